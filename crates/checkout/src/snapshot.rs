//! Cart snapshot reader.

use std::collections::HashMap;

use common::{Money, ProductId, UserId};
use store::{ProductStock, UnitOfWork};

use crate::error::CheckoutError;

/// One cart line joined with the product's current price and stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub available_stock: i32,
}

impl SnapshotLine {
    /// Unit price × quantity, or `None` if it does not fit in [`Money`].
    pub fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_mul(self.quantity)
    }
}

/// A user's cart as read under lock, ordered by product id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSnapshot {
    user_id: UserId,
    lines: Vec<SnapshotLine>,
}

impl CartSnapshot {
    pub fn new(user_id: UserId, mut lines: Vec<SnapshotLine>) -> Self {
        lines.sort_by_key(|l| l.product_id);
        Self { user_id, lines }
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn lines(&self) -> &[SnapshotLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Reads the user's cart and locks every product it references.
///
/// The locks are held until `tx` ends, so no other unit of work can change
/// the stock that validation is about to check. An empty cart yields an
/// empty snapshot.
pub async fn read_snapshot<U: UnitOfWork>(
    tx: &mut U,
    user_id: UserId,
) -> Result<CartSnapshot, CheckoutError> {
    let cart = tx.cart_lines(user_id).await?;
    if cart.is_empty() {
        return Ok(CartSnapshot::new(user_id, Vec::new()));
    }

    let mut product_ids: Vec<ProductId> = cart.iter().map(|line| line.product_id).collect();
    product_ids.sort();
    product_ids.dedup();

    let stock: HashMap<ProductId, ProductStock> = tx
        .products_for_update(&product_ids)
        .await?
        .into_iter()
        .map(|s| (s.product_id, s))
        .collect();

    let lines = cart
        .into_iter()
        .map(|line| {
            let product = stock
                .get(&line.product_id)
                .ok_or(CheckoutError::ProductUnavailable {
                    product_id: line.product_id,
                })?;
            Ok(SnapshotLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: product.price,
                available_stock: product.stock_quantity,
            })
        })
        .collect::<Result<Vec<_>, CheckoutError>>()?;

    tracing::debug!(%user_id, lines = lines.len(), "cart snapshot read");
    Ok(CartSnapshot::new(user_id, lines))
}
