//! Order writer: turns a validated cart into durable rows inside the unit of work.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus};
use store::{NewOrder, NewOrderLine, UnitOfWork};

use crate::error::CheckoutError;
use crate::validator::ValidatedCart;

/// What a successful checkout hands back to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Writes the order, its lines, the stock decrements and the cart clear.
///
/// Nothing is visible until the caller commits `tx`. Any error leaves the
/// unit in a state the caller must roll back.
pub async fn commit_order<U: UnitOfWork>(
    tx: &mut U,
    cart: &ValidatedCart,
) -> Result<CheckoutReceipt, CheckoutError> {
    let order = tx
        .insert_order(NewOrder {
            user_id: cart.user_id(),
            total_amount: cart.total(),
            status: OrderStatus::Pending,
        })
        .await?;

    for line in cart.lines() {
        tx.insert_order_line(NewOrderLine {
            order_id: order.id,
            product_id: line.product_id,
            quantity: line.quantity,
            price_at_purchase: line.unit_price,
        })
        .await?;
    }

    for line in cart.lines() {
        tx.decrement_stock(line.product_id, line.quantity).await?;
    }

    let product_ids: Vec<_> = cart.lines().iter().map(|line| line.product_id).collect();
    tx.clear_cart(cart.user_id(), &product_ids).await?;

    Ok(CheckoutReceipt {
        order_id: order.id,
        total_amount: order.total_amount,
        status: order.status,
        created_at: order.created_at,
    })
}
