//! Rows read from and written to the store.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, ProductId, Role, UserId};
use uuid::Uuid;

/// A registered user account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to register a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub role: Role,
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Editable product fields, used for both create and full update.
#[derive(Debug, Clone)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
}

/// Offset pagination for catalog listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Page {
    pub const DEFAULT_LIMIT: i64 = 20;
    pub const MAX_LIMIT: i64 = 100;

    /// Builds a page from optional `limit` and 1-based `page` parameters.
    ///
    /// Out-of-range values, including pages whose offset would overflow,
    /// fall back to the defaults.
    pub fn from_params(limit: Option<i64>, page: Option<i64>) -> Self {
        let limit = limit
            .filter(|l| (1..=Self::MAX_LIMIT).contains(l))
            .unwrap_or(Self::DEFAULT_LIMIT);
        let offset = page
            .filter(|p| *p > 1)
            .and_then(|p| (p - 1).checked_mul(limit))
            .unwrap_or(0);
        Self { limit, offset }
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::from_params(None, None)
    }
}

/// A cart line joined with its product, as shown to the shopper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub id: Uuid,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
}

impl CartItem {
    pub fn subtotal(&self) -> Option<Money> {
        self.price.checked_mul(self.quantity)
    }
}

/// A cart line as consumed by checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Price and stock of a product, read under a row lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProductStock {
    pub product_id: ProductId,
    pub price: Money,
    pub stock_quantity: i32,
}

/// Order header to insert.
#[derive(Debug, Clone, Copy)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: OrderStatus,
}

/// A placed order header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

/// Order line to insert.
#[derive(Debug, Clone, Copy)]
pub struct NewOrderLine {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_purchase: Money,
}

/// A stored order line with its product name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_purchase: Money,
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderWithLines {
    pub order: Order,
    pub lines: Vec<OrderLine>,
}
