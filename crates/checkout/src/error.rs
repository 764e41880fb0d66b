//! Checkout and order status error types.

use std::time::Duration;

use common::{OrderId, OrderStatus, ParseStatusError, ProductId};
use store::StoreError;
use thiserror::Error;

/// Errors that can end a checkout.
///
/// Every variant means the unit of work was discarded: cart, stock and
/// orders are exactly as they were before the call.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The user's cart has no lines.
    #[error("Your cart is empty")]
    EmptyCart,

    /// A cart line asks for more units than are in stock.
    #[error(
        "Insufficient stock for product {product_id}: requested {requested}, available {available}"
    )]
    InsufficientStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// A cart line references a product that no longer exists.
    #[error("Product {product_id} is no longer available")]
    ProductUnavailable { product_id: ProductId },

    /// Line totals or their sum do not fit in a money amount.
    #[error("Order total exceeds the largest supported amount")]
    TotalOverflow,

    /// The checkout did not finish before its deadline.
    #[error("Checkout timed out after {0:?}")]
    Timeout(Duration),

    /// The store could not complete the unit of work.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Short label used for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            CheckoutError::EmptyCart => "empty_cart",
            CheckoutError::InsufficientStock { .. } => "insufficient_stock",
            CheckoutError::ProductUnavailable { .. } => "product_unavailable",
            CheckoutError::TotalOverflow => "total_overflow",
            CheckoutError::Timeout(_) => "timeout",
            CheckoutError::Store(_) => "store",
        }
    }

    /// Returns true if a fresh attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CheckoutError::Store(err) if err.is_retryable())
    }
}

/// Errors that can occur when changing an order's status.
#[derive(Debug, Error)]
pub enum StatusError {
    /// The requested status is not one of the known values.
    #[error(transparent)]
    InvalidStatus(#[from] ParseStatusError),

    /// Order not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The transition is not in the allow-list.
    #[error("Invalid status transition: cannot move order from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },

    /// The order's status changed between read and write.
    #[error("Order {0} was modified concurrently")]
    ConcurrentUpdate(OrderId),

    /// Store error.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
