use common::ProductId;
use thiserror::Error;

use crate::memory::FailPoint;

/// SQLSTATE raised when an integer result leaves its column's range.
pub(crate) const NUMERIC_VALUE_OUT_OF_RANGE: &str = "22003";

/// SQLSTATE codes after which a fresh attempt may succeed.
const RETRYABLE_SQLSTATES: [&str; 3] = [
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
];

/// Errors that can occur when interacting with the store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A unique constraint rejected the write.
    #[error("Duplicate {0}")]
    Duplicate(&'static str),

    /// The write references a row that does not exist.
    #[error("Referenced {0} does not exist")]
    MissingReference(&'static str),

    /// The row cannot be deleted while other rows reference it.
    #[error("{0} is still referenced by existing orders")]
    StillReferenced(&'static str),

    /// A cart quantity would exceed the range of the quantity column.
    #[error("Cart quantity for product {0} is too large")]
    QuantityOutOfRange(ProductId),

    /// A stock decrement would have taken the quantity below zero.
    #[error("Stock for product {product_id} cannot be decremented by {quantity}")]
    StockUnderflow {
        product_id: ProductId,
        quantity: i32,
    },

    /// A stored value could not be decoded into its domain type.
    #[error("Invalid stored data: {0}")]
    InvalidData(String),

    /// A failure injected into the in-memory store.
    #[error("Injected failure at {0:?}")]
    Injected(FailPoint),
}

impl StoreError {
    /// Returns true if retrying the whole unit of work may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Database(sqlx::Error::Database(db_err)) => db_err
                .code()
                .is_some_and(|code| RETRYABLE_SQLSTATES.contains(&code.as_ref())),
            StoreError::Database(sqlx::Error::PoolTimedOut) => true,
            _ => false,
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
