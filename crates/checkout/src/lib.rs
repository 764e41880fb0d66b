//! Checkout transaction engine.
//!
//! Converts a user's cart into a durable order without overselling stock.
//! The work runs in three steps inside one [`store::UnitOfWork`]:
//!
//! - [`read_snapshot`] reads the cart and locks the referenced products
//! - [`validate`] checks every line against the locked stock
//! - [`commit_order`] writes the order and lines, decrements stock and
//!   clears the cart
//!
//! [`CheckoutService`] drives the steps under a deadline and commits or
//! discards the unit. [`OrderStatusService`] handles later status changes.

pub mod committer;
pub mod error;
pub mod retry;
pub mod service;
pub mod snapshot;
pub mod status;
pub mod validator;

pub use committer::{CheckoutReceipt, commit_order};
pub use error::{CheckoutError, StatusError};
pub use retry::{RetryPolicy, with_retry};
pub use service::{CheckoutService, DEFAULT_DEADLINE};
pub use snapshot::{CartSnapshot, SnapshotLine, read_snapshot};
pub use status::OrderStatusService;
pub use validator::{ValidatedCart, validate};
