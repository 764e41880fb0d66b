//! Shared types for the storefront workspace.
//!
//! Typed identifiers, money amounts, user roles and the order status
//! state machine. Every other crate depends on these.

pub mod ids;
pub mod money;
pub mod role;
pub mod status;

pub use ids::{OrderId, ProductId, UserId};
pub use money::Money;
pub use role::Role;
pub use status::{OrderStatus, ParseStatusError};
