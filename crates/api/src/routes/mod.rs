//! Request handlers, one module per resource.

pub mod cart;
pub mod ops;
pub mod orders;
pub mod products;
pub mod users;

use std::str::FromStr;

use crate::error::ApiError;

/// Parses a path id, reporting `what` in the 400 message.
pub(crate) fn parse_id<T: FromStr>(raw: &str, what: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Invalid {what} ID format")))
}
