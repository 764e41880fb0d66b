//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::{CheckoutError, StatusError};
use store::StoreError;

use crate::auth::AuthError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// Authentication or authorization failure.
    Auth(AuthError),
    /// Checkout was rejected or failed.
    Checkout(CheckoutError),
    /// Order status change was rejected or failed.
    Status(StatusError),
    /// Storage error outside checkout.
    Store(StoreError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Auth(err) => auth_error_to_response(err),
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::Status(err) => status_error_to_response(err),
            ApiError::Store(err) => store_error_to_response(err),
            ApiError::Internal(msg) => internal(msg),
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn internal(detail: String) -> (StatusCode, String) {
    tracing::error!(error = %detail, "internal server error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn auth_error_to_response(err: AuthError) -> (StatusCode, String) {
    match &err {
        AuthError::InvalidCredentials
        | AuthError::MissingToken
        | AuthError::MalformedHeader
        | AuthError::InvalidToken => (StatusCode::UNAUTHORIZED, err.to_string()),
        AuthError::Forbidden => (StatusCode::FORBIDDEN, err.to_string()),
        AuthError::Hash(_) | AuthError::Issue(_) => internal(err.to_string()),
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        CheckoutError::EmptyCart | CheckoutError::TotalOverflow => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CheckoutError::InsufficientStock { .. } | CheckoutError::ProductUnavailable { .. } => {
            (StatusCode::CONFLICT, err.to_string())
        }
        CheckoutError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, err.to_string()),
        CheckoutError::Store(_) => internal(err.to_string()),
    }
}

fn status_error_to_response(err: StatusError) -> (StatusCode, String) {
    match &err {
        StatusError::InvalidStatus(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        StatusError::OrderNotFound(_) => (StatusCode::NOT_FOUND, err.to_string()),
        StatusError::InvalidTransition { .. } | StatusError::ConcurrentUpdate(_) => {
            (StatusCode::CONFLICT, err.to_string())
        }
        StatusError::Store(_) => internal(err.to_string()),
    }
}

fn store_error_to_response(err: StoreError) -> (StatusCode, String) {
    match &err {
        StoreError::Duplicate("email") => {
            (StatusCode::CONFLICT, "Email already in use".to_string())
        }
        StoreError::Duplicate(_) => (StatusCode::CONFLICT, err.to_string()),
        StoreError::MissingReference(what) => {
            (StatusCode::NOT_FOUND, format!("Referenced {what} not found"))
        }
        StoreError::StillReferenced("product") => (
            StatusCode::CONFLICT,
            "Could not delete product. It may be part of an existing order.".to_string(),
        ),
        StoreError::StillReferenced(_) => (StatusCode::CONFLICT, err.to_string()),
        StoreError::QuantityOutOfRange(_) => (StatusCode::BAD_REQUEST, err.to_string()),
        _ => internal(err.to_string()),
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StatusError> for ApiError {
    fn from(err: StatusError) -> Self {
        ApiError::Status(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Store(err)
    }
}
