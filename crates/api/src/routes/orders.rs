//! Checkout, order history and order status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderStatus, ProductId};
use serde::{Deserialize, Serialize};
use store::{OrderWithLines, Store};

use super::parse_id;
use crate::AppState;
use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: OrderId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct OrderHistoryResponse {
    pub order_id: OrderId,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub items: Vec<OrderHistoryItemResponse>,
}

#[derive(Serialize)]
pub struct OrderHistoryItemResponse {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: i32,
    pub price_at_purchase: Money,
}

impl From<OrderWithLines> for OrderHistoryResponse {
    fn from(entry: OrderWithLines) -> Self {
        Self {
            order_id: entry.order.id,
            total_amount: entry.order.total_amount,
            status: entry.order.status,
            created_at: entry.order.created_at,
            items: entry
                .lines
                .into_iter()
                .map(|line| OrderHistoryItemResponse {
                    product_id: line.product_id,
                    product_name: line.product_name,
                    quantity: line.quantity,
                    price_at_purchase: line.price_at_purchase,
                })
                .collect(),
        }
    }
}

#[derive(Serialize)]
pub struct StatusUpdatedResponse {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub message: String,
}

// -- Handlers --

/// POST /checkout: turn the caller's cart into a pending order.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn checkout<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let receipt = state.checkout.checkout(user.user_id).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            order_id: receipt.order_id,
            total_amount: receipt.total_amount,
            status: receipt.status,
            message: "Checkout successful! Your order has been placed.",
        }),
    ))
}

/// GET /orders: the caller's orders, newest first.
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn history<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<Vec<OrderHistoryResponse>>, ApiError> {
    let orders = state.store.order_history(user.user_id).await?;
    Ok(Json(orders.into_iter().map(Into::into).collect()))
}

/// PUT /orders/{id}/status
#[tracing::instrument(skip(state, req), fields(admin_id = %admin.0.user_id))]
pub async fn update_status<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<StatusUpdatedResponse>, ApiError> {
    let order_id: OrderId = parse_id(&id, "order")?;
    let order = state
        .statuses
        .update_status(order_id, req.status.trim())
        .await?;

    Ok(Json(StatusUpdatedResponse {
        order_id: order.id,
        status: order.status,
        message: format!("Order status updated to {}", order.status),
    }))
}
