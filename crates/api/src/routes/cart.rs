//! Shopping cart endpoints for the authenticated user.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use checkout::CheckoutError;
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{CartItem, Store};
use uuid::Uuid;

use super::parse_id;
use super::products::MessageResponse;
use crate::AppState;
use crate::auth::AuthUser;
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    pub quantity: i32,
}

#[derive(Serialize)]
pub struct CartItemResponse {
    pub cart_item_id: Uuid,
    pub product_id: ProductId,
    pub name: String,
    pub price: Money,
    pub quantity: i32,
    pub subtotal: Money,
}

impl TryFrom<CartItem> for CartItemResponse {
    type Error = CheckoutError;

    fn try_from(item: CartItem) -> Result<Self, Self::Error> {
        Ok(Self {
            subtotal: item.subtotal().ok_or(CheckoutError::TotalOverflow)?,
            cart_item_id: item.id,
            product_id: item.product_id,
            name: item.name,
            price: item.price,
            quantity: item.quantity,
        })
    }
}

#[derive(Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub total_price: Money,
}

/// POST /cart
#[tracing::instrument(skip(state, user, req), fields(user_id = %user.user_id))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Json(req): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), ApiError> {
    let product_id: ProductId = parse_id(&req.product_id, "product")?;
    if req.quantity <= 0 {
        return Err(ApiError::BadRequest(
            "Quantity must be greater than 0".to_string(),
        ));
    }

    state
        .store
        .add_to_cart(user.user_id, product_id, req.quantity)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Item added to cart successfully".to_string(),
        }),
    ))
}

/// GET /cart
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
) -> Result<Json<CartResponse>, ApiError> {
    let items = state
        .store
        .cart_items(user.user_id)
        .await?
        .into_iter()
        .map(CartItemResponse::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let total_price = Money::checked_sum(items.iter().map(|item| item.subtotal))
        .ok_or(CheckoutError::TotalOverflow)?;

    Ok(Json(CartResponse { items, total_price }))
}

/// DELETE /cart/{product_id}
#[tracing::instrument(skip(state, user), fields(user_id = %user.user_id))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: AuthUser,
    Path(product_id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id: ProductId = parse_id(&product_id, "product")?;
    if !state
        .store
        .remove_from_cart(user.user_id, product_id)
        .await?
    {
        return Err(ApiError::NotFound("Item not found in your cart".to_string()));
    }

    Ok(Json(MessageResponse {
        message: "Item removed from cart successfully".to_string(),
    }))
}
