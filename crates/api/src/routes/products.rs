//! Catalog endpoints. Reads are public; writes need an admin token.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use serde::{Deserialize, Serialize};
use store::{Page, Product, ProductInput, Store};

use super::parse_id;
use crate::AppState;
use crate::auth::AdminUser;
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct ListParams {
    pub limit: Option<i64>,
    pub page: Option<i64>,
}

#[derive(Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: i64,
    pub stock_quantity: i32,
}

/// Highest accepted unit price, in cents ($1,000,000.00).
pub const MAX_PRICE_CENTS: i64 = 100_000_000;

impl ProductRequest {
    fn validated(self) -> Result<ProductInput, ApiError> {
        let name = self.name.trim().to_string();
        if name.is_empty()
            || !(1..=MAX_PRICE_CENTS).contains(&self.price)
            || self.stock_quantity < 0
        {
            return Err(ApiError::BadRequest(format!(
                "Invalid product details: name is required, price must be between 1 and {MAX_PRICE_CENTS} cents, stock cannot be negative"
            )));
        }
        Ok(ProductInput {
            name,
            description: self.description,
            price: Money::from_cents(self.price),
            stock_quantity: self.stock_quantity,
        })
    }
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub stock_quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Product> for ProductResponse {
    fn from(p: Product) -> Self {
        Self {
            id: p.id,
            name: p.name,
            description: p.description,
            price: p.price,
            stock_quantity: p.stock_quantity,
            created_at: p.created_at,
            updated_at: p.updated_at,
        }
    }
}

#[derive(Serialize)]
pub struct ProductCreatedResponse {
    pub message: &'static str,
    pub product_id: ProductId,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: String,
}

// -- Handlers --

/// GET /products
#[tracing::instrument(skip(state, params))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let page = Page::from_params(params.limit, params.page);
    let products = state.store.list_products(page).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// GET /products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product = state
        .store
        .get_product(product_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(product.into()))
}

/// POST /products
#[tracing::instrument(skip(state, req), fields(admin_id = %admin.0.user_id))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductCreatedResponse>), ApiError> {
    let product = state.store.create_product(req.validated()?).await?;
    tracing::info!(product_id = %product.id, "product created");
    Ok((
        StatusCode::CREATED,
        Json(ProductCreatedResponse {
            message: "Product created successfully",
            product_id: product.id,
        }),
    ))
}

/// PUT /products/{id}
#[tracing::instrument(skip(state, req), fields(admin_id = %admin.0.user_id))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    let product = state
        .store
        .update_product(product_id, req.validated()?)
        .await?
        .ok_or_else(|| ApiError::NotFound("Product not found".to_string()))?;
    Ok(Json(product.into()))
}

/// DELETE /products/{id}
#[tracing::instrument(skip(state), fields(admin_id = %admin.0.user_id))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    admin: AdminUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let product_id: ProductId = parse_id(&id, "product")?;
    if !state.store.delete_product(product_id).await? {
        return Err(ApiError::NotFound("Product not found".to_string()));
    }
    Ok(Json(MessageResponse {
        message: "Product deleted successfully".to_string(),
    }))
}
