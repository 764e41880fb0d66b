//! Registration and login.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::{Role, UserId};
use serde::{Deserialize, Serialize};
use store::{NewUser, Store};

use crate::AppState;
use crate::auth::{self, AuthError};
use crate::error::ApiError;

#[derive(Deserialize)]
pub struct CredentialsRequest {
    pub email: String,
    pub password: String,
}

impl CredentialsRequest {
    /// Trims and lowercases the email, rejecting empty fields.
    fn normalized(self) -> Result<(String, String), ApiError> {
        let email = self.email.trim().to_lowercase();
        if email.is_empty() || self.password.is_empty() {
            return Err(ApiError::BadRequest(
                "Email or password can't be empty".to_string(),
            ));
        }
        Ok((email, self.password))
    }
}

#[derive(Serialize)]
pub struct RegisteredResponse {
    pub message: &'static str,
    pub user_id: UserId,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

/// POST /users/register
#[tracing::instrument(skip_all)]
pub async fn register<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<(StatusCode, Json<RegisteredResponse>), ApiError> {
    let (email, password) = req.normalized()?;
    let password_hash = auth::hash_password_blocking(password).await?;

    let user = state
        .store
        .create_user(NewUser {
            email,
            password_hash,
            role: Role::Customer,
        })
        .await?;

    tracing::info!(user_id = %user.id, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(RegisteredResponse {
            message: "User registered successfully",
            user_id: user.id,
        }),
    ))
}

/// POST /users/login
#[tracing::instrument(skip_all)]
pub async fn login<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Json(req): Json<CredentialsRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let (email, password) = req.normalized()?;

    let user = state
        .store
        .find_user_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;
    if !auth::verify_password_blocking(password, user.password_hash).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let token = state.tokens.issue(user.id, user.role)?;
    Ok(Json(TokenResponse { token }))
}
