use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use service_core::error::AppError;
use uuid::Uuid;
use validator::Validate;

use crate::dtos::{CreateUserRequest, UserResponse};
use crate::models::{IdentityProvider, User};
use crate::AppState;

pub async fn create_user(
    State(state): State<AppState>,
    Json(req): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserResponse>), AppError> {
    req.validate()?;

    let provider =
        IdentityProvider::from_code(req.provider).map_err(|e| AppError::BadRequest(e.into()))?;

    if state.config.is_prod() && !provider.allowed_in_production() {
        tracing::warn!(provider = %provider, "Rejected non-production provider");
        return Err(AppError::Forbidden(anyhow::anyhow!(
            "Provider '{}' is not accepted in production",
            provider
        )));
    }

    if state.users.find_by_email(&req.email).await?.is_some() {
        return Err(AppError::Conflict(anyhow::anyhow!(
            "Email {} is already registered",
            req.email.trim().to_lowercase()
        )));
    }

    let user = User::new(&req.email, req.display_name, provider);
    state.users.insert(&user).await?;

    // Account creation does not depend on the notification being delivered.
    if let Err(e) = state.notifier.account_created(&user).await {
        tracing::warn!(error = %e, user_id = %user.user_id, "Welcome notification failed");
    }

    tracing::info!(user_id = %user.user_id, provider = %provider, "User created");

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn list_users(State(state): State<AppState>) -> Result<Json<Vec<UserResponse>>, AppError> {
    let users = state.users.list().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserResponse>, AppError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User {} not found", user_id)))?;

    Ok(Json(user.into()))
}

pub async fn delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    if !state.users.delete(user_id).await? {
        return Err(AppError::NotFound(anyhow::anyhow!(
            "User {} not found",
            user_id
        )));
    }

    let dropped = state.sessions.remove_user(user_id).await?;
    tracing::info!(user_id = %user_id, sessions_dropped = dropped, "User deleted");

    Ok(StatusCode::NO_CONTENT)
}
