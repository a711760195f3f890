use axum::{extract::State, http::StatusCode, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use service_core::error::AppError;
use uuid::Uuid;

use crate::dtos::{CreateSessionRequest, UserResponse};
use crate::AppState;

fn session_cookie(state: &AppState, value: String) -> Cookie<'static> {
    Cookie::build((state.config.session.cookie_name.clone(), value))
        .path("/")
        .http_only(true)
        .secure(state.config.session.secure_cookie)
        .same_site(SameSite::Lax)
        .build()
}

fn unauthorized() -> AppError {
    AppError::Unauthorized(anyhow::anyhow!("No active session"))
}

/// Start a session for an existing user and hand the id back as a cookie.
pub async fn create_session(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(req): Json<CreateSessionRequest>,
) -> Result<(CookieJar, Json<UserResponse>), AppError> {
    let user = state
        .users
        .find_by_id(req.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("User {} not found", req.user_id)))?;

    let session_id = Uuid::new_v4().to_string();
    state.sessions.put(&session_id, user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "Session started");

    let jar = jar.add(session_cookie(&state, session_id));
    Ok((jar, Json(user.into())))
}

pub async fn current_user(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<UserResponse>, AppError> {
    let session_id = jar
        .get(&state.config.session.cookie_name)
        .map(|cookie| cookie.value().to_string())
        .ok_or_else(unauthorized)?;

    let user_id = state
        .sessions
        .get(&session_id)
        .await?
        .ok_or_else(unauthorized)?;

    // A session can outlive its user row; treat that as signed out.
    let user = state
        .users
        .find_by_id(user_id)
        .await?
        .ok_or_else(unauthorized)?;

    Ok(Json(user.into()))
}

pub async fn end_session(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, StatusCode), AppError> {
    if let Some(cookie) = jar.get(&state.config.session.cookie_name) {
        state.sessions.remove(cookie.value()).await?;
    }

    let jar = jar.remove(session_cookie(&state, String::new()));
    Ok((jar, StatusCode::NO_CONTENT))
}
