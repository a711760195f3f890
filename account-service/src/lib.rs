pub mod config;
pub mod db;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

use std::sync::Arc;

use axum::{
    body::Body,
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use service_core::middleware::{make_request_span, request_id_middleware};
use tower_http::trace::TraceLayer;

use crate::config::AccountConfig;
use crate::services::{SessionCache, UserRepository, WelcomeNotifier};

/// The composed service graph shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: AccountConfig,
    pub users: Arc<dyn UserRepository>,
    pub sessions: Arc<dyn SessionCache>,
    pub notifier: Arc<dyn WelcomeNotifier>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route(
            "/users",
            post(handlers::create_user).get(handlers::list_users),
        )
        .route(
            "/users/:user_id",
            get(handlers::get_user).delete(handlers::delete_user),
        )
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/me",
            get(handlers::current_user).delete(handlers::end_session),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        // Outermost so the span sees the request id.
        .layer(from_fn(request_id_middleware))
}
