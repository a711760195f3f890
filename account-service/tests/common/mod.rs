//! Router-level helpers: requests go through `tower::ServiceExt::oneshot`,
//! no sockets involved.

#![allow(dead_code)]

use account_service::config::AccountConfig;
use account_service::startup::ServiceRegistry;
use account_service::{build_router, AppState};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

pub struct TestRouter {
    pub router: Router,
    pub state: AppState,
}

impl TestRouter {
    pub fn new() -> Self {
        Self::with_config(AccountConfig::for_tests())
    }

    pub fn with_config(config: AccountConfig) -> Self {
        let state = ServiceRegistry::new(config)
            .compose()
            .expect("Failed to compose test state");
        let router = build_router(state.clone());
        Self { router, state }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Router failed");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read body")
            .to_bytes();
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("Body is not JSON")
        };

        (status, headers, body)
    }

    pub async fn post_json(&self, uri: &str, body: serde_json::Value) -> (StatusCode, axum::http::HeaderMap, serde_json::Value) {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        let (status, _, body) = self
            .send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await;
        (status, body)
    }
}
