mod common;

use account_service::config::{AccountConfig, Environment};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use common::TestRouter;
use serde_json::json;

#[tokio::test]
async fn health_check_reports_stores() {
    let app = TestRouter::new();

    let (status, headers, body) = app
        .send(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["database"], "up");
    assert!(headers.contains_key("x-request-id"));
}

#[tokio::test]
async fn create_user_returns_integer_provider() {
    let app = TestRouter::new();

    let (status, _, body) = app
        .post_json(
            "/users",
            json!({ "email": "Grace@Example.com", "display_name": "Grace", "provider": 4 }),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["provider"], 4);
    assert_eq!(body["provider_name"], "microsoft");

    let user_id = body["user_id"].as_str().unwrap();
    let (status, fetched) = app.get(&format!("/users/{}", user_id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["display_name"], "Grace");
}

#[tokio::test]
async fn unknown_provider_code_is_rejected() {
    let app = TestRouter::new();

    let (status, _, body) = app
        .post_json("/users", json!({ "email": "x@example.com", "provider": 99 }))
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("99"));
}

#[tokio::test]
async fn invalid_email_fails_validation() {
    let app = TestRouter::new();

    let (status, _, _) = app
        .post_json("/users", json!({ "email": "not-an-email", "provider": 1 }))
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn duplicate_email_conflicts() {
    let app = TestRouter::new();
    let payload = json!({ "email": "dup@example.com", "provider": 2 });

    let (first, _, _) = app.post_json("/users", payload.clone()).await;
    let (second, _, _) = app.post_json("/users", payload).await;

    assert_eq!(first, StatusCode::CREATED);
    assert_eq!(second, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_provider_forbidden_in_production() {
    let mut config = AccountConfig::for_tests();
    config.environment = Environment::Prod;
    config.common.port = 8080;
    let app = TestRouter::with_config(config);

    let (status, _, _) = app
        .post_json("/users", json!({ "email": "qa@example.com", "provider": 6 }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.get("/users").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn delete_user_then_not_found() {
    let app = TestRouter::new();
    let (_, _, created) = app
        .post_json("/users", json!({ "email": "bye@example.com", "provider": 7 }))
        .await;
    let uri = format!("/users/{}", created["user_id"].as_str().unwrap());

    let (status, _, _) = app
        .send(
            Request::builder()
                .method("DELETE")
                .uri(&uri)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.get(&uri).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn session_cookie_identifies_user() {
    let app = TestRouter::new();
    let (_, _, created) = app
        .post_json("/users", json!({ "email": "me@example.com", "provider": 3 }))
        .await;

    let (status, headers, _) = app
        .post_json("/sessions", json!({ "user_id": created["user_id"] }))
        .await;
    assert_eq!(status, StatusCode::OK);

    let set_cookie = headers
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("No session cookie set");
    let cookie_pair = set_cookie.split(';').next().unwrap().to_string();
    assert!(cookie_pair.starts_with("account_session="));

    let (status, _, me) = app
        .send(
            Request::builder()
                .uri("/sessions/me")
                .header(header::COOKIE, &cookie_pair)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "me@example.com");

    let (status, _) = app.get("/sessions/me").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}
