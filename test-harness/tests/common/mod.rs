//! Shared fixtures for harness integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use account_service::models::{IdentityProvider, User};
use account_service::services::{InMemorySessionCache, SessionCache};
use async_trait::async_trait;
use serde_json::{json, Value};
use test_harness::{init_test_tracing, HarnessFactory, HarnessInstance, Overrides, TestClient};
use uuid::Uuid;

pub fn factory() -> HarnessFactory {
    init_test_tracing();
    HarnessFactory::default()
}

pub async fn spawn() -> HarnessInstance {
    factory().spawn().await.expect("Failed to spawn harness instance")
}

pub fn seed_user() -> User {
    User::new("seed@example.com", Some("Seed".to_string()), IdentityProvider::Google)
}

/// POST a user and return the response body.
pub async fn create_user(client: &TestClient, email: &str, provider: i32) -> Value {
    let response = client
        .post_json("/users", &json!({ "email": email, "provider": provider }))
        .send()
        .await
        .expect("Failed to send create_user");
    assert_eq!(response.status(), 201, "creating {email}");
    response.json().await.expect("create_user body is not JSON")
}

pub async fn list_emails(client: &TestClient) -> Vec<String> {
    let users: Vec<Value> = client
        .get("/users")
        .send()
        .await
        .expect("Failed to list users")
        .json()
        .await
        .expect("list body is not JSON");
    users
        .iter()
        .filter_map(|u| u["email"].as_str().map(str::to_string))
        .collect()
}

/// Session cache whose `clear` takes `delay`.
pub struct SlowSessionCache {
    inner: InMemorySessionCache,
    delay: Duration,
}

impl SlowSessionCache {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemorySessionCache::new(),
            delay,
        }
    }
}

#[async_trait]
impl SessionCache for SlowSessionCache {
    async fn health_check(&self) -> anyhow::Result<()> {
        self.inner.health_check().await
    }

    async fn put(&self, session_id: &str, user_id: Uuid) -> anyhow::Result<()> {
        self.inner.put(session_id, user_id).await
    }

    async fn get(&self, session_id: &str) -> anyhow::Result<Option<Uuid>> {
        self.inner.get(session_id).await
    }

    async fn remove(&self, session_id: &str) -> anyhow::Result<bool> {
        self.inner.remove(session_id).await
    }

    async fn remove_user(&self, user_id: Uuid) -> anyhow::Result<usize> {
        self.inner.remove_user(user_id).await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.clear().await
    }

    async fn session_count(&self) -> anyhow::Result<usize> {
        self.inner.session_count().await
    }
}

/// Session cache that cannot be cleared.
#[derive(Default)]
pub struct BrokenSessionCache {
    inner: InMemorySessionCache,
}

#[async_trait]
impl SessionCache for BrokenSessionCache {
    async fn health_check(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn put(&self, session_id: &str, user_id: Uuid) -> anyhow::Result<()> {
        self.inner.put(session_id, user_id).await
    }

    async fn get(&self, session_id: &str) -> anyhow::Result<Option<Uuid>> {
        self.inner.get(session_id).await
    }

    async fn remove(&self, session_id: &str) -> anyhow::Result<bool> {
        self.inner.remove(session_id).await
    }

    async fn remove_user(&self, user_id: Uuid) -> anyhow::Result<usize> {
        self.inner.remove_user(user_id).await
    }

    async fn clear(&self) -> anyhow::Result<()> {
        anyhow::bail!("session cache connection lost")
    }

    async fn session_count(&self) -> anyhow::Result<usize> {
        self.inner.session_count().await
    }
}

pub fn slow_sessions(delay: Duration) -> Overrides {
    Overrides::new().session_cache(move || Arc::new(SlowSessionCache::new(delay)) as Arc<dyn SessionCache>)
}

pub fn broken_sessions() -> Overrides {
    Overrides::new().session_cache(|| Arc::new(BrokenSessionCache::default()) as Arc<dyn SessionCache>)
}
