//! Backing stores owned by a harness instance and how each one is reset.

use std::sync::Arc;

use account_service::models::User;
use account_service::services::{SessionCache, UserRepository};
use account_service::AppState;
use async_trait::async_trait;
use service_core::error::AppError;

use crate::error::HarnessError;

#[async_trait]
pub trait BackingStore: Send + Sync {
    fn name(&self) -> &'static str;

    async fn ping(&self) -> Result<(), AppError>;

    /// Return the store to its baseline contents.
    async fn reset(&self) -> Result<(), AppError>;

    async fn release(&self);
}

/// The relational user store, reset to the seeded baseline.
pub struct UserDatabase {
    users: Arc<dyn UserRepository>,
    baseline: Arc<[User]>,
}

#[async_trait]
impl BackingStore for UserDatabase {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.users.health_check().await
    }

    async fn reset(&self) -> Result<(), AppError> {
        self.users.reseed(&self.baseline).await
    }

    async fn release(&self) {
        self.users.close().await;
    }
}

/// The session cache, reset to empty.
pub struct SessionStore {
    sessions: Arc<dyn SessionCache>,
}

#[async_trait]
impl BackingStore for SessionStore {
    fn name(&self) -> &'static str {
        "sessions"
    }

    async fn ping(&self) -> Result<(), AppError> {
        self.sessions.health_check().await.map_err(AppError::InternalError)
    }

    async fn reset(&self) -> Result<(), AppError> {
        self.sessions.clear().await.map_err(AppError::InternalError)
    }

    async fn release(&self) {}
}

/// Stores that reset must cover, in the order they are reset.
pub(crate) fn managed_stores(state: &AppState, baseline: Arc<[User]>) -> Vec<Arc<dyn BackingStore>> {
    vec![
        Arc::new(UserDatabase {
            users: state.users.clone(),
            baseline,
        }),
        Arc::new(SessionStore {
            sessions: state.sessions.clone(),
        }),
    ]
}

/// Reset each store in turn, stopping at the first failure.
pub(crate) async fn reset_all(stores: &[Arc<dyn BackingStore>]) -> Result<(), HarnessError> {
    for store in stores {
        store.reset().await.map_err(|source| {
            tracing::error!(store = store.name(), error = %source, "Store reset failed");
            HarnessError::ResetFailure {
                store: store.name(),
                source,
            }
        })?;
        tracing::debug!(store = store.name(), "Store reset");
    }
    Ok(())
}

pub(crate) async fn ping_all(stores: &[Arc<dyn BackingStore>]) -> Result<(), HarnessError> {
    for store in stores {
        store.ping().await.map_err(|e| {
            HarnessError::ProvisioningFailure(
                anyhow::Error::new(e).context(format!("store '{}' is unreachable", store.name())),
            )
        })?;
    }
    Ok(())
}
