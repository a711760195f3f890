//! Stand-ins for outbound dependencies, installed through [`Overrides`](crate::Overrides).

use std::sync::Mutex;

use account_service::models::User;
use account_service::services::WelcomeNotifier;
use async_trait::async_trait;
use service_core::error::AppError;

/// Records every welcome notification instead of sending it.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<User>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<User> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn sent_to(&self, email: &str) -> bool {
        self.sent().iter().any(|user| user.email == email)
    }
}

#[async_trait]
impl WelcomeNotifier for RecordingNotifier {
    async fn account_created(&self, user: &User) -> Result<(), AppError> {
        self.sent
            .lock()
            .map_err(|_| AppError::InternalError(anyhow::anyhow!("recording notifier poisoned")))?
            .push(user.clone());
        Ok(())
    }
}

/// Fails every notification, as an unreachable notification service would.
pub struct FailingNotifier;

#[async_trait]
impl WelcomeNotifier for FailingNotifier {
    async fn account_created(&self, _user: &User) -> Result<(), AppError> {
        Err(AppError::BadGateway("notification service unavailable".to_string()))
    }
}
