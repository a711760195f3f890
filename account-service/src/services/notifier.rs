//! Outbound notification on account creation.

use async_trait::async_trait;
use serde::Serialize;
use service_core::error::AppError;
use std::time::Duration;
use tracing::instrument;

use crate::config::NotificationConfig;
use crate::models::User;

#[async_trait]
pub trait WelcomeNotifier: Send + Sync {
    async fn account_created(&self, user: &User) -> Result<(), AppError>;
}

#[derive(Serialize)]
struct WelcomeEmail<'a> {
    to: &'a str,
    template: &'static str,
    user_id: String,
    provider: i32,
}

/// Client for the notification service's HTTP API.
#[derive(Clone)]
pub struct NotificationClient {
    http: reqwest::Client,
    endpoint: String,
}

impl NotificationClient {
    pub fn new(config: &NotificationConfig) -> Result<Self, AppError> {
        let base = config.url.as_deref().ok_or_else(|| {
            AppError::ConfigError(anyhow::anyhow!(
                "NOTIFICATION_SERVICE_URL is required when notifications are enabled"
            ))
        })?;

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let endpoint = format!("{}/notifications/email", base.trim_end_matches('/'));
        tracing::info!(endpoint = %endpoint, "Notification client configured");

        Ok(Self { http, endpoint })
    }
}

#[async_trait]
impl WelcomeNotifier for NotificationClient {
    #[instrument(skip(self, user), fields(user_id = %user.user_id))]
    async fn account_created(&self, user: &User) -> Result<(), AppError> {
        let body = WelcomeEmail {
            to: &user.email,
            template: "account_welcome",
            user_id: user.user_id.to_string(),
            provider: user.provider.code(),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to reach notification service");
                AppError::BadGateway(e.to_string())
            })?;

        if !response.status().is_success() {
            return Err(AppError::BadGateway(format!(
                "notification service returned {}",
                response.status()
            )));
        }

        tracing::info!("Welcome notification queued");
        Ok(())
    }
}

/// Used when notifications are disabled.
pub struct NoopNotifier;

#[async_trait]
impl WelcomeNotifier for NoopNotifier {
    async fn account_created(&self, user: &User) -> Result<(), AppError> {
        tracing::debug!(user_id = %user.user_id, "Notifications disabled; skipping welcome");
        Ok(())
    }
}
