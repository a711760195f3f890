use service_core::error::AppError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    /// The service graph could not be built from configuration plus overrides.
    #[error("Service graph composition failed: {0:#}")]
    CompositionFailure(anyhow::Error),

    /// A backing store could not be created or reached.
    #[error("Backing store provisioning failed: {0:#}")]
    ProvisioningFailure(anyhow::Error),

    #[error("Failed to reset store '{store}': {source}")]
    ResetFailure {
        store: &'static str,
        #[source]
        source: AppError,
    },

    #[error("A reset is already running on this instance")]
    ResetInProgress,

    #[error("Reset was cancelled; store state is undefined")]
    ResetCancelled,

    #[error("Reset did not finish within {0:?}; store state is undefined")]
    ResetTimedOut(Duration),

    /// A previous reset failed; the instance must be reprovisioned.
    #[error("Instance is tainted: {0}")]
    Tainted(String),

    #[error("Instance has been disposed")]
    Disposed,

    #[error("Invalid harness configuration: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarnessError {
    /// Classify an error raised while composing the service graph.
    pub(crate) fn from_composition(err: AppError) -> Self {
        match err {
            AppError::DatabaseError(cause) => HarnessError::ProvisioningFailure(cause),
            other => HarnessError::CompositionFailure(anyhow::Error::new(other)),
        }
    }

    /// Whether the failure leaves the instance unusable until reprovisioned.
    pub fn taints_instance(&self) -> bool {
        matches!(
            self,
            HarnessError::ResetFailure { .. }
                | HarnessError::ResetCancelled
                | HarnessError::ResetTimedOut(_)
        )
    }
}
