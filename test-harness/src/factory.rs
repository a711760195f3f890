use std::sync::Arc;

use account_service::config::AccountConfig;
use account_service::models::User;

use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::instance::{HarnessInstance, Recipe};
use crate::overrides::Overrides;

/// Immutable recipe for harness instances.
///
/// Deriving a factory with [`with_configuration`](Self::with_configuration)
/// or [`with_seed`](Self::with_seed) leaves the receiver untouched, so a
/// base factory can be shared across tests.
#[derive(Clone, Debug)]
pub struct HarnessFactory {
    base: AccountConfig,
    overrides: Overrides,
    baseline: Arc<[User]>,
    settings: HarnessConfig,
}

impl HarnessFactory {
    pub fn new(base: AccountConfig) -> Self {
        Self {
            base,
            overrides: Overrides::new(),
            baseline: Arc::from(Vec::new()),
            settings: HarnessConfig::default(),
        }
    }

    /// Test account configuration plus `HARNESS_*` settings from the environment.
    pub fn from_env() -> Result<Self, HarnessError> {
        let settings = HarnessConfig::from_env()?;
        let mut base = AccountConfig::for_tests();
        base.log_level = settings.log_level.clone();
        Ok(Self::new(base).with_settings(settings))
    }

    /// A new factory whose instances apply `overrides` after this one's.
    pub fn with_configuration(&self, overrides: Overrides) -> Self {
        Self {
            overrides: self.overrides.then(&overrides),
            ..self.clone()
        }
    }

    /// A new factory whose stores reset to `users`.
    pub fn with_seed(&self, users: impl IntoIterator<Item = User>) -> Self {
        Self {
            baseline: users.into_iter().collect::<Vec<_>>().into(),
            ..self.clone()
        }
    }

    pub fn with_settings(&self, settings: HarnessConfig) -> Self {
        Self {
            settings,
            ..self.clone()
        }
    }

    pub fn settings(&self) -> &HarnessConfig {
        &self.settings
    }

    pub fn baseline(&self) -> &[User] {
        &self.baseline
    }

    /// An uninitialized instance; nothing is composed until first use.
    pub fn build(&self) -> HarnessInstance {
        HarnessInstance::new(Arc::new(Recipe {
            base: self.base.clone(),
            overrides: self.overrides.clone(),
            baseline: self.baseline.clone(),
            settings: self.settings.clone(),
        }))
    }

    /// Build, initialize and wait for the instance to answer `/health`.
    /// On failure the partially built instance is torn down.
    pub async fn spawn(&self) -> Result<HarnessInstance, HarnessError> {
        let instance = self.build();
        let started = match instance.initialize() {
            Ok(()) => instance.wait_until_healthy().await,
            Err(e) => Err(e),
        };

        if let Err(e) = started {
            tracing::error!(instance = %instance.id(), error = %e, "Harness instance failed to start");
            let _ = instance.dispose().await;
            return Err(e);
        }
        Ok(instance)
    }
}

impl Default for HarnessFactory {
    fn default() -> Self {
        Self::new(AccountConfig::for_tests())
    }
}
