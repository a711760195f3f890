use std::sync::Arc;

use account_service::config::AccountConfig;
use account_service::services::{SessionCache, UserRepository, WelcomeNotifier};
use account_service::startup::ServiceRegistry;

type ConfigDirective = Arc<dyn Fn(AccountConfig) -> AccountConfig + Send + Sync>;
type ServiceDirective = Arc<dyn Fn(ServiceRegistry) -> ServiceRegistry + Send + Sync>;

/// Adjustments layered on top of a factory's base configuration.
///
/// Directives run in insertion order each time an instance is composed, so
/// a value passed to [`Overrides::notifier`] is shared by every instance
/// built from the resulting factory.
#[derive(Clone, Default)]
pub struct Overrides {
    config: Vec<ConfigDirective>,
    services: Vec<ServiceDirective>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite the configuration before the service graph is composed.
    pub fn configure<F>(mut self, directive: F) -> Self
    where
        F: Fn(AccountConfig) -> AccountConfig + Send + Sync + 'static,
    {
        self.config.push(Arc::new(directive));
        self
    }

    /// Replace or wrap service registrations.
    pub fn services<F>(mut self, directive: F) -> Self
    where
        F: Fn(ServiceRegistry) -> ServiceRegistry + Send + Sync + 'static,
    {
        self.services.push(Arc::new(directive));
        self
    }

    pub fn notifier(self, notifier: Arc<dyn WelcomeNotifier>) -> Self {
        self.services(move |registry| registry.with_notifier(notifier.clone()))
    }

    /// Swap the session cache. The factory is invoked once per instance so
    /// each instance keeps its own cache.
    pub fn session_cache<F>(self, make: F) -> Self
    where
        F: Fn() -> Arc<dyn SessionCache> + Send + Sync + 'static,
    {
        self.services(move |registry| registry.with_session_cache(make()))
    }

    /// Swap the user repository, invoked once per instance.
    pub fn user_repository<F>(self, make: F) -> Self
    where
        F: Fn() -> Arc<dyn UserRepository> + Send + Sync + 'static,
    {
        self.services(move |registry| registry.with_user_repository(make()))
    }

    pub fn is_empty(&self) -> bool {
        self.config.is_empty() && self.services.is_empty()
    }

    /// `self` followed by `later`; neither input is modified.
    pub(crate) fn then(&self, later: &Overrides) -> Overrides {
        let mut merged = self.clone();
        merged.config.extend(later.config.iter().cloned());
        merged.services.extend(later.services.iter().cloned());
        merged
    }

    pub(crate) fn apply_config(&self, base: AccountConfig) -> AccountConfig {
        self.config
            .iter()
            .fold(base, |config, directive| directive(config))
    }

    pub(crate) fn apply_services(&self, registry: ServiceRegistry) -> ServiceRegistry {
        self.services
            .iter()
            .fold(registry, |registry, directive| directive(registry))
    }
}

impl std::fmt::Debug for Overrides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Overrides")
            .field("config", &self.config.len())
            .field("services", &self.services.len())
            .finish()
    }
}
