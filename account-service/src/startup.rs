//! Composition root and HTTP server lifecycle.

use std::sync::Arc;

use axum::Router;
use service_core::error::AppError;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::AccountConfig;
use crate::db;
use crate::models::User;
use crate::services::{
    InMemorySessionCache, NoopNotifier, NotificationClient, SessionCache, SqliteUserRepository,
    UserRepository, WelcomeNotifier,
};
use crate::{build_router, AppState};

/// Builds an [`AppState`] from configuration. Any slot set explicitly
/// replaces the implementation that configuration would otherwise select.
#[derive(Clone)]
pub struct ServiceRegistry {
    config: AccountConfig,
    baseline: Arc<[User]>,
    users: Option<Arc<dyn UserRepository>>,
    sessions: Option<Arc<dyn SessionCache>>,
    notifier: Option<Arc<dyn WelcomeNotifier>>,
}

impl ServiceRegistry {
    pub fn new(config: AccountConfig) -> Self {
        Self {
            config,
            baseline: Arc::from(Vec::new()),
            users: None,
            sessions: None,
            notifier: None,
        }
    }

    pub fn config(&self) -> &AccountConfig {
        &self.config
    }

    /// Fixture users the default repository is provisioned with.
    pub fn with_baseline(mut self, users: impl Into<Arc<[User]>>) -> Self {
        self.baseline = users.into();
        self
    }

    pub fn with_user_repository(mut self, users: Arc<dyn UserRepository>) -> Self {
        self.users = Some(users);
        self
    }

    pub fn with_session_cache(mut self, sessions: Arc<dyn SessionCache>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn WelcomeNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Resolve every slot. Does not touch the network or the database.
    pub fn compose(self) -> Result<AppState, AppError> {
        self.config.validate()?;

        if self.config.is_prod()
            && self
                .baseline
                .iter()
                .any(|user| !user.provider.allowed_in_production())
        {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "Baseline contains test-provider accounts but the environment is production"
            )));
        }

        let users = match self.users {
            Some(users) => users,
            None => {
                let pool = db::create_pool(&self.config.database).map_err(|e| {
                    tracing::error!(error = %e, url = %self.config.database.url, "Invalid database configuration");
                    AppError::from(e)
                })?;
                Arc::new(SqliteUserRepository::new(pool, self.baseline))
            }
        };

        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(InMemorySessionCache::new()));

        let notifier: Arc<dyn WelcomeNotifier> = match self.notifier {
            Some(notifier) => notifier,
            None if self.config.notification.enabled => {
                Arc::new(NotificationClient::new(&self.config.notification)?)
            }
            None => Arc::new(NoopNotifier),
        };

        Ok(AppState {
            config: self.config,
            users,
            sessions,
            notifier,
        })
    }
}

pub struct Application {
    port: u16,
    listener: TcpListener,
    router: Router,
    state: AppState,
}

impl Application {
    pub async fn build(config: AccountConfig) -> Result<Self, AppError> {
        let addr = config.common.socket_addr();
        let state = ServiceRegistry::new(config).compose()?;

        // Migrate before accepting traffic.
        state.users.health_check().await.map_err(|e| {
            tracing::error!("Failed to initialize user database: {}", e);
            e
        })?;

        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;

        Self::from_listener(state, listener)
    }

    /// Serve an already-composed state on an already-bound listener.
    pub fn from_listener(state: AppState, listener: TcpListener) -> Result<Self, AppError> {
        let port = listener.local_addr()?.port();
        let router = build_router(state.clone());

        tracing::info!("Listening on {}", port);

        Ok(Self {
            port,
            listener,
            router,
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router).await
    }

    /// Serve until `shutdown` fires, then drain in-flight requests.
    pub async fn run_until_cancelled(self, shutdown: CancellationToken) -> std::io::Result<()> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    }
}
