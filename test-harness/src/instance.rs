//! A single isolated deployment of the account service and its stores.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use account_service::config::AccountConfig;
use account_service::models::User;
use account_service::startup::{Application, ServiceRegistry};
use account_service::AppState;
use anyhow::anyhow;
use service_core::config::Config;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::client::TestClient;
use crate::config::HarnessConfig;
use crate::error::HarnessError;
use crate::overrides::Overrides;
use crate::store::{self, BackingStore};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Everything needed to compose an instance, captured when it is built.
pub(crate) struct Recipe {
    pub base: AccountConfig,
    pub overrides: Overrides,
    pub baseline: Arc<[User]>,
    pub settings: HarnessConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceStatus {
    Uninitialized,
    Ready,
    /// Ready, but a reset failed and left the stores in an unknown state.
    Tainted,
    /// Composition failed; only [`HarnessInstance::reprovision`] retries it.
    Failed,
    Disposed,
}

enum Lifecycle {
    Uninitialized,
    Ready(Deployment),
    Failed(FailedLaunch),
    Disposed,
}

/// Why composition failed, kept so later calls report the same error.
struct FailedLaunch {
    provisioning: bool,
    reason: String,
}

impl FailedLaunch {
    fn from_error(err: &HarnessError) -> Self {
        match err {
            HarnessError::ProvisioningFailure(cause) => Self {
                provisioning: true,
                reason: format!("{cause:#}"),
            },
            HarnessError::CompositionFailure(cause) => Self {
                provisioning: false,
                reason: format!("{cause:#}"),
            },
            other => Self {
                provisioning: false,
                reason: other.to_string(),
            },
        }
    }

    fn to_error(&self) -> HarnessError {
        let cause = anyhow!("{}", self.reason);
        if self.provisioning {
            HarnessError::ProvisioningFailure(cause)
        } else {
            HarnessError::CompositionFailure(cause)
        }
    }
}

struct Deployment {
    state: AppState,
    base_url: String,
    stores: Vec<Arc<dyn BackingStore>>,
    shutdown: CancellationToken,
    server: JoinHandle<()>,
    taint: Option<String>,
}

impl Deployment {
    /// Compose the service graph and start serving it on a loopback port.
    /// Must run inside a Tokio runtime but does not await.
    fn launch(id: Uuid, recipe: &Recipe) -> Result<Self, HarnessError> {
        let handle = Handle::try_current().map_err(|e| {
            HarnessError::CompositionFailure(anyhow!("a Tokio runtime is required: {e}"))
        })?;

        let config = recipe.overrides.apply_config(recipe.base.clone());
        let registry = ServiceRegistry::new(config).with_baseline(recipe.baseline.clone());
        let state = recipe
            .overrides
            .apply_services(registry)
            .compose()
            .map_err(HarnessError::from_composition)?;

        let listener = std::net::TcpListener::bind(Config::ephemeral().socket_addr())
            .and_then(|listener| listener.set_nonblocking(true).map(|_| listener))
            .map_err(|e| HarnessError::CompositionFailure(anyhow!("failed to bind listener: {e}")))?;

        let _entered = handle.enter();
        let listener = tokio::net::TcpListener::from_std(listener).map_err(|e| {
            HarnessError::CompositionFailure(anyhow!("failed to register listener: {e}"))
        })?;

        let app = Application::from_listener(state.clone(), listener)
            .map_err(|e| HarnessError::CompositionFailure(anyhow::Error::new(e)))?;
        let base_url = format!("http://127.0.0.1:{}", app.port());

        let shutdown = CancellationToken::new();
        let token = shutdown.clone();
        let server = handle.spawn(async move {
            if let Err(e) = app.run_until_cancelled(token).await {
                tracing::error!(instance = %id, error = %e, "Harness server stopped with error");
            }
        });

        let stores = store::managed_stores(&state, recipe.baseline.clone());

        tracing::info!(instance = %id, base_url = %base_url, "Harness instance composed");

        Ok(Self {
            state,
            base_url,
            stores,
            shutdown,
            server,
            taint: None,
        })
    }

    async fn shutdown(self) {
        self.shutdown.cancel();
        let mut server = self.server;
        if tokio::time::timeout(SHUTDOWN_GRACE, &mut server).await.is_err() {
            tracing::warn!("Harness server did not drain in time; aborting");
            server.abort();
        }
        for store in &self.stores {
            store.release().await;
        }
    }
}

/// One isolated instance: its own service graph, HTTP listener and stores.
///
/// Composition is lazy. The first call to [`services`](Self::services),
/// [`create_client`](Self::create_client) or [`initialize`](Self::initialize)
/// builds the graph; later calls return the same one. If composition fails
/// the instance stays failed and every later call returns that error.
pub struct HarnessInstance {
    id: Uuid,
    recipe: Arc<Recipe>,
    lifecycle: Mutex<Lifecycle>,
    reset_lock: tokio::sync::Mutex<()>,
}

impl HarnessInstance {
    pub(crate) fn new(recipe: Arc<Recipe>) -> Self {
        Self {
            id: Uuid::new_v4(),
            recipe,
            lifecycle: Mutex::new(Lifecycle::Uninitialized),
            reset_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn settings(&self) -> &HarnessConfig {
        &self.recipe.settings
    }

    pub fn status(&self) -> InstanceStatus {
        match &*self.lifecycle() {
            Lifecycle::Uninitialized => InstanceStatus::Uninitialized,
            Lifecycle::Ready(d) if d.taint.is_some() => InstanceStatus::Tainted,
            Lifecycle::Ready(_) => InstanceStatus::Ready,
            Lifecycle::Failed(_) => InstanceStatus::Failed,
            Lifecycle::Disposed => InstanceStatus::Disposed,
        }
    }

    /// Whether the HTTP server task is still running. It stops when the
    /// runtime that spawned it shuts down.
    pub fn is_serving(&self) -> bool {
        match &*self.lifecycle() {
            Lifecycle::Ready(d) => !d.server.is_finished(),
            _ => false,
        }
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_ready<'a>(
        id: Uuid,
        recipe: &Recipe,
        lifecycle: &'a mut Lifecycle,
    ) -> Result<&'a mut Deployment, HarnessError> {
        if matches!(lifecycle, Lifecycle::Uninitialized) {
            match Deployment::launch(id, recipe) {
                Ok(deployment) => *lifecycle = Lifecycle::Ready(deployment),
                Err(err) => {
                    *lifecycle = Lifecycle::Failed(FailedLaunch::from_error(&err));
                    return Err(err);
                }
            }
        }
        match lifecycle {
            Lifecycle::Ready(deployment) => Ok(deployment),
            Lifecycle::Failed(failure) => Err(failure.to_error()),
            Lifecycle::Disposed => Err(HarnessError::Disposed),
            Lifecycle::Uninitialized => Err(HarnessError::CompositionFailure(anyhow!(
                "instance did not initialize"
            ))),
        }
    }

    fn with_ready<T>(
        &self,
        f: impl FnOnce(&mut Deployment) -> T,
    ) -> Result<T, HarnessError> {
        let mut lifecycle = self.lifecycle();
        let deployment = Self::ensure_ready(self.id, &self.recipe, &mut lifecycle)?;
        if let Some(reason) = &deployment.taint {
            return Err(HarnessError::Tainted(reason.clone()));
        }
        Ok(f(deployment))
    }

    /// Compose the service graph now instead of on first use.
    pub fn initialize(&self) -> Result<(), HarnessError> {
        self.with_ready(|_| ())
    }

    /// The composed service graph. Repeated calls return the same graph.
    pub fn services(&self) -> Result<AppState, HarnessError> {
        self.with_ready(|d| d.state.clone())
    }

    pub fn base_url(&self) -> Result<String, HarnessError> {
        self.with_ready(|d| d.base_url.clone())
    }

    /// A new client with its own cookies and headers.
    pub fn create_client(&self) -> Result<TestClient, HarnessError> {
        let base_url = self.base_url()?;
        TestClient::new(&base_url)
    }

    /// Ping every store and poll `/health` until the instance answers.
    pub async fn wait_until_healthy(&self) -> Result<(), HarnessError> {
        let stores = self.with_ready(|d| d.stores.clone())?;
        store::ping_all(&stores).await?;

        let client = self.create_client()?;
        let timeout = self.recipe.settings.startup_timeout();
        let start = tokio::time::Instant::now();

        loop {
            let last_error = match client.get("/health").send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => format!("status {}", resp.status()),
                Err(e) => e.to_string(),
            };

            if start.elapsed() > timeout {
                return Err(HarnessError::ProvisioningFailure(anyhow!(
                    "instance {} not healthy after {:?}: {}",
                    self.id,
                    timeout,
                    last_error
                )));
            }

            tracing::debug!(instance = %self.id, "Waiting for instance: {}", last_error);
            tokio::time::sleep(HEALTH_POLL_INTERVAL).await;
        }
    }

    /// Return every store to its baseline.
    pub async fn reset_databases(&self) -> Result<(), HarnessError> {
        self.reset_databases_with(CancellationToken::new()).await
    }

    /// Reset, abandoning the attempt if `cancel` fires first.
    ///
    /// Fails immediately with [`HarnessError::ResetInProgress`] if another
    /// reset is running. A failed, cancelled or timed-out reset taints the
    /// instance until [`reprovision`](Self::reprovision) is called.
    pub async fn reset_databases_with(&self, cancel: CancellationToken) -> Result<(), HarnessError> {
        let _guard = self
            .reset_lock
            .try_lock()
            .map_err(|_| HarnessError::ResetInProgress)?;

        let stores = self.with_ready(|d| d.stores.clone())?;
        let timeout = self.recipe.settings.reset_timeout();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(HarnessError::ResetCancelled),
            result = tokio::time::timeout(timeout, store::reset_all(&stores)) => {
                result.unwrap_or(Err(HarnessError::ResetTimedOut(timeout)))
            }
        };

        match &outcome {
            Ok(()) => tracing::debug!(instance = %self.id, "Stores reset to baseline"),
            Err(err) => {
                tracing::error!(instance = %self.id, error = %err, "Reset failed; instance tainted");
                self.taint(err.to_string());
            }
        }
        outcome
    }

    fn taint(&self, reason: String) {
        if let Lifecycle::Ready(deployment) = &mut *self.lifecycle() {
            deployment.taint = Some(reason);
        }
    }

    /// Tear down the current deployment, if any, and compose a fresh one
    /// from the same recipe. Also retries a failed composition.
    pub async fn reprovision(&self) -> Result<(), HarnessError> {
        let _guard = self.reset_lock.lock().await;

        let previous = {
            let mut lifecycle = self.lifecycle();
            if matches!(*lifecycle, Lifecycle::Disposed) {
                return Err(HarnessError::Disposed);
            }
            std::mem::replace(&mut *lifecycle, Lifecycle::Uninitialized)
        };
        if let Lifecycle::Ready(old) = previous {
            old.shutdown().await;
        }

        let mut lifecycle = self.lifecycle();
        Self::ensure_ready(self.id, &self.recipe, &mut lifecycle)?;
        tracing::info!(instance = %self.id, "Instance reprovisioned");
        Ok(())
    }

    /// Stop the server and release every store. Terminal.
    ///
    /// A reset already running finishes first; resets started later fail
    /// with [`HarnessError::Disposed`].
    pub async fn dispose(&self) -> Result<(), HarnessError> {
        let _guard = self.reset_lock.lock().await;

        let previous = std::mem::replace(&mut *self.lifecycle(), Lifecycle::Disposed);
        match previous {
            Lifecycle::Disposed => Err(HarnessError::Disposed),
            Lifecycle::Uninitialized | Lifecycle::Failed(_) => Ok(()),
            Lifecycle::Ready(deployment) => {
                deployment.shutdown().await;
                tracing::info!(instance = %self.id, "Instance disposed");
                Ok(())
            }
        }
    }
}

impl Drop for HarnessInstance {
    fn drop(&mut self) {
        let lifecycle = self
            .lifecycle
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Lifecycle::Ready(deployment) = lifecycle {
            deployment.shutdown.cancel();
        }
    }
}
