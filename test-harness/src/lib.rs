//! Isolated, resettable account-service instances for integration tests.
//!
//! A [`HarnessFactory`] describes how to compose the service; each
//! [`HarnessInstance`] it builds gets its own in-memory database, session
//! cache and loopback HTTP listener.
//!
//! ```no_run
//! # async fn demo() -> Result<(), test_harness::HarnessError> {
//! use test_harness::HarnessFactory;
//!
//! let instance = HarnessFactory::default().spawn().await?;
//! let client = instance.create_client()?;
//! let response = client.get("/health").send().await?;
//! assert!(response.status().is_success());
//!
//! instance.reset_databases().await?;
//! instance.dispose().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Once;

use tracing_subscriber::EnvFilter;

pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod fakes;
pub mod instance;
pub mod overrides;
pub mod pool;
pub mod store;

pub use client::TestClient;
pub use config::HarnessConfig;
pub use error::HarnessError;
pub use factory::HarnessFactory;
pub use instance::{HarnessInstance, InstanceStatus};
pub use overrides::Overrides;
pub use pool::{shared_pool, HarnessPool, PoolLease};

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once). `RUST_LOG` wins over
/// `HARNESS_LOG_LEVEL`.
pub fn init_test_tracing() {
    INIT.call_once(|| {
        let level = std::env::var("HARNESS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{level},test_harness=debug,sqlx=warn"))
        });
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}
