//! Bounded pool of reusable harness instances.

use std::ops::Deref;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use once_cell::sync::OnceCell;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::HarnessError;
use crate::factory::HarnessFactory;
use crate::instance::{HarnessInstance, InstanceStatus};

static SHARED_POOL: OnceCell<HarnessPool> = OnceCell::new();

/// Process-wide pool built from `HARNESS_*` settings on first use.
pub fn shared_pool() -> Result<&'static HarnessPool, HarnessError> {
    SHARED_POOL.get_or_try_init(|| {
        let factory = HarnessFactory::from_env()?;
        let capacity = factory.settings().pool_size;
        tracing::info!(capacity, "Creating shared harness pool");
        Ok(HarnessPool::new(factory, capacity))
    })
}

/// Hands out at most `capacity` instances at a time. Returned instances
/// are reset before their next lease.
#[derive(Clone)]
pub struct HarnessPool {
    inner: Arc<PoolInner>,
}

struct PoolInner {
    factory: HarnessFactory,
    idle: Mutex<Vec<Arc<HarnessInstance>>>,
    permits: Arc<Semaphore>,
    capacity: usize,
}

impl PoolInner {
    fn idle(&self) -> MutexGuard<'_, Vec<Arc<HarnessInstance>>> {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl HarnessPool {
    pub fn new(factory: HarnessFactory, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Arc::new(PoolInner {
                factory,
                idle: Mutex::new(Vec::with_capacity(capacity)),
                permits: Arc::new(Semaphore::new(capacity)),
                capacity,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.capacity
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle().len()
    }

    /// Wait for a free slot, then hand out a clean instance.
    pub async fn acquire(&self) -> Result<PoolLease, HarnessError> {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| HarnessError::Disposed)?;

        let recycled = self.inner.idle().pop();
        let instance = match recycled {
            Some(instance) => {
                Self::recycle(&instance).await?;
                instance
            }
            None => Arc::new(self.inner.factory.spawn().await?),
        };

        tracing::debug!(instance = %instance.id(), "Leased harness instance");
        Ok(PoolLease {
            instance,
            pool: self.inner.clone(),
            _permit: permit,
        })
    }

    async fn recycle(instance: &HarnessInstance) -> Result<(), HarnessError> {
        if instance.status() == InstanceStatus::Tainted || !instance.is_serving() {
            tracing::info!(instance = %instance.id(), "Reprovisioning pooled instance");
            instance.reprovision().await?;
            instance.wait_until_healthy().await?;
        }
        instance.reset_databases().await
    }

    /// Wait for every lease to come back, then dispose all instances.
    /// Later calls to [`acquire`](Self::acquire) fail with `Disposed`.
    pub async fn teardown(&self) -> Result<(), HarnessError> {
        let all = u32::try_from(self.inner.capacity).unwrap_or(u32::MAX);
        let permits = self
            .inner
            .permits
            .clone()
            .acquire_many_owned(all)
            .await
            .map_err(|_| HarnessError::Disposed)?;
        self.inner.permits.close();

        let idle = std::mem::take(&mut *self.inner.idle());
        let mut first_error = None;
        for instance in idle {
            match instance.dispose().await {
                Ok(()) | Err(HarnessError::Disposed) => {}
                Err(e) => {
                    tracing::error!(instance = %instance.id(), error = %e, "Failed to dispose pooled instance");
                    first_error.get_or_insert(e);
                }
            }
        }
        drop(permits);

        first_error.map_or(Ok(()), Err)
    }
}

/// An instance on loan from a [`HarnessPool`]; returned when dropped.
pub struct PoolLease {
    instance: Arc<HarnessInstance>,
    pool: Arc<PoolInner>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PoolLease {
    type Target = HarnessInstance;

    fn deref(&self) -> &HarnessInstance {
        &self.instance
    }
}

impl Drop for PoolLease {
    fn drop(&mut self) {
        if self.instance.status() != InstanceStatus::Disposed {
            self.pool.idle().push(self.instance.clone());
        }
    }
}
