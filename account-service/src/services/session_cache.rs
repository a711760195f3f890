use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

/// Session id -> user id lookup.
#[async_trait]
pub trait SessionCache: Send + Sync {
    async fn health_check(&self) -> Result<(), anyhow::Error>;

    async fn put(&self, session_id: &str, user_id: Uuid) -> Result<(), anyhow::Error>;

    async fn get(&self, session_id: &str) -> Result<Option<Uuid>, anyhow::Error>;

    async fn remove(&self, session_id: &str) -> Result<bool, anyhow::Error>;

    /// Drop every session belonging to `user_id`; returns how many were dropped.
    async fn remove_user(&self, user_id: Uuid) -> Result<usize, anyhow::Error>;

    /// Drop every session.
    async fn clear(&self) -> Result<(), anyhow::Error>;

    async fn session_count(&self) -> Result<usize, anyhow::Error>;
}

#[derive(Default)]
pub struct InMemorySessionCache {
    sessions: DashMap<String, Uuid>,
}

impl InMemorySessionCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn health_check(&self) -> Result<(), anyhow::Error> {
        Ok(())
    }

    async fn put(&self, session_id: &str, user_id: Uuid) -> Result<(), anyhow::Error> {
        self.sessions.insert(session_id.to_string(), user_id);
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<Uuid>, anyhow::Error> {
        Ok(self.sessions.get(session_id).map(|entry| *entry.value()))
    }

    async fn remove(&self, session_id: &str) -> Result<bool, anyhow::Error> {
        Ok(self.sessions.remove(session_id).is_some())
    }

    async fn remove_user(&self, user_id: Uuid) -> Result<usize, anyhow::Error> {
        let before = self.sessions.len();
        self.sessions.retain(|_, owner| *owner != user_id);
        Ok(before.saturating_sub(self.sessions.len()))
    }

    async fn clear(&self) -> Result<(), anyhow::Error> {
        self.sessions.clear();
        Ok(())
    }

    async fn session_count(&self) -> Result<usize, anyhow::Error> {
        Ok(self.sessions.len())
    }
}
