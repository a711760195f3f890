//! Services layer for account-service.
//!
//! Each service sits behind a trait so the composition root can swap in
//! alternative implementations.

mod database;
mod notifier;
mod session_cache;

pub use database::{SqliteUserRepository, UserRepository};
pub use notifier::{NoopNotifier, NotificationClient, WelcomeNotifier};
pub use session_cache::{InMemorySessionCache, SessionCache};
