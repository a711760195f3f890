pub mod identity_provider;
pub mod user;

pub use identity_provider::{IdentityProvider, UnknownProvider};
pub use user::{User, UserRow};
