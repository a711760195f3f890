//! User model - accounts tagged with the identity provider they came from.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use uuid::Uuid;

use super::IdentityProvider;

/// User entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub provider: IdentityProvider,
    pub created_utc: DateTime<Utc>,
}

impl User {
    /// Create a new user. Emails are stored lowercased.
    pub fn new(email: &str, display_name: Option<String>, provider: IdentityProvider) -> Self {
        Self {
            user_id: Uuid::new_v4(),
            email: email.trim().to_lowercase(),
            display_name,
            provider,
            created_utc: Utc::now(),
        }
    }
}

/// Raw `users` row. The provider column holds the integer code.
#[derive(Debug, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub provider_code: i64,
    pub created_utc: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        let provider = i32::try_from(row.provider_code)
            .ok()
            .and_then(|code| IdentityProvider::from_code(code).ok())
            .unwrap_or_else(|| {
                tracing::warn!(
                    user_id = %row.user_id,
                    provider_code = row.provider_code,
                    "Stored user has an unknown provider code; treating as other"
                );
                IdentityProvider::Other
            });

        Self {
            user_id: row.user_id,
            email: row.email,
            display_name: row.display_name,
            provider,
            created_utc: row.created_utc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_user_normalizes_email() {
        let user = User::new("  Ada@Example.COM ", None, IdentityProvider::Google);
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.provider, IdentityProvider::Google);
    }

    #[test]
    fn unknown_stored_code_becomes_other() {
        let row = UserRow {
            user_id: Uuid::new_v4(),
            email: "legacy@example.com".to_string(),
            display_name: None,
            provider_code: 42,
            created_utc: Utc::now(),
        };
        assert_eq!(User::from(row).provider, IdentityProvider::Other);
    }
}
