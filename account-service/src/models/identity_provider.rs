//! Identity provider tags - the external system a user account originates from.
//!
//! The integer codes are persisted and sent over the wire. They are assigned
//! by hand and must never be renumbered.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Identity provider codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
#[repr(i32)]
pub enum IdentityProvider {
    Auth0 = 1,
    Clerk = 2,
    Google = 3,
    Microsoft = 4,
    Supabase = 5,
    /// Non-production accounts only.
    Test = 6,
    /// Catch-all for providers without a dedicated tag.
    Other = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Unknown identity provider code: {0}")]
pub struct UnknownProvider(pub i32);

impl IdentityProvider {
    pub const ALL: [IdentityProvider; 7] = [
        IdentityProvider::Auth0,
        IdentityProvider::Clerk,
        IdentityProvider::Google,
        IdentityProvider::Microsoft,
        IdentityProvider::Supabase,
        IdentityProvider::Test,
        IdentityProvider::Other,
    ];

    pub fn from_code(code: i32) -> Result<Self, UnknownProvider> {
        match code {
            1 => Ok(IdentityProvider::Auth0),
            2 => Ok(IdentityProvider::Clerk),
            3 => Ok(IdentityProvider::Google),
            4 => Ok(IdentityProvider::Microsoft),
            5 => Ok(IdentityProvider::Supabase),
            6 => Ok(IdentityProvider::Test),
            7 => Ok(IdentityProvider::Other),
            other => Err(UnknownProvider(other)),
        }
    }

    /// Decode, folding unknown codes into `Other`.
    pub fn from_code_or_other(code: i32) -> Self {
        Self::from_code(code).unwrap_or(IdentityProvider::Other)
    }

    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityProvider::Auth0 => "auth0",
            IdentityProvider::Clerk => "clerk",
            IdentityProvider::Google => "google",
            IdentityProvider::Microsoft => "microsoft",
            IdentityProvider::Supabase => "supabase",
            IdentityProvider::Test => "test",
            IdentityProvider::Other => "other",
        }
    }

    /// Whether accounts with this tag may be stored by a production deployment.
    pub fn allowed_in_production(&self) -> bool {
        !matches!(self, IdentityProvider::Test)
    }
}

impl TryFrom<i32> for IdentityProvider {
    type Error = UnknownProvider;

    fn try_from(code: i32) -> Result<Self, Self::Error> {
        Self::from_code(code)
    }
}

impl From<IdentityProvider> for i32 {
    fn from(provider: IdentityProvider) -> Self {
        provider.code()
    }
}

impl fmt::Display for IdentityProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for IdentityProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.to_lowercase();
        IdentityProvider::ALL
            .into_iter()
            .find(|provider| provider.as_str() == wanted)
            .ok_or_else(|| format!("Invalid identity provider: {}", s))
    }
}
