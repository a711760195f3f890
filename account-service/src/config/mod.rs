use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct AccountConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub service_version: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub notification: NotificationConfig,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    Dev,
    Prod,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx SQLite URL. `sqlite::memory:` gives each pool a private database.
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure_cookie: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotificationConfig {
    pub enabled: bool,
    pub url: Option<String>,
    pub timeout_seconds: u64,
}

impl AccountConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;

        let env_str = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string());
        let environment: Environment = env_str
            .parse()
            .map_err(|e: String| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let is_prod = environment == Environment::Prod;

        let config = AccountConfig {
            common: common_config,
            environment,
            service_name: get_env("SERVICE_NAME", Some("account-service"), is_prod)?,
            service_version: get_env("SERVICE_VERSION", Some(env!("CARGO_PKG_VERSION")), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok(),
            database: DatabaseConfig {
                url: get_env("DATABASE_URL", Some("sqlite::memory:"), is_prod)?,
                max_connections: parse_env("DATABASE_MAX_CONNECTIONS", "5", is_prod)?,
            },
            session: SessionConfig {
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("account_session"), is_prod)?,
                secure_cookie: parse_env("SESSION_SECURE_COOKIE", "false", is_prod)?,
            },
            notification: NotificationConfig {
                enabled: parse_env("NOTIFICATION_ENABLED", "false", false)?,
                url: env::var("NOTIFICATION_SERVICE_URL").ok(),
                timeout_seconds: parse_env("NOTIFICATION_TIMEOUT_SECONDS", "10", false)?,
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// In-process configuration: loopback listener on a random port, private
    /// in-memory database, notifications off.
    pub fn for_tests() -> Self {
        Self {
            common: core_config::Config::ephemeral(),
            environment: Environment::Dev,
            service_name: "account-service-test".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "debug".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                max_connections: 4,
            },
            session: SessionConfig {
                cookie_name: "account_session".to_string(),
                secure_cookie: false,
            },
            notification: NotificationConfig {
                enabled: false,
                url: None,
                timeout_seconds: 5,
            },
        }
    }

    pub fn is_prod(&self) -> bool {
        self.environment == Environment::Prod
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.database.max_connections == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "DATABASE_MAX_CONNECTIONS must be greater than 0"
            )));
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "SESSION_COOKIE_NAME must not be empty"
            )));
        }

        if self.is_prod() {
            if self.common.port == 0 {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "PORT must be greater than 0 in production"
                )));
            }

            if !self.session.secure_cookie {
                tracing::warn!("Session cookie is not marked secure in production");
            }
        }

        Ok(())
    }
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}

fn parse_env<T>(key: &str, default: &str, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    get_env(key, Some(default), is_prod)?
        .parse()
        .map_err(|e: T::Err| AppError::ConfigError(anyhow::anyhow!("{}: {}", key, e)))
}

impl std::str::FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dev" => Ok(Environment::Dev),
            "prod" => Ok(Environment::Prod),
            _ => Err(format!("Invalid environment: {}", s)),
        }
    }
}
