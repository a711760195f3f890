//! User storage.
//!
//! `SqliteUserRepository` migrates and loads its baseline fixtures lazily on
//! first use, so a repository can be composed without awaiting anything.

use async_trait::async_trait;
use service_core::error::AppError;
use sqlx::sqlite::{Sqlite, SqlitePool};
use std::sync::Arc;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::db;
use crate::models::{User, UserRow};

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn health_check(&self) -> Result<(), AppError>;

    /// Insert a user. Fails with `Conflict` when the email is taken.
    async fn insert(&self, user: &User) -> Result<(), AppError>;

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    /// All users, oldest first.
    async fn list(&self) -> Result<Vec<User>, AppError>;

    /// Returns whether a row was removed.
    async fn delete(&self, user_id: Uuid) -> Result<bool, AppError>;

    /// Atomically replace every stored user with `baseline`.
    async fn reseed(&self, baseline: &[User]) -> Result<(), AppError>;

    /// Release pooled connections. Later calls fail.
    async fn close(&self);
}

/// SQLite-backed repository.
#[derive(Clone)]
pub struct SqliteUserRepository {
    pool: SqlitePool,
    baseline: Arc<[User]>,
    ready: Arc<OnceCell<()>>,
}

impl SqliteUserRepository {
    pub fn new(pool: SqlitePool, baseline: Arc<[User]>) -> Self {
        Self {
            pool,
            baseline,
            ready: Arc::new(OnceCell::new()),
        }
    }

    /// The pool, after migrations and baseline fixtures have been applied once.
    async fn pool(&self) -> Result<&SqlitePool, AppError> {
        self.ready
            .get_or_try_init(|| async {
                db::run_migrations(&self.pool).await.map_err(|e| {
                    tracing::error!(error = %e, "Failed to migrate user database");
                    AppError::from(e)
                })?;
                replace_all(&self.pool, &self.baseline).await?;
                tracing::debug!(fixtures = self.baseline.len(), "User database ready");
                Ok::<(), AppError>(())
            })
            .await?;
        Ok(&self.pool)
    }
}

async fn insert_row<'e, E>(executor: E, user: &User) -> Result<(), AppError>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO users (user_id, email, display_name, provider_code, created_utc)
        VALUES (?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.user_id)
    .bind(&user.email)
    .bind(&user.display_name)
    .bind(i64::from(user.provider.code()))
    .bind(user.created_utc)
    .execute(executor)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::Conflict(anyhow::anyhow!("Email {} is already registered", user.email))
        }
        other => AppError::from(other),
    })?;
    Ok(())
}

async fn replace_all(pool: &SqlitePool, users: &[User]) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;
    sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
    for user in users {
        insert_row(&mut *tx, user).await?;
    }
    tx.commit().await?;
    Ok(())
}

#[async_trait]
impl UserRepository for SqliteUserRepository {
    async fn health_check(&self) -> Result<(), AppError> {
        let pool = self.pool().await?;
        db::health_check(pool).await.map_err(|e| {
            tracing::error!("Database health check failed: {}", e);
            AppError::DatabaseError(anyhow::anyhow!("Database health check failed: {}", e))
        })
    }

    async fn insert(&self, user: &User) -> Result<(), AppError> {
        insert_row(self.pool().await?, user).await
    }

    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE user_id = ?")
            .bind(user_id)
            .fetch_optional(self.pool().await?)
            .await?;
        Ok(row.map(User::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let row = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = LOWER(?)")
            .bind(email.trim())
            .fetch_optional(self.pool().await?)
            .await?;
        Ok(row.map(User::from))
    }

    async fn list(&self) -> Result<Vec<User>, AppError> {
        let rows = sqlx::query_as::<_, UserRow>("SELECT * FROM users")
            .fetch_all(self.pool().await?)
            .await?;
        let mut users: Vec<User> = rows.into_iter().map(User::from).collect();
        users.sort_by(|a, b| {
            a.created_utc
                .cmp(&b.created_utc)
                .then_with(|| a.email.cmp(&b.email))
        });
        Ok(users)
    }

    async fn delete(&self, user_id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE user_id = ?")
            .bind(user_id)
            .execute(self.pool().await?)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn reseed(&self, baseline: &[User]) -> Result<(), AppError> {
        replace_all(self.pool().await?, baseline).await
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
