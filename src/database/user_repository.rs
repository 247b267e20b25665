//! User persistence and admin purge cascade

use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// User entity
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub email: String,
    pub user_name: Option<String>,
    pub email_verified: bool,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// Store abstraction for user accounts
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    /// Flip the email_verified flag. Returns false when no user exists.
    async fn set_email_verified(&self, email: &str) -> Result<bool, DatabaseError>;

    /// Delete the user and every dependent record (notifications, wishlist,
    /// cart) in a single transaction. Returns false when no user exists.
    async fn purge(&self, email: &str) -> Result<bool, DatabaseError>;
}

/// Postgres-backed user store
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        sqlx::query_as::<_, User>(
            "SELECT email, user_name, email_verified, is_admin, created_at
             FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn set_email_verified(&self, email: &str) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE users SET email_verified = TRUE, updated_at = NOW() WHERE email = $1",
        )
        .bind(email)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge(&self, email: &str) -> Result<bool, DatabaseError> {
        let mut tx = self.pool.begin().await.map_err(DatabaseError::from_sqlx)?;

        sqlx::query("DELETE FROM notifications WHERE user_email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        sqlx::query("DELETE FROM wishlist_items WHERE user_email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        sqlx::query("DELETE FROM cart_items WHERE user_email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        let result = sqlx::query("DELETE FROM users WHERE email = $1")
            .bind(email)
            .execute(&mut *tx)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        tx.commit().await.map_err(DatabaseError::from_sqlx)?;
        Ok(result.rows_affected() > 0)
    }
}
