//! OTP session persistence
//!
//! Sessions are keyed by email. Only a salted hash of the code is stored;
//! the plaintext code exists only in memory and in the outbound email.

use crate::database::error::DatabaseError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

/// OTP session entity
#[derive(Debug, Clone, FromRow)]
pub struct OtpSession {
    pub email: String,
    pub code_hash: String,
    pub salt: String,
    pub expires_at: DateTime<Utc>,
    pub attempts: i32,
    pub resend_count: i32,
    pub next_resend_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Store abstraction for OTP sessions
#[async_trait]
pub trait OtpSessionStore: Send + Sync {
    async fn find(&self, email: &str) -> Result<Option<OtpSession>, DatabaseError>;

    /// Insert or replace the session for an email. Issuing a fresh code
    /// resets attempts and expiry while carrying the resend counter forward.
    async fn upsert(&self, session: &OtpSession) -> Result<(), DatabaseError>;

    /// Increment the failed-attempt counter; returns the new count.
    async fn record_failed_attempt(&self, email: &str) -> Result<i32, DatabaseError>;

    async fn mark_verified(&self, email: &str, at: DateTime<Utc>) -> Result<(), DatabaseError>;
}

/// Postgres-backed OTP session store
pub struct PgOtpSessionStore {
    pool: PgPool,
}

impl PgOtpSessionStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OtpSessionStore for PgOtpSessionStore {
    async fn find(&self, email: &str) -> Result<Option<OtpSession>, DatabaseError> {
        sqlx::query_as::<_, OtpSession>(
            "SELECT email, code_hash, salt, expires_at, attempts, resend_count,
                    next_resend_at, verified, verified_at, created_at, updated_at
             FROM otp_sessions WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn upsert(&self, session: &OtpSession) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO otp_sessions
               (email, code_hash, salt, expires_at, attempts, resend_count,
                next_resend_at, verified, verified_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW(), NOW())
             ON CONFLICT (email) DO UPDATE SET
               code_hash = EXCLUDED.code_hash,
               salt = EXCLUDED.salt,
               expires_at = EXCLUDED.expires_at,
               attempts = EXCLUDED.attempts,
               resend_count = EXCLUDED.resend_count,
               next_resend_at = EXCLUDED.next_resend_at,
               verified = EXCLUDED.verified,
               verified_at = EXCLUDED.verified_at,
               updated_at = NOW()",
        )
        .bind(&session.email)
        .bind(&session.code_hash)
        .bind(&session.salt)
        .bind(session.expires_at)
        .bind(session.attempts)
        .bind(session.resend_count)
        .bind(session.next_resend_at)
        .bind(session.verified)
        .bind(session.verified_at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    async fn record_failed_attempt(&self, email: &str) -> Result<i32, DatabaseError> {
        let row: (i32,) = sqlx::query_as(
            "UPDATE otp_sessions
             SET attempts = attempts + 1, updated_at = NOW()
             WHERE email = $1
             RETURNING attempts",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(row.0)
    }

    async fn mark_verified(&self, email: &str, at: DateTime<Utc>) -> Result<(), DatabaseError> {
        sqlx::query(
            "UPDATE otp_sessions
             SET verified = TRUE, verified_at = $2, updated_at = NOW()
             WHERE email = $1",
        )
        .bind(email)
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
