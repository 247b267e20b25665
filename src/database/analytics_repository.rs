//! Append-only analytics event log

use crate::database::error::DatabaseError;
use async_trait::async_trait;
use sqlx::PgPool;

/// Store abstraction for analytics events
#[async_trait]
pub trait AnalyticsStore: Send + Sync {
    async fn record(
        &self,
        event: &str,
        email: &str,
        metadata: serde_json::Value,
    ) -> Result<(), DatabaseError>;
}

/// Postgres-backed analytics store
pub struct PgAnalyticsStore {
    pool: PgPool,
}

impl PgAnalyticsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AnalyticsStore for PgAnalyticsStore {
    async fn record(
        &self,
        event: &str,
        email: &str,
        metadata: serde_json::Value,
    ) -> Result<(), DatabaseError> {
        sqlx::query(
            "INSERT INTO analytics_events (event, email, metadata, created_at)
             VALUES ($1, $2, $3, NOW())",
        )
        .bind(event)
        .bind(email)
        .bind(metadata)
        .execute(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }
}
