//! Service health reporting

use crate::database;
use serde::Serialize;
use sqlx::PgPool;
use std::time::Instant;

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub status: String,
    pub uptime_seconds: u64,
    pub database: ComponentHealth,
}

#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct HealthChecker {
    pool: PgPool,
    started_at: Instant,
}

impl HealthChecker {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            started_at: Instant::now(),
        }
    }

    pub async fn ready(&self) -> bool {
        database::health_check(&self.pool).await.is_ok()
    }

    pub async fn report(&self) -> HealthReport {
        let check_start = Instant::now();
        let db_result = database::health_check(&self.pool).await;
        let latency_ms = check_start.elapsed().as_millis() as u64;

        let database = match db_result {
            Ok(()) => ComponentHealth {
                status: "up".to_string(),
                latency_ms,
                error: None,
            },
            Err(e) => ComponentHealth {
                status: "down".to_string(),
                latency_ms,
                error: Some(e.to_string()),
            },
        };

        let healthy = database.status == "up";
        HealthReport {
            healthy,
            status: if healthy { "healthy" } else { "degraded" }.to_string(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            database,
        }
    }
}
