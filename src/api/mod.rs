//! HTTP surface
//!
//! Route handlers are thin: they decode the request, call into a service,
//! and encode the result. All error rendering goes through the shared
//! `AppError` response path.

pub mod admin;
pub mod otp;
pub mod payments;

use crate::database::order_repository::OrderStore;
use crate::error::AppResult;
use crate::health::HealthChecker;
use crate::payments::provider::StkGateway;
use crate::services::admin::AdminService;
use crate::services::otp::OtpService;
use crate::services::poller::PaymentStatusPoller;
use crate::services::reconciler::PaymentReconciler;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use std::sync::Arc;

#[derive(Clone)]
pub struct ApiState {
    pub gateway: Arc<dyn StkGateway>,
    pub orders: Arc<dyn OrderStore>,
    pub reconciler: Arc<PaymentReconciler>,
    pub poller: Arc<PaymentStatusPoller>,
    pub otp: Arc<OtpService>,
    pub admin: Arc<AdminService>,
    pub health: Arc<HealthChecker>,
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health_report))
        .route("/health/live", get(health_live))
        .route("/health/ready", get(health_ready))
        .route("/api/payments/stk-push", post(payments::initiate_stk_push))
        .route("/api/payments/status", post(payments::poll_status))
        .route("/payments/mpesa/callback", post(payments::mpesa_callback))
        .route("/api/otp/send", post(otp::send_code))
        .route("/api/otp/verify", post(otp::verify_code))
        .route("/api/otp/status", get(otp::code_status))
        .route("/api/admin/users/purge", post(admin::purge_user))
        .with_state(state)
}

async fn health_report(State(state): State<ApiState>) -> AppResult<impl IntoResponse> {
    let report = state.health.report().await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    Ok((status, Json(report)))
}

async fn health_live() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

async fn health_ready(State(state): State<ApiState>) -> impl IntoResponse {
    if state.health.ready().await {
        (StatusCode::OK, Json(serde_json::json!({ "status": "ready" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "not ready" })),
        )
    }
}
