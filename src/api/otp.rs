//! Email verification endpoints

use crate::api::ApiState;
use crate::error::AppError;
use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendBody {
    pub email: String,
    #[serde(default)]
    pub user_name: Option<String>,
    #[serde(default)]
    pub resend: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendReply {
    pub success: bool,
    pub expires_in_seconds: i64,
    pub cooldown_seconds: i64,
    pub remaining_resends: i32,
    pub resend_cap_reached: bool,
}

pub async fn send_code(
    State(state): State<ApiState>,
    Json(body): Json<SendBody>,
) -> Result<Json<SendReply>, AppError> {
    let receipt = state
        .otp
        .send(&body.email, body.user_name.as_deref(), body.resend)
        .await?;

    Ok(Json(SendReply {
        success: true,
        expires_in_seconds: receipt.expires_in_seconds,
        cooldown_seconds: receipt.cooldown_seconds,
        remaining_resends: receipt.remaining_resends,
        resend_cap_reached: receipt.resend_cap_reached,
    }))
}

#[derive(Debug, Deserialize)]
pub struct VerifyBody {
    pub email: String,
    pub otp: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyReply {
    pub success: bool,
    pub verified: bool,
    pub already_verified: bool,
}

pub async fn verify_code(
    State(state): State<ApiState>,
    Json(body): Json<VerifyBody>,
) -> Result<Json<VerifyReply>, AppError> {
    let receipt = state.otp.verify(&body.email, &body.otp).await?;

    Ok(Json(VerifyReply {
        success: true,
        verified: receipt.verified,
        already_verified: receipt.already_verified,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub verified: bool,
    pub status: &'static str,
    pub attempts: i32,
    pub expires_at_ms: i64,
    pub cooldown_seconds: i64,
    pub remaining_resends: i32,
    pub resend_cap_reached: bool,
}

pub async fn code_status(
    State(state): State<ApiState>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<StatusReply>, AppError> {
    let status = state.otp.status(&query.email).await?;

    Ok(Json(StatusReply {
        verified: status.verified,
        status: status.state.as_str(),
        attempts: status.attempts_used,
        expires_at_ms: status.expires_at.timestamp_millis(),
        cooldown_seconds: status.cooldown_seconds_remaining,
        remaining_resends: status.remaining_resends,
        resend_cap_reached: status.resend_cap_reached,
    }))
}
