//! Admin endpoints

use crate::api::ApiState;
use crate::error::{AppError, ValidationError};
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PurgeBody {
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct PurgeReply {
    pub success: bool,
    pub email: String,
}

pub async fn purge_user(
    State(state): State<ApiState>,
    headers: HeaderMap,
    Json(body): Json<PurgeBody>,
) -> Result<Json<PurgeReply>, AppError> {
    let caller = headers
        .get("x-caller-email")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            AppError::validation(ValidationError::MissingField {
                field: "x-caller-email".to_string(),
            })
        })?;

    state.admin.purge_user(&caller, &body.email).await?;

    Ok(Json(PurgeReply {
        success: true,
        email: body.email,
    }))
}
