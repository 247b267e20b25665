//! Payment endpoints: STK push initiation, status polling, and the
//! provider's asynchronous result callback.

use crate::api::ApiState;
use crate::error::AppError;
use crate::payments::provider::StkPushOrder;
use crate::payments::types::{CallbackAck, StkCallbackEnvelope};
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushBody {
    pub phone_number: String,
    pub amount: f64,
    pub account_reference: String,
    #[serde(default)]
    pub transaction_desc: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StkPushReply {
    pub success: bool,
    #[serde(rename = "checkoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "merchantRequestID")]
    pub merchant_request_id: String,
    pub response_description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_message: Option<String>,
}

pub async fn initiate_stk_push(
    State(state): State<ApiState>,
    Json(body): Json<StkPushBody>,
) -> Result<Response, AppError> {
    let order = StkPushOrder {
        phone_number: body.phone_number,
        amount: body.amount,
        account_reference: body.account_reference.clone(),
        description: body
            .transaction_desc
            .unwrap_or_else(|| "Order payment".to_string()),
    };

    match state.gateway.initiate(&order).await {
        Ok(response) => {
            // Correlate the push with its order so the callback can find it.
            // Best-effort: a miss is logged, the customer prompt already
            // went out.
            let attached = state
                .orders
                .attach_checkout_request(&body.account_reference, &response.checkout_request_id)
                .await?;
            if !attached {
                warn!(
                    account_reference = %body.account_reference,
                    checkout_request_id = %response.checkout_request_id,
                    "no pending order to attach checkout request to"
                );
            }

            info!(
                checkout_request_id = %response.checkout_request_id,
                "STK push initiated"
            );

            Ok(Json(StkPushReply {
                success: true,
                checkout_request_id: response.checkout_request_id,
                merchant_request_id: response.merchant_request_id,
                response_description: response.response_description,
                customer_message: response.customer_message,
            })
            .into_response())
        }
        Err(e) => {
            let status =
                StatusCode::from_u16(e.http_status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
            warn!(status = %status, error = %e, "STK push rejected");
            Ok((
                status,
                Json(json!({
                    "success": false,
                    "error": e.user_message(),
                    "retryable": e.is_retryable(),
                })),
            )
                .into_response())
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
    #[serde(rename = "checkoutRequestID")]
    pub checkout_request_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReply {
    pub success: bool,
    #[serde(rename = "checkoutRequestID")]
    pub checkout_request_id: String,
    pub status: &'static str,
    pub response_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_desc: Option<String>,
}

pub async fn poll_status(
    State(state): State<ApiState>,
    Json(body): Json<StatusBody>,
) -> Result<Json<StatusReply>, AppError> {
    let outcome = state.poller.poll(&body.checkout_request_id).await?;

    Ok(Json(StatusReply {
        success: true,
        checkout_request_id: body.checkout_request_id,
        status: outcome.status.as_str(),
        response_code: outcome.response_code,
        result_code: outcome.result_code,
        result_desc: outcome.result_desc,
    }))
}

/// Decode the callback envelope ourselves so a shape-invalid body is a 400,
/// matching the syntax-error case, rather than the extractor's 422.
fn decode_callback(value: serde_json::Value) -> Result<StkCallbackEnvelope, AppError> {
    serde_json::from_value(value).map_err(|e| {
        AppError::validation(crate::error::ValidationError::MalformedBody {
            reason: e.to_string(),
        })
    })
}

/// Daraja result callback. Always acknowledges with ResultCode 0 once the
/// result has been durably applied (or safely ignored); a non-2xx answer
/// would make the provider retry.
pub async fn mpesa_callback(
    State(state): State<ApiState>,
    Json(value): Json<serde_json::Value>,
) -> Result<Json<CallbackAck>, AppError> {
    let envelope = decode_callback(value)?;
    let callback = envelope.body.stk_callback;
    let checkout_request_id = callback.checkout_request_id.clone();
    let result = callback.into_result();

    let outcome = state
        .reconciler
        .reconcile(&checkout_request_id, &result)
        .await?;

    info!(
        checkout_request_id = %checkout_request_id,
        ?outcome,
        "payment callback processed"
    );

    Ok(Json(CallbackAck::accepted()))
}
