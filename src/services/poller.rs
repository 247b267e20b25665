//! Payment status polling
//!
//! Fallback for the asynchronous callback: clients poll the provider's
//! query endpoint through this service, and any terminal answer is fed to
//! the reconciler so a missed callback still settles the order.

use crate::error::AppResult;
use crate::payments::error::PaymentResult;
use crate::payments::provider::StkGateway;
use crate::payments::types::CallbackResult;
use crate::services::reconciler::{PaymentReconciler, ReconcileOutcome};
use std::sync::Arc;
use tracing::debug;

/// Client-facing payment state derived from a provider query
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollStatus {
    Processing,
    Completed,
    Failed,
}

impl PollStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PollStatus::Processing => "processing",
            PollStatus::Completed => "completed",
            PollStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub status: PollStatus,
    pub response_code: String,
    pub result_code: Option<String>,
    pub result_desc: Option<String>,
}

pub struct PaymentStatusPoller {
    gateway: Arc<dyn StkGateway>,
    reconciler: Arc<PaymentReconciler>,
}

impl PaymentStatusPoller {
    pub fn new(gateway: Arc<dyn StkGateway>, reconciler: Arc<PaymentReconciler>) -> Self {
        Self {
            gateway,
            reconciler,
        }
    }

    /// Query the provider and classify the answer. ResponseCode "0" with
    /// ResultCode "0" is success; "0" with any other ResultCode is failure;
    /// everything else (including an absent ResultCode) means the push is
    /// still in flight.
    pub async fn poll(&self, checkout_request_id: &str) -> AppResult<PollOutcome> {
        let response = self.query_provider(checkout_request_id).await?;

        let status = if response.response_code == "0" {
            match response.result_code.as_deref() {
                Some("0") => PollStatus::Completed,
                Some(_) => PollStatus::Failed,
                None => PollStatus::Processing,
            }
        } else {
            PollStatus::Processing
        };

        match status {
            PollStatus::Completed => {
                // Settlement details ride in the callback, not the query;
                // reconcile with what the query proves.
                let result = CallbackResult::Success {
                    receipt: None,
                    amount: None,
                    phone: None,
                    transaction_date: None,
                };
                let outcome = self.reconciler.reconcile(checkout_request_id, &result).await?;
                debug!(checkout_request_id = %checkout_request_id, ?outcome, "poll settled order");
            }
            PollStatus::Failed => {
                let code = response
                    .result_code
                    .as_deref()
                    .and_then(|c| c.parse::<i64>().ok())
                    .unwrap_or(-1);
                let result = CallbackResult::Failure {
                    code,
                    description: response
                        .result_desc
                        .clone()
                        .unwrap_or_else(|| "Payment did not complete".to_string()),
                };
                let outcome = self.reconciler.reconcile(checkout_request_id, &result).await?;
                debug!(checkout_request_id = %checkout_request_id, ?outcome, "poll settled order");
            }
            PollStatus::Processing => {}
        }

        Ok(PollOutcome {
            status,
            response_code: response.response_code,
            result_code: response.result_code,
            result_desc: response.result_desc,
        })
    }

    async fn query_provider(
        &self,
        checkout_request_id: &str,
    ) -> PaymentResult<crate::payments::types::StkQueryResponse> {
        self.gateway.query(checkout_request_id).await
    }
}
