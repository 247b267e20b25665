//! Payment result reconciliation
//!
//! Applies a decoded provider result to the matching order. Reconciliation
//! is idempotent: a result that matches the order's terminal state is a
//! no-op, and a result that contradicts it is refused without touching the
//! row. Both outcomes are reported so callers can still acknowledge the
//! provider.

use crate::database::error::DatabaseError;
use crate::database::order_repository::{
    OrderPaymentStatus, OrderStore, PaymentCompletion, PaymentFailure,
};
use crate::payments::types::CallbackResult;
use crate::payments::utils::parse_daraja_timestamp;
use std::sync::Arc;
use tracing::{info, warn};

/// What reconciliation did with a provider result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Order moved to completed
    Completed,
    /// Order moved to failed
    Failed,
    /// No order carries this checkout request id
    NoMatch,
    /// Order already sits in the state the result describes
    AlreadyFinal,
    /// Result contradicts the order's terminal state; nothing written
    Conflict,
}

pub struct PaymentReconciler {
    orders: Arc<dyn OrderStore>,
}

impl PaymentReconciler {
    pub fn new(orders: Arc<dyn OrderStore>) -> Self {
        Self { orders }
    }

    pub async fn reconcile(
        &self,
        checkout_request_id: &str,
        result: &CallbackResult,
    ) -> Result<ReconcileOutcome, DatabaseError> {
        let order = match self
            .orders
            .find_by_checkout_request_id(checkout_request_id)
            .await?
        {
            Some(order) => order,
            None => {
                info!(
                    checkout_request_id = %checkout_request_id,
                    "payment result for unknown checkout request"
                );
                return Ok(ReconcileOutcome::NoMatch);
            }
        };

        let current = order.payment_status();
        let incoming = match result {
            CallbackResult::Success { .. } => OrderPaymentStatus::Completed,
            CallbackResult::Failure { .. } => OrderPaymentStatus::Failed,
        };

        if current.is_terminal() {
            if current == incoming {
                return Ok(ReconcileOutcome::AlreadyFinal);
            }
            warn!(
                order_id = %order.order_id,
                current = %current,
                incoming = %incoming,
                "payment result contradicts settled order, refusing"
            );
            return Ok(ReconcileOutcome::Conflict);
        }

        match result {
            CallbackResult::Success {
                receipt,
                amount,
                phone,
                transaction_date,
            } => {
                let completion = PaymentCompletion {
                    receipt: receipt.clone(),
                    transaction_id: receipt.clone(),
                    phone: phone.clone(),
                    paid_amount: *amount,
                    transaction_time: transaction_date
                        .as_deref()
                        .and_then(parse_daraja_timestamp),
                };

                let applied = self
                    .orders
                    .apply_completion(&order.order_id, &completion)
                    .await?;
                if !applied {
                    // Lost the race to a contradicting writer
                    return Ok(ReconcileOutcome::Conflict);
                }

                info!(
                    order_id = %order.order_id,
                    receipt = receipt.as_deref().unwrap_or(""),
                    "payment completed"
                );
                Ok(ReconcileOutcome::Completed)
            }
            CallbackResult::Failure { code, description } => {
                let failure = PaymentFailure {
                    result_code: *code,
                    reason: description.clone(),
                };

                let applied = self.orders.apply_failure(&order.order_id, &failure).await?;
                if !applied {
                    return Ok(ReconcileOutcome::Conflict);
                }

                info!(
                    order_id = %order.order_id,
                    result_code = code,
                    reason = %description,
                    "payment failed"
                );
                Ok(ReconcileOutcome::Failed)
            }
        }
    }
}
