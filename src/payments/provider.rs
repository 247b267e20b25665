//! Gateway abstraction over the STK push provider
//!
//! The HTTP client lives behind this trait so the reconciliation and
//! polling services can be exercised against a stub gateway.

use crate::payments::error::PaymentResult;
use crate::payments::types::{StkPushResponse, StkQueryResponse};
use async_trait::async_trait;

/// Parameters for initiating an STK push against an order
#[derive(Debug, Clone)]
pub struct StkPushOrder {
    pub phone_number: String,
    pub amount: f64,
    pub account_reference: String,
    pub description: String,
}

#[async_trait]
pub trait StkGateway: Send + Sync {
    /// Initiate an STK push prompt on the customer's handset.
    async fn initiate(&self, order: &StkPushOrder) -> PaymentResult<StkPushResponse>;

    /// Query the provider for the current state of a previously initiated
    /// push.
    async fn query(&self, checkout_request_id: &str) -> PaymentResult<StkQueryResponse>;
}
