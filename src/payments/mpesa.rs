//! M-Pesa Daraja client
//!
//! Implements the OAuth + STK push flow against Safaricom's Daraja API.
//! A fresh access token is fetched per operation; Daraja tokens are cheap
//! and short-lived, and per-call fetch avoids a shared refresh path.

use crate::config::MpesaSettings;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::{StkGateway, StkPushOrder};
use crate::payments::types::{
    AuthResponse, StkPushRequest, StkPushResponse, StkQueryRequest, StkQueryResponse,
};
use crate::payments::utils::{
    basic_credentials, daraja_timestamp, normalize_phone_number, stk_password, ProviderHttpClient,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, info};

const SANDBOX_BASE_URL: &str = "https://sandbox.safaricom.co.ke";
const PRODUCTION_BASE_URL: &str = "https://api.safaricom.co.ke";

/// Daraja takes whole shillings: round to the nearest unit, floor at 1.
fn whole_shillings(amount: f64) -> u64 {
    amount.round().max(1.0) as u64
}

pub struct MpesaClient {
    config: MpesaSettings,
    http: ProviderHttpClient,
}

impl MpesaClient {
    pub fn new(config: MpesaSettings) -> PaymentResult<Self> {
        let http = ProviderHttpClient::new(
            Duration::from_secs(config.request_timeout),
            config.max_retries,
        )?;

        Ok(Self { config, http })
    }

    fn base_url(&self) -> &'static str {
        match self.config.environment.as_str() {
            "production" => PRODUCTION_BASE_URL,
            _ => SANDBOX_BASE_URL,
        }
    }

    async fn access_token(&self) -> PaymentResult<String> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.base_url()
        );
        let credentials =
            basic_credentials(&self.config.consumer_key, &self.config.consumer_secret);

        let response: AuthResponse = self
            .http
            .request_json(
                Method::GET,
                &url,
                crate::payments::utils::RequestAuth::Basic(&credentials),
                None,
            )
            .await
            .map_err(|e| match e {
                PaymentError::ProviderError { message, .. } => {
                    PaymentError::AuthenticationError { message }
                }
                other => other,
            })?;

        debug!(expires_in = %response.expires_in, "obtained provider access token");
        Ok(response.access_token)
    }

    fn validate_order(order: &StkPushOrder) -> PaymentResult<()> {
        if !order.amount.is_finite() || order.amount <= 0.0 {
            return Err(PaymentError::ValidationError {
                message: "amount must be a positive number".to_string(),
                field: Some("amount".to_string()),
            });
        }

        if order.account_reference.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "account reference cannot be empty".to_string(),
                field: Some("accountReference".to_string()),
            });
        }

        Ok(())
    }
}

#[async_trait]
impl StkGateway for MpesaClient {
    async fn initiate(&self, order: &StkPushOrder) -> PaymentResult<StkPushResponse> {
        Self::validate_order(order)?;
        let phone = normalize_phone_number(&order.phone_number)?;

        let token = self.access_token().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let password = stk_password(&self.config.short_code, &self.config.passkey, &timestamp);

        let amount = whole_shillings(order.amount);

        let request = StkPushRequest {
            business_short_code: self.config.short_code.clone(),
            password,
            timestamp,
            transaction_type: "CustomerPayBillOnline".to_string(),
            amount,
            party_a: phone.clone(),
            party_b: self.config.short_code.clone(),
            phone_number: phone,
            callback_url: self.config.callback_url.clone(),
            account_reference: order.account_reference.clone(),
            transaction_desc: order.description.clone(),
        };

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.base_url());
        let body = serde_json::to_value(&request).map_err(|e| PaymentError::ProviderError {
            provider: "mpesa".to_string(),
            message: format!("failed to encode STK push request: {}", e),
            provider_code: None,
            retryable: false,
        })?;

        let response: StkPushResponse = self
            .http
            .request_json(
                Method::POST,
                &url,
                crate::payments::utils::RequestAuth::Bearer(&token),
                Some(&body),
            )
            .await?;

        if response.response_code != "0" {
            return Err(PaymentError::PaymentDeclinedError {
                message: response.response_description,
                provider_code: Some(response.response_code),
            });
        }

        info!(
            checkout_request_id = %response.checkout_request_id,
            account_reference = %order.account_reference,
            "STK push accepted by provider"
        );

        Ok(response)
    }

    async fn query(&self, checkout_request_id: &str) -> PaymentResult<StkQueryResponse> {
        if checkout_request_id.trim().is_empty() {
            return Err(PaymentError::ValidationError {
                message: "checkout request id cannot be empty".to_string(),
                field: Some("checkoutRequestID".to_string()),
            });
        }

        let token = self.access_token().await?;
        let timestamp = daraja_timestamp(Utc::now());
        let password = stk_password(&self.config.short_code, &self.config.passkey, &timestamp);

        let request = StkQueryRequest {
            business_short_code: self.config.short_code.clone(),
            password,
            timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.base_url());
        let body = serde_json::to_value(&request).map_err(|e| PaymentError::ProviderError {
            provider: "mpesa".to_string(),
            message: format!("failed to encode status query: {}", e),
            provider_code: None,
            retryable: false,
        })?;

        self.http
            .request_json(
                Method::POST,
                &url,
                crate::payments::utils::RequestAuth::Bearer(&token),
                Some(&body),
            )
            .await
    }
}
