//! Daraja wire types
//!
//! Field names follow the provider's JSON exactly, so every struct uses
//! explicit serde renames rather than a rename_all convention (Daraja mixes
//! `CheckoutRequestID`, `CallBackURL` and `stkCallback` in one API).

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// OAuth token response
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    pub expires_in: String,
}

/// STK push request body
#[derive(Debug, Clone, Serialize)]
pub struct StkPushRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: String,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// STK push acceptance response
#[derive(Debug, Clone, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: Option<String>,
}

/// STK push status query request body
#[derive(Debug, Clone, Serialize)]
pub struct StkQueryRequest {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// STK push status query response
///
/// ResultCode is absent while the push is still awaiting user action, and a
/// string when present (the query endpoint stringifies it, unlike the
/// callback which sends a number).
#[derive(Debug, Clone, Deserialize)]
pub struct StkQueryResponse {
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: Option<String>,
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: Option<String>,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: Option<String>,
    #[serde(rename = "ResultCode")]
    pub result_code: Option<String>,
    #[serde(rename = "ResultDesc")]
    pub result_desc: Option<String>,
}

/// Asynchronous payment-result callback envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: StkCallbackBody,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<CallbackItem>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: Option<JsonValue>,
}

/// Decoded payment result, produced once at the callback boundary
#[derive(Debug, Clone, PartialEq)]
pub enum CallbackResult {
    Success {
        receipt: Option<String>,
        amount: Option<i64>,
        phone: Option<String>,
        transaction_date: Option<String>,
    },
    Failure {
        code: i64,
        description: String,
    },
}

impl StkCallback {
    /// Decode the name/value metadata list into a typed result. Missing
    /// metadata items stay None; a zero ResultCode is success.
    pub fn into_result(self) -> CallbackResult {
        if self.result_code != 0 {
            return CallbackResult::Failure {
                code: self.result_code,
                description: self.result_desc,
            };
        }

        let mut receipt = None;
        let mut amount = None;
        let mut phone = None;
        let mut transaction_date = None;

        if let Some(metadata) = self.callback_metadata {
            for item in metadata.item {
                match item.name.as_str() {
                    "MpesaReceiptNumber" => {
                        receipt = item
                            .value
                            .as_ref()
                            .and_then(|v| v.as_str())
                            .map(|s| s.to_string());
                    }
                    "Amount" => {
                        // Daraja sends whole shillings, occasionally as a float
                        amount = item.value.as_ref().and_then(|v| {
                            v.as_i64().or_else(|| v.as_f64().map(|f| f.round() as i64))
                        });
                    }
                    "PhoneNumber" => {
                        phone = item.value.as_ref().map(|v| match v.as_str() {
                            Some(s) => s.to_string(),
                            None => v.to_string(),
                        });
                    }
                    "TransactionDate" => {
                        transaction_date = item.value.as_ref().map(|v| match v.as_str() {
                            Some(s) => s.to_string(),
                            None => v.to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }

        CallbackResult::Success {
            receipt,
            amount,
            phone,
            transaction_date,
        }
    }
}

/// Acknowledgement body Daraja expects from the callback endpoint
#[derive(Debug, Clone, Serialize)]
pub struct CallbackAck {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl CallbackAck {
    pub fn accepted() -> Self {
        Self {
            result_code: 0,
            result_desc: "Accepted".to_string(),
        }
    }
}
