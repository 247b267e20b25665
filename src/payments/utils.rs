use crate::payments::error::{PaymentError, PaymentResult};
use base64::Engine;
use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::warn;

/// Authentication scheme for an outbound provider request
#[derive(Debug, Clone, Copy)]
pub enum RequestAuth<'a> {
    None,
    Bearer(&'a str),
    Basic(&'a str),
}

#[derive(Clone)]
pub struct ProviderHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl ProviderHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: reqwest::Method,
        url: &str,
        auth: RequestAuth<'_>,
        body: Option<&JsonValue>,
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let mut request = self.client.request(method.clone(), url);
            request = request.timeout(self.timeout);

            match auth {
                RequestAuth::None => {}
                RequestAuth::Bearer(token) => {
                    request = request.bearer_auth(token);
                }
                RequestAuth::Basic(credentials) => {
                    request = request.header("Authorization", format!("Basic {}", credentials));
                }
            }
            if let Some(payload) = body {
                request = request.json(payload);
            }

            let response = request
                .send()
                .await
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("provider request failed: {}", e),
                });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::ProviderError {
                                provider: "mpesa".to_string(),
                                message: format!("invalid provider JSON response: {}", e),
                                provider_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimitError {
                            message: "provider rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "provider server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::ProviderError {
                        provider: "mpesa".to_string(),
                        message: format!("HTTP {}: {}", status, text),
                        provider_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::NetworkError {
            message: "provider request failed".to_string(),
        }))
    }
}

/// Normalize a subscriber phone number to MSISDN form (254XXXXXXXXX).
///
/// Strips whitespace and a leading '+'; a leading '0' is rewritten to the
/// country prefix.
pub fn normalize_phone_number(phone: &str) -> PaymentResult<String> {
    let cleaned: String = phone.chars().filter(|c| !c.is_whitespace()).collect();
    let cleaned = cleaned.strip_prefix('+').unwrap_or(&cleaned);

    let normalized = if let Some(rest) = cleaned.strip_prefix('0') {
        format!("254{}", rest)
    } else {
        cleaned.to_string()
    };

    if normalized.len() != 12
        || !normalized.starts_with("254")
        || !normalized.chars().all(|c| c.is_ascii_digit())
    {
        return Err(PaymentError::ValidationError {
            message: format!("phone number '{}' is not a valid Kenyan MSISDN", phone),
            field: Some("phoneNumber".to_string()),
        });
    }

    Ok(normalized)
}

/// Offset for East Africa Time (UTC+3); Daraja timestamps are local time.
fn eat_offset() -> FixedOffset {
    FixedOffset::east_opt(3 * 3600).unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

/// Format an instant as a Daraja timestamp (YYYYMMDDHHMMSS in EAT).
pub fn daraja_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&eat_offset()).format("%Y%m%d%H%M%S").to_string()
}

/// Parse a Daraja timestamp back into UTC. Returns None on malformed input.
pub fn parse_daraja_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let naive = chrono::NaiveDateTime::parse_from_str(value, "%Y%m%d%H%M%S").ok()?;
    eat_offset()
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

/// STK password: base64(shortCode + passKey + timestamp)
pub fn stk_password(short_code: &str, passkey: &str, timestamp: &str) -> String {
    let raw = format!("{}{}{}", short_code, passkey, timestamp);
    base64::engine::general_purpose::STANDARD.encode(raw)
}

/// Basic-auth credential: base64(consumerKey:consumerSecret)
pub fn basic_credentials(consumer_key: &str, consumer_secret: &str) -> String {
    let raw = format!("{}:{}", consumer_key, consumer_secret);
    base64::engine::general_purpose::STANDARD.encode(raw)
}

/// Constant-time byte comparison
pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
