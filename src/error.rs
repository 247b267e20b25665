//! Comprehensive error handling for the Duka backend
//!
//! This module provides a unified error system with proper HTTP status mapping,
//! user-friendly messages, and structured error codes for client handling.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for programmatic handling by clients
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    // Domain errors (4xx)
    #[serde(rename = "ORDER_NOT_FOUND")]
    OrderNotFound,
    #[serde(rename = "PAYMENT_STATE_CONFLICT")]
    PaymentStateConflict,
    #[serde(rename = "USER_NOT_FOUND")]
    UserNotFound,
    #[serde(rename = "OTP_SESSION_NOT_FOUND")]
    OtpSessionNotFound,
    #[serde(rename = "OTP_EXPIRED")]
    OtpExpired,
    #[serde(rename = "OTP_INVALID_CODE")]
    OtpInvalidCode,
    #[serde(rename = "OTP_LOCKED")]
    OtpLocked,
    #[serde(rename = "OTP_RESEND_LIMIT")]
    OtpResendLimit,
    #[serde(rename = "OTP_COOLDOWN_ACTIVE")]
    OtpCooldownActive,
    #[serde(rename = "NOT_AUTHORIZED")]
    NotAuthorized,
    #[serde(rename = "PURGE_REFUSED")]
    PurgeRefused,

    // Infrastructure errors (5xx)
    #[serde(rename = "DATABASE_ERROR")]
    DatabaseError,
    #[serde(rename = "CONFIGURATION_ERROR")]
    ConfigurationError,

    // External errors (502, 503, 504)
    #[serde(rename = "PAYMENT_PROVIDER_ERROR")]
    PaymentProviderError,
    #[serde(rename = "MAIL_DELIVERY_ERROR")]
    MailDeliveryError,
    #[serde(rename = "RATE_LIMIT_ERROR")]
    RateLimitError,
    #[serde(rename = "EXTERNAL_SERVICE_TIMEOUT")]
    ExternalServiceTimeout,

    // Generic
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
}

/// Domain-specific business logic errors
#[derive(Debug, Clone)]
pub enum DomainError {
    /// No order carries the given M-Pesa correlation id
    OrderNotFound { checkout_request_id: String },
    /// A payment result arrived for an order already finalized with the
    /// opposite outcome
    PaymentStateConflict {
        order_id: String,
        current: String,
        attempted: String,
    },
    /// User record doesn't exist
    UserNotFound { email: String },
    /// No OTP session exists for the email
    OtpSessionNotFound { email: String },
    /// The OTP code expired before verification
    OtpExpired { email: String },
    /// Submitted code didn't match the stored hash
    OtpInvalidCode { attempts_remaining: i32 },
    /// Too many wrong codes; session is locked
    OtpLocked { email: String },
    /// Resend budget for the session is exhausted
    OtpResendLimit { email: String },
    /// A resend was requested before the cooldown elapsed
    OtpCooldownActive { seconds_remaining: i64 },
    /// Caller lacks the admin capability
    NotAuthorized { email: String },
    /// Purge target is protected (super-admin or the caller themselves)
    PurgeRefused { email: String, reason: String },
}

/// Infrastructure-level errors (database, configuration)
#[derive(Debug, Clone)]
pub enum InfrastructureError {
    /// Database connection or query failure
    Database { message: String, is_retryable: bool },
    /// Missing or invalid configuration
    Configuration { message: String },
}

/// External service errors (payment provider, mail transport)
#[derive(Debug, Clone)]
pub enum ExternalError {
    /// M-Pesa Daraja API error
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },
    /// Outbound mail delivery failed
    MailDelivery { message: String },
    /// Rate limit exceeded
    RateLimit {
        service: String,
        retry_after: Option<u64>,
    },
    /// External service timeout
    Timeout { service: String, timeout_secs: u64 },
}

/// Input validation errors
#[derive(Debug, Clone)]
pub enum ValidationError {
    /// Malformed email address
    InvalidEmail { email: String, reason: String },
    /// Phone number that can't be normalized to MSISDN form
    InvalidPhoneNumber { phone: String, reason: String },
    /// Invalid amount (format or value)
    InvalidAmount { amount: String, reason: String },
    /// OTP code with the wrong shape (not 6 digits)
    InvalidCode { reason: String },
    /// Required field missing
    MissingField { field: String },
    /// Request body that doesn't decode into the expected shape
    MalformedBody { reason: String },
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
    pub context: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    Domain(DomainError),
    Infrastructure(InfrastructureError),
    External(ExternalError),
    Validation(ValidationError),
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
            context: None,
        }
    }

    pub fn domain(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }

    pub fn validation(err: ValidationError) -> Self {
        Self::new(AppErrorKind::Validation(err))
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => 404,
                DomainError::PaymentStateConflict { .. } => 409,
                DomainError::UserNotFound { .. } => 404,
                DomainError::OtpSessionNotFound { .. } => 404,
                DomainError::OtpExpired { .. } => 410, // Gone
                DomainError::OtpInvalidCode { .. } => 401,
                DomainError::OtpLocked { .. } => 429,
                DomainError::OtpResendLimit { .. } => 429,
                DomainError::OtpCooldownActive { .. } => 429,
                DomainError::NotAuthorized { .. } => 403,
                DomainError::PurgeRefused { .. } => 403,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => 500,
                InfrastructureError::Configuration { .. } => 500,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => 502, // Bad Gateway
                ExternalError::MailDelivery { .. } => 502,
                ExternalError::RateLimit { .. } => 429,
                ExternalError::Timeout { .. } => 504,
            },
            AppErrorKind::Validation(_) => 400,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound { .. } => ErrorCode::OrderNotFound,
                DomainError::PaymentStateConflict { .. } => ErrorCode::PaymentStateConflict,
                DomainError::UserNotFound { .. } => ErrorCode::UserNotFound,
                DomainError::OtpSessionNotFound { .. } => ErrorCode::OtpSessionNotFound,
                DomainError::OtpExpired { .. } => ErrorCode::OtpExpired,
                DomainError::OtpInvalidCode { .. } => ErrorCode::OtpInvalidCode,
                DomainError::OtpLocked { .. } => ErrorCode::OtpLocked,
                DomainError::OtpResendLimit { .. } => ErrorCode::OtpResendLimit,
                DomainError::OtpCooldownActive { .. } => ErrorCode::OtpCooldownActive,
                DomainError::NotAuthorized { .. } => ErrorCode::NotAuthorized,
                DomainError::PurgeRefused { .. } => ErrorCode::PurgeRefused,
            },
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { .. } => ErrorCode::DatabaseError,
                InfrastructureError::Configuration { .. } => ErrorCode::ConfigurationError,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { .. } => ErrorCode::PaymentProviderError,
                ExternalError::MailDelivery { .. } => ErrorCode::MailDeliveryError,
                ExternalError::RateLimit { .. } => ErrorCode::RateLimitError,
                ExternalError::Timeout { .. } => ErrorCode::ExternalServiceTimeout,
            },
            AppErrorKind::Validation(_) => ErrorCode::ValidationError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::Domain(err) => match err {
                DomainError::OrderNotFound {
                    checkout_request_id,
                } => {
                    format!(
                        "No order found for checkout request '{}'",
                        checkout_request_id
                    )
                }
                DomainError::PaymentStateConflict {
                    order_id,
                    current,
                    attempted,
                } => {
                    format!(
                        "Order '{}' is already {} and cannot be marked {}",
                        order_id, current, attempted
                    )
                }
                DomainError::UserNotFound { email } => {
                    format!("No account found for '{}'", email)
                }
                DomainError::OtpSessionNotFound { email } => {
                    format!(
                        "No verification code was issued for '{}'. Please request a new code",
                        email
                    )
                }
                DomainError::OtpExpired { .. } => {
                    "Verification code has expired. Please request a new code".to_string()
                }
                DomainError::OtpInvalidCode { attempts_remaining } => {
                    format!(
                        "Invalid verification code. {} attempt(s) remaining",
                        attempts_remaining
                    )
                }
                DomainError::OtpLocked { .. } => {
                    "Too many failed attempts. Please request a new code".to_string()
                }
                DomainError::OtpResendLimit { .. } => {
                    "Resend limit reached. Please try again later".to_string()
                }
                DomainError::OtpCooldownActive { seconds_remaining } => {
                    format!(
                        "Please wait {} second(s) before requesting another code",
                        seconds_remaining
                    )
                }
                DomainError::NotAuthorized { .. } => {
                    "You are not authorized to perform this action".to_string()
                }
                DomainError::PurgeRefused { email, reason } => {
                    format!("Account '{}' cannot be deleted: {}", email, reason)
                }
            },
            AppErrorKind::Infrastructure(_) => {
                "Service temporarily unavailable. Please try again later".to_string()
            }
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider {
                    provider,
                    is_retryable,
                    ..
                } => {
                    if *is_retryable {
                        format!(
                            "Payment provider ({}) is temporarily unavailable. Please try again",
                            provider
                        )
                    } else {
                        "Payment processing failed. Please contact support".to_string()
                    }
                }
                ExternalError::MailDelivery { .. } => {
                    "We couldn't send the verification email. Please try again".to_string()
                }
                ExternalError::RateLimit {
                    service,
                    retry_after,
                } => {
                    if let Some(secs) = retry_after {
                        format!(
                            "Rate limit exceeded for {}. Please try again in {} seconds",
                            service, secs
                        )
                    } else {
                        format!(
                            "Rate limit exceeded for {}. Please try again later",
                            service
                        )
                    }
                }
                ExternalError::Timeout {
                    service,
                    timeout_secs,
                } => {
                    format!(
                        "{} request timed out after {} seconds. Please try again",
                        service, timeout_secs
                    )
                }
            },
            AppErrorKind::Validation(err) => match err {
                ValidationError::InvalidEmail { email, reason } => {
                    format!("Invalid email '{}': {}", email, reason)
                }
                ValidationError::InvalidPhoneNumber { phone, reason } => {
                    format!("Invalid phone number '{}': {}", phone, reason)
                }
                ValidationError::InvalidAmount { amount, reason } => {
                    format!("Invalid amount '{}': {}", amount, reason)
                }
                ValidationError::InvalidCode { reason } => {
                    format!("Invalid verification code: {}", reason)
                }
                ValidationError::MissingField { field } => {
                    format!("Required field '{}' is missing", field)
                }
                ValidationError::MalformedBody { reason } => {
                    format!("Malformed request body: {}", reason)
                }
            },
        }
    }

    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::Domain(_) => false,
            AppErrorKind::Infrastructure(err) => match err {
                InfrastructureError::Database { is_retryable, .. } => *is_retryable,
                InfrastructureError::Configuration { .. } => false,
            },
            AppErrorKind::External(err) => match err {
                ExternalError::PaymentProvider { is_retryable, .. } => *is_retryable,
                ExternalError::MailDelivery { .. } => true,
                ExternalError::RateLimit { .. } => true,
                ExternalError::Timeout { .. } => true,
            },
            AppErrorKind::Validation(_) => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

// Conversions from specific error types
// Note: From<DatabaseError> is implemented in database/error.rs to avoid
// circular dependency, and From<PaymentError> in payments/error.rs.

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;
