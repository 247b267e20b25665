//! Email verification code lifecycle
//!
//! Issues salted, hashed one-time codes, enforces the attempt lockout and
//! resend budget, and flips the user's verified flag on success. All
//! clock-dependent paths take an explicit `now` so the lifecycle can be
//! tested without sleeping.

use crate::config::OtpSettings;
use crate::database::analytics_repository::AnalyticsStore;
use crate::database::otp_repository::{OtpSession, OtpSessionStore};
use crate::database::user_repository::UserStore;
use crate::error::{AppError, AppResult, DomainError, ValidationError};
use crate::payments::utils::secure_eq;
use crate::services::mailer::Mailer;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::sync::OnceLock;
use tracing::{info, warn};

fn email_regex() -> &'static Regex {
    static EMAIL_RE: OnceLock<Regex> = OnceLock::new();
    EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$")
            .unwrap_or_else(|_| Regex::new("^$").unwrap())
    })
}

fn validate_email(email: &str) -> AppResult<()> {
    if email_regex().is_match(email) {
        Ok(())
    } else {
        Err(AppError::validation(ValidationError::InvalidEmail {
            email: email.to_string(),
            reason: "not a valid email address".to_string(),
        }))
    }
}

fn hash_code(code: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}", code, salt).as_bytes());
    hex::encode(hasher.finalize())
}

fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

fn generate_salt() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// Result of issuing (or re-issuing) a code
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub expires_in_seconds: i64,
    pub cooldown_seconds: i64,
    pub remaining_resends: i32,
    pub resend_cap_reached: bool,
}

/// Result of a successful verification
#[derive(Debug, Clone)]
pub struct VerifyReceipt {
    pub verified: bool,
    pub already_verified: bool,
}

/// Read-only projection of a session's state
#[derive(Debug, Clone)]
pub struct OtpStatus {
    pub state: OtpState,
    pub verified: bool,
    pub attempts_used: i32,
    pub attempts_remaining: i32,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: i64,
    pub cooldown_seconds_remaining: i64,
    pub remaining_resends: i32,
    pub resend_cap_reached: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpState {
    Pending,
    Verified,
    Expired,
    Locked,
}

impl OtpState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OtpState::Pending => "pending",
            OtpState::Verified => "verified",
            OtpState::Expired => "expired",
            OtpState::Locked => "locked",
        }
    }
}

pub struct OtpService {
    sessions: Arc<dyn OtpSessionStore>,
    users: Arc<dyn UserStore>,
    analytics: Arc<dyn AnalyticsStore>,
    mailer: Arc<dyn Mailer>,
    config: OtpSettings,
}

impl OtpService {
    pub fn new(
        sessions: Arc<dyn OtpSessionStore>,
        users: Arc<dyn UserStore>,
        analytics: Arc<dyn AnalyticsStore>,
        mailer: Arc<dyn Mailer>,
        config: OtpSettings,
    ) -> Self {
        Self {
            sessions,
            users,
            analytics,
            mailer,
            config,
        }
    }

    pub async fn send(
        &self,
        email: &str,
        user_name: Option<&str>,
        is_resend: bool,
    ) -> AppResult<SendReceipt> {
        self.send_at(Utc::now(), email, user_name, is_resend).await
    }

    pub async fn verify(&self, email: &str, code: &str) -> AppResult<VerifyReceipt> {
        self.verify_at(Utc::now(), email, code).await
    }

    pub async fn status(&self, email: &str) -> AppResult<OtpStatus> {
        self.status_at(Utc::now(), email).await
    }

    /// Issue a fresh code. The `is_resend` flag drives the resend counter:
    /// a resend advances it (and is subject to the cap), a first send
    /// starts the budget over. The cooldown binds every send on an
    /// unverified session; a verified session starts the lifecycle over.
    pub async fn send_at(
        &self,
        now: DateTime<Utc>,
        email: &str,
        user_name: Option<&str>,
        is_resend: bool,
    ) -> AppResult<SendReceipt> {
        validate_email(email)?;

        let existing = self.sessions.find(email).await?;

        let resend_count = match &existing {
            Some(session) if !session.verified => {
                if is_resend && session.resend_count >= self.config.resend_cap {
                    return Err(AppError::domain(DomainError::OtpResendLimit {
                        email: email.to_string(),
                    }));
                }
                if let Some(next_resend_at) = session.next_resend_at {
                    if now < next_resend_at {
                        let remaining = (next_resend_at - now).num_seconds().max(1);
                        return Err(AppError::domain(DomainError::OtpCooldownActive {
                            seconds_remaining: remaining,
                        }));
                    }
                }
                if is_resend {
                    session.resend_count + 1
                } else {
                    0
                }
            }
            _ => 0,
        };

        let code = generate_code();
        let salt = generate_salt();
        let cooldown = self.cooldown_for(resend_count);

        let session = OtpSession {
            email: email.to_string(),
            code_hash: hash_code(&code, &salt),
            salt,
            expires_at: now + Duration::seconds(self.config.code_ttl_secs),
            attempts: 0,
            resend_count,
            next_resend_at: Some(now + Duration::seconds(cooldown)),
            verified: false,
            verified_at: None,
            created_at: now,
            updated_at: now,
        };
        self.sessions.upsert(&session).await?;

        // Prefer the caller-supplied name, fall back to the user record
        let recipient_name = match user_name {
            Some(name) => Some(name.to_string()),
            None => self
                .users
                .find_by_email(email)
                .await?
                .and_then(|u| u.user_name),
        };
        self.mailer
            .send_otp(email, recipient_name.as_deref(), &code, self.config.code_ttl_secs)
            .await
            .map_err(|e| {
                AppError::new(crate::error::AppErrorKind::External(
                    crate::error::ExternalError::MailDelivery {
                        message: e.to_string(),
                    },
                ))
            })?;

        self.record_event("otp_sent", email, serde_json::json!({ "resend_count": resend_count }))
            .await;

        info!(email = %email, resend_count, "verification code issued");

        Ok(SendReceipt {
            expires_in_seconds: self.config.code_ttl_secs,
            cooldown_seconds: cooldown,
            remaining_resends: (self.config.resend_cap - resend_count).max(0),
            resend_cap_reached: resend_count >= self.config.resend_cap,
        })
    }

    pub async fn verify_at(
        &self,
        now: DateTime<Utc>,
        email: &str,
        code: &str,
    ) -> AppResult<VerifyReceipt> {
        validate_email(email)?;
        if code.len() != 6 || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::validation(ValidationError::InvalidCode {
                reason: "code must be exactly 6 digits".to_string(),
            }));
        }

        let session = self
            .sessions
            .find(email)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::OtpSessionNotFound {
                    email: email.to_string(),
                })
            })?;

        // Re-verifying a settled session is a no-op, not an error
        if session.verified {
            return Ok(VerifyReceipt {
                verified: true,
                already_verified: true,
            });
        }

        if session.attempts >= self.config.max_attempts {
            return Err(AppError::domain(DomainError::OtpLocked {
                email: email.to_string(),
            }));
        }

        if now > session.expires_at {
            return Err(AppError::domain(DomainError::OtpExpired {
                email: email.to_string(),
            }));
        }

        let submitted = hash_code(code, &session.salt);
        if !secure_eq(submitted.as_bytes(), session.code_hash.as_bytes()) {
            let attempts = self.sessions.record_failed_attempt(email).await?;
            let remaining = (self.config.max_attempts - attempts).max(0);
            warn!(email = %email, attempts, "wrong verification code");
            return Err(AppError::domain(DomainError::OtpInvalidCode {
                attempts_remaining: remaining,
            }));
        }

        self.sessions.mark_verified(email, now).await?;

        let flagged = self.users.set_email_verified(email).await?;
        if !flagged {
            return Err(AppError::domain(DomainError::UserNotFound {
                email: email.to_string(),
            }));
        }

        self.record_event("email_verified", email, serde_json::json!({}))
            .await;

        info!(email = %email, "email verified");

        Ok(VerifyReceipt {
            verified: true,
            already_verified: false,
        })
    }

    /// Project the session's state without mutating it.
    pub async fn status_at(&self, now: DateTime<Utc>, email: &str) -> AppResult<OtpStatus> {
        validate_email(email)?;

        let session = self
            .sessions
            .find(email)
            .await?
            .ok_or_else(|| {
                AppError::domain(DomainError::OtpSessionNotFound {
                    email: email.to_string(),
                })
            })?;

        let state = if session.verified {
            OtpState::Verified
        } else if session.attempts >= self.config.max_attempts {
            OtpState::Locked
        } else if now > session.expires_at {
            OtpState::Expired
        } else {
            OtpState::Pending
        };

        let cooldown_remaining = session
            .next_resend_at
            .map(|at| (at - now).num_seconds().max(0))
            .unwrap_or(0);

        Ok(OtpStatus {
            state,
            verified: session.verified,
            attempts_used: session.attempts,
            attempts_remaining: (self.config.max_attempts - session.attempts).max(0),
            expires_at: session.expires_at,
            expires_in_seconds: (session.expires_at - now).num_seconds().max(0),
            cooldown_seconds_remaining: cooldown_remaining,
            remaining_resends: (self.config.resend_cap - session.resend_count).max(0),
            resend_cap_reached: session.resend_count >= self.config.resend_cap,
        })
    }

    /// Escalating cooldown, clamped to the last schedule entry.
    fn cooldown_for(&self, resend_count: i32) -> i64 {
        let schedule = &self.config.cooldown_schedule_secs;
        let index = (resend_count.max(0) as usize).min(schedule.len().saturating_sub(1));
        schedule.get(index).copied().unwrap_or(0)
    }

    async fn record_event(&self, event: &str, email: &str, metadata: serde_json::Value) {
        if let Err(e) = self.analytics.record(event, email, metadata).await {
            warn!(event = %event, error = %e, "failed to record analytics event");
        }
    }
}
