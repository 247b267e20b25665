mod common;

use chrono::{Duration, Utc};
use common::{user, MemoryAnalytics, MemoryOtpStore, MemoryUserStore, RecordingMailer};
use duka_backend::config::OtpSettings;
use duka_backend::error::{AppErrorKind, DomainError};
use duka_backend::services::otp::{OtpService, OtpState};
use std::sync::Arc;

const EMAIL: &str = "user@example.com";

struct Harness {
    sessions: Arc<MemoryOtpStore>,
    users: Arc<MemoryUserStore>,
    analytics: Arc<MemoryAnalytics>,
    mailer: Arc<RecordingMailer>,
    service: OtpService,
}

fn harness() -> Harness {
    let sessions = Arc::new(MemoryOtpStore::default());
    let users = Arc::new(MemoryUserStore::with_users(vec![user(EMAIL, false)]));
    let analytics = Arc::new(MemoryAnalytics::default());
    let mailer = Arc::new(RecordingMailer::default());

    let service = OtpService::new(
        sessions.clone(),
        users.clone(),
        analytics.clone(),
        mailer.clone(),
        OtpSettings {
            code_ttl_secs: 300,
            max_attempts: 5,
            resend_cap: 3,
            cooldown_schedule_secs: vec![30, 60, 120],
        },
    );

    Harness {
        sessions,
        users,
        analytics,
        mailer,
        service,
    }
}

fn domain_error(err: duka_backend::error::AppError) -> DomainError {
    match err.kind {
        AppErrorKind::Domain(e) => e,
        other => panic!("expected domain error, got {:?}", other),
    }
}

#[tokio::test]
async fn send_then_verify_flips_user_flag() {
    let h = harness();
    let now = Utc::now();

    let receipt = h.service.send_at(now, EMAIL, None, false).await.unwrap();
    assert_eq!(receipt.expires_in_seconds, 300);
    assert_eq!(receipt.cooldown_seconds, 30);
    assert_eq!(receipt.remaining_resends, 3);
    assert!(!receipt.resend_cap_reached);

    let code = h.mailer.last_code_for(EMAIL).unwrap();
    let verified = h.service.verify_at(now, EMAIL, &code).await.unwrap();
    assert!(verified.verified);
    assert!(!verified.already_verified);

    assert!(h.users.get(EMAIL).unwrap().email_verified);
    assert_eq!(h.analytics.events_named("otp_sent"), 1);
    assert_eq!(h.analytics.events_named("email_verified"), 1);
}

#[tokio::test]
async fn only_the_hash_is_stored() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let code = h.mailer.last_code_for(EMAIL).unwrap();
    let session = h.sessions.get(EMAIL).unwrap();

    assert_ne!(session.code_hash, code);
    assert!(!session.code_hash.contains(&code));
    assert_eq!(session.code_hash.len(), 64);
    assert!(!session.salt.is_empty());
}

#[tokio::test]
async fn wrong_code_consumes_attempts_then_locks() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let code = h.mailer.last_code_for(EMAIL).unwrap();
    let wrong = if code == "000000" { "000001" } else { "000000" };

    for expected_remaining in (0..5).rev() {
        let err = h.service.verify_at(now, EMAIL, wrong).await.unwrap_err();
        match domain_error(err) {
            DomainError::OtpInvalidCode { attempts_remaining } => {
                assert_eq!(attempts_remaining, expected_remaining);
            }
            other => panic!("expected invalid code, got {:?}", other),
        }
    }

    // Sixth try is locked out even with the right code
    let err = h.service.verify_at(now, EMAIL, &code).await.unwrap_err();
    assert!(matches!(domain_error(err), DomainError::OtpLocked { .. }));
    assert!(!h.users.get(EMAIL).unwrap().email_verified);
}

#[tokio::test]
async fn expired_code_is_rejected() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let code = h.mailer.last_code_for(EMAIL).unwrap();

    let later = now + Duration::seconds(301);
    let err = h.service.verify_at(later, EMAIL, &code).await.unwrap_err();
    assert!(matches!(domain_error(err), DomainError::OtpExpired { .. }));
}

#[tokio::test]
async fn code_is_still_valid_at_the_expiry_boundary() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let code = h.mailer.last_code_for(EMAIL).unwrap();

    let boundary = now + Duration::seconds(300);
    let verified = h.service.verify_at(boundary, EMAIL, &code).await.unwrap();
    assert!(verified.verified);
}

#[tokio::test]
async fn resend_cooldowns_escalate_and_clamp() {
    let h = harness();
    let mut now = Utc::now();

    let receipt = h.service.send_at(now, EMAIL, None, false).await.unwrap();
    assert_eq!(receipt.cooldown_seconds, 30);

    now = now + Duration::seconds(31);
    let receipt = h.service.send_at(now, EMAIL, None, true).await.unwrap();
    assert_eq!(receipt.cooldown_seconds, 60);
    assert_eq!(receipt.remaining_resends, 2);

    now = now + Duration::seconds(61);
    let receipt = h.service.send_at(now, EMAIL, None, true).await.unwrap();
    assert_eq!(receipt.cooldown_seconds, 120);

    now = now + Duration::seconds(121);
    let receipt = h.service.send_at(now, EMAIL, None, true).await.unwrap();
    assert_eq!(receipt.cooldown_seconds, 120);
    assert_eq!(receipt.remaining_resends, 0);
    assert!(receipt.resend_cap_reached);

    assert_eq!(h.mailer.sent_count(), 4);
}

#[tokio::test]
async fn resend_during_cooldown_is_refused() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();

    let too_soon = now + Duration::seconds(10);
    let err = h
        .service
        .send_at(too_soon, EMAIL, None, true)
        .await
        .unwrap_err();
    match domain_error(err) {
        DomainError::OtpCooldownActive { seconds_remaining } => {
            assert_eq!(seconds_remaining, 20);
        }
        other => panic!("expected cooldown, got {:?}", other),
    }
    assert_eq!(h.mailer.sent_count(), 1);
}

#[tokio::test]
async fn cooldown_binds_first_sends_too() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();

    // Re-issuing without the resend flag cannot sidestep the cooldown
    let too_soon = now + Duration::seconds(10);
    let err = h
        .service
        .send_at(too_soon, EMAIL, None, false)
        .await
        .unwrap_err();
    assert!(matches!(
        domain_error(err),
        DomainError::OtpCooldownActive { .. }
    ));
    assert_eq!(h.mailer.sent_count(), 1);
}

#[tokio::test]
async fn resend_budget_is_exhausted_after_three_resends() {
    let h = harness();
    let mut now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    for _ in 0..3 {
        now = now + Duration::seconds(121);
        h.service.send_at(now, EMAIL, None, true).await.unwrap();
    }

    now = now + Duration::seconds(121);
    let err = h
        .service
        .send_at(now, EMAIL, None, true)
        .await
        .unwrap_err();
    assert!(matches!(
        domain_error(err),
        DomainError::OtpResendLimit { .. }
    ));
}

#[tokio::test]
async fn first_send_restarts_the_resend_budget() {
    let h = harness();
    let mut now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    for _ in 0..3 {
        now = now + Duration::seconds(121);
        h.service.send_at(now, EMAIL, None, true).await.unwrap();
    }
    assert!(h.sessions.get(EMAIL).unwrap().resend_count >= 3);

    // A send without the resend flag starts the budget over; the cap does
    // not apply to it.
    now = now + Duration::seconds(121);
    let receipt = h.service.send_at(now, EMAIL, None, false).await.unwrap();
    assert_eq!(receipt.remaining_resends, 3);
    assert_eq!(receipt.cooldown_seconds, 30);
    assert!(!receipt.resend_cap_reached);
    assert_eq!(h.sessions.get(EMAIL).unwrap().resend_count, 0);

    // And the resend ladder works again from the top
    now = now + Duration::seconds(31);
    let receipt = h.service.send_at(now, EMAIL, None, true).await.unwrap();
    assert_eq!(receipt.cooldown_seconds, 60);
    assert_eq!(receipt.remaining_resends, 2);
}

#[tokio::test]
async fn supplied_recipient_name_takes_precedence_over_the_user_record() {
    let h = harness();
    let now = Utc::now();

    h.service
        .send_at(now, EMAIL, Some("Jane"), false)
        .await
        .unwrap();
    let mail = h.mailer.last_for(EMAIL).unwrap();
    assert_eq!(mail.user_name.as_deref(), Some("Jane"));

    // Without a caller-supplied name the user record fills it in
    let later = now + Duration::seconds(31);
    h.service.send_at(later, EMAIL, None, true).await.unwrap();
    let mail = h.mailer.last_for(EMAIL).unwrap();
    assert_eq!(mail.user_name.as_deref(), Some("Test User"));
}

#[tokio::test]
async fn resend_issues_a_new_code_and_resets_attempts() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let first_code = h.mailer.last_code_for(EMAIL).unwrap();
    let wrong = if first_code == "000000" { "000001" } else { "000000" };
    let _ = h.service.verify_at(now, EMAIL, wrong).await.unwrap_err();
    assert_eq!(h.sessions.get(EMAIL).unwrap().attempts, 1);

    let later = now + Duration::seconds(31);
    h.service.send_at(later, EMAIL, None, true).await.unwrap();

    let session = h.sessions.get(EMAIL).unwrap();
    assert_eq!(session.attempts, 0);

    let new_code = h.mailer.last_code_for(EMAIL).unwrap();
    let verified = h.service.verify_at(later, EMAIL, &new_code).await.unwrap();
    assert!(verified.verified);
}

#[tokio::test]
async fn reverifying_a_settled_session_is_idempotent() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let code = h.mailer.last_code_for(EMAIL).unwrap();
    h.service.verify_at(now, EMAIL, &code).await.unwrap();

    // Any well-formed code succeeds without touching the session
    let again = h.service.verify_at(now, EMAIL, "999999").await.unwrap();
    assert!(again.verified);
    assert!(again.already_verified);
    assert_eq!(h.sessions.get(EMAIL).unwrap().attempts, 0);
}

#[tokio::test]
async fn verify_without_a_session_is_not_found() {
    let h = harness();
    let err = h
        .service
        .verify_at(Utc::now(), EMAIL, "123456")
        .await
        .unwrap_err();
    assert!(matches!(
        domain_error(err),
        DomainError::OtpSessionNotFound { .. }
    ));
}

#[tokio::test]
async fn verify_for_missing_user_reports_user_not_found() {
    let h = harness();
    let now = Utc::now();

    h.service
        .send_at(now, "ghost@example.com", None, false)
        .await
        .unwrap();
    let code = h.mailer.last_code_for("ghost@example.com").unwrap();

    let err = h
        .service
        .verify_at(now, "ghost@example.com", &code)
        .await
        .unwrap_err();
    assert!(matches!(domain_error(err), DomainError::UserNotFound { .. }));
}

#[tokio::test]
async fn malformed_code_is_rejected_before_touching_the_session() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();

    for bad in ["12345", "1234567", "12345a", ""] {
        let err = h.service.verify_at(now, EMAIL, bad).await.unwrap_err();
        assert!(matches!(err.kind, AppErrorKind::Validation(_)));
    }
    assert_eq!(h.sessions.get(EMAIL).unwrap().attempts, 0);
}

#[tokio::test]
async fn status_projects_without_mutating() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let before = h.sessions.get(EMAIL).unwrap();

    let status = h
        .service
        .status_at(now + Duration::seconds(10), EMAIL)
        .await
        .unwrap();
    assert_eq!(status.state, OtpState::Pending);
    assert!(!status.verified);
    assert_eq!(status.attempts_used, 0);
    assert_eq!(status.attempts_remaining, 5);
    assert_eq!(status.expires_at, before.expires_at);
    assert_eq!(status.expires_in_seconds, 290);
    assert_eq!(status.cooldown_seconds_remaining, 20);
    assert_eq!(status.remaining_resends, 3);
    assert!(!status.resend_cap_reached);

    let after = h.sessions.get(EMAIL).unwrap();
    assert_eq!(after.attempts, before.attempts);
    assert_eq!(after.updated_at, before.updated_at);

    let expired = h
        .service
        .status_at(now + Duration::seconds(400), EMAIL)
        .await
        .unwrap();
    assert_eq!(expired.state, OtpState::Expired);
    assert_eq!(expired.expires_in_seconds, 0);
}

#[tokio::test]
async fn status_reports_verified_and_locked_states() {
    let h = harness();
    let now = Utc::now();

    h.service.send_at(now, EMAIL, None, false).await.unwrap();
    let code = h.mailer.last_code_for(EMAIL).unwrap();
    let wrong = if code == "000000" { "000001" } else { "000000" };
    for _ in 0..5 {
        let _ = h.service.verify_at(now, EMAIL, wrong).await.unwrap_err();
    }

    let status = h.service.status_at(now, EMAIL).await.unwrap();
    assert_eq!(status.state, OtpState::Locked);
    assert_eq!(status.attempts_remaining, 0);

    // A fresh code after the cooldown clears the lock
    let later = now + Duration::seconds(31);
    h.service.send_at(later, EMAIL, None, true).await.unwrap();
    let code = h.mailer.last_code_for(EMAIL).unwrap();
    h.service.verify_at(later, EMAIL, &code).await.unwrap();

    let status = h.service.status_at(later, EMAIL).await.unwrap();
    assert_eq!(status.state, OtpState::Verified);
    assert!(status.verified);
}

#[tokio::test]
async fn invalid_email_is_rejected() {
    let h = harness();
    let err = h
        .service
        .send_at(Utc::now(), "not-an-email", None, false)
        .await
        .unwrap_err();
    assert!(matches!(err.kind, AppErrorKind::Validation(_)));
}
