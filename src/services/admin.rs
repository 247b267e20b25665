//! Admin account purge
//!
//! Deletes a user and every dependent record. The super-admin account can
//! never be purged, and an admin cannot purge themselves.

use crate::database::analytics_repository::AnalyticsStore;
use crate::database::user_repository::UserStore;
use crate::error::{AppError, AppResult, DomainError};
use std::sync::Arc;
use tracing::{info, warn};

pub struct AdminService {
    users: Arc<dyn UserStore>,
    analytics: Arc<dyn AnalyticsStore>,
    super_admin_email: String,
}

impl AdminService {
    pub fn new(
        users: Arc<dyn UserStore>,
        analytics: Arc<dyn AnalyticsStore>,
        super_admin_email: String,
    ) -> Self {
        Self {
            users,
            analytics,
            super_admin_email,
        }
    }

    pub async fn purge_user(&self, caller_email: &str, target_email: &str) -> AppResult<()> {
        self.authorize(caller_email).await?;

        if target_email.eq_ignore_ascii_case(&self.super_admin_email) {
            return Err(AppError::domain(DomainError::PurgeRefused {
                email: target_email.to_string(),
                reason: "the super-admin account is protected".to_string(),
            }));
        }

        if target_email.eq_ignore_ascii_case(caller_email) {
            return Err(AppError::domain(DomainError::PurgeRefused {
                email: target_email.to_string(),
                reason: "an admin cannot delete their own account".to_string(),
            }));
        }

        let purged = self.users.purge(target_email).await?;
        if !purged {
            return Err(AppError::domain(DomainError::UserNotFound {
                email: target_email.to_string(),
            }));
        }

        if let Err(e) = self
            .analytics
            .record(
                "user_purged",
                target_email,
                serde_json::json!({ "purged_by": caller_email }),
            )
            .await
        {
            warn!(error = %e, "failed to record purge event");
        }

        info!(target = %target_email, caller = %caller_email, "user account purged");
        Ok(())
    }

    async fn authorize(&self, caller_email: &str) -> AppResult<()> {
        if caller_email.eq_ignore_ascii_case(&self.super_admin_email) {
            return Ok(());
        }

        let caller = self.users.find_by_email(caller_email).await?;
        match caller {
            Some(user) if user.is_admin => Ok(()),
            _ => Err(AppError::domain(DomainError::NotAuthorized {
                email: caller_email.to_string(),
            })),
        }
    }
}
