// ============================
// watchdog-lib/src/validator.rs
// ============================
//! Periodic server-side session validation.
use std::sync::Arc;

use helpdesk_common::SessionUser;
use metrics::counter;
use tracing::{debug, error, instrument, warn};

use crate::backend::{SessionBackend, SessionCheck};
use crate::metrics::{POLL_INVALID, POLL_TOTAL, POLL_UNREACHABLE};

/// Result of one poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Session still valid
    Valid { user: Option<SessionUser> },
    /// Session rejected; the page must leave
    Invalid { reason: String, redirect: Option<String> },
    /// No verdict; transient, the next tick tries again
    Unreachable(String),
}

/// Asks the backend whether the session survived server-side changes
pub struct SessionValidator {
    backend: Arc<dyn SessionBackend>,
}

impl SessionValidator {
    pub fn new(backend: Arc<dyn SessionBackend>) -> Self {
        Self { backend }
    }

    #[instrument(skip(self))]
    pub async fn check(&self) -> PollOutcome {
        counter!(POLL_TOTAL).increment(1);
        match self.backend.check_session().await {
            Ok(SessionCheck::Valid { user }) => {
                debug!(user = ?user.as_ref().map(|u| &u.username), "session still valid");
                PollOutcome::Valid { user }
            }
            Ok(SessionCheck::Invalid { reason, redirect }) => {
                counter!(POLL_INVALID).increment(1);
                warn!(%reason, "session invalidated by server");
                PollOutcome::Invalid { reason, redirect }
            }
            Err(e) => {
                counter!(POLL_UNREACHABLE).increment(1);
                if e.is_transient() {
                    warn!(error = %e, "session check failed, will retry on next tick");
                } else {
                    error!(error = %e, "session check could not be sent, will retry on next tick");
                }
                PollOutcome::Unreachable(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use async_trait::async_trait;

    struct FixedBackend(Option<SessionCheck>);

    #[async_trait]
    impl SessionBackend for FixedBackend {
        async fn renew_session(&self) -> Result<bool, AppError> {
            Ok(true)
        }

        async fn check_session(&self) -> Result<SessionCheck, AppError> {
            self.0
                .clone()
                .ok_or_else(|| AppError::Internal("connection refused".to_string()))
        }
    }

    async fn outcome(check: Option<SessionCheck>) -> PollOutcome {
        SessionValidator::new(Arc::new(FixedBackend(check))).check().await
    }

    #[tokio::test]
    async fn test_outcomes() {
        assert_eq!(
            outcome(Some(SessionCheck::Valid { user: None })).await,
            PollOutcome::Valid { user: None }
        );

        let invalid = SessionCheck::Invalid {
            reason: "user removed".to_string(),
            redirect: Some("/p/login".to_string()),
        };
        assert_eq!(
            outcome(Some(invalid)).await,
            PollOutcome::Invalid {
                reason: "user removed".to_string(),
                redirect: Some("/p/login".to_string()),
            }
        );

        assert!(matches!(outcome(None).await, PollOutcome::Unreachable(_)));
    }
}
