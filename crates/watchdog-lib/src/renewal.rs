// ============================
// watchdog-lib/src/renewal.rs
// ============================
//! Session renewal with an attempt throttle.
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, error, instrument, warn};

use crate::backend::SessionBackend;
use crate::metrics::{RENEWAL_ATTEMPTED, RENEWAL_FAILED, RENEWAL_SUCCEEDED, RENEWAL_THROTTLED};

/// Result of one renewal call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenewalOutcome {
    /// The server extended the session
    Renewed,
    /// The server answered but did not extend the session
    Rejected,
    /// The request could not be completed
    Failed(String),
    /// Skipped: the previous attempt was too recent
    Throttled,
}

/// Minimum-interval gate keyed on attempt time (not response time)
#[derive(Debug, Clone)]
pub struct RenewalThrottle {
    interval: Duration,
    last_attempt_at: Option<Instant>,
}

impl RenewalThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_attempt_at: None,
        }
    }

    /// Whether an attempt may start at `now`; records the attempt when it may.
    ///
    /// Applies to every attempt, including an explicit "continue".
    pub fn try_acquire(&mut self, now: Instant) -> bool {
        if let Some(last) = self.last_attempt_at {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
        }
        self.last_attempt_at = Some(now);
        true
    }

    pub fn last_attempt_at(&self) -> Option<Instant> {
        self.last_attempt_at
    }
}

/// Issues renewal requests through a [`SessionBackend`]
pub struct RenewalClient {
    backend: Arc<dyn SessionBackend>,
    throttle: Mutex<RenewalThrottle>,
}

impl RenewalClient {
    pub fn new(backend: Arc<dyn SessionBackend>, throttle_interval: Duration) -> Self {
        Self {
            backend,
            throttle: Mutex::new(RenewalThrottle::new(throttle_interval)),
        }
    }

    /// Pass the throttle gate for an attempt starting now
    pub fn try_begin(&self) -> bool {
        let allowed = self.throttle.lock().try_acquire(Instant::now());
        if !allowed {
            counter!(RENEWAL_THROTTLED).increment(1);
            debug!("renewal throttled, previous attempt too recent");
        }
        allowed
    }

    /// Send the renewal request, without consulting the throttle.
    ///
    /// Failures are logged and reported, never retried.
    #[instrument(skip(self))]
    pub async fn send(&self) -> RenewalOutcome {
        counter!(RENEWAL_ATTEMPTED).increment(1);
        match self.backend.renew_session().await {
            Ok(true) => {
                counter!(RENEWAL_SUCCEEDED).increment(1);
                debug!("session renewed");
                RenewalOutcome::Renewed
            }
            Ok(false) => {
                counter!(RENEWAL_FAILED).increment(1);
                warn!("server declined to renew the session");
                RenewalOutcome::Rejected
            }
            Err(e) => {
                counter!(RENEWAL_FAILED).increment(1);
                if e.is_transient() {
                    warn!(error = %e, "session renewal failed");
                } else {
                    error!(error = %e, "session renewal could not be sent");
                }
                RenewalOutcome::Failed(e.to_string())
            }
        }
    }

    /// Throttled renewal: a no-op when the previous attempt is too recent
    pub async fn renew(&self) -> RenewalOutcome {
        if !self.try_begin() {
            return RenewalOutcome::Throttled;
        }
        self.send().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SessionCheck;
    use crate::error::AppError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend {
        renewals: AtomicUsize,
        answer: Option<bool>,
    }

    #[async_trait]
    impl SessionBackend for CountingBackend {
        async fn renew_session(&self) -> Result<bool, AppError> {
            self.renewals.fetch_add(1, Ordering::SeqCst);
            self.answer.ok_or_else(|| AppError::Internal("connection reset".to_string()))
        }

        async fn check_session(&self) -> Result<SessionCheck, AppError> {
            Ok(SessionCheck::Valid { user: None })
        }
    }

    fn client(answer: Option<bool>) -> (Arc<CountingBackend>, RenewalClient) {
        let backend = Arc::new(CountingBackend {
            renewals: AtomicUsize::new(0),
            answer,
        });
        let client = RenewalClient::new(backend.clone(), Duration::from_secs(30));
        (backend, client)
    }

    #[test]
    fn test_throttle_gates_on_attempt_time() {
        let t0 = Instant::now();
        let mut throttle = RenewalThrottle::new(Duration::from_secs(30));

        assert!(throttle.try_acquire(t0));
        assert!(!throttle.try_acquire(t0 + Duration::from_secs(5)));
        assert!(!throttle.try_acquire(t0 + Duration::from_secs(29)));
        // Rejected attempts do not move the window
        assert_eq!(throttle.last_attempt_at(), Some(t0));
        assert!(throttle.try_acquire(t0 + Duration::from_secs(30)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_attempts_five_seconds_apart_send_once() {
        let (backend, client) = client(Some(true));

        assert_eq!(client.renew().await, RenewalOutcome::Renewed);
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(client.renew().await, RenewalOutcome::Throttled);

        assert_eq!(backend.renewals.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_still_counts_for_throttle() {
        let (backend, client) = client(None);

        assert!(matches!(client.renew().await, RenewalOutcome::Failed(_)));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(client.renew().await, RenewalOutcome::Throttled);
        assert_eq!(backend.renewals.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(20)).await;
        assert!(matches!(client.renew().await, RenewalOutcome::Failed(_)));
        assert_eq!(backend.renewals.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rejected_renewal() {
        let (_, client) = client(Some(false));
        assert_eq!(client.renew().await, RenewalOutcome::Rejected);
    }
}
