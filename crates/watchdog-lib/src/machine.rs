// ============================
// watchdog-lib/src/machine.rs
// ============================
//! Session expiry state machine.
//!
//! Pure and clock-free: every input carries the instant it happened at and
//! every output is an [`Effect`] for the runtime to carry out. The warning and
//! logout timers are a single pair of deadlines that every reset overwrites,
//! so two logout timers can never be pending at once.
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info};

use crate::activity::ActivityState;
use crate::config::{Routes, SessionConfig};
use crate::validator::PollOutcome;

/// Watchdog states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Timers running, no warning shown
    Active,
    /// Warning shown, logout timer still running
    Warning,
    /// Terminal; the page is navigating away
    LoggedOut,
}

/// Why the page was sent away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The logout timer fired
    Expired,
    /// The user picked "logout now"
    UserRequested,
    /// The server rejected the session
    SessionInvalid,
    /// No activity for longer than the session timeout, seen on a poll tick
    Idle,
}

impl LogoutReason {
    pub fn as_str(self) -> &'static str {
        match self {
            LogoutReason::Expired => "expired",
            LogoutReason::UserRequested => "user_requested",
            LogoutReason::SessionInvalid => "session_invalid",
            LogoutReason::Idle => "idle",
        }
    }
}

/// Work the runtime must carry out after a transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Ask the renewal client for a renewal, subject to its throttle
    RequestRenewal,
    /// Present the warning overlay
    ShowWarning { remaining: Duration },
    /// Remove the warning overlay
    DismissWarning,
    /// Leave the page
    Navigate { target: String, reason: LogoutReason },
}

/// The current warning/logout timer pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerDeadlines {
    pub warning_at: Instant,
    pub logout_at: Instant,
}

impl TimerDeadlines {
    fn from(now: Instant, config: &SessionConfig) -> Self {
        Self {
            warning_at: now + config.warning_delay(),
            logout_at: now + config.session_timeout(),
        }
    }
}

/// Observable snapshot of the watchdog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchdogStatus {
    pub state: SessionState,
    pub warning_shown: bool,
    /// Pending warning deadline, `None` once shown or logged out
    pub warning_at: Option<Instant>,
    /// Pending logout deadline, `None` once logged out
    pub logout_at: Option<Instant>,
    pub last_activity_at: Instant,
}

/// Expiry state machine with a single reset entry point
#[derive(Debug)]
pub struct SessionMachine {
    config: SessionConfig,
    routes: Routes,
    state: SessionState,
    activity: ActivityState,
    warning_shown: bool,
    timers: TimerDeadlines,
}

impl SessionMachine {
    /// Machine for a page loaded at `now`; the first timer pair is scheduled from `now`
    pub fn new(config: SessionConfig, routes: Routes, now: Instant) -> Self {
        Self {
            timers: TimerDeadlines::from(now, &config),
            config,
            routes,
            state: SessionState::Active,
            activity: ActivityState::new(now),
            warning_shown: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn warning_shown(&self) -> bool {
        self.warning_shown
    }

    pub fn timers(&self) -> TimerDeadlines {
        self.timers
    }

    pub fn last_activity_at(&self) -> Instant {
        self.activity.last_activity_at()
    }

    /// Deadline of the warning timer while it is armed
    pub fn warning_deadline(&self) -> Option<Instant> {
        (self.state == SessionState::Active && !self.warning_shown).then_some(self.timers.warning_at)
    }

    /// Deadline of the logout timer while it is armed
    pub fn logout_deadline(&self) -> Option<Instant> {
        (self.state != SessionState::LoggedOut).then_some(self.timers.logout_at)
    }

    pub fn status(&self) -> WatchdogStatus {
        WatchdogStatus {
            state: self.state,
            warning_shown: self.warning_shown,
            warning_at: self.warning_deadline(),
            logout_at: self.logout_deadline(),
            last_activity_at: self.activity.last_activity_at(),
        }
    }

    /// Cancel both timers and schedule a fresh pair measured from `now`
    fn reset(&mut self, now: Instant) {
        self.timers = TimerDeadlines::from(now, &self.config);
    }

    /// A user interaction happened at `at`.
    ///
    /// The timestamp is always recorded. Timers are reset and a renewal is
    /// requested only while no warning is displayed, so residual input cannot
    /// silently dismiss the question the user is being asked.
    pub fn on_activity(&mut self, at: Instant) -> Option<Effect> {
        if self.state == SessionState::LoggedOut {
            return None;
        }
        self.activity.record(at);
        if self.warning_shown {
            return None;
        }
        self.reset(self.activity.last_activity_at());
        Some(Effect::RequestRenewal)
    }

    /// The warning deadline was reached.
    ///
    /// Re-checks state and deadline first: a stale firing is a no-op.
    pub fn on_warning_timer(&mut self, now: Instant) -> Option<Effect> {
        if self.state != SessionState::Active || self.warning_shown || now < self.timers.warning_at {
            return None;
        }
        self.state = SessionState::Warning;
        self.warning_shown = true;
        let remaining = self.timers.logout_at.saturating_duration_since(now);
        info!(remaining_secs = remaining.as_secs(), "session about to expire");
        Some(Effect::ShowWarning { remaining })
    }

    /// The logout deadline was reached
    pub fn on_logout_timer(&mut self, now: Instant) -> Option<Effect> {
        if self.state == SessionState::LoggedOut || now < self.timers.logout_at {
            return None;
        }
        Some(self.log_out(self.routes.logout_path.clone(), LogoutReason::Expired))
    }

    /// "Continue" was picked on the warning overlay
    pub fn on_continue(&mut self) -> Option<Effect> {
        if self.state != SessionState::Warning {
            debug!(state = ?self.state, "continue ignored outside of warning state");
            return None;
        }
        Some(Effect::RequestRenewal)
    }

    /// "Logout now" was picked on the warning overlay
    pub fn on_logout_requested(&mut self) -> Option<Effect> {
        if self.state == SessionState::LoggedOut {
            return None;
        }
        Some(self.log_out(self.routes.logout_path.clone(), LogoutReason::UserRequested))
    }

    /// The server extended the session
    pub fn on_renewal_succeeded(&mut self, now: Instant) -> Option<Effect> {
        if self.state == SessionState::LoggedOut {
            return None;
        }
        self.activity.record(now);
        self.reset(now);
        self.state = SessionState::Active;
        let was_shown = std::mem::replace(&mut self.warning_shown, false);
        was_shown.then_some(Effect::DismissWarning)
    }

    /// Client-side idle check, run on every poll tick before the server is asked
    pub fn on_poll_tick(&mut self, now: Instant) -> Option<Effect> {
        if self.state == SessionState::LoggedOut {
            return None;
        }
        let idle = self.activity.idle_for(now);
        if idle > self.config.session_timeout() {
            info!(idle_secs = idle.as_secs(), "idle beyond session timeout");
            return Some(self.log_out(self.routes.logout_path.clone(), LogoutReason::Idle));
        }
        None
    }

    /// The server answered a session check
    pub fn on_poll_result(&mut self, outcome: &PollOutcome) -> Option<Effect> {
        if self.state == SessionState::LoggedOut {
            return None;
        }
        match outcome {
            PollOutcome::Valid { .. } | PollOutcome::Unreachable(_) => None,
            PollOutcome::Invalid { redirect, .. } => {
                let target = redirect
                    .clone()
                    .filter(|target| !target.trim().is_empty())
                    .unwrap_or_else(|| self.routes.login_path.clone());
                Some(self.log_out(target, LogoutReason::SessionInvalid))
            }
        }
    }

    fn log_out(&mut self, target: String, reason: LogoutReason) -> Effect {
        self.state = SessionState::LoggedOut;
        Effect::Navigate { target, reason }
    }
}
