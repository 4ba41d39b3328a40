// ============================
// watchdog-lib/src/activity.rs
// ============================
//! User activity detection.
//!
//! The host (a browser binding, a terminal, a test) reports interaction
//! events through an [`ActivityTracker`]. The tracker only forwards them on
//! the watchdog's channel; the watchdog owns the resulting [`ActivityState`].
use std::fmt;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::watchdog::WatchdogMsg;

/// Interaction kinds that count as user activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    PointerDown,
    PointerMove,
    KeyPress,
    Scroll,
    TouchStart,
    Click,
}

impl ActivityKind {
    /// Every tracked kind
    pub const ALL: [ActivityKind; 6] = [
        ActivityKind::PointerDown,
        ActivityKind::PointerMove,
        ActivityKind::KeyPress,
        ActivityKind::Scroll,
        ActivityKind::TouchStart,
        ActivityKind::Click,
    ];

    /// DOM event type this kind is observed as
    pub fn dom_event_name(self) -> &'static str {
        match self {
            ActivityKind::PointerDown => "mousedown",
            ActivityKind::PointerMove => "mousemove",
            ActivityKind::KeyPress => "keypress",
            ActivityKind::Scroll => "scroll",
            ActivityKind::TouchStart => "touchstart",
            ActivityKind::Click => "click",
        }
    }

    /// Map a DOM event type to a kind; untracked events yield `None`
    pub fn from_dom_event(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.dom_event_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dom_event_name())
    }
}

/// Timestamp of the latest user interaction
#[derive(Debug, Clone, Copy)]
pub struct ActivityState {
    last_activity_at: Instant,
}

impl ActivityState {
    /// State created at page load
    pub fn new(now: Instant) -> Self {
        Self { last_activity_at: now }
    }

    pub fn record(&mut self, at: Instant) {
        // Events can be delivered slightly out of order; never move backwards.
        if at > self.last_activity_at {
            self.last_activity_at = at;
        }
    }

    pub fn last_activity_at(&self) -> Instant {
        self.last_activity_at
    }

    /// Time elapsed since the latest interaction
    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_activity_at)
    }
}

/// Cheap, cloneable emitter of activity events.
///
/// Recording never blocks and never fails: once the watchdog has stopped the
/// events are dropped.
#[derive(Clone)]
pub struct ActivityTracker {
    tx: mpsc::UnboundedSender<WatchdogMsg>,
}

impl ActivityTracker {
    pub(crate) fn new(tx: mpsc::UnboundedSender<WatchdogMsg>) -> Self {
        Self { tx }
    }

    /// Record an interaction happening now
    pub fn record(&self, kind: ActivityKind) {
        let _ = self.tx.send(WatchdogMsg::Activity {
            kind,
            at: Instant::now(),
        });
    }

    /// Record a raw DOM event; returns whether the event type is tracked
    pub fn record_dom_event(&self, name: &str) -> bool {
        match ActivityKind::from_dom_event(name) {
            Some(kind) => {
                self.record(kind);
                true
            }
            None => false,
        }
    }
}
