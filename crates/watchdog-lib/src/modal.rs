// ============================
// watchdog-lib/src/modal.rs
// ============================
//! Session expiry warning overlay.
use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::metrics::WARNING_SHOWN;
use crate::watchdog::WatchdogMsg;

/// Content of the warning overlay
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WarningModal {
    /// Identifies the rendered element
    pub id: Uuid,
    pub title: String,
    pub message: String,
    /// Time left before the hard logout when the overlay appeared
    pub remaining: Duration,
}

impl WarningModal {
    pub const CONTINUE_LABEL: &'static str = "Continue session";
    pub const LOGOUT_LABEL: &'static str = "Log out now";

    fn new(remaining: Duration) -> Self {
        let minutes = remaining.as_secs().div_ceil(60);
        Self {
            id: Uuid::new_v4(),
            title: "Your session is about to expire".to_string(),
            message: format!(
                "You will be logged out in {minutes} minute{} due to inactivity.",
                if minutes == 1 { "" } else { "s" }
            ),
            remaining,
        }
    }
}

/// The overlay's two buttons, wired to the watchdog that showed it.
///
/// Clicks after the watchdog has stopped are dropped.
#[derive(Clone)]
pub struct ModalActions {
    tx: mpsc::UnboundedSender<WatchdogMsg>,
}

impl ModalActions {
    pub(crate) fn new(tx: mpsc::UnboundedSender<WatchdogMsg>) -> Self {
        Self { tx }
    }

    /// Renew the session; the overlay goes away once the server agrees
    pub fn continue_session(&self) {
        let _ = self.tx.send(WatchdogMsg::Continue);
    }

    /// Leave through the logout route right away
    pub fn logout_now(&self) {
        let _ = self.tx.send(WatchdogMsg::LogoutNow);
    }
}

/// Surface the overlay is drawn on
pub trait ModalView: Send + Sync {
    /// Draw a blocking overlay whose buttons call `actions`
    fn render(&self, modal: &WarningModal, actions: ModalActions);

    /// Remove the overlay drawn for `id`
    fn remove(&self, id: Uuid);
}

/// Keeps at most one overlay on the view
pub struct ModalPresenter {
    view: Arc<dyn ModalView>,
    actions: ModalActions,
    current: Option<WarningModal>,
}

impl ModalPresenter {
    pub fn new(view: Arc<dyn ModalView>, actions: ModalActions) -> Self {
        Self {
            view,
            actions,
            current: None,
        }
    }

    /// Show the overlay; a no-op returning `false` while one is visible
    pub fn show(&mut self, remaining: Duration) -> bool {
        if self.current.is_some() {
            debug!("warning overlay already visible");
            return false;
        }
        let modal = WarningModal::new(remaining);
        self.view.render(&modal, self.actions.clone());
        counter!(WARNING_SHOWN).increment(1);
        self.current = Some(modal);
        true
    }

    /// Remove the overlay; returns whether one was visible
    pub fn dismiss(&mut self) -> bool {
        match self.current.take() {
            Some(modal) => {
                self.view.remove(modal.id);
                true
            }
            None => false,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.current.is_some()
    }

    pub fn current(&self) -> Option<&WarningModal> {
        self.current.as_ref()
    }
}
