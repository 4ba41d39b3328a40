// ============================
// watchdog-lib/src/page.rs
// ============================
//! The page's location and lifetime.
//!
//! Navigating away is terminal: the first navigation wins, is forwarded to
//! the host [`Navigator`], and tears the page down for every component
//! watching it. Later requests are ignored.
use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info};

/// Host hook that actually changes location
pub trait Navigator: Send + Sync {
    fn navigate(&self, target: &str);
}

/// Location latch shared by all components of one page
pub struct Page {
    navigator: Arc<dyn Navigator>,
    location: watch::Sender<Option<String>>,
}

impl Page {
    pub fn new(navigator: Arc<dyn Navigator>) -> Self {
        let (location, _) = watch::channel(None);
        Self { navigator, location }
    }

    /// Leave the page for `target`. Returns `false` if the page was already left.
    pub fn navigate(&self, target: &str) -> bool {
        let first = self.location.send_if_modified(|location| {
            if location.is_some() {
                return false;
            }
            *location = Some(target.to_string());
            true
        });

        if first {
            info!(%target, "navigating away from page");
            self.navigator.navigate(target);
        } else {
            debug!(%target, "page already navigating, request ignored");
        }
        first
    }

    /// Target of the navigation, once it happened
    pub fn location(&self) -> Option<String> {
        self.location.borrow().clone()
    }

    pub fn is_torn_down(&self) -> bool {
        self.location.borrow().is_some()
    }

    /// Resolves once the page has navigated away
    pub async fn torn_down(&self) {
        let mut rx = self.location.subscribe();
        // The sender lives as long as `self`, so this only ends on navigation
        let _ = rx.wait_for(Option::is_some).await;
    }
}
