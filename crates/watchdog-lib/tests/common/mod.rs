//! Test utilities for watchdog tests
//!
//! Host-side fakes: a navigator that records where the page went, a document
//! that holds overlay elements, and a scripted session backend.
#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use uuid::Uuid;
use watchdog_lib::backend::{SessionBackend, SessionCheck};
use watchdog_lib::config::{Routes, SessionConfig};
use watchdog_lib::error::AppError;
use watchdog_lib::modal::{ModalActions, ModalView, WarningModal};
use watchdog_lib::page::{Navigator, Page};
use watchdog_lib::watchdog::{SessionWatchdog, WatchdogHandle};

pub const MIN: Duration = Duration::from_secs(60);

/// Records every navigation the page forwards
#[derive(Default)]
pub struct RecordingNavigator {
    visited: Mutex<Vec<String>>,
}

impl RecordingNavigator {
    pub fn visited(&self) -> Vec<String> {
        self.visited.lock().clone()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, target: &str) {
        self.visited.lock().push(target.to_string());
    }
}

/// Overlay elements currently in the document, with their buttons
#[derive(Default)]
pub struct InMemoryDocument {
    elements: Mutex<Vec<WarningModal>>,
    buttons: Mutex<Option<ModalActions>>,
    rendered: AtomicUsize,
}

impl InMemoryDocument {
    pub fn overlay_count(&self) -> usize {
        self.elements.lock().len()
    }

    pub fn is_visible(&self) -> bool {
        self.overlay_count() > 0
    }

    /// Total overlays ever drawn
    pub fn rendered(&self) -> usize {
        self.rendered.load(Ordering::SeqCst)
    }

    pub fn current(&self) -> Option<WarningModal> {
        self.elements.lock().last().cloned()
    }

    /// Click "continue" on the visible overlay; `false` when there is none
    pub fn click_continue(&self) -> bool {
        match self.buttons.lock().as_ref() {
            Some(buttons) => {
                buttons.continue_session();
                true
            }
            None => false,
        }
    }

    /// Click "log out now" on the visible overlay; `false` when there is none
    pub fn click_logout(&self) -> bool {
        match self.buttons.lock().as_ref() {
            Some(buttons) => {
                buttons.logout_now();
                true
            }
            None => false,
        }
    }
}

impl ModalView for InMemoryDocument {
    fn render(&self, modal: &WarningModal, actions: ModalActions) {
        self.rendered.fetch_add(1, Ordering::SeqCst);
        self.elements.lock().push(modal.clone());
        *self.buttons.lock() = Some(actions);
    }

    fn remove(&self, id: Uuid) {
        let mut elements = self.elements.lock();
        elements.retain(|m| m.id != id);
        if elements.is_empty() {
            *self.buttons.lock() = None;
        }
    }
}

/// Session backend with scripted answers
pub struct FakeBackend {
    renewals: AtomicUsize,
    checks: AtomicUsize,
    renew_answer: Mutex<Result<bool, String>>,
    renew_delay: Mutex<Duration>,
    check_answer: Mutex<Result<SessionCheck, String>>,
}

impl Default for FakeBackend {
    fn default() -> Self {
        Self {
            renewals: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
            renew_answer: Mutex::new(Ok(true)),
            renew_delay: Mutex::new(Duration::ZERO),
            check_answer: Mutex::new(Ok(SessionCheck::Valid { user: None })),
        }
    }
}

impl FakeBackend {
    pub fn renewals(&self) -> usize {
        self.renewals.load(Ordering::SeqCst)
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }

    pub fn answer_renewals_with(&self, answer: Result<bool, String>) {
        *self.renew_answer.lock() = answer;
    }

    /// Make every renewal take `delay` before answering
    pub fn delay_renewals_by(&self, delay: Duration) {
        *self.renew_delay.lock() = delay;
    }

    pub fn answer_checks_with(&self, answer: Result<SessionCheck, String>) {
        *self.check_answer.lock() = answer;
    }
}

#[async_trait]
impl SessionBackend for FakeBackend {
    async fn renew_session(&self) -> Result<bool, AppError> {
        self.renewals.fetch_add(1, Ordering::SeqCst);
        let delay = *self.renew_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.renew_answer.lock().clone().map_err(AppError::Internal)
    }

    async fn check_session(&self) -> Result<SessionCheck, AppError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        self.check_answer.lock().clone().map_err(AppError::Internal)
    }
}

/// A started watchdog and the fakes around it
pub struct Harness {
    pub handle: WatchdogHandle,
    pub page: Arc<Page>,
    pub navigator: Arc<RecordingNavigator>,
    pub document: Arc<InMemoryDocument>,
    pub backend: Arc<FakeBackend>,
}

impl Harness {
    pub fn start(config: SessionConfig) -> Self {
        Self::start_with(config, Arc::new(FakeBackend::default()))
    }

    pub fn start_with(config: SessionConfig, backend: Arc<FakeBackend>) -> Self {
        let navigator = Arc::new(RecordingNavigator::default());
        let page = Arc::new(Page::new(navigator.clone()));
        let document = Arc::new(InMemoryDocument::default());
        let handle = SessionWatchdog::new(
            config,
            Routes::default(),
            page.clone(),
            backend.clone(),
            document.clone(),
        )
        .start();

        Self {
            handle,
            page,
            navigator,
            document,
            backend,
        }
    }
}

/// Let every ready task run without moving the paused clock meaningfully
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// The 8h / 30min configuration, polling every minute, renewing at most every 30s
pub fn workday_config() -> SessionConfig {
    SessionConfig::new(480 * MIN, 30 * MIN)
        .with_poll_interval(MIN)
        .with_renew_throttle(Duration::from_secs(30))
}
