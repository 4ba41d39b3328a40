// ============================
// watchdog-lib/src/lib.rs
// ============================
//! Client-side session watchdog for the helpdesk web application.
//!
//! Tracks user activity, renews the server session, warns before it expires,
//! logs out when it does, and sends the page to the login screen whenever the
//! backend stops recognizing the session.

pub mod activity;
pub mod backend;
pub mod config;
pub mod error;
pub mod http;
pub mod machine;
pub mod metrics;
pub mod modal;
pub mod page;
pub mod renewal;
pub mod validator;
pub mod watchdog;

use std::sync::Arc;

use crate::backend::HttpSessionBackend;
use crate::config::Settings;
use crate::error::AppError;
use crate::http::{AuthRedirectInterceptor, AuthenticatedClient};
use crate::modal::ModalView;
use crate::page::{Navigator, Page};
use crate::watchdog::{SessionWatchdog, WatchdogHandle};

pub use crate::activity::{ActivityKind, ActivityTracker};
pub use crate::machine::{LogoutReason, SessionState, WatchdogStatus};

/// Everything one authenticated page shares
#[derive(Clone)]
pub struct SessionContext {
    /// Settings the page was bootstrapped with
    pub settings: Arc<Settings>,
    /// Location latch
    pub page: Arc<Page>,
    /// HTTP client every request must go through
    pub client: Arc<AuthenticatedClient>,
    /// Session endpoints
    pub backend: Arc<HttpSessionBackend>,
}

impl SessionContext {
    /// Build the client and install the auth redirect interceptor
    pub fn new(settings: Settings, navigator: Arc<dyn Navigator>) -> Result<Self, AppError> {
        settings.validate()?;
        let page = Arc::new(Page::new(navigator));
        let client = Arc::new(
            AuthenticatedClient::builder(settings.base_url()?)
                .timeout(settings.request_timeout())
                .session_cookie(settings.session_cookie.clone())
                .build()?,
        );
        client.install(Arc::new(AuthRedirectInterceptor::new(
            page.clone(),
            settings.routes.login_path.clone(),
        )));
        let backend = Arc::new(HttpSessionBackend::new(client.clone()));

        Ok(Self {
            settings: Arc::new(settings),
            page,
            client,
            backend,
        })
    }

    /// Like [`SessionContext::new`], but `None` on public pages such as the login screen
    pub fn for_page(
        settings: Settings,
        navigator: Arc<dyn Navigator>,
        current_path: &str,
    ) -> Result<Option<Self>, AppError> {
        if settings.is_public_path(current_path) {
            tracing::debug!(%current_path, "public page, session watchdog not installed");
            return Ok(None);
        }
        Self::new(settings, navigator).map(Some)
    }

    /// Start the watchdog for this page
    pub fn start_watchdog(&self, modal_view: Arc<dyn ModalView>) -> WatchdogHandle {
        SessionWatchdog::new(
            self.settings.session,
            self.settings.routes.clone(),
            self.page.clone(),
            self.backend.clone(),
            modal_view,
        )
        .start()
    }
}
