// ============================
// watchdog-lib/src/http.rs
// ============================
//! HTTP client wrapper with a response-interceptor pipeline.
//!
//! Every request the page makes goes through [`AuthenticatedClient`]. Each
//! response is buffered and shown to every installed [`ResponseInterceptor`]
//! before it is handed back, unmodified, to the caller.
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use helpdesk_common::AuthFailureBody;
use metrics::counter;
use parking_lot::RwLock;
use reqwest::cookie::Jar;
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::AppError;
use crate::metrics::{AUTH_REDIRECT, HTTP_REQUESTS};
use crate::page::Page;

/// A fully buffered response
#[derive(Clone)]
pub struct HttpResponse {
    status: StatusCode,
    url: Url,
    body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, url: Url, body: Vec<u8>) -> Self {
        Self { status, url, body }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, replacing invalid UTF-8
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserialize the body as JSON
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, AppError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Fail with [`AppError::Status`] unless the status is 2xx
    pub fn error_for_status(self) -> Result<Self, AppError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(AppError::Status {
                status: self.status,
                url: self.url.to_string(),
            })
        }
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("url", &self.url.as_str())
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Observer of every response
pub trait ResponseInterceptor: Send + Sync {
    /// Unique name; a second interceptor with the same name is not installed
    fn name(&self) -> &'static str;

    /// Inspect a response before the caller sees it
    fn on_response(&self, response: &HttpResponse);
}

/// Sends the page to the login screen on any 401
pub struct AuthRedirectInterceptor {
    page: Arc<Page>,
    default_redirect: String,
}

impl AuthRedirectInterceptor {
    pub const NAME: &'static str = "auth-redirect";

    pub fn new(page: Arc<Page>, default_redirect: impl Into<String>) -> Self {
        Self {
            page,
            default_redirect: default_redirect.into(),
        }
    }

    /// Where a 401 response should send the page
    pub fn redirect_target(&self, response: &HttpResponse) -> String {
        match response.json::<AuthFailureBody>() {
            Ok(body) => body.redirect_or(&self.default_redirect).to_string(),
            Err(e) => {
                debug!(error = %e, "unreadable 401 body, using default redirect");
                self.default_redirect.clone()
            }
        }
    }
}

impl ResponseInterceptor for AuthRedirectInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn on_response(&self, response: &HttpResponse) {
        if response.status() != StatusCode::UNAUTHORIZED {
            return;
        }
        let target = self.redirect_target(response);
        warn!(url = %response.url(), %target, "request was not authenticated, leaving page");
        counter!(AUTH_REDIRECT).increment(1);
        self.page.navigate(&target);
    }
}

/// `reqwest` client shared by every component of the page
pub struct AuthenticatedClient {
    client: reqwest::Client,
    base_url: Url,
    interceptors: RwLock<Vec<Arc<dyn ResponseInterceptor>>>,
}

impl AuthenticatedClient {
    /// Start building a client for the backend at `base_url`
    pub fn builder(base_url: Url) -> AuthenticatedClientBuilder {
        AuthenticatedClientBuilder {
            base_url,
            timeout: Duration::from_secs(15),
            session_cookie: None,
        }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Add an interceptor to the pipeline.
    ///
    /// Idempotent by name: returns `false` and changes nothing when an
    /// interceptor with the same name is already installed.
    pub fn install(&self, interceptor: Arc<dyn ResponseInterceptor>) -> bool {
        let mut interceptors = self.interceptors.write();
        if interceptors.iter().any(|i| i.name() == interceptor.name()) {
            debug!(name = interceptor.name(), "interceptor already installed");
            return false;
        }
        debug!(name = interceptor.name(), "interceptor installed");
        interceptors.push(interceptor);
        true
    }

    pub fn interceptor_names(&self) -> Vec<&'static str> {
        self.interceptors.read().iter().map(|i| i.name()).collect()
    }

    /// Resolve a path against the backend origin
    pub fn url(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path)
            .map_err(|e| AppError::InvalidUrl(format!("{path}: {e}")))
    }

    /// Send a request and run the response through the pipeline.
    ///
    /// Any HTTP status is `Ok`; only transport failures are errors.
    #[instrument(skip(self))]
    pub async fn request(&self, method: Method, path: &str) -> Result<HttpResponse, AppError> {
        let url = self.url(path)?;
        let response = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json")
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;
        let status = response.status();
        let url = response.url().clone();
        // The status alone decides redirects, so a failed body read still reaches the interceptors
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                warn!(%status, error = %e, "could not read response body");
                Vec::new()
            }
        };
        counter!(HTTP_REQUESTS, "status" => status.as_u16().to_string()).increment(1);
        debug!(%status, body_len = body.len(), "received response");

        let response = HttpResponse::new(status, url, body);
        // Clone the list so an interceptor may install others without deadlocking
        let interceptors = self.interceptors.read().clone();
        for interceptor in interceptors {
            interceptor.on_response(&response);
        }
        Ok(response)
    }

    pub async fn get(&self, path: &str) -> Result<HttpResponse, AppError> {
        self.request(Method::GET, path).await
    }

    /// POST without a body
    pub async fn post(&self, path: &str) -> Result<HttpResponse, AppError> {
        self.request(Method::POST, path).await
    }
}

/// Builder for [`AuthenticatedClient`]
pub struct AuthenticatedClientBuilder {
    base_url: Url,
    timeout: Duration,
    session_cookie: Option<String>,
}

impl AuthenticatedClientBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Seed the cookie jar from a raw `Cookie` header value (`a=1; b=2`)
    pub fn session_cookie(mut self, cookie: Option<String>) -> Self {
        self.session_cookie = cookie;
        self
    }

    pub fn build(self) -> Result<AuthenticatedClient, AppError> {
        let jar = Jar::default();
        if let Some(cookie) = &self.session_cookie {
            for pair in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
                jar.add_cookie_str(pair, &self.base_url);
            }
        }
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .cookie_provider(Arc::new(jar))
            .build()?;

        Ok(AuthenticatedClient {
            client,
            base_url: self.base_url,
            interceptors: RwLock::new(Vec::new()),
        })
    }
}
