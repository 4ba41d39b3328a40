// ============================
// watchdog-lib/src/config.rs
// ============================
//! Configuration management.
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use helpdesk_common::{DEFAULT_LOGIN_PATH, LEGACY_LOGIN_PATH, LOGOUT_PATH};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Prefix of the environment variables read by [`Settings::load`]
pub const ENV_PREFIX: &str = "HELPDESK_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Application settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Origin of the helpdesk backend, e.g. `http://127.0.0.1:5000`
    pub base_url: String,
    /// Log level
    pub log_level: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Raw `Cookie` header carrying the session, sent with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_cookie: Option<String>,
    /// Pages the client navigates to
    pub routes: Routes,
    /// Watchdog timing
    pub session: SessionConfig,
}

/// Navigation targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Routes {
    /// Login page, also the fallback for 401 redirects
    pub login_path: String,
    /// Logout route used when the session expires or the user leaves
    pub logout_path: String,
}

/// Timing of the session watchdog. Immutable for the lifetime of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hard expiry, measured from the latest activity or renewal
    pub session_timeout_ms: u64,
    /// How long before expiry the warning appears
    pub warning_lead_ms: u64,
    /// Cadence of the server-side session check
    pub poll_interval_ms: u64,
    /// Minimum spacing between renewal attempts
    pub renew_throttle_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            log_level: "info".to_string(),
            request_timeout_secs: 15,
            session_cookie: None,
            routes: Routes::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self {
            login_path: DEFAULT_LOGIN_PATH.to_string(),
            logout_path: LOGOUT_PATH.to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_timeout_ms: 8 * 60 * 60 * 1000, // 8 hours
            warning_lead_ms: 30 * 60 * 1000,        // 30 minutes
            poll_interval_ms: 60 * 1000,
            renew_throttle_ms: 30 * 1000,
        }
    }
}

impl SessionConfig {
    /// Config with the given expiry and warning lead, other fields defaulted
    pub fn new(session_timeout: Duration, warning_lead: Duration) -> Self {
        Self {
            session_timeout_ms: duration_ms(session_timeout),
            warning_lead_ms: duration_ms(warning_lead),
            ..Self::default()
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = duration_ms(interval);
        self
    }

    pub fn with_renew_throttle(mut self, throttle: Duration) -> Self {
        self.renew_throttle_ms = duration_ms(throttle);
        self
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    pub fn warning_lead(&self) -> Duration {
        Duration::from_millis(self.warning_lead_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn renew_throttle(&self) -> Duration {
        Duration::from_millis(self.renew_throttle_ms)
    }

    /// Delay from a timer reset until the warning fires.
    ///
    /// A lead time at or beyond the timeout clamps to zero so the warning
    /// fires immediately instead of never.
    pub fn warning_delay(&self) -> Duration {
        self.session_timeout().saturating_sub(self.warning_lead())
    }

    /// Check the timing values for consistency
    pub fn validate(&self) -> Result<(), AppError> {
        if self.session_timeout_ms == 0 {
            return Err(AppError::Config("session_timeout_ms must be positive".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(AppError::Config("poll_interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}

impl Settings {
    /// Load settings from the default sources and validate them.
    ///
    /// Later sources win: built-in defaults, `watchdog.toml`, `watchdog.json`,
    /// then `HELPDESK_*` environment variables (nested keys split on `__`).
    pub fn load() -> anyhow::Result<Self> {
        let settings: Settings = Self::figment()
            .merge(Toml::file("watchdog.toml"))
            .merge(Json::file("watchdog.json"))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from an explicit TOML file, still honoring the environment
    pub fn load_from(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        let settings: Settings = Self::figment()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    fn figment() -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), AppError> {
        if !LOG_LEVELS.contains(&self.log_level.to_ascii_lowercase().as_str()) {
            return Err(AppError::Config(format!("unknown log level {:?}", self.log_level)));
        }
        if self.request_timeout_secs == 0 {
            return Err(AppError::Config("request_timeout_secs must be positive".to_string()));
        }
        for path in [&self.routes.login_path, &self.routes.logout_path] {
            if !path.starts_with('/') {
                return Err(AppError::Config(format!("route {path:?} must be absolute")));
            }
        }
        self.base_url()?;
        self.session.validate()
    }

    /// Parsed backend origin
    pub fn base_url(&self) -> Result<Url, AppError> {
        Url::parse(&self.base_url).map_err(|e| AppError::InvalidUrl(format!("{}: {e}", self.base_url)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Whether `path` is a page where the watchdog must not run
    pub fn is_public_path(&self, path: &str) -> bool {
        path == self.routes.login_path || path == LEGACY_LOGIN_PATH
    }
}

fn duration_ms(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
