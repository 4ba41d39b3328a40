// ================
// common/src/lib.rs
// ================
//! Common types and structures
//! used for communication between the helpdesk web client and its backend.
//! This module defines the JSON bodies of the session endpoints and the
//! canonical routes the client navigates to.

use serde::{Deserialize, Serialize};

/// Endpoint that extends the server-side session
pub const RENEW_SESSION_PATH: &str = "/auth/renew-session";
/// Endpoint that reports whether the current session is still valid
pub const CHECK_SESSION_PATH: &str = "/auth/check-session";
/// Endpoint that reports the signed-in user's role
pub const CHECK_ROLE_PATH: &str = "/auth/check-role";
/// Terminal logout route; the server clears the session and redirects
pub const LOGOUT_PATH: &str = "/auth/logout";
/// Login page used when a 401 body does not name a redirect
pub const DEFAULT_LOGIN_PATH: &str = "/p/login";
/// Legacy login route, also treated as a public page
pub const LEGACY_LOGIN_PATH: &str = "/login";

/// Response of `POST /auth/renew-session`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RenewSessionResponse {
    /// Whether the server extended the session
    pub success: bool,
}

/// User attached to a valid session
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionUser {
    /// Database id of the user
    pub id: i64,
    /// Login name
    pub username: String,
    /// Role name (e.g. "admin")
    pub role: String,
}

/// Response of `GET /auth/check-session`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CheckSessionResponse {
    /// Whether the session is still valid
    pub valid: bool,
    /// Reason the session was rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Where the client should go when the session is rejected
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
    /// Signed-in user, present on valid sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<SessionUser>,
}

/// Response of `GET /auth/check-role`
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RoleResponse {
    /// Role of the signed-in user, `None` without a session
    pub role: Option<String>,
    /// Name of the signed-in user, `None` without a session
    pub username: Option<String>,
}

/// JSON body that may accompany any 401 response
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthFailureBody {
    /// Usually `false`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    /// Human readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Page the client should navigate to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect: Option<String>,
}

impl AuthFailureBody {
    /// Navigation target for this failure, falling back to `default`
    pub fn redirect_or<'a>(&'a self, default: &'a str) -> &'a str {
        match self.redirect.as_deref() {
            Some(target) if !target.trim().is_empty() => target,
            _ => default,
        }
    }
}
