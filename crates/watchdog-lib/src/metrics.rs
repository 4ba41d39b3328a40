// ==============
// crates/watchdog-lib/src/metrics.rs

//! Central place for metric keys
pub const HTTP_REQUESTS: &str = "http.requests";
pub const AUTH_REDIRECT: &str = "http.auth_redirect";
pub const RENEWAL_ATTEMPTED: &str = "session.renewal.attempted";
pub const RENEWAL_SUCCEEDED: &str = "session.renewal.succeeded";
pub const RENEWAL_FAILED: &str = "session.renewal.failed";
pub const RENEWAL_THROTTLED: &str = "session.renewal.throttled";
pub const POLL_TOTAL: &str = "session.poll";
pub const POLL_INVALID: &str = "session.poll.invalid";
pub const POLL_UNREACHABLE: &str = "session.poll.unreachable";
pub const WARNING_SHOWN: &str = "session.warning.shown";
pub const LOGOUT: &str = "session.logout";
