// ============================
// watchdog-lib/src/backend.rs
// ============================
//! Session endpoints of the helpdesk backend.
use std::sync::Arc;

use async_trait::async_trait;
use helpdesk_common::{
    AuthFailureBody, CheckSessionResponse, RenewSessionResponse, RoleResponse, SessionUser,
    CHECK_ROLE_PATH, CHECK_SESSION_PATH, RENEW_SESSION_PATH,
};
use tracing::{debug, instrument};

use crate::error::AppError;
use crate::http::AuthenticatedClient;

/// Server verdict on the current session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCheck {
    Valid { user: Option<SessionUser> },
    Invalid { reason: String, redirect: Option<String> },
}

/// The calls the watchdog makes against the backend
#[async_trait]
pub trait SessionBackend: Send + Sync {
    /// Ask the server to extend the session; `Ok(false)` when it declines
    async fn renew_session(&self) -> Result<bool, AppError>;

    /// Ask the server whether the session is still valid.
    ///
    /// `Err` only when no verdict could be obtained at all.
    async fn check_session(&self) -> Result<SessionCheck, AppError>;
}

/// [`SessionBackend`] over the page's [`AuthenticatedClient`]
pub struct HttpSessionBackend {
    client: Arc<AuthenticatedClient>,
}

impl HttpSessionBackend {
    pub fn new(client: Arc<AuthenticatedClient>) -> Self {
        Self { client }
    }

    /// Signed-in user as reported by `/auth/check-role`
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> Result<RoleResponse, AppError> {
        let response = self.client.get(CHECK_ROLE_PATH).await?.error_for_status()?;
        response.json()
    }
}

#[async_trait]
impl SessionBackend for HttpSessionBackend {
    #[instrument(skip(self))]
    async fn renew_session(&self) -> Result<bool, AppError> {
        let response = self.client.post(RENEW_SESSION_PATH).await?;
        if !response.is_success() {
            debug!(status = %response.status(), "renewal refused");
            return Ok(false);
        }
        // A body we cannot read is never a success
        Ok(response
            .json::<RenewSessionResponse>()
            .map(|body| body.success)
            .unwrap_or(false))
    }

    #[instrument(skip(self))]
    async fn check_session(&self) -> Result<SessionCheck, AppError> {
        let response = self.client.get(CHECK_SESSION_PATH).await?;
        if !response.is_success() {
            let redirect = response
                .json::<AuthFailureBody>()
                .ok()
                .and_then(|body| body.redirect);
            return Ok(SessionCheck::Invalid {
                reason: format!("session check returned {}", response.status()),
                redirect,
            });
        }

        match response.json::<CheckSessionResponse>() {
            Ok(body) if body.valid => Ok(SessionCheck::Valid { user: body.user }),
            Ok(body) => Ok(SessionCheck::Invalid {
                reason: body.error.unwrap_or_else(|| "session is no longer valid".to_string()),
                redirect: body.redirect,
            }),
            Err(e) => Ok(SessionCheck::Invalid {
                reason: format!("malformed session check response: {e}"),
                redirect: None,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Url;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn backend(server: &MockServer) -> HttpSessionBackend {
        let client = AuthenticatedClient::builder(Url::parse(&server.uri()).unwrap())
            .build()
            .unwrap();
        HttpSessionBackend::new(Arc::new(client))
    }

    async fn mount(server: &MockServer, verb: &str, route: &str, template: ResponseTemplate) {
        Mock::given(method(verb))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_renew_session_success() {
        let server = MockServer::start().await;
        mount(&server, "POST", RENEW_SESSION_PATH, ResponseTemplate::new(200).set_body_json(json!({"success": true}))).await;

        assert!(backend(&server).await.renew_session().await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_session_refused() {
        let server = MockServer::start().await;
        mount(&server, "POST", RENEW_SESSION_PATH, ResponseTemplate::new(401).set_body_json(json!({"success": false}))).await;

        assert!(!backend(&server).await.renew_session().await.unwrap());
    }

    #[tokio::test]
    async fn test_renew_session_malformed_is_failure() {
        let server = MockServer::start().await;
        mount(&server, "POST", RENEW_SESSION_PATH, ResponseTemplate::new(200).set_body_string("ok")).await;

        assert!(!backend(&server).await.renew_session().await.unwrap());
    }

    #[tokio::test]
    async fn test_check_session_valid() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            CHECK_SESSION_PATH,
            ResponseTemplate::new(200).set_body_json(json!({
                "valid": true,
                "user": {"id": 1, "username": "tecnico", "role": "user"}
            })),
        )
        .await;

        match backend(&server).await.check_session().await.unwrap() {
            SessionCheck::Valid { user: Some(user) } => assert_eq!(user.username, "tecnico"),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_session_invalid_variants() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            CHECK_SESSION_PATH,
            ResponseTemplate::new(200).set_body_json(json!({"valid": false, "error": "revoked"})),
        )
        .await;

        assert_eq!(
            backend(&server).await.check_session().await.unwrap(),
            SessionCheck::Invalid {
                reason: "revoked".to_string(),
                redirect: None,
            }
        );
    }

    #[tokio::test]
    async fn test_check_session_non_ok_status() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            CHECK_SESSION_PATH,
            ResponseTemplate::new(500).set_body_json(json!({"valid": false, "redirect": "/p/login"})),
        )
        .await;

        match backend(&server).await.check_session().await.unwrap() {
            SessionCheck::Invalid { redirect, .. } => assert_eq!(redirect.as_deref(), Some("/p/login")),
            other => panic!("unexpected verdict {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_check_session_malformed_body() {
        let server = MockServer::start().await;
        mount(&server, "GET", CHECK_SESSION_PATH, ResponseTemplate::new(200).set_body_string("<html/>")).await;

        assert!(matches!(
            backend(&server).await.check_session().await.unwrap(),
            SessionCheck::Invalid { .. }
        ));
    }

    #[tokio::test]
    async fn test_current_user() {
        let server = MockServer::start().await;
        mount(
            &server,
            "GET",
            CHECK_ROLE_PATH,
            ResponseTemplate::new(200).set_body_json(json!({"role": "admin", "username": "ana"})),
        )
        .await;

        let role = backend(&server).await.current_user().await.unwrap();
        assert_eq!(role.username.as_deref(), Some("ana"));
        assert_eq!(role.role.as_deref(), Some("admin"));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        // Grab a free port and release it so nothing is listening there
        let port = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let client = AuthenticatedClient::builder(Url::parse(&format!("http://127.0.0.1:{port}")).unwrap())
            .build()
            .unwrap();
        let backend = HttpSessionBackend::new(Arc::new(client));

        assert!(backend.check_session().await.is_err());
        assert!(backend.renew_session().await.is_err());
    }
}
