//! services/client/src/auth.rs
//!
//! Credential lifecycle: password login, magic-link login, silent refresh and
//! logout.

use std::sync::Arc;
use taskflow_core::domain::{AccessToken, AuthError, EstablishedSession, User, ValidationError};
use taskflow_core::ports::{Body, HttpRequest};
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::config::AuthEndpoints;
use crate::error::{ClientError, ClientResult};
use crate::remote::{decode, expect_success, json_body, RemoteClient, RequestOptions};
use crate::session::{Session, SessionState};
use crate::wire::{Envelope, MagicLinkRequest, TokenData};

pub struct Authenticator {
    remote: Arc<RemoteClient>,
    endpoints: AuthEndpoints,
}

impl Authenticator {
    pub fn new(remote: Arc<RemoteClient>, endpoints: AuthEndpoints) -> Self {
        Self { remote, endpoints }
    }

    pub fn session(&self) -> &Arc<Session> {
        self.remote.session()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.session().subscribe()
    }

    /// Logs in with email and password. The server answers with the access
    /// token directly.
    pub async fn login_with_password(&self, email: &str, password: &str) -> ClientResult<User> {
        let email = required("email", email)?;
        if password.is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }

        let session = self.session();
        session.begin_attempt();

        let request = HttpRequest::post(self.endpoints.login.as_str()).with_body(Body::Form(vec![
            ("email".to_string(), email.clone()),
            ("password".to_string(), password.to_string()),
        ]));
        let result = async {
            let response = self
                .remote
                .send_with(request, RequestOptions::without_refresh())
                .await?;
            let response = expect_success(response)?;
            let envelope: Envelope<TokenData> = decode(&response.body)?;
            Ok::<_, ClientError>(envelope.into_data()?.access_token)
        }
        .await;

        match result {
            Ok(token) => {
                let user = User {
                    id: None,
                    email: Some(email),
                    is_logged_in: true,
                };
                session.establish(AccessToken::new(token), user.clone());
                info!("Logged in with password");
                Ok(user)
            }
            Err(e) => {
                error!(error = %e, "Password login failed");
                session.fail(auth_error(&e));
                Err(e)
            }
        }
    }

    /// Asks the server to email a sign-in link. The session only starts once
    /// [`Authenticator::complete_magic_link`] is called from the link's callback.
    pub async fn request_magic_link(&self, email: &str) -> ClientResult<()> {
        let email = required("email", email)?;

        let session = self.session();
        session.begin_attempt();

        let result = async {
            let body = json_body(&MagicLinkRequest { email: &email })?;
            let request = HttpRequest::post(self.endpoints.magic_link.as_str()).with_body(body);
            let response = self
                .remote
                .send_with(request, RequestOptions::without_refresh())
                .await?;
            expect_success(response).map(|_| ())
        }
        .await;

        match result {
            Ok(()) => {
                info!("Magic link requested");
                session.await_confirmation(email);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Magic link request failed");
                session.fail(auth_error(&e));
                Err(e)
            }
        }
    }

    /// Completes a magic-link sign-in. Called by whatever observes the
    /// out-of-band confirmation, not by the original request.
    pub fn complete_magic_link(&self, established: EstablishedSession) -> User {
        let user = User {
            is_logged_in: true,
            ..established.user
        };
        self.session().establish(established.access_token, user.clone());
        info!("Magic link session established");
        user
    }

    /// Obtains a new access token without user interaction. A failure ends
    /// the session.
    pub async fn refresh(&self) -> ClientResult<AccessToken> {
        self.remote.refresh().await
    }

    /// Returns whether a session is available, silently refreshing when no
    /// user is known yet.
    pub async fn restore(&self) -> bool {
        if self.session().state().is_authenticated() {
            return true;
        }
        match self.refresh().await {
            Ok(_) => true,
            Err(e) => {
                info!(error = %e, "No session to restore");
                false
            }
        }
    }

    /// Logs out. The local token and identity are cleared whatever the server
    /// answers; a server-side failure is still returned for reporting.
    pub async fn logout(&self) -> ClientResult<()> {
        let request = HttpRequest::post(self.endpoints.logout.as_str());
        let result = self
            .remote
            .send_with(request, RequestOptions::without_refresh())
            .await
            .and_then(expect_success);

        self.session().clear();

        match result {
            Ok(_) => {
                info!("Logged out");
                Ok(())
            }
            Err(e) => {
                warn!(error = %e, "Server-side logout failed; local session cleared");
                Err(e)
            }
        }
    }
}

fn required(field: &'static str, value: &str) -> Result<String, ValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        Err(ValidationError::MissingField(field))
    } else {
        Ok(trimmed.to_string())
    }
}

/// Maps a failure to the structured error kept in session state. Anything
/// without an HTTP status is reported as 500.
fn auth_error(err: &ClientError) -> AuthError {
    AuthError {
        message: err.to_string(),
        code: err.status().unwrap_or(500),
    }
}
