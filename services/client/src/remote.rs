//! services/client/src/remote.rs
//!
//! Wraps the `Transport` port with per-request credential injection and the
//! refresh-on-401 interceptor.
//!
//! A request that comes back 401 is retried at most once: the client runs a
//! single-flight refresh and, if that produced a token, replays the request
//! with it. If the refresh fails the session is ended and the original 401 is
//! handed back to the caller. A refresh that resolves after the session was
//! ended (for example by a logout) is discarded. Calls made with
//! [`RequestOptions::without_refresh`] (login, refresh, logout) never enter
//! that path.

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use taskflow_core::domain::AccessToken;
use taskflow_core::ports::{Body, HttpRequest, HttpResponse, Transport};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::AuthEndpoints;
use crate::error::{ClientError, ClientResult};
use crate::session::Session;
use crate::wire::{Envelope, TokenData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestOptions {
    pub retry_on_unauthorized: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            retry_on_unauthorized: true,
        }
    }
}

impl RequestOptions {
    pub fn without_refresh() -> Self {
        Self {
            retry_on_unauthorized: false,
        }
    }
}

pub struct RemoteClient {
    transport: Arc<dyn Transport>,
    session: Arc<Session>,
    endpoints: AuthEndpoints,
    refresh_lock: Mutex<()>,
}

impl RemoteClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<Session>, endpoints: AuthEndpoints) -> Self {
        Self {
            transport,
            session,
            endpoints,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Sends a request with the refresh interceptor enabled.
    pub async fn send(&self, request: HttpRequest) -> ClientResult<HttpResponse> {
        self.send_with(request, RequestOptions::default()).await
    }

    /// Sends a request. Error statuses come back as `Ok` responses; only
    /// transport failures are errors.
    pub async fn send_with(
        &self,
        request: HttpRequest,
        options: RequestOptions,
    ) -> ClientResult<HttpResponse> {
        let epoch = self.session.epoch();
        let token = self.session.access_token();
        let response = self.dispatch(&request, token.clone()).await?;

        if !response.is_unauthorized() || !options.retry_on_unauthorized {
            return Ok(response);
        }

        debug!(path = %request.path, "Received 401, attempting a silent refresh");
        match self.refresh_after(token.as_ref(), epoch).await {
            Ok(fresh) => {
                let replay = self.dispatch(&request, Some(fresh)).await?;
                if replay.is_unauthorized() {
                    warn!(path = %request.path, "Replayed request was rejected again");
                }
                Ok(replay)
            }
            Err(e) => {
                warn!(path = %request.path, error = %e, "Silent refresh failed");
                Ok(response)
            }
        }
    }

    /// Forces a refresh regardless of the token currently held.
    pub async fn refresh(&self) -> ClientResult<AccessToken> {
        let _guard = self.refresh_lock.lock().await;
        self.refresh_locked().await
    }

    /// Refreshes unless another caller already replaced `stale` while this
    /// one was waiting for the lock. If the session was ended since `epoch`,
    /// the earlier refresh failed or the user logged out, and nothing is retried.
    async fn refresh_after(&self, stale: Option<&AccessToken>, epoch: u64) -> ClientResult<AccessToken> {
        let _guard = self.refresh_lock.lock().await;
        if let Some(current) = self.session.access_token() {
            if Some(&current) != stale {
                debug!("Token already refreshed by a concurrent request");
                return Ok(current);
            }
        }
        if self.session.epoch() != epoch {
            debug!("Session ended while waiting to refresh");
            return Err(ClientError::SessionEnded);
        }
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> ClientResult<AccessToken> {
        let epoch = self.session.epoch();
        self.session.begin_refresh();

        let request = HttpRequest::post(self.endpoints.refresh.as_str());
        let result = async {
            let response = expect_success(self.dispatch(&request, None).await?)?;
            let envelope: Envelope<TokenData> = decode(&response.body)?;
            Ok::<_, ClientError>(AccessToken::new(envelope.into_data()?.access_token))
        }
        .await;

        match result {
            Ok(token) => {
                if !self.session.install_refreshed(token.clone(), epoch) {
                    warn!("Session ended during refresh; discarding the new token");
                    return Err(ClientError::SessionEnded);
                }
                info!("Access token refreshed");
                Ok(token)
            }
            Err(e) => {
                if self.session.epoch() == epoch {
                    self.end_session().await;
                }
                Err(e)
            }
        }
    }

    /// Clears the local session, then tells the server on a best-effort basis.
    async fn end_session(&self) {
        self.session.clear();
        let request = HttpRequest::post(self.endpoints.logout.as_str());
        match self.dispatch(&request, None).await.and_then(expect_success) {
            Ok(_) => info!("Session ended after failed refresh"),
            Err(e) => warn!(error = %e, "Server-side logout failed after refresh failure"),
        }
    }

    async fn dispatch(
        &self,
        request: &HttpRequest,
        bearer: Option<AccessToken>,
    ) -> ClientResult<HttpResponse> {
        let mut outbound = request.clone();
        outbound.bearer = bearer;
        Ok(self.transport.send(outbound).await?)
    }
}

//=========================================================================================
// Helpers shared by the resource and auth layers
//=========================================================================================

/// Turns a non-2xx response into [`ClientError::Status`].
pub fn expect_success(response: HttpResponse) -> ClientResult<HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ClientError::Status {
            status: response.status,
            body: String::from_utf8_lossy(&response.body).into_owned(),
        })
    }
}

pub fn decode<T: DeserializeOwned>(body: &[u8]) -> ClientResult<T> {
    Ok(serde_json::from_slice(body)?)
}

pub fn json_body<T: Serialize + ?Sized>(payload: &T) -> ClientResult<Body> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(Body::Json(Bytes::from(bytes)))
}
