//! services/client/src/adapters/http.rs
//!
//! This module contains the HTTP adapter, the concrete implementation of the
//! `Transport` port from the `core` crate. It sends requests with `reqwest`.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::{Client, Url};
use std::time::Duration;
use taskflow_core::ports::{
    Body, HttpRequest, HttpResponse, Method, PortError, PortResult, Transport,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `Transport` port over a pooled [`reqwest::Client`].
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
}

impl ReqwestTransport {
    /// Creates a new `ReqwestTransport` with a per-request timeout.
    pub fn new(base_url: Url, timeout: Duration) -> Result<Self, PortError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(Self { client, base_url })
    }

    /// Creates a transport reusing an existing client.
    pub fn with_client(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// Appends `path` to the base URL, keeping any path prefix the base
    /// carries (`http://host/api/` + `/v1/tasks` is `http://host/api/v1/tasks`).
    fn url_for(&self, path: &str) -> PortResult<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| PortError::InvalidRequest(format!("{}: {}", path, e)))
    }
}

//=========================================================================================
// `Transport` Trait Implementation
//=========================================================================================

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> PortResult<HttpResponse> {
        let url = self.url_for(&request.path)?;
        let method = match request.method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        };

        let mut builder = self.client.request(method, url);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.as_str());
        }
        builder = match request.body {
            Body::Empty => builder,
            Body::Json(bytes) => builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(bytes),
            Body::Form(pairs) => builder.form(&pairs),
        };

        // Connection, DNS, TLS and timeout failures all mean "no response".
        let response = builder
            .send()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| PortError::Network(e.to_string()))?;

        Ok(HttpResponse { status, body })
    }
}
