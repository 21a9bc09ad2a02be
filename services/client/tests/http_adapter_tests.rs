//! Exercises `ReqwestTransport` against a local axum server.

use assert_matches::assert_matches;
use axum::body::Bytes;
use axum::http::{header, HeaderMap, Method as HttpMethod, StatusCode};
use axum::routing::{any, get};
use axum::{Json, Router};
use reqwest::Url;
use serde_json::{json, Value};
use std::time::Duration;

use client_lib::adapters::ReqwestTransport;
use taskflow_core::domain::AccessToken;
use taskflow_core::ports::{Body, HttpRequest, PortError, Transport};

async fn echo(method: HttpMethod, headers: HeaderMap, body: Bytes) -> Json<Value> {
    let header_str = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(json!({
        "method": method.as_str(),
        "authorization": header_str(header::AUTHORIZATION),
        "content_type": header_str(header::CONTENT_TYPE),
        "body": String::from_utf8_lossy(&body),
    }))
}

async fn spawn_server() -> Url {
    let app = Router::new()
        .route("/echo", any(echo))
        .route("/api/echo", any(echo))
        .route(
            "/v1/tasks",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "maintenance") }),
        );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    Url::parse(&format!("http://{}", addr)).unwrap()
}

fn transport(base_url: Url) -> ReqwestTransport {
    ReqwestTransport::new(base_url, Duration::from_secs(5)).unwrap()
}

fn echoed(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap()
}

#[tokio::test]
async fn bearer_token_is_sent_only_when_present() {
    let transport = transport(spawn_server().await);

    let mut request = HttpRequest::get("/echo");
    request.bearer = Some(AccessToken::new("tok-1"));
    let response = transport.send(request).await.unwrap();
    assert_eq!(response.status, 200);
    let seen = echoed(&response.body);
    assert_eq!(seen["method"], "GET");
    assert_eq!(seen["authorization"], "Bearer tok-1");

    let response = transport.send(HttpRequest::get("/echo")).await.unwrap();
    assert_eq!(echoed(&response.body)["authorization"], Value::Null);
}

#[tokio::test]
async fn json_and_form_bodies_are_encoded() {
    let transport = transport(spawn_server().await);

    let request = HttpRequest::put("/echo").with_body(Body::Json(Bytes::from_static(
        br#"{"content":"Buy milk"}"#,
    )));
    let seen = echoed(&transport.send(request).await.unwrap().body);
    assert_eq!(seen["method"], "PUT");
    assert_eq!(seen["content_type"], "application/json");
    assert_eq!(seen["body"], r#"{"content":"Buy milk"}"#);

    let request = HttpRequest::post("/echo").with_body(Body::Form(vec![
        ("email".to_string(), "ada@example.com".to_string()),
        ("password".to_string(), "hunter2".to_string()),
    ]));
    let seen = echoed(&transport.send(request).await.unwrap().body);
    assert_eq!(seen["content_type"], "application/x-www-form-urlencoded");
    assert_eq!(seen["body"], "email=ada%40example.com&password=hunter2");
}

#[tokio::test]
async fn base_url_path_prefix_is_kept() {
    let root = spawn_server().await;

    for base in ["api/", "api"] {
        let transport = transport(root.join(base).unwrap());
        let mut request = HttpRequest::get("/echo");
        request.bearer = Some(AccessToken::new("tok-1"));

        let response = transport.send(request).await.unwrap();
        assert_eq!(response.status, 200, "base {}", base);
        assert_eq!(echoed(&response.body)["authorization"], "Bearer tok-1");
    }
}

#[tokio::test]
async fn error_statuses_are_responses_not_errors() {
    let transport = transport(spawn_server().await);

    let response = transport.send(HttpRequest::get("/v1/tasks")).await.unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(&response.body[..], b"maintenance");
    assert!(!response.is_success());

    let response = transport.send(HttpRequest::delete("/missing")).await.unwrap();
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = transport(Url::parse(&format!("http://{}", addr)).unwrap());
    let result = transport.send(HttpRequest::get("/echo")).await;
    assert_matches!(result, Err(PortError::Network(_)));
}
