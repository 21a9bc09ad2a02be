//! Shared helpers for the client integration tests.
//!
//! [`FakeTransport`] stands in for the HTTP adapter: responses are scripted
//! per method and path, served in order, and every request is recorded. A
//! response can be gated on a [`Notify`] so a test can inspect the cache
//! between the optimistic apply and the server's answer.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

use client_lib::config::ApiEndpoints;
use client_lib::{
    Authenticator, ConcurrencyPolicy, RemoteClient, ResourceClient, ResourceStore, Session,
};
use taskflow_core::domain::{Project, Task, Todo};
use taskflow_core::ports::{
    Body, HttpRequest, HttpResponse, Method, PortError, PortResult, Transport,
};

// ---------------------------------------------------------------------------
// FakeTransport
// ---------------------------------------------------------------------------

enum Scripted {
    Respond(HttpResponse),
    Fail(String),
    Gated(Arc<Notify>, HttpResponse),
}

#[derive(Default)]
pub struct FakeTransport {
    routes: Mutex<HashMap<(Method, String), VecDeque<Scripted>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        self.routes
            .lock()
            .unwrap()
            .entry((method, path.to_string()))
            .or_default()
            .push_back(scripted);
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: Value) {
        let response = HttpResponse::new(status, body.to_string());
        self.push(method, path, Scripted::Respond(response));
    }

    /// Scripts a transport failure: no response at all.
    pub fn fail(&self, method: Method, path: &str, reason: &str) {
        self.push(method, path, Scripted::Fail(reason.to_string()));
    }

    /// Scripts a response that is only delivered after `gate` is notified.
    pub fn respond_after(
        &self,
        gate: Arc<Notify>,
        method: Method,
        path: &str,
        status: u16,
        body: Value,
    ) {
        let response = HttpResponse::new(status, body.to_string());
        self.push(method, path, Scripted::Gated(gate, response));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> PortResult<HttpResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let scripted = self
            .routes
            .lock()
            .unwrap()
            .get_mut(&(request.method, request.path.clone()))
            .and_then(|queue| queue.pop_front());

        match scripted {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::Fail(reason)) => Err(PortError::Network(reason)),
            Some(Scripted::Gated(gate, response)) => {
                gate.notified().await;
                Ok(response)
            }
            None => Ok(HttpResponse::new(
                404,
                format!("no scripted response for {:?} {}", request.method, request.path),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub transport: Arc<FakeTransport>,
    pub session: Arc<Session>,
    pub remote: Arc<RemoteClient>,
    pub auth: Authenticator,
    pub tasks: Arc<ResourceStore<Task>>,
    pub projects: Arc<ResourceStore<Project>>,
    pub todos: Arc<ResourceStore<Todo>>,
}

pub fn harness() -> Harness {
    harness_with(ConcurrencyPolicy::Serialize)
}

pub fn harness_with(policy: ConcurrencyPolicy) -> Harness {
    let endpoints = ApiEndpoints::default();
    let transport = FakeTransport::new();
    let session = Arc::new(Session::new());
    let remote = Arc::new(RemoteClient::new(
        transport.clone(),
        session.clone(),
        endpoints.auth.clone(),
    ));
    let auth = Authenticator::new(remote.clone(), endpoints.auth.clone());
    let resources = ResourceClient::new(remote.clone());
    let tasks = Arc::new(ResourceStore::new(resources.clone(), endpoints.tasks, policy));
    let projects = Arc::new(ResourceStore::new(resources.clone(), endpoints.projects, policy));
    let todos = Arc::new(ResourceStore::new(resources, endpoints.todos, policy));

    Harness {
        transport,
        session,
        remote,
        auth,
        tasks,
        projects,
        todos,
    }
}

pub const TASKS: &str = "/v1/tasks";
pub const TODOS: &str = "/v1/todos";
pub const LOGIN: &str = "/login";
pub const LOGOUT: &str = "/logout";
pub const REFRESH: &str = "/refresh-token";
pub const MAGIC_LINK: &str = "/auth/magic-link";

pub fn task_json(id: &str, content: &str) -> Value {
    json!({
        "task_id": id,
        "project_id": "inbox",
        "user_id": "u1",
        "content": content,
        "priority": 1,
        "is_completed": false,
        "created_at": "2026-01-01T09:00:00Z"
    })
}

pub fn todo_json(id: i64, title: &str) -> Value {
    json!({
        "todo_id": id,
        "title": title,
        "is_completed": false,
        "due_date": "2026-05-01",
        "tags": ["home"]
    })
}

pub fn envelope(data: Value) -> Value {
    json!({ "message": "ok", "data": data })
}

pub fn token_envelope(token: &str) -> Value {
    envelope(json!({ "access_token": token }))
}

/// Loads `tasks` into the store through a scripted revalidation.
pub async fn seed_tasks(h: &Harness, tasks: Vec<Value>) {
    h.transport
        .respond(Method::Get, TASKS, 200, Value::Array(tasks));
    h.tasks.revalidate().await.expect("seeding revalidation should succeed");
}

/// Lets spawned tasks run until they block on a gate.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(5)).await;
}

/// Logs the harness in with a scripted password login.
pub async fn login(h: &Harness, token: &str) {
    h.transport
        .respond(Method::Post, LOGIN, 200, token_envelope(token));
    h.auth
        .login_with_password("ada@example.com", "hunter2")
        .await
        .expect("scripted login should succeed");
}

/// Decodes the JSON body of a recorded request.
pub fn json_of(request: &HttpRequest) -> Value {
    match &request.body {
        Body::Json(bytes) => serde_json::from_slice(bytes).expect("body should be valid JSON"),
        other => panic!("expected a JSON body, got {:?}", other),
    }
}

pub fn bearer_of(request: &HttpRequest) -> Option<&str> {
    request.bearer.as_ref().map(|t| t.as_str())
}
