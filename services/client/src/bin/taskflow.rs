//! services/client/src/bin/taskflow.rs

use client_lib::{
    adapters::ReqwestTransport,
    config::Config,
    error::ClientError,
    Authenticator, RemoteClient, ResourceClient, ResourceStore, Session,
};
use std::sync::Arc;
use taskflow_core::domain::{Project, Task, Todo};
use taskflow_core::views;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!(base_url = %config.base_url, "Configuration loaded");

    // --- 2. Wire the Transport, Session & Stores ---
    let transport = Arc::new(ReqwestTransport::new(
        config.base_url.clone(),
        config.request_timeout,
    )?);
    let session = Arc::new(Session::new());
    let remote = Arc::new(RemoteClient::new(
        transport,
        session.clone(),
        config.endpoints.auth.clone(),
    ));
    let auth = Authenticator::new(remote.clone(), config.endpoints.auth.clone());
    let resources = ResourceClient::new(remote);

    let tasks: ResourceStore<Task> = ResourceStore::new(
        resources.clone(),
        config.endpoints.tasks.clone(),
        config.concurrency_policy,
    );
    let projects: ResourceStore<Project> = ResourceStore::new(
        resources.clone(),
        config.endpoints.projects.clone(),
        config.concurrency_policy,
    );
    let todos: ResourceStore<Todo> = ResourceStore::new(
        resources,
        config.endpoints.todos.clone(),
        config.concurrency_policy,
    );

    // --- 3. Restore or Start a Session ---
    if !auth.restore().await {
        match (config.email.as_deref(), config.password.as_deref()) {
            (Some(email), Some(password)) => {
                auth.login_with_password(email, password).await?;
            }
            (Some(email), None) => {
                auth.request_magic_link(email).await?;
                info!("Magic link sent to {}; follow it to finish signing in", email);
                return Ok(());
            }
            _ => {
                return Err(ClientError::Internal(
                    "No session to restore and TASKFLOW_EMAIL is not set".to_string(),
                ))
            }
        }
    }

    // --- 4. Load the Collections ---
    futures::future::try_join3(
        tasks.revalidate(),
        projects.revalidate(),
        todos.revalidate(),
    )
    .await?;

    let task_records = tasks.records();
    let summary = views::summary(&task_records);
    let (top_level, sub_tasks) = views::partition_by_parent(&task_records);
    info!(
        projects = projects.records().len(),
        todos = todos.records().len(),
        tasks = summary.total,
        completed = summary.completed,
        incomplete = summary.incomplete,
        top_level = top_level.len(),
        with_sub_tasks = sub_tasks.len(),
        "Collections loaded"
    );

    if let Err(e) = auth.logout().await {
        warn!(error = %e, "Logout reported a failure");
    }
    Ok(())
}
