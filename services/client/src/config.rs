//! services/client/src/config.rs
//!
//! Defines the client's configuration structure and loading logic.
//!
//! Runtime settings are loaded from environment variables at startup. The `.env`
//! file is used for local development. Endpoint paths live in [`ApiEndpoints`]
//! so no request path is hard-coded at a call site.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::Url;
use std::time::Duration;
use tracing::Level;

use crate::store::ConcurrencyPolicy;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub base_url: Url,
    pub log_level: Level,
    pub request_timeout: Duration,
    pub concurrency_policy: ConcurrencyPolicy,
    pub email: Option<String>,
    pub password: Option<String>,
    pub endpoints: ApiEndpoints,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let base_url_str = std::env::var("TASKFLOW_BASE_URL")
            .map_err(|_| ConfigError::MissingVar("TASKFLOW_BASE_URL".to_string()))?;
        let base_url = Url::parse(&base_url_str).map_err(|e| {
            ConfigError::InvalidValue("TASKFLOW_BASE_URL".to_string(), e.to_string())
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let timeout_str =
            std::env::var("TASKFLOW_REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "30".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue("TASKFLOW_REQUEST_TIMEOUT_SECS".to_string(), e.to_string())
        })?;

        let policy_str = std::env::var("TASKFLOW_CONCURRENCY_POLICY")
            .unwrap_or_else(|_| "serialize".to_string());
        let concurrency_policy = policy_str.parse::<ConcurrencyPolicy>().map_err(|e| {
            ConfigError::InvalidValue("TASKFLOW_CONCURRENCY_POLICY".to_string(), e)
        })?;

        // --- Optional credentials used by the `taskflow` binary ---
        let email = std::env::var("TASKFLOW_EMAIL").ok();
        let password = std::env::var("TASKFLOW_PASSWORD").ok();

        Ok(Self {
            base_url,
            log_level,
            request_timeout: Duration::from_secs(timeout_secs),
            concurrency_policy,
            email,
            password,
            endpoints: ApiEndpoints::default(),
        })
    }
}

//=========================================================================================
// Endpoints
//=========================================================================================

/// The verb an edit endpoint expects. The API is not consistent across
/// resource types, so every endpoint states its verb explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditMethod {
    Post,
    Put,
}

/// Characters escaped in a query value. RFC 3986 unreserved marks pass through.
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Paths for one resource type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEndpoints {
    pub collection: String,
    pub edit: String,
    pub edit_method: EditMethod,
    /// Toggle path template; `{id}` is replaced with the record id.
    pub toggle: Option<String>,
    pub toggle_method: EditMethod,
    /// Query parameter carrying the id on DELETE.
    pub delete_param: String,
}

impl ResourceEndpoints {
    pub fn delete_path(&self, id: &str) -> String {
        format!(
            "{}?{}={}",
            self.collection,
            self.delete_param,
            utf8_percent_encode(id, QUERY_VALUE)
        )
    }

    pub fn toggle_path(&self, id: &str) -> Option<String> {
        self.toggle.as_ref().map(|t| t.replace("{id}", id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthEndpoints {
    pub login: String,
    pub logout: String,
    pub refresh: String,
    pub magic_link: String,
}

/// Every path the client talks to, relative to the base URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiEndpoints {
    pub auth: AuthEndpoints,
    pub tasks: ResourceEndpoints,
    pub projects: ResourceEndpoints,
    pub todos: ResourceEndpoints,
}

impl Default for AuthEndpoints {
    fn default() -> Self {
        Self {
            login: "/login".to_string(),
            logout: "/logout".to_string(),
            refresh: "/refresh-token".to_string(),
            magic_link: "/auth/magic-link".to_string(),
        }
    }
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            auth: AuthEndpoints::default(),
            tasks: ResourceEndpoints {
                collection: "/v1/tasks".to_string(),
                edit: "/v1/tasks".to_string(),
                edit_method: EditMethod::Put,
                toggle: Some("/v1/tasks/{id}/toggle".to_string()),
                toggle_method: EditMethod::Put,
                delete_param: "task_id".to_string(),
            },
            projects: ResourceEndpoints {
                collection: "/v1/projects".to_string(),
                edit: "/v1/projects".to_string(),
                edit_method: EditMethod::Put,
                toggle: None,
                toggle_method: EditMethod::Put,
                delete_param: "project_id".to_string(),
            },
            todos: ResourceEndpoints {
                collection: "/v1/todos".to_string(),
                edit: "/v1/todos".to_string(),
                edit_method: EditMethod::Post,
                toggle: Some("/v1/todos/{id}/toggle".to_string()),
                toggle_method: EditMethod::Put,
                delete_param: "todo_id".to_string(),
            },
        }
    }
}
