//! crates/taskflow_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any transport or serialization format.

use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

//=========================================================================================
// Identifiers
//=========================================================================================

/// Identifies a record inside a local collection.
///
/// Records acknowledged by the server always carry a `Server` id. A
/// `Temporary` id only exists between optimistic insertion and the server's
/// response to the create call.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordId {
    Server(String),
    Temporary(Uuid),
}

impl RecordId {
    pub fn server(id: impl Into<String>) -> Self {
        Self::Server(id.into())
    }

    /// Generates a fresh client-side placeholder id.
    pub fn temporary() -> Self {
        Self::Temporary(Uuid::new_v4())
    }

    pub fn as_server(&self) -> Option<&str> {
        match self {
            Self::Server(id) => Some(id),
            Self::Temporary(_) => None,
        }
    }

    pub fn is_temporary(&self) -> bool {
        matches!(self, Self::Temporary(_))
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => f.write_str(id),
            Self::Temporary(id) => write!(f, "tmp-{}", id),
        }
    }
}

//=========================================================================================
// Validation
//=========================================================================================

/// Client-side validation failures, raised before any state change or network call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("Invalid date '{0}', expected YYYY-MM-DD or an RFC 3339 timestamp")]
    InvalidDate(String),
    #[error("Invalid time '{0}', expected HH:MM or HH:MM:SS")]
    InvalidTime(String),
    #[error("Priority {0} is outside the supported range 1..=3")]
    InvalidPriority(i16),
    #[error("Record {0} has not been saved to the server yet")]
    NotPersisted(RecordId),
}

//=========================================================================================
// Tasks
//=========================================================================================

/// Task priority. The server stores it as a smallint in `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[default]
    Low = 1,
    Medium = 2,
    High = 3,
}

impl Priority {
    pub fn as_i16(self) -> i16 {
        self as i16
    }
}

impl TryFrom<i16> for Priority {
    type Error = ValidationError;

    fn try_from(value: i16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Low),
            2 => Ok(Self::Medium),
            3 => Ok(Self::High),
            other => Err(ValidationError::InvalidPriority(other)),
        }
    }
}

/// A task as held in the authoritative local collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    pub id: RecordId,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub content: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub due_datetime: Option<DateTime<Utc>>,
    pub priority: Option<Priority>,
    pub is_completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    /// One level of sub-tasks hangs off this reference.
    pub parent_task_id: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Form-shaped input for creating or editing a task.
///
/// Empty strings mean "not set". Normalization turns them into absent fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TaskDraft {
    pub content: String,
    pub description: String,
    pub project_id: String,
    pub user_id: String,
    /// `YYYY-MM-DD` or a full RFC 3339 timestamp.
    pub due_date: String,
    /// `HH:MM` / `HH:MM:SS`, combined with today's date on submit.
    pub due_time: String,
    pub priority: Option<Priority>,
    pub parent_task_id: Option<String>,
}

impl TaskDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    /// Prefills a draft from an existing task, for the edit form.
    pub fn from_task(task: &Task) -> Self {
        Self {
            content: task.content.clone(),
            description: task.description.clone().unwrap_or_default(),
            project_id: task.project_id.clone().unwrap_or_default(),
            user_id: task.user_id.clone().unwrap_or_default(),
            due_date: task
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
            due_time: task
                .due_datetime
                .map(|d| d.format("%H:%M").to_string())
                .unwrap_or_default(),
            priority: task.priority,
            parent_task_id: task.parent_task_id.clone(),
        }
    }
}

/// The validated, normalized fields of a [`TaskDraft`], ready to be sent.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskFields {
    pub content: String,
    pub description: Option<String>,
    pub project_id: Option<String>,
    pub user_id: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    pub due_datetime: Option<DateTime<Utc>>,
    pub priority: Priority,
    pub parent_task_id: Option<String>,
}

//=========================================================================================
// Projects
//=========================================================================================

/// A project groups tasks. Projects nest one level via `parent_project_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    pub id: RecordId,
    pub user_id: Option<String>,
    pub name: String,
    pub color: Option<String>,
    pub is_inbox: bool,
    pub parent_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProjectDraft {
    pub name: String,
    pub color: String,
    pub parent_project_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectFields {
    pub name: String,
    pub color: Option<String>,
    pub parent_project_id: Option<String>,
}

//=========================================================================================
// Todos
//=========================================================================================

/// A lightweight checklist entry. The server keys todos by a numeric id,
/// held here in its decimal form.
#[derive(Debug, Clone, PartialEq)]
pub struct Todo {
    pub id: RecordId,
    pub title: String,
    pub description: Option<String>,
    pub is_completed: bool,
    pub due_date: Option<DateTime<Utc>>,
    /// Assigned by the server; never edited by the client.
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TodoDraft {
    pub title: String,
    pub description: String,
    /// `YYYY-MM-DD` or a full RFC 3339 timestamp.
    pub due_date: String,
}

impl TodoDraft {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn from_todo(todo: &Todo) -> Self {
        Self {
            title: todo.title.clone(),
            description: todo.description.clone().unwrap_or_default(),
            due_date: todo
                .due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TodoFields {
    pub title: String,
    pub description: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

//=========================================================================================
// Identity & Credentials
//=========================================================================================

/// The currently signed-in user, as far as the client knows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: Option<String>,
    pub email: Option<String>,
    pub is_logged_in: bool,
}

/// Structured authentication failure, retained until the next attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthError {
    pub message: String,
    pub code: u16,
}

/// A bearer access token. Held in memory only; never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// A session established outside the normal request/response flow, e.g. by
/// the user following a magic link.
#[derive(Debug, Clone)]
pub struct EstablishedSession {
    pub access_token: AccessToken,
    pub user: User,
}
