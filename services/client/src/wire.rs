//! services/client/src/wire.rs
//!
//! JSON shapes exchanged with the API, and their mapping to and from the pure
//! domain types of the `core` crate.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use taskflow_core::domain::{
    Priority, Project, ProjectFields, RecordId, Task, TaskFields, Todo, TodoFields,
};
use taskflow_core::normalize::parse_due_date;
use taskflow_core::resource::Resource;
use tracing::warn;

use crate::error::{ClientError, ClientResult};

//=========================================================================================
// Envelopes
//=========================================================================================

/// The `{ message, data }` wrapper around create/edit/login responses.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope<T> {
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    /// Unwraps `data`. A missing payload means the server accepted the call
    /// but reported an error in `message`.
    pub fn into_data(self) -> ClientResult<T> {
        self.data.ok_or(ClientError::Rejected {
            message: self.message,
        })
    }
}

/// Body of a DELETE response.
#[derive(Debug, Clone, Deserialize)]
pub struct DeleteReceipt {
    pub rows_affected: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TokenData {
    pub access_token: String,
}

#[derive(Debug, Serialize)]
pub struct MagicLinkRequest<'a> {
    pub email: &'a str,
}

//=========================================================================================
// Resource Mapping
//=========================================================================================

/// A [`Resource`] that can be exchanged with the API.
pub trait RemoteResource: Resource {
    /// Shape the server returns.
    type Record: DeserializeOwned + Send + 'static;
    /// Shape sent on create/edit.
    type Payload: Serialize + Send + Sync + 'static;

    fn from_record(record: Self::Record) -> Self;

    fn create_payload(fields: &Self::Fields) -> Self::Payload;

    /// Builds an edit payload. Ids the form does not carry come from `current`.
    fn edit_payload(server_id: &str, current: &Self, fields: &Self::Fields) -> Self::Payload;
}

//=========================================================================================
// Tasks
//=========================================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub content: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default, alias = "date_datetime")]
    pub due_datetime: Option<String>,
    #[serde(default)]
    pub priority: Option<i16>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub parent_task_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl TaskRecord {
    fn to_domain(self) -> Task {
        let priority = self.priority.and_then(|p| match Priority::try_from(p) {
            Ok(priority) => Some(priority),
            Err(e) => {
                warn!(task_id = %self.task_id, error = %e, "Ignoring out-of-range priority");
                None
            }
        });

        Task {
            due_date: lenient_timestamp(&self.task_id, "due_date", self.due_date.as_deref()),
            due_datetime: lenient_timestamp(
                &self.task_id,
                "due_datetime",
                self.due_datetime.as_deref(),
            ),
            id: RecordId::Server(self.task_id),
            project_id: self.project_id,
            user_id: self.user_id,
            content: self.content,
            description: self.description,
            priority,
            is_completed: self.is_completed.unwrap_or(false),
            completed_at: self.completed_at,
            parent_task_id: self.parent_task_id,
            created_at: self.created_at,
        }
    }
}

/// Server dates arrive either as `YYYY-MM-DD` or as full timestamps. An
/// unparseable value is dropped rather than failing the whole list.
fn lenient_timestamp(record_id: &str, field: &str, value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value?;
    match parse_due_date(value) {
        Ok(parsed) => parsed,
        Err(e) => {
            warn!(record_id, field, error = %e, "Ignoring unparseable timestamp");
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_datetime: Option<DateTime<Utc>>,
    pub priority: i16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_task_id: Option<String>,
}

impl RemoteResource for Task {
    type Record = TaskRecord;
    type Payload = TaskPayload;

    fn from_record(record: TaskRecord) -> Self {
        record.to_domain()
    }

    fn create_payload(fields: &TaskFields) -> TaskPayload {
        TaskPayload {
            task_id: None,
            content: fields.content.clone(),
            description: fields.description.clone(),
            project_id: fields.project_id.clone(),
            user_id: fields.user_id.clone(),
            due_date: fields.due_date,
            due_datetime: fields.due_datetime,
            priority: fields.priority.as_i16(),
            parent_task_id: fields.parent_task_id.clone(),
        }
    }

    fn edit_payload(server_id: &str, current: &Task, fields: &TaskFields) -> TaskPayload {
        TaskPayload {
            task_id: Some(server_id.to_string()),
            project_id: fields.project_id.clone().or_else(|| current.project_id.clone()),
            user_id: fields.user_id.clone().or_else(|| current.user_id.clone()),
            ..Self::create_payload(fields)
        }
    }
}

//=========================================================================================
// Projects
//=========================================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectRecord {
    pub project_id: String,
    #[serde(default)]
    pub user_id: Option<String>,
    pub project_name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_inbox: Option<bool>,
    #[serde(default)]
    pub parent_project_id: Option<String>,
}

impl ProjectRecord {
    fn to_domain(self) -> Project {
        Project {
            id: RecordId::Server(self.project_id),
            user_id: self.user_id,
            name: self.project_name,
            color: self.color,
            is_inbox: self.is_inbox.unwrap_or(false),
            parent_project_id: self.parent_project_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub project_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_project_id: Option<String>,
}

impl RemoteResource for Project {
    type Record = ProjectRecord;
    type Payload = ProjectPayload;

    fn from_record(record: ProjectRecord) -> Self {
        record.to_domain()
    }

    fn create_payload(fields: &ProjectFields) -> ProjectPayload {
        ProjectPayload {
            project_id: None,
            project_name: fields.name.clone(),
            color: fields.color.clone(),
            parent_project_id: fields.parent_project_id.clone(),
        }
    }

    fn edit_payload(server_id: &str, _current: &Project, fields: &ProjectFields) -> ProjectPayload {
        ProjectPayload {
            project_id: Some(server_id.to_string()),
            ..Self::create_payload(fields)
        }
    }
}

//=========================================================================================
// Todos
//=========================================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct TodoRecord {
    pub todo_id: i64,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_completed: Option<bool>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl TodoRecord {
    fn to_domain(self) -> Todo {
        let id = self.todo_id.to_string();
        Todo {
            due_date: lenient_timestamp(&id, "due_date", self.due_date.as_deref()),
            id: RecordId::Server(id),
            title: self.title,
            description: self.description,
            is_completed: self.is_completed.unwrap_or(false),
            tags: self.tags,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TodoPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub todo_id: Option<i64>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<DateTime<Utc>>,
}

impl RemoteResource for Todo {
    type Record = TodoRecord;
    type Payload = TodoPayload;

    fn from_record(record: TodoRecord) -> Self {
        record.to_domain()
    }

    fn create_payload(fields: &TodoFields) -> TodoPayload {
        TodoPayload {
            todo_id: None,
            title: fields.title.clone(),
            description: fields.description.clone(),
            due_date: fields.due_date,
        }
    }

    // Server ids in the todo cache all come from `TodoRecord::to_domain`,
    // so they are decimal integers.
    fn edit_payload(server_id: &str, _current: &Todo, fields: &TodoFields) -> TodoPayload {
        TodoPayload {
            todo_id: server_id.parse().ok(),
            ..Self::create_payload(fields)
        }
    }
}
