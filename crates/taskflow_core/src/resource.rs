//! crates/taskflow_core/src/resource.rs
//!
//! The record contracts the reconciliation engine is generic over.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;

use crate::domain::{
    Project, ProjectDraft, ProjectFields, RecordId, Task, TaskDraft, TaskFields, Todo, TodoDraft,
    TodoFields, ValidationError,
};
use crate::normalize::{normalize_project, normalize_task, normalize_todo};

/// A record type held in a cache-backed collection.
pub trait Resource: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    /// Form-shaped input accepted by create/edit.
    type Draft: Clone + fmt::Debug + Send + Sync + 'static;
    /// Validated, normalized form of a draft.
    type Fields: Clone + fmt::Debug + Send + Sync + 'static;

    /// Name of the local collection. Independent of any endpoint address.
    const CACHE_NAME: &'static str;

    fn id(&self) -> &RecordId;

    fn normalize(draft: &Self::Draft, today: NaiveDate) -> Result<Self::Fields, ValidationError>;

    /// Builds the optimistic stand-in shown until the server answers a create.
    fn placeholder(id: RecordId, fields: &Self::Fields, now: DateTime<Utc>) -> Self;

    /// Returns a copy with the editable fields replaced.
    fn with_fields(&self, fields: &Self::Fields) -> Self;
}

/// Records with a completion flag.
pub trait Completable: Resource {
    fn is_completed(&self) -> bool;

    fn toggled(&self, now: DateTime<Utc>) -> Self;
}

/// Records that may hang off a parent record of the same type.
pub trait Nested: Resource {
    fn parent_id(&self) -> Option<&str>;
}

//=========================================================================================
// Task
//=========================================================================================

impl Resource for Task {
    type Draft = TaskDraft;
    type Fields = TaskFields;

    const CACHE_NAME: &'static str = "tasks";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn normalize(draft: &TaskDraft, today: NaiveDate) -> Result<TaskFields, ValidationError> {
        normalize_task(draft, today)
    }

    fn placeholder(id: RecordId, fields: &TaskFields, now: DateTime<Utc>) -> Self {
        Task {
            id,
            project_id: fields.project_id.clone(),
            user_id: fields.user_id.clone(),
            content: fields.content.clone(),
            description: fields.description.clone(),
            due_date: fields.due_date,
            due_datetime: fields.due_datetime,
            priority: Some(fields.priority),
            is_completed: false,
            completed_at: None,
            parent_task_id: fields.parent_task_id.clone(),
            created_at: Some(now),
        }
    }

    fn with_fields(&self, fields: &TaskFields) -> Self {
        Task {
            project_id: fields.project_id.clone().or_else(|| self.project_id.clone()),
            user_id: fields.user_id.clone().or_else(|| self.user_id.clone()),
            content: fields.content.clone(),
            description: fields.description.clone(),
            due_date: fields.due_date,
            due_datetime: fields.due_datetime,
            priority: Some(fields.priority),
            parent_task_id: fields.parent_task_id.clone(),
            ..self.clone()
        }
    }
}

impl Completable for Task {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn toggled(&self, now: DateTime<Utc>) -> Self {
        let is_completed = !self.is_completed;
        Task {
            is_completed,
            completed_at: is_completed.then_some(now),
            ..self.clone()
        }
    }
}

impl Nested for Task {
    fn parent_id(&self) -> Option<&str> {
        self.parent_task_id.as_deref()
    }
}

//=========================================================================================
// Project
//=========================================================================================

impl Resource for Project {
    type Draft = ProjectDraft;
    type Fields = ProjectFields;

    const CACHE_NAME: &'static str = "projects";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn normalize(draft: &ProjectDraft, _today: NaiveDate) -> Result<ProjectFields, ValidationError> {
        normalize_project(draft)
    }

    fn placeholder(id: RecordId, fields: &ProjectFields, _now: DateTime<Utc>) -> Self {
        Project {
            id,
            user_id: None,
            name: fields.name.clone(),
            color: fields.color.clone(),
            is_inbox: false,
            parent_project_id: fields.parent_project_id.clone(),
        }
    }

    fn with_fields(&self, fields: &ProjectFields) -> Self {
        Project {
            name: fields.name.clone(),
            color: fields.color.clone(),
            parent_project_id: fields.parent_project_id.clone(),
            ..self.clone()
        }
    }
}

impl Nested for Project {
    fn parent_id(&self) -> Option<&str> {
        self.parent_project_id.as_deref()
    }
}

//=========================================================================================
// Todo
//=========================================================================================

impl Resource for Todo {
    type Draft = TodoDraft;
    type Fields = TodoFields;

    const CACHE_NAME: &'static str = "todos";

    fn id(&self) -> &RecordId {
        &self.id
    }

    fn normalize(draft: &TodoDraft, _today: NaiveDate) -> Result<TodoFields, ValidationError> {
        normalize_todo(draft)
    }

    fn placeholder(id: RecordId, fields: &TodoFields, _now: DateTime<Utc>) -> Self {
        Todo {
            id,
            title: fields.title.clone(),
            description: fields.description.clone(),
            is_completed: false,
            due_date: fields.due_date,
            tags: Vec::new(),
        }
    }

    fn with_fields(&self, fields: &TodoFields) -> Self {
        Todo {
            title: fields.title.clone(),
            description: fields.description.clone(),
            due_date: fields.due_date,
            ..self.clone()
        }
    }
}

impl Completable for Todo {
    fn is_completed(&self) -> bool {
        self.is_completed
    }

    fn toggled(&self, _now: DateTime<Utc>) -> Self {
        Todo {
            is_completed: !self.is_completed,
            ..self.clone()
        }
    }
}
