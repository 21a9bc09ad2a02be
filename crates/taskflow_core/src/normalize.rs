//! crates/taskflow_core/src/normalize.rs
//!
//! Turns form-shaped drafts into the normalized field sets sent to the server:
//! blank optional strings become absent, date-only values are expanded to
//! full UTC timestamps, and bare times are anchored to a given day.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::domain::{
    ProjectDraft, ProjectFields, TaskDraft, TaskFields, TodoDraft, TodoFields, ValidationError,
};

/// Trims `value` and returns `None` when nothing is left.
pub fn blank_to_none(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn optional_id(value: Option<&String>) -> Option<String> {
    value.and_then(|v| blank_to_none(v))
}

/// Parses a due date given as `YYYY-MM-DD` (midnight UTC) or as RFC 3339.
pub fn parse_due_date(value: &str) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let Some(value) = blank_to_none(value) else {
        return Ok(None);
    };

    if let Ok(date) = NaiveDate::parse_from_str(&value, "%Y-%m-%d") {
        let midnight = date.and_time(NaiveTime::MIN);
        return Ok(Some(Utc.from_utc_datetime(&midnight)));
    }

    DateTime::parse_from_rfc3339(&value)
        .map(|d| Some(d.with_timezone(&Utc)))
        .map_err(|_| ValidationError::InvalidDate(value))
}

/// Combines `day` with a time given as `HH:MM` or `HH:MM:SS`, in UTC.
///
/// A full RFC 3339 timestamp is accepted as-is.
pub fn combine_day_with_time(
    day: NaiveDate,
    value: &str,
) -> Result<Option<DateTime<Utc>>, ValidationError> {
    let Some(value) = blank_to_none(value) else {
        return Ok(None);
    };

    let time = NaiveTime::parse_from_str(&value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(&value, "%H:%M:%S"));
    if let Ok(time) = time {
        return Ok(Some(Utc.from_utc_datetime(&day.and_time(time))));
    }

    DateTime::parse_from_rfc3339(&value)
        .map(|d| Some(d.with_timezone(&Utc)))
        .map_err(|_| ValidationError::InvalidTime(value))
}

/// Validates and normalizes a task draft. `today` anchors a bare due time.
pub fn normalize_task(draft: &TaskDraft, today: NaiveDate) -> Result<TaskFields, ValidationError> {
    let content =
        blank_to_none(&draft.content).ok_or(ValidationError::MissingField("content"))?;

    Ok(TaskFields {
        content,
        description: blank_to_none(&draft.description),
        project_id: blank_to_none(&draft.project_id),
        user_id: blank_to_none(&draft.user_id),
        due_date: parse_due_date(&draft.due_date)?,
        due_datetime: combine_day_with_time(today, &draft.due_time)?,
        priority: draft.priority.unwrap_or_default(),
        parent_task_id: optional_id(draft.parent_task_id.as_ref()),
    })
}

pub fn normalize_project(draft: &ProjectDraft) -> Result<ProjectFields, ValidationError> {
    let name = blank_to_none(&draft.name).ok_or(ValidationError::MissingField("name"))?;

    Ok(ProjectFields {
        name,
        color: blank_to_none(&draft.color),
        parent_project_id: optional_id(draft.parent_project_id.as_ref()),
    })
}

pub fn normalize_todo(draft: &TodoDraft) -> Result<TodoFields, ValidationError> {
    let title = blank_to_none(&draft.title).ok_or(ValidationError::MissingField("title"))?;

    Ok(TodoFields {
        title,
        description: blank_to_none(&draft.description),
        due_date: parse_due_date(&draft.due_date)?,
    })
}
