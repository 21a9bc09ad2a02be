//! crates/taskflow_core/src/views.rs
//!
//! Read-only projections of an authoritative collection. Nothing here
//! mutates its input.

use std::collections::HashMap;

use crate::domain::Task;
use crate::resource::{Completable, Nested};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Summary {
    pub total: usize,
    pub completed: usize,
    pub incomplete: usize,
}

pub fn completed<R: Completable>(records: &[R]) -> Vec<&R> {
    records.iter().filter(|r| r.is_completed()).collect()
}

pub fn incomplete<R: Completable>(records: &[R]) -> Vec<&R> {
    records.iter().filter(|r| !r.is_completed()).collect()
}

pub fn summary<R: Completable>(records: &[R]) -> Summary {
    let completed = records.iter().filter(|r| r.is_completed()).count();
    Summary {
        total: records.len(),
        completed,
        incomplete: records.len() - completed,
    }
}

/// Direct children of `parent_id`.
pub fn children_of<'a, R: Nested>(records: &'a [R], parent_id: &str) -> Vec<&'a R> {
    records
        .iter()
        .filter(|r| r.parent_id() == Some(parent_id))
        .collect()
}

/// Records without a parent reference.
pub fn top_level<R: Nested>(records: &[R]) -> Vec<&R> {
    records.iter().filter(|r| r.parent_id().is_none()).collect()
}

/// Splits a collection into top-level records and children grouped by parent id.
pub fn partition_by_parent<R: Nested>(records: &[R]) -> (Vec<&R>, HashMap<&str, Vec<&R>>) {
    let mut roots = Vec::new();
    let mut children: HashMap<&str, Vec<&R>> = HashMap::new();
    for record in records {
        match record.parent_id() {
            Some(parent) => children.entry(parent).or_default().push(record),
            None => roots.push(record),
        }
    }
    (roots, children)
}

/// Tasks ordered by creation time, oldest first. Optimistic inserts carry the
/// local time of the create call. Tasks the server returned without a
/// `created_at` sort last, keeping their relative order.
pub fn sorted_by_creation(tasks: &[Task]) -> Vec<&Task> {
    let mut sorted: Vec<&Task> = tasks.iter().collect();
    sorted.sort_by(|a, b| match (a.created_at, b.created_at) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    sorted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::RecordId;
    use chrono::{TimeZone, Utc};

    fn task(id: &str, parent: Option<&str>, done: bool, minute: Option<u32>) -> Task {
        Task {
            id: RecordId::server(id),
            project_id: None,
            user_id: None,
            content: id.to_uppercase(),
            description: None,
            due_date: None,
            due_datetime: None,
            priority: None,
            is_completed: done,
            completed_at: None,
            parent_task_id: parent.map(str::to_string),
            created_at: minute.map(|m| Utc.with_ymd_and_hms(2026, 1, 1, 12, m, 0).unwrap()),
        }
    }

    fn sample() -> Vec<Task> {
        vec![
            task("a", None, false, Some(3)),
            task("b", Some("a"), true, Some(1)),
            task("c", Some("a"), false, None),
            task("d", None, true, Some(2)),
        ]
    }

    #[test]
    fn completion_views_split_the_collection() {
        let tasks = sample();
        let done: Vec<_> = completed(&tasks).iter().map(|t| t.content.clone()).collect();
        let open: Vec<_> = incomplete(&tasks).iter().map(|t| t.content.clone()).collect();
        assert_eq!(done, vec!["B", "D"]);
        assert_eq!(open, vec!["A", "C"]);
        assert_eq!(
            summary(&tasks),
            Summary {
                total: 4,
                completed: 2,
                incomplete: 2
            }
        );
    }

    #[test]
    fn parent_partition_groups_sub_tasks() {
        let tasks = sample();
        let (roots, children) = partition_by_parent(&tasks);
        assert_eq!(roots.len(), 2);
        assert_eq!(children["a"].len(), 2);
        assert_eq!(children_of(&tasks, "a").len(), 2);
        assert!(children_of(&tasks, "d").is_empty());
        assert_eq!(top_level(&tasks).len(), 2);
    }

    #[test]
    fn creation_order_puts_undated_tasks_last() {
        let tasks = sample();
        let order: Vec<_> = sorted_by_creation(&tasks)
            .iter()
            .map(|t| t.content.clone())
            .collect();
        assert_eq!(order, vec!["B", "D", "A", "C"]);
    }

    #[test]
    fn placeholders_sort_by_their_local_creation_time() {
        use crate::domain::TaskFields;
        use crate::resource::Resource;

        let fields = TaskFields {
            content: "Pending".into(),
            description: None,
            project_id: None,
            user_id: None,
            due_date: None,
            due_datetime: None,
            priority: crate::domain::Priority::Low,
            parent_task_id: None,
        };
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 12, 2, 30).unwrap();
        let mut tasks = sample();
        tasks.insert(0, Task::placeholder(RecordId::temporary(), &fields, now));

        let order: Vec<_> = sorted_by_creation(&tasks)
            .iter()
            .map(|t| t.content.clone())
            .collect();
        assert_eq!(order, vec!["B", "D", "Pending", "A", "C"]);
    }
}
