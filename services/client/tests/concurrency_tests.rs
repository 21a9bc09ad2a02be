//! Overlapping mutations of the same record under both concurrency policies,
//! and rollback of one record while another changes.

mod common;

use assert_matches::assert_matches;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

use client_lib::{ClientError, ConcurrencyPolicy};
use common::*;
use taskflow_core::domain::{RecordId, TaskDraft};
use taskflow_core::ports::Method;

const DELETE_T1: &str = "/v1/tasks?task_id=t1";

fn t1() -> RecordId {
    RecordId::server("t1")
}

#[tokio::test]
async fn serialize_edit_then_delete_runs_delete_after_edit_resolves() {
    let h = harness_with(ConcurrencyPolicy::Serialize);
    seed_tasks(&h, vec![task_json("t1", "Original")]).await;

    let gate = Arc::new(Notify::new());
    h.transport
        .respond_after(gate.clone(), Method::Put, TASKS, 500, json!({ "message": "boom" }));
    h.transport
        .respond(Method::Delete, DELETE_T1, 200, json!({ "rows_affected": 1 }));

    let store = h.tasks.clone();
    let edit = tokio::spawn(async move { store.edit(&t1(), TaskDraft::new("Renamed")).await });
    settle().await;
    assert_eq!(h.tasks.get(&t1()).unwrap().content, "Renamed");

    let store = h.tasks.clone();
    let delete = tokio::spawn(async move { store.remove(&t1()).await });
    settle().await;
    assert!(h.transport.requests_to(DELETE_T1).is_empty());
    assert_eq!(h.tasks.get(&t1()).unwrap().content, "Renamed");

    gate.notify_one();
    let err = edit.await.unwrap().unwrap_err();
    assert_matches!(err.source, ClientError::Status { status: 500, .. });
    delete.await.unwrap().unwrap();

    assert!(h.tasks.records().is_empty());
}

#[tokio::test]
async fn serialize_delete_then_edit_edits_the_restored_record() {
    let h = harness_with(ConcurrencyPolicy::Serialize);
    seed_tasks(&h, vec![task_json("t1", "Original")]).await;

    let gate = Arc::new(Notify::new());
    h.transport.respond_after(
        gate.clone(),
        Method::Delete,
        DELETE_T1,
        200,
        json!({ "rows_affected": 0 }),
    );
    h.transport
        .respond(Method::Put, TASKS, 200, envelope(task_json("t1", "Renamed")));

    let store = h.tasks.clone();
    let delete = tokio::spawn(async move { store.remove(&t1()).await });
    settle().await;
    assert!(h.tasks.records().is_empty());

    let store = h.tasks.clone();
    let edit = tokio::spawn(async move { store.edit(&t1(), TaskDraft::new("Renamed")).await });
    settle().await;
    assert!(h.transport.requests_to(TASKS).iter().all(|r| r.method != Method::Put));

    gate.notify_one();
    assert_matches!(
        delete.await.unwrap(),
        Err(ClientError::DeleteNotApplied { rows_affected: 0 })
    );
    let edited = edit.await.unwrap().unwrap();

    assert_eq!(edited.content, "Renamed");
    assert_eq!(h.tasks.records(), vec![edited]);
}

#[tokio::test]
async fn serialize_edit_then_edit_applies_in_order() {
    let h = harness_with(ConcurrencyPolicy::Serialize);
    seed_tasks(&h, vec![task_json("t1", "Original")]).await;

    let gate = Arc::new(Notify::new());
    h.transport
        .respond_after(gate.clone(), Method::Put, TASKS, 200, envelope(task_json("t1", "First")));
    h.transport
        .respond(Method::Put, TASKS, 200, envelope(task_json("t1", "Second")));

    let store = h.tasks.clone();
    let first = tokio::spawn(async move { store.edit(&t1(), TaskDraft::new("First")).await });
    settle().await;
    let store = h.tasks.clone();
    let second = tokio::spawn(async move { store.edit(&t1(), TaskDraft::new("Second")).await });
    settle().await;

    gate.notify_one();
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();

    assert_eq!(h.tasks.get(&t1()).unwrap().content, "Second");
}

#[tokio::test]
async fn supersede_edit_then_delete_does_not_resurrect_the_record() {
    let h = harness_with(ConcurrencyPolicy::Supersede);
    seed_tasks(&h, vec![task_json("t1", "Original")]).await;

    let gate = Arc::new(Notify::new());
    h.transport
        .respond_after(gate.clone(), Method::Put, TASKS, 500, json!({ "message": "boom" }));
    h.transport
        .respond(Method::Delete, DELETE_T1, 200, json!({ "rows_affected": 1 }));

    let store = h.tasks.clone();
    let edit = tokio::spawn(async move { store.edit(&t1(), TaskDraft::new("Renamed")).await });
    settle().await;

    h.tasks.remove(&t1()).await.unwrap();
    assert!(h.tasks.records().is_empty());

    gate.notify_one();
    let err = edit.await.unwrap().unwrap_err();
    assert_matches!(err.source, ClientError::Status { status: 500, .. });
    assert!(h.tasks.records().is_empty());
}

#[tokio::test]
async fn supersede_delete_then_edit_rolls_back_the_failed_delete() {
    let h = harness_with(ConcurrencyPolicy::Supersede);
    seed_tasks(&h, vec![task_json("t1", "Original")]).await;
    let before = h.tasks.records();

    let gate = Arc::new(Notify::new());
    h.transport.respond_after(
        gate.clone(),
        Method::Delete,
        DELETE_T1,
        200,
        json!({ "rows_affected": 0 }),
    );

    let store = h.tasks.clone();
    let delete = tokio::spawn(async move { store.remove(&t1()).await });
    settle().await;

    // The record is optimistically gone, so the edit has nothing to apply to.
    let err = h
        .tasks
        .edit(&t1(), TaskDraft::new("Renamed"))
        .await
        .unwrap_err();
    assert_matches!(err.source, ClientError::NotFound(_));

    gate.notify_one();
    assert_matches!(
        delete.await.unwrap(),
        Err(ClientError::DeleteNotApplied { rows_affected: 0 })
    );
    assert_eq!(h.tasks.records(), before);
}

#[tokio::test]
async fn supersede_keeps_the_latest_edit() {
    let h = harness_with(ConcurrencyPolicy::Supersede);
    seed_tasks(&h, vec![task_json("t1", "Original")]).await;

    let gate = Arc::new(Notify::new());
    h.transport
        .respond_after(gate.clone(), Method::Put, TASKS, 200, envelope(task_json("t1", "First")));
    h.transport
        .respond(Method::Put, TASKS, 200, envelope(task_json("t1", "Second")));

    let store = h.tasks.clone();
    let first = tokio::spawn(async move { store.edit(&t1(), TaskDraft::new("First")).await });
    settle().await;

    h.tasks.edit(&t1(), TaskDraft::new("Second")).await.unwrap();
    assert_eq!(h.tasks.get(&t1()).unwrap().content, "Second");

    gate.notify_one();
    let stale = first.await.unwrap().unwrap();
    assert_eq!(stale.content, "First");
    assert_eq!(h.tasks.get(&t1()).unwrap().content, "Second");
}

#[tokio::test]
async fn rollback_only_touches_its_own_record_when_others_changed() {
    let h = harness();
    seed_tasks(&h, vec![task_json("t1", "First"), task_json("t2", "Second")]).await;

    let gate = Arc::new(Notify::new());
    h.transport.respond_after(
        gate.clone(),
        Method::Put,
        "/v1/tasks/t1/toggle",
        500,
        json!({ "message": "boom" }),
    );
    h.transport.respond(
        Method::Delete,
        "/v1/tasks?task_id=t2",
        200,
        json!({ "rows_affected": 1 }),
    );

    let store = h.tasks.clone();
    let toggle = tokio::spawn(async move { store.toggle(&t1()).await });
    settle().await;

    h.tasks.remove(&RecordId::server("t2")).await.unwrap();

    gate.notify_one();
    assert!(toggle.await.unwrap().is_err());

    let records = h.tasks.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id, t1());
    assert!(!records[0].is_completed);
}
