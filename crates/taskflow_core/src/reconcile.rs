//! crates/taskflow_core/src/reconcile.rs
//!
//! Pure collection edits used by the optimistic-update protocol. Every
//! function takes the collection by `&mut` so callers can run them inside a
//! single atomic publish.

use crate::domain::RecordId;
use crate::resource::{Completable, Resource};
use chrono::{DateTime, Utc};

pub fn position<R: Resource>(records: &[R], id: &RecordId) -> Option<usize> {
    records.iter().position(|r| r.id() == id)
}

pub fn find<'a, R: Resource>(records: &'a [R], id: &RecordId) -> Option<&'a R> {
    records.iter().find(|r| r.id() == id)
}

/// Replaces the record with the same id. Returns `false` if it is not present.
pub fn replace<R: Resource>(records: &mut [R], record: R) -> bool {
    match position(records, record.id()) {
        Some(idx) => {
            records[idx] = record;
            true
        }
        None => false,
    }
}

/// Removes the record with `id`, returning it and its former index.
pub fn remove<R: Resource>(records: &mut Vec<R>, id: &RecordId) -> Option<(usize, R)> {
    let idx = position(records, id)?;
    Some((idx, records.remove(idx)))
}

/// Flips the completion flag of the record with `id`, returning the new version.
pub fn toggle<R: Completable>(records: &mut [R], id: &RecordId, now: DateTime<Utc>) -> Option<R> {
    let idx = position(records, id)?;
    let toggled = records[idx].toggled(now);
    records[idx] = toggled.clone();
    Some(toggled)
}

/// Swaps an optimistic placeholder for the server's record.
///
/// The placeholder is filtered out rather than replaced in place, and any
/// copy of the created record that arrived meanwhile (e.g. via revalidation)
/// is dropped too, so the collection never holds the created record twice.
pub fn swap_placeholder<R: Resource>(records: &mut Vec<R>, temporary: &RecordId, created: R) {
    records.retain(|r| r.id() != temporary && r.id() != created.id());
    records.push(created);
}

/// Restores a single record to how it looked in `snapshot`.
///
/// Records absent from the snapshot (optimistic inserts) are removed; records
/// absent from the current collection (optimistic deletes) are re-inserted at
/// their former index.
pub fn restore_record<R: Resource>(records: &mut Vec<R>, snapshot: &[R], id: &RecordId) {
    match (position(snapshot, id), position(records, id)) {
        (Some(old), Some(current)) => records[current] = snapshot[old].clone(),
        (Some(old), None) => {
            let at = old.min(records.len());
            records.insert(at, snapshot[old].clone());
        }
        (None, Some(current)) => {
            records.remove(current);
        }
        (None, None) => {}
    }
}
