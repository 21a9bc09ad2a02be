//! services/client/src/store.rs
//!
//! The cache-backed resource store: one authoritative in-memory collection per
//! resource type, revalidated from the server and mutated optimistically.
//!
//! Every mutation runs the same three phases:
//!
//! 1. **Optimistic apply.** Validate, snapshot the collection by value, apply
//!    the expected effect and publish it, all in one `send_if_modified`.
//! 2. **Network commit.** Send the normalized payload.
//! 3. **Reconcile or roll back.** On success the server's record replaces the
//!    optimistic one. On failure the snapshot is restored and the error is
//!    returned to the caller.
//!
//! Overlapping mutations on the same record are governed by an explicit
//! [`ConcurrencyPolicy`].

use chrono::{Local, NaiveDate, Utc};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, PoisonError};
use taskflow_core::domain::{RecordId, ValidationError};
use taskflow_core::reconcile;
use taskflow_core::resource::Completable;
use tokio::sync::{watch, Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::config::ResourceEndpoints;
use crate::error::{ClientError, ClientResult};
use crate::resource::ResourceClient;
use crate::wire::RemoteResource;

//=========================================================================================
// Policy, State & Errors
//=========================================================================================

/// What happens when a mutation targets a record that already has one in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyPolicy {
    /// The later mutation waits until the earlier one has reconciled or
    /// rolled back, then runs against the resulting state.
    #[default]
    Serialize,
    /// The later mutation runs immediately. When the earlier one resolves it
    /// neither reconciles nor rolls back; its result only goes to its caller.
    Supersede,
}

impl FromStr for ConcurrencyPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serialize" => Ok(Self::Serialize),
            "supersede" => Ok(Self::Supersede),
            other => Err(format!(
                "'{}' is not a concurrency policy (expected 'serialize' or 'supersede')",
                other
            )),
        }
    }
}

/// What subscribers observe.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheState<R> {
    pub records: Vec<R>,
    pub is_loading: bool,
    pub last_error: Option<String>,
    version: u64,
}

impl<R> CacheState<R> {
    /// Bumped by every publish that changes `records`.
    pub fn version(&self) -> u64 {
        self.version
    }
}

impl<R> Default for CacheState<R> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            is_loading: false,
            last_error: None,
            version: 0,
        }
    }
}

/// A failed create or edit. Carries the submitted draft back so the form can
/// be shown again unchanged.
#[derive(Debug)]
pub struct MutationError<D> {
    pub draft: D,
    pub source: ClientError,
}

impl<D> MutationError<D> {
    fn new(draft: D, source: impl Into<ClientError>) -> Self {
        Self {
            draft,
            source: source.into(),
        }
    }
}

impl<D> fmt::Display for MutationError<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.source.fmt(f)
    }
}

impl<D: fmt::Debug> std::error::Error for MutationError<D> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}

impl<D> From<MutationError<D>> for ClientError {
    fn from(err: MutationError<D>) -> Self {
        err.source
    }
}

/// The collection as it was before one mutation's optimistic apply.
struct Snapshot<R> {
    records: Vec<R>,
    /// Version published by that apply. If it is still current at rollback
    /// time, nothing else has touched the collection since.
    applied_version: u64,
}

//=========================================================================================
// In-flight Tracking
//=========================================================================================

#[derive(Default)]
struct Slot {
    lock: Arc<AsyncMutex<()>>,
    generation: u64,
    in_flight: usize,
}

type Slots = Arc<Mutex<HashMap<RecordId, Slot>>>;

/// Held for the lifetime of one mutation. Dropping it releases the record.
struct Ticket {
    slots: Slots,
    id: RecordId,
    /// Set once this mutation's optimistic apply has been published.
    generation: u64,
    _guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(&self.id) {
            slot.in_flight -= 1;
            if slot.in_flight == 0 {
                slots.remove(&self.id);
            }
        }
    }
}

//=========================================================================================
// The Store
//=========================================================================================

pub struct ResourceStore<R: RemoteResource> {
    resources: ResourceClient,
    endpoints: ResourceEndpoints,
    policy: ConcurrencyPolicy,
    state: watch::Sender<CacheState<R>>,
    slots: Slots,
}

impl<R: RemoteResource> ResourceStore<R> {
    pub fn new(
        resources: ResourceClient,
        endpoints: ResourceEndpoints,
        policy: ConcurrencyPolicy,
    ) -> Self {
        let (state, _) = watch::channel(CacheState::default());
        Self {
            resources,
            endpoints,
            policy,
            state,
            slots: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn cache_name(&self) -> &'static str {
        R::CACHE_NAME
    }

    pub fn policy(&self) -> ConcurrencyPolicy {
        self.policy
    }

    pub fn subscribe(&self) -> watch::Receiver<CacheState<R>> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CacheState<R> {
        self.state.borrow().clone()
    }

    pub fn records(&self) -> Vec<R> {
        self.state.borrow().records.clone()
    }

    pub fn get(&self, id: &RecordId) -> Option<R> {
        reconcile::find(&self.state.borrow().records, id).cloned()
    }

    //-------------------------------------------------------------------------------------
    // Revalidation
    //-------------------------------------------------------------------------------------

    /// Replaces the collection with the server's. Optimistic inserts that are
    /// still waiting for their create call are kept at the end.
    pub async fn revalidate(&self) -> ClientResult<()> {
        self.state.send_modify(|s| s.is_loading = true);

        let result = self
            .resources
            .fetch::<Vec<R::Record>>(&self.endpoints.collection)
            .await;

        match result {
            Ok(records) => {
                let fresh: Vec<R> = records.into_iter().map(R::from_record).collect();
                let count = fresh.len();
                self.state.send_modify(|s| {
                    let pending: Vec<R> = s
                        .records
                        .iter()
                        .filter(|r| r.id().is_temporary())
                        .cloned()
                        .collect();
                    s.records = fresh;
                    s.records.extend(pending);
                    s.is_loading = false;
                    s.last_error = None;
                    s.version += 1;
                });
                debug!(cache = R::CACHE_NAME, count, "Revalidated");
                Ok(())
            }
            Err(e) => {
                warn!(cache = R::CACHE_NAME, error = %e, "Revalidation failed");
                self.state.send_modify(|s| {
                    s.is_loading = false;
                    s.last_error = Some(e.to_string());
                });
                Err(e)
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Mutations
    //-------------------------------------------------------------------------------------

    /// Creates a record. A placeholder with a temporary id is shown until the
    /// server answers, then swapped for the server's record.
    pub async fn create(&self, draft: R::Draft) -> Result<R, MutationError<R::Draft>> {
        let fields = match R::normalize(&draft, today()) {
            Ok(fields) => fields,
            Err(e) => return Err(MutationError::new(draft, e)),
        };

        let temporary = RecordId::temporary();
        let mut ticket = self.begin(&temporary).await;

        let placeholder = R::placeholder(temporary.clone(), &fields, Utc::now());
        let Some((snapshot, ())) = self.apply(&mut ticket, |records| {
            records.push(placeholder);
            Some(())
        }) else {
            return Err(MutationError::new(
                draft,
                ClientError::Internal("optimistic insert was not applied".to_string()),
            ));
        };
        debug!(cache = R::CACHE_NAME, id = %temporary, "Optimistic insert");

        let payload = R::create_payload(&fields);
        let result = async {
            self.resources
                .create::<_, R::Record>(&self.endpoints.collection, &payload)
                .await?
                .into_data()
        }
        .await;

        match result {
            Ok(record) => {
                let created = R::from_record(record);
                self.reconcile(&ticket, |records| {
                    reconcile::swap_placeholder(records, &temporary, created.clone());
                });
                info!(cache = R::CACHE_NAME, id = %created.id(), "Created");
                Ok(created)
            }
            Err(e) => {
                self.rollback(&ticket, snapshot, &temporary, &e);
                Err(MutationError::new(draft, e))
            }
        }
    }

    /// Replaces the editable fields of an existing record.
    pub async fn edit(&self, id: &RecordId, draft: R::Draft) -> Result<R, MutationError<R::Draft>> {
        let fields = match R::normalize(&draft, today()) {
            Ok(fields) => fields,
            Err(e) => return Err(MutationError::new(draft, e)),
        };
        let Some(server_id) = id.as_server() else {
            return Err(MutationError::new(draft, ValidationError::NotPersisted(id.clone())));
        };

        let mut ticket = self.begin(id).await;

        let applied = self.apply(&mut ticket, |records| {
            let current = reconcile::find(records, id)?.clone();
            reconcile::replace(records, current.with_fields(&fields));
            Some(current)
        });
        let Some((snapshot, current)) = applied else {
            return Err(MutationError::new(draft, ClientError::NotFound(id.clone())));
        };
        debug!(cache = R::CACHE_NAME, %id, "Optimistic edit");

        let payload = R::edit_payload(server_id, &current, &fields);
        let result = async {
            self.resources
                .edit::<_, R::Record>(&self.endpoints.edit, &payload, self.endpoints.edit_method)
                .await?
                .into_data()
        }
        .await;

        match result {
            Ok(record) => {
                let updated = R::from_record(record);
                self.reconcile(&ticket, |records| {
                    reconcile::replace(records, updated.clone());
                });
                info!(cache = R::CACHE_NAME, %id, "Edited");
                Ok(updated)
            }
            Err(e) => {
                self.rollback(&ticket, snapshot, id, &e);
                Err(MutationError::new(draft, e))
            }
        }
    }

    /// Deletes a record. Anything other than exactly one affected row is a
    /// failure and puts the record back.
    pub async fn remove(&self, id: &RecordId) -> ClientResult<()> {
        let server_id = id
            .as_server()
            .ok_or_else(|| ValidationError::NotPersisted(id.clone()))?;
        let path = self.endpoints.delete_path(server_id);

        let mut ticket = self.begin(id).await;

        let (snapshot, _) = self
            .apply(&mut ticket, |records| reconcile::remove(records, id))
            .ok_or_else(|| ClientError::NotFound(id.clone()))?;
        debug!(cache = R::CACHE_NAME, %id, "Optimistic delete");

        let result = match self.resources.remove_counted(&path).await {
            Ok(1) => Ok(()),
            Ok(rows_affected) => Err(ClientError::DeleteNotApplied { rows_affected }),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                self.reconcile(&ticket, |records| {
                    reconcile::remove(records, id);
                });
                info!(cache = R::CACHE_NAME, %id, "Deleted");
                Ok(())
            }
            Err(e) => {
                self.rollback(&ticket, snapshot, id, &e);
                Err(e)
            }
        }
    }

    //-------------------------------------------------------------------------------------
    // Phase helpers
    //-------------------------------------------------------------------------------------

    /// Registers a mutation of `id`. Under `Serialize` this waits for any
    /// earlier mutation of the same record to finish.
    async fn begin(&self, id: &RecordId) -> Ticket {
        let lock = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            let slot = slots.entry(id.clone()).or_default();
            slot.in_flight += 1;
            slot.lock.clone()
        };

        // Build the ticket before waiting so a cancelled wait still releases the slot.
        let mut ticket = Ticket {
            slots: self.slots.clone(),
            id: id.clone(),
            generation: 0,
            _guard: None,
        };
        if self.policy == ConcurrencyPolicy::Serialize {
            ticket._guard = Some(lock.lock_owned().await);
        }
        ticket
    }

    /// Whether this mutation may still write its outcome into the cache.
    fn is_current(&self, ticket: &Ticket) -> bool {
        if self.policy == ConcurrencyPolicy::Serialize {
            return true;
        }
        let slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        slots
            .get(&ticket.id)
            .map_or(true, |slot| slot.generation == ticket.generation)
    }

    /// Makes `ticket` the latest applied mutation of its record.
    fn claim(&self, ticket: &mut Ticket) {
        let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(slot) = slots.get_mut(&ticket.id) {
            slot.generation += 1;
            ticket.generation = slot.generation;
        }
    }

    /// Phase 1. Runs `f` against the collection and publishes the result in
    /// one step. Returns `None`, publishing nothing, when `f` does. Only a
    /// published apply claims the record.
    fn apply<T>(
        &self,
        ticket: &mut Ticket,
        f: impl FnOnce(&mut Vec<R>) -> Option<T>,
    ) -> Option<(Snapshot<R>, T)> {
        let mut outcome = None;
        self.state.send_if_modified(|state| {
            let before = state.records.clone();
            match f(&mut state.records) {
                Some(value) => {
                    state.version += 1;
                    self.claim(ticket);
                    outcome = Some((
                        Snapshot {
                            records: before,
                            applied_version: state.version,
                        },
                        value,
                    ));
                    true
                }
                None => false,
            }
        });
        outcome
    }

    /// Phase 3a.
    fn reconcile(&self, ticket: &Ticket, f: impl FnOnce(&mut Vec<R>)) {
        let applied = self.state.send_if_modified(|state| {
            if !self.is_current(ticket) {
                return false;
            }
            f(&mut state.records);
            state.version += 1;
            true
        });
        if !applied {
            debug!(cache = R::CACHE_NAME, id = %ticket.id, "Superseded; skipping reconciliation");
        }
    }

    /// Phase 3b. Restores the whole snapshot when nothing else has changed
    /// the collection since the optimistic apply, otherwise only the record
    /// this mutation touched.
    fn rollback(&self, ticket: &Ticket, snapshot: Snapshot<R>, id: &RecordId, error: &ClientError) {
        let rolled_back = self.state.send_if_modified(|state| {
            if !self.is_current(ticket) {
                return false;
            }
            if state.version == snapshot.applied_version {
                state.records = snapshot.records;
            } else {
                reconcile::restore_record(&mut state.records, &snapshot.records, id);
            }
            state.version += 1;
            true
        });
        if rolled_back {
            warn!(cache = R::CACHE_NAME, %id, %error, "Mutation failed; rolled back");
        } else {
            warn!(cache = R::CACHE_NAME, %id, %error, "Superseded mutation failed; not rolling back");
        }
    }
}

impl<R: RemoteResource + Completable> ResourceStore<R> {
    /// Flips the completion flag of a record.
    pub async fn toggle(&self, id: &RecordId) -> ClientResult<R> {
        let server_id = id
            .as_server()
            .ok_or_else(|| ValidationError::NotPersisted(id.clone()))?;
        let path = self.endpoints.toggle_path(server_id).ok_or_else(|| {
            ClientError::Internal(format!("{} has no toggle endpoint", R::CACHE_NAME))
        })?;

        let mut ticket = self.begin(id).await;

        let now = Utc::now();
        let (snapshot, _) = self
            .apply(&mut ticket, |records| reconcile::toggle(records, id, now))
            .ok_or_else(|| ClientError::NotFound(id.clone()))?;
        debug!(cache = R::CACHE_NAME, %id, "Optimistic toggle");

        let result = async {
            self.resources
                .edit::<_, R::Record>(&path, &serde_json::json!({}), self.endpoints.toggle_method)
                .await?
                .into_data()
        }
        .await;

        match result {
            Ok(record) => {
                let updated = R::from_record(record);
                self.reconcile(&ticket, |records| {
                    reconcile::replace(records, updated.clone());
                });
                Ok(updated)
            }
            Err(e) => {
                self.rollback(&ticket, snapshot, id, &e);
                Err(e)
            }
        }
    }
}

/// The local calendar day, used to anchor bare due times.
fn today() -> NaiveDate {
    Local::now().date_naive()
}
