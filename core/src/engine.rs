//! Reconciliation orchestrator and local operations.
//!
//! # Design
//! `SyncEngine` owns no timers and no background tasks; the host calls
//! `run_reconciliation_cycle` when it wants to converge. A cycle runs the
//! content-sync pass and the deletion-sync pass concurrently. The two passes
//! work on disjoint record sets: content sync never picks up a record that
//! is awaiting purge, and deletion sync only touches those.
//!
//! Every state change is committed in a store transaction before the next
//! remote call, so dropping a cycle future at any await point leaves the
//! store consistent. Records left `SynchronizationPending` by an interrupted
//! push are reset at the start of the next content-sync pass.
//!
//! Remote failures never escape a pass: they are rolled back and reported
//! as `PassOutcome::RolledBack`. Store failures abort the pass with `Err`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, instrument, warn, Instrument, Span};

use crate::config::{EngineConfig, MissingRemotePolicy};
use crate::error::{ApiError, Result, StoreError, SyncError};
use crate::merge::{self, ImportSummary};
use crate::remote::RemoteClient;
use crate::state::{DeletionEvent, SyncEvent, SyncState, TransitionError};
use crate::store::{Predicate, RecordStore, StoreTransaction};
use crate::types::{timestamp_now, RemoteTodo, TodoEdit, TodoId, TodoRecord};

/// Attempts at drawing an unused random id before giving up.
const ID_ATTEMPTS: usize = 16;

/// What a single pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Nothing to do.
    Idle,
    /// The remote acknowledged `records` pushes or deletes.
    Completed { records: usize },
    /// A pull imported the remote's records.
    Imported(ImportSummary),
    /// The remote failed; `records` were returned to their pre-pass state
    /// and will be retried by the next cycle.
    RolledBack { records: usize, cause: ApiError },
}

/// Result of one reconciliation cycle, per pass.
#[derive(Debug)]
pub struct CycleReport {
    pub content: Result<PassOutcome>,
    pub deletion: Result<PassOutcome>,
    /// Present when the cycle was configured to pull.
    pub pull: Option<Result<PassOutcome>>,
}

impl CycleReport {
    fn passes(&self) -> impl Iterator<Item = (&'static str, &Result<PassOutcome>)> {
        [("content", Some(&self.content)), ("deletion", Some(&self.deletion)), ("pull", self.pull.as_ref())]
            .into_iter()
            .filter_map(|(name, outcome)| Some((name, outcome?)))
    }

    /// Every pass succeeded and none rolled back.
    pub fn is_clean(&self) -> bool {
        self.passes()
            .all(|(_, outcome)| matches!(outcome, Ok(o) if !matches!(o, PassOutcome::RolledBack { .. })))
    }

    /// Local failures that aborted a pass.
    pub fn errors(&self) -> impl Iterator<Item = &SyncError> {
        self.passes().filter_map(|(_, outcome)| outcome.as_ref().err())
    }
}

/// What `request_hard_delete` did with the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardDeleteOutcome {
    /// The record never reached the remote and was removed right away.
    Purged,
    /// The record is marked `Deleted` and waits for the deletion pass.
    Scheduled,
}

pub struct SyncEngine<S, R> {
    store: Arc<S>,
    remote: Arc<R>,
    config: EngineConfig,
}

impl<S, R> Clone for SyncEngine<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            remote: Arc::clone(&self.remote),
            config: self.config.clone(),
        }
    }
}

impl<S: RecordStore, R: RemoteClient> SyncEngine<S, R> {
    pub fn new(store: Arc<S>, remote: Arc<R>, config: EngineConfig) -> Self {
        Self { store, remote, config }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn remote(&self) -> &Arc<R> {
        &self.remote
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ---------------------------------------------------------------
    // Reconciliation
    // ---------------------------------------------------------------

    /// Run both passes concurrently (then the pull, if configured).
    /// Never fails as a whole; each pass reports separately.
    #[instrument(name = "cycle", skip_all)]
    pub async fn run_reconciliation_cycle(&self) -> CycleReport {
        let (content, deletion) = tokio::join!(self.content_sync(), self.deletion_sync());
        let pull = if self.config.pull_on_cycle {
            Some(self.pull_remote().await)
        } else {
            None
        };
        let report = CycleReport { content, deletion, pull };
        for (pass, outcome) in report.passes() {
            match outcome {
                Ok(PassOutcome::Idle) => debug!(pass, "idle"),
                Ok(PassOutcome::RolledBack { records, cause }) => {
                    warn!(pass, records, %cause, "rolled back")
                }
                Ok(outcome) => info!(pass, ?outcome, "done"),
                Err(err) => error!(pass, %err, "aborted"),
            }
        }
        report
    }

    /// Push every unsynchronized record and adopt the remote's canonical copy.
    #[instrument(name = "content_sync", skip_all)]
    pub async fn content_sync(&self) -> Result<PassOutcome> {
        self.reset_in_flight()?;

        let candidates: Vec<TodoId> = self
            .store
            .query(Predicate::NotSynchronized)?
            .into_iter()
            .map(|record| record.id)
            .collect();
        if candidates.is_empty() {
            return Ok(PassOutcome::Idle);
        }

        let batch = self.store.with_transaction(|txn| {
            let mut batch = Vec::with_capacity(candidates.len());
            for id in &candidates {
                let Some(mut record) = txn.find(*id)? else {
                    continue;
                };
                if !record.is_push_eligible() {
                    continue;
                }
                record.sync_state = record.sync_state.apply(SyncEvent::SyncStarted)?;
                txn.save(&record)?;
                batch.push(record.to_remote());
            }
            Ok::<_, SyncError>(batch)
        })?;
        if batch.is_empty() {
            return Ok(PassOutcome::Idle);
        }

        let pushed: Vec<TodoId> = batch.iter().map(|todo| todo.id).collect();
        debug!(records = pushed.len(), "pushing");

        let canonical = match self
            .remote
            .push_batch(batch)
            .await
            .and_then(|canonical| covers_pushed(&pushed, canonical))
        {
            Ok(canonical) => canonical,
            Err(cause) => {
                self.roll_back(&pushed)?;
                return Ok(PassOutcome::RolledBack {
                    records: pushed.len(),
                    cause,
                });
            }
        };

        let now = timestamp_now();
        let acknowledged = match self.acknowledge(&pushed, now) {
            Ok(acknowledged) => acknowledged,
            Err(err) => {
                self.roll_back(&pushed)?;
                return Err(err);
            }
        };
        debug!(acknowledged, "push acknowledged");

        match self
            .store
            .with_transaction(|txn| merge::import_batch(txn, &canonical, now))
        {
            Ok(summary) => debug!(
                written = summary.written(),
                skipped = summary.skipped,
                "canonical records imported"
            ),
            Err(err) => {
                self.roll_back(&pushed)?;
                return Err(err.into());
            }
        }
        Ok(PassOutcome::Completed { records: pushed.len() })
    }

    /// Delete every hard-deleted record remotely, then purge them locally.
    /// All or nothing: one failure leaves every record `Deleted` for the
    /// next cycle.
    #[instrument(name = "deletion_sync", skip_all)]
    pub async fn deletion_sync(&self) -> Result<PassOutcome> {
        let doomed: Vec<TodoId> = self
            .store
            .query(Predicate::Deleted)?
            .into_iter()
            .map(|record| record.id)
            .collect();
        if doomed.is_empty() {
            return Ok(PassOutcome::Idle);
        }

        if let Err(cause) = self.delete_all_remote(&doomed).await {
            self.store.with_transaction(|txn| {
                for id in &doomed {
                    let Some(mut record) = txn.find(*id)? else {
                        continue;
                    };
                    record.deletion_state = record.deletion_state.apply(DeletionEvent::DeleteFailed)?;
                    txn.save(&record)?;
                }
                Ok::<_, SyncError>(())
            })?;
            return Ok(PassOutcome::RolledBack {
                records: doomed.len(),
                cause,
            });
        }

        let purged = self.store.with_transaction(|txn| {
            let mut purged = 0;
            for id in &doomed {
                if let Some(record) = txn.find(*id)?.filter(TodoRecord::is_purge_eligible) {
                    record.deletion_state.apply(DeletionEvent::DeleteSucceeded)?;
                    if txn.purge(*id)? {
                        purged += 1;
                    }
                }
            }
            Ok::<_, SyncError>(purged)
        })?;
        Ok(PassOutcome::Completed { records: purged })
    }

    /// Fetch the remote's full list and import it under the merge policy.
    #[instrument(name = "pull", skip_all)]
    pub async fn pull_remote(&self) -> Result<PassOutcome> {
        let remote = match self.remote.fetch_all().await {
            Ok(remote) => remote,
            Err(cause) => return Ok(PassOutcome::RolledBack { records: 0, cause }),
        };
        let now = timestamp_now();
        let summary = self
            .store
            .with_transaction(|txn| merge::import_batch(txn, &remote, now))?;
        Ok(PassOutcome::Imported(summary))
    }

    /// Records still marked in flight when a pass starts belong to a push
    /// that never resolved. Nothing else marks records in flight, so they go
    /// back to `NotSynchronized` and are pushed again.
    fn reset_in_flight(&self) -> Result<()> {
        let stale = self.store.query(Predicate::InFlight)?;
        if stale.is_empty() {
            return Ok(());
        }
        warn!(records = stale.len(), "resetting records left in flight");
        let ids: Vec<TodoId> = stale.into_iter().map(|record| record.id).collect();
        self.roll_back(&ids)
    }

    /// Apply `SyncFailed` to every record of a push that did not complete.
    fn roll_back(&self, ids: &[TodoId]) -> Result<()> {
        self.store.with_transaction(|txn| {
            for id in ids {
                let Some(mut record) = txn.find(*id)? else {
                    continue;
                };
                record.sync_state = record.sync_state.apply(SyncEvent::SyncFailed)?;
                txn.save(&record)?;
            }
            Ok(())
        })
    }

    /// Mark the pushed records synchronized. A record edited while the push
    /// was in flight is already `NotSynchronized` again and stays that way,
    /// but it now exists remotely. Returns how many became `Synchronized`.
    fn acknowledge(&self, pushed: &[TodoId], now: DateTime<Utc>) -> Result<usize> {
        self.store.with_transaction(|txn| {
            let mut acknowledged = 0;
            for id in pushed {
                let Some(mut record) = txn.find(*id)? else {
                    continue;
                };
                record.last_synced_at = Some(now);
                if record.sync_state == SyncState::SynchronizationPending {
                    record.sync_state = record.sync_state.apply(SyncEvent::SyncSucceeded)?;
                    acknowledged += 1;
                } else {
                    debug!(%id, "edited during push, left for next cycle");
                }
                txn.save(&record)?;
            }
            Ok(acknowledged)
        })
    }

    /// Fan the remote deletes out, at most `max_concurrent_deletes` at once.
    /// Stops at the first failure and cancels what is still running.
    async fn delete_all_remote(&self, ids: &[TodoId]) -> std::result::Result<(), ApiError> {
        let limit = Arc::new(Semaphore::new(self.config.max_concurrent_deletes));
        let policy = self.config.missing_on_delete;
        let mut tasks = JoinSet::new();
        for &id in ids {
            let remote = Arc::clone(&self.remote);
            let limit = Arc::clone(&limit);
            tasks.spawn(
                async move {
                    // The semaphore is never closed.
                    let _permit = limit.acquire_owned().await;
                    match remote.delete_remote(id).await {
                        Ok(()) => Ok(()),
                        Err(err) if err.is_not_found() && policy == MissingRemotePolicy::AlreadyDeleted => {
                            debug!(%id, "already gone remotely");
                            Ok(())
                        }
                        Err(err) => Err((id, err)),
                    }
                }
                .instrument(Span::current()),
            );
        }

        while let Some(joined) = tasks.join_next().await {
            let cause = match joined {
                Ok(Ok(())) => continue,
                Ok(Err((id, cause))) => {
                    debug!(%id, %cause, "remote delete failed");
                    cause
                }
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                Err(err) => ApiError::Transport(err.to_string()),
            };
            tasks.abort_all();
            return Err(cause);
        }
        Ok(())
    }

    // ---------------------------------------------------------------
    // Local operations
    // ---------------------------------------------------------------

    /// Create a record on this device with a fresh random id.
    pub fn create_local(&self, title: impl Into<String>, owner_id: i64) -> Result<TodoRecord> {
        let title = title.into();
        self.store.with_transaction(|txn| {
            for _ in 0..ID_ATTEMPTS {
                let id = TodoId::random_local();
                if txn.contains(id)? {
                    continue;
                }
                let record = TodoRecord::new_local(id, owner_id, title, timestamp_now());
                txn.save(&record)?;
                debug!(%id, "created");
                return Ok(record);
            }
            Err(StoreError::Constraint("no unused local id found".into()).into())
        })
    }

    /// Change title and/or completion. An edit that changes nothing leaves
    /// the record untouched.
    pub fn edit_local(&self, id: TodoId, edit: &TodoEdit) -> Result<TodoRecord> {
        self.store.with_transaction(|txn| {
            let mut record = load(txn, id)?;
            if !record.is_visible() {
                return Err(TransitionError::new(
                    record.deletion_state.name(),
                    SyncEvent::LocalEdit.name(),
                )
                .into());
            }
            if !record.apply_edit(edit) {
                return Ok(record);
            }
            record.sync_state = record.sync_state.apply(SyncEvent::LocalEdit)?;
            record.updated_at = timestamp_now();
            txn.save(&record)?;
            debug!(%id, "edited");
            Ok(record)
        })
    }

    /// Move a record to the trash.
    pub fn request_soft_delete(&self, id: TodoId) -> Result<TodoRecord> {
        self.store.with_transaction(|txn| {
            let mut record = load(txn, id)?;
            record.deletion_state = record.deletion_state.apply(DeletionEvent::SoftDeleteRequested)?;
            let now = timestamp_now();
            record.deleted_at = Some(now);
            record.updated_at = now;
            txn.save(&record)?;
            debug!(%id, "moved to trash");
            Ok(record)
        })
    }

    /// Confirm deletion. A record the remote has never seen is purged
    /// immediately; anything else waits for the deletion pass.
    pub fn request_hard_delete(&self, id: TodoId) -> Result<HardDeleteOutcome> {
        self.store.with_transaction(|txn| {
            let mut record = load(txn, id)?;
            record.deletion_state = record.deletion_state.apply(DeletionEvent::HardDeleteRequested)?;
            if record.is_local_only() {
                txn.purge(id)?;
                debug!(%id, "purged local-only record");
                return Ok(HardDeleteOutcome::Purged);
            }
            let now = timestamp_now();
            record.deleted_at.get_or_insert(now);
            record.updated_at = now;
            txn.save(&record)?;
            debug!(%id, "scheduled for remote delete");
            Ok(HardDeleteOutcome::Scheduled)
        })
    }

    /// Take a record back out of the trash.
    pub fn request_restore(&self, id: TodoId) -> Result<TodoRecord> {
        self.store.with_transaction(|txn| {
            let mut record = load(txn, id)?;
            record.deletion_state = record.deletion_state.apply(DeletionEvent::RestoreRequested)?;
            record.deleted_at = None;
            record.updated_at = timestamp_now();
            txn.save(&record)?;
            debug!(%id, "restored");
            Ok(record)
        })
    }

    /// The normal list, newest first.
    pub fn list_visible(&self) -> Result<Vec<TodoRecord>> {
        Ok(self.store.query(Predicate::Visible)?)
    }

    /// The trash, newest first.
    pub fn list_trash(&self) -> Result<Vec<TodoRecord>> {
        Ok(self.store.query(Predicate::DeletionPending)?)
    }
}

fn load(txn: &dyn StoreTransaction, id: TodoId) -> Result<TodoRecord> {
    txn.find(id)?.ok_or(SyncError::NotFound(id))
}

/// A push only counts when the canonical response holds every pushed id.
fn covers_pushed(
    pushed: &[TodoId],
    canonical: Vec<RemoteTodo>,
) -> std::result::Result<Vec<RemoteTodo>, ApiError> {
    let missing = pushed
        .iter()
        .filter(|id| canonical.iter().all(|todo| todo.id != **id))
        .count();
    if missing > 0 {
        return Err(ApiError::Deserialization(format!(
            "{missing} of {} pushed records missing from the response",
            pushed.len()
        )));
    }
    Ok(canonical)
}
