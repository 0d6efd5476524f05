//! Import/merge policy: may a remote record overwrite the local one?
//!
//! | local record                         | decision                      |
//! |--------------------------------------|-------------------------------|
//! | absent                               | overwrite (fresh insert)      |
//! | pending or completed deletion        | skip: deletion in progress    |
//! | `NotSynchronized` / `Pending`        | skip: local edit pending      |
//! | `Synchronized`, same content         | skip: unchanged               |
//! | `Synchronized`, different content    | overwrite                     |
//!
//! Local edits win over remote snapshots until they have been pushed; the
//! next successful push makes the two sides agree again.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::StoreError;
use crate::state::DeletionState;
use crate::store::StoreTransaction;
use crate::types::{RemoteTodo, TodoRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeDecision {
    Overwrite,
    Skip(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The local record has an edit the remote has not acknowledged.
    LocalEditPending,
    /// The local record is in the trash or awaiting purge.
    DeletionInProgress,
    /// The remote content is what we already have.
    Unchanged,
}

/// Decide what to do with `remote` given the local record with the same id.
pub fn decide(remote: &RemoteTodo, local: Option<&TodoRecord>) -> MergeDecision {
    let Some(local) = local else {
        return MergeDecision::Overwrite;
    };
    if local.deletion_state != DeletionState::NotDeleted {
        return MergeDecision::Skip(SkipReason::DeletionInProgress);
    }
    if local.sync_state.has_unacknowledged_edit() {
        return MergeDecision::Skip(SkipReason::LocalEditPending);
    }
    if local.content_matches(remote) {
        return MergeDecision::Skip(SkipReason::Unchanged);
    }
    MergeDecision::Overwrite
}

/// Counts from one `import_batch`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl ImportSummary {
    pub fn written(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Apply the policy to every remote record inside the caller's transaction.
pub fn import_batch(
    txn: &mut dyn StoreTransaction,
    remote: &[RemoteTodo],
    now: DateTime<Utc>,
) -> Result<ImportSummary, StoreError> {
    let mut summary = ImportSummary::default();
    for incoming in remote {
        let entry = txn.find_or_create(incoming.id)?;
        let local = (!entry.created).then_some(&entry.record);
        match decide(incoming, local) {
            MergeDecision::Overwrite => {
                let mut record = entry.record;
                record.overwrite_from(incoming, now);
                txn.save(&record)?;
                if entry.created {
                    summary.inserted += 1;
                } else {
                    summary.updated += 1;
                }
            }
            MergeDecision::Skip(reason) => {
                debug!(id = %incoming.id, ?reason, "import skipped");
                summary.skipped += 1;
            }
        }
    }
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SyncState;
    use crate::store::{MemoryStore, Predicate, RecordStore};
    use crate::types::{timestamp_now, TodoId};
    use pretty_assertions::assert_eq;

    fn remote(id: i64, title: &str) -> RemoteTodo {
        RemoteTodo {
            id: TodoId::new(id),
            owner_id: id,
            title: title.to_string(),
            completed: false,
        }
    }

    fn local(id: i64, title: &str, sync: SyncState) -> TodoRecord {
        let mut record = TodoRecord::new_local(TodoId::new(id), id, title, timestamp_now());
        record.sync_state = sync;
        record
    }

    #[test]
    fn decision_table() {
        let incoming = remote(1, "remote");
        assert_eq!(decide(&incoming, None), MergeDecision::Overwrite);
        assert_eq!(
            decide(&incoming, Some(&local(1, "mine", SyncState::Synchronized))),
            MergeDecision::Overwrite
        );
        assert_eq!(
            decide(&incoming, Some(&local(1, "mine", SyncState::NotSynchronized))),
            MergeDecision::Skip(SkipReason::LocalEditPending)
        );
        assert_eq!(
            decide(&incoming, Some(&local(1, "mine", SyncState::SynchronizationPending))),
            MergeDecision::Skip(SkipReason::LocalEditPending)
        );
        assert_eq!(
            decide(&incoming, Some(&local(1, "remote", SyncState::Synchronized))),
            MergeDecision::Skip(SkipReason::Unchanged)
        );
    }

    #[test]
    fn deletion_blocks_import_regardless_of_sync_state() {
        let incoming = remote(1, "remote");
        for deletion in [DeletionState::DeletionPending, DeletionState::Deleted] {
            let mut record = local(1, "mine", SyncState::Synchronized);
            record.deletion_state = deletion;
            assert_eq!(
                decide(&incoming, Some(&record)),
                MergeDecision::Skip(SkipReason::DeletionInProgress)
            );
        }
    }

    #[test]
    fn import_batch_keeps_unsynchronized_edits() {
        // 4 local edits that were never pushed, 6 synchronized records.
        let records = (1..=4)
            .map(|id| local(id, "Some title", SyncState::NotSynchronized))
            .chain((5..=10).map(|id| local(id, "Some title", SyncState::Synchronized)));
        let store = MemoryStore::with_records(records);
        let incoming: Vec<RemoteTodo> = (1..=10).map(|id| remote(id, "Updated title")).collect();

        let summary = store
            .with_transaction(|txn| import_batch(txn, &incoming, timestamp_now()))
            .unwrap();
        assert_eq!(summary, ImportSummary {
            inserted: 0,
            updated: 6,
            skipped: 4
        });

        for record in store.query(Predicate::All).unwrap() {
            if record.id.get() <= 4 {
                assert_eq!(record.title, "Some title");
                assert_eq!(record.sync_state, SyncState::NotSynchronized);
            } else {
                assert_eq!(record.title, "Updated title");
                assert_eq!(record.sync_state, SyncState::Synchronized);
            }
        }
    }

    #[test]
    fn import_batch_inserts_unknown_ids_as_synchronized() {
        let store = MemoryStore::new();
        let summary = store
            .with_transaction(|txn| import_batch(txn, &[remote(1, "a"), remote(2, "b")], timestamp_now()))
            .unwrap();
        assert_eq!(summary.inserted, 2);
        assert_eq!(summary.written(), 2);

        let all = store.query(Predicate::All).unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().all(|r| r.sync_state == SyncState::Synchronized));
        assert!(all.iter().all(|r| r.last_synced_at.is_some()));
    }

    #[test]
    fn import_batch_never_duplicates_ids() {
        let store = MemoryStore::new();
        store
            .with_transaction(|txn| import_batch(txn, &[remote(1, "a"), remote(1, "b")], timestamp_now()))
            .unwrap();
        let all = store.query(Predicate::All).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "b");
    }

    #[test]
    fn unchanged_import_keeps_updated_at() {
        let mut record = local(1, "same", SyncState::Synchronized);
        record.updated_at -= chrono::Duration::seconds(30);
        let before = record.updated_at;
        let store = MemoryStore::with_records([record]);

        let summary = store
            .with_transaction(|txn| import_batch(txn, &[remote(1, "same")], timestamp_now()))
            .unwrap();
        assert_eq!(summary.skipped, 1);
        assert_eq!(store.find(TodoId::new(1)).unwrap().unwrap().updated_at, before);
    }
}
