//! Record store adapter.
//!
//! # Design
//! The engine only needs predicate queries, find-or-create by id, and scoped
//! transactional writes, so that is the whole contract. Reads used to build
//! a pass's work set may happen outside a transaction; every mutation goes
//! through `with_transaction`, which commits only when the body returns `Ok`
//! and discards every write otherwise.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use std::cmp::Reverse;

use crate::error::StoreError;
use crate::state::{DeletionState, SyncState};
use crate::types::{timestamp_now, TodoId, TodoRecord};

/// The record sets the engine and the application query for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    /// Every record, by id.
    All,
    /// Records shown in the normal list (not deleted in any way), newest first.
    Visible,
    /// Content-sync work set: never-acknowledged edits that are not awaiting
    /// purge, by id.
    NotSynchronized,
    /// Soft-deleted records (the trash), newest first.
    DeletionPending,
    /// Hard-deleted records awaiting the deletion-sync pass, by id.
    Deleted,
    /// Records marked `SynchronizationPending`, i.e. part of a push that has
    /// not resolved yet, by id.
    InFlight,
}

impl Predicate {
    pub fn matches(self, record: &TodoRecord) -> bool {
        match self {
            Predicate::All => true,
            Predicate::Visible => record.is_visible(),
            Predicate::NotSynchronized => {
                record.sync_state == SyncState::NotSynchronized
                    && record.deletion_state != DeletionState::Deleted
            }
            Predicate::DeletionPending => record.deletion_state == DeletionState::DeletionPending,
            Predicate::Deleted => record.deletion_state == DeletionState::Deleted,
            Predicate::InFlight => record.sync_state == SyncState::SynchronizationPending,
        }
    }

    /// Order a matched set the way this predicate promises.
    pub fn sort(self, records: &mut [TodoRecord]) {
        match self {
            Predicate::Visible | Predicate::DeletionPending => {
                records.sort_by_key(|record| (Reverse(record.updated_at), record.id));
            }
            Predicate::All | Predicate::NotSynchronized | Predicate::Deleted | Predicate::InFlight => {
                records.sort_by_key(|record| record.id);
            }
        }
    }
}

/// Result of `find_or_create`: the record and whether it is a new scaffold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub record: TodoRecord,
    pub created: bool,
}

/// Writes and reads inside one scoped transaction.
pub trait StoreTransaction {
    fn query(&self, predicate: Predicate) -> Result<Vec<TodoRecord>, StoreError>;

    fn find(&self, id: TodoId) -> Result<Option<TodoRecord>, StoreError>;

    /// Insert or replace the record with `record.id`.
    fn save(&mut self, record: &TodoRecord) -> Result<(), StoreError>;

    /// Physically remove a record. Returns whether it existed.
    fn purge(&mut self, id: TodoId) -> Result<bool, StoreError>;

    /// The existing record with `id`, or an unsaved scaffold.
    fn find_or_create(&mut self, id: TodoId) -> Result<Entry, StoreError> {
        Ok(match self.find(id)? {
            Some(record) => Entry { record, created: false },
            None => Entry {
                record: TodoRecord::scaffold(id, timestamp_now()),
                created: true,
            },
        })
    }

    fn contains(&self, id: TodoId) -> Result<bool, StoreError> {
        Ok(self.find(id)?.is_some())
    }
}

/// A persistent, queryable store of todo records.
pub trait RecordStore: Send + Sync {
    fn query(&self, predicate: Predicate) -> Result<Vec<TodoRecord>, StoreError>;

    fn find(&self, id: TodoId) -> Result<Option<TodoRecord>, StoreError>;

    /// Run `body` atomically. Writes are visible only if `body` returns `Ok`
    /// and the commit succeeds; the body's error is returned unchanged.
    fn with_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>;
}
