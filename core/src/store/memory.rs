//! In-memory record store.
//!
//! Transactions run against a staged copy of the map, swapped in on commit,
//! so a failing body leaves nothing behind.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use super::{Predicate, RecordStore, StoreTransaction};
use crate::error::StoreError;
use crate::types::{TodoId, TodoRecord};

#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<TodoId, TodoRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with existing records (later duplicates win).
    pub fn with_records(records: impl IntoIterator<Item = TodoRecord>) -> Self {
        let records = records.into_iter().map(|record| (record.id, record)).collect();
        Self {
            records: Mutex::new(records),
        }
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of every record, by id.
    pub fn snapshot(&self) -> Vec<TodoRecord> {
        self.records.lock().values().cloned().collect()
    }
}

fn select(records: &BTreeMap<TodoId, TodoRecord>, predicate: Predicate) -> Vec<TodoRecord> {
    let mut matched: Vec<TodoRecord> = records
        .values()
        .filter(|record| predicate.matches(record))
        .cloned()
        .collect();
    predicate.sort(&mut matched);
    matched
}

struct MemoryTransaction<'a> {
    staged: &'a mut BTreeMap<TodoId, TodoRecord>,
}

impl StoreTransaction for MemoryTransaction<'_> {
    fn query(&self, predicate: Predicate) -> Result<Vec<TodoRecord>, StoreError> {
        Ok(select(self.staged, predicate))
    }

    fn find(&self, id: TodoId) -> Result<Option<TodoRecord>, StoreError> {
        Ok(self.staged.get(&id).cloned())
    }

    fn save(&mut self, record: &TodoRecord) -> Result<(), StoreError> {
        self.staged.insert(record.id, record.clone());
        Ok(())
    }

    fn purge(&mut self, id: TodoId) -> Result<bool, StoreError> {
        Ok(self.staged.remove(&id).is_some())
    }
}

impl RecordStore for MemoryStore {
    fn query(&self, predicate: Predicate) -> Result<Vec<TodoRecord>, StoreError> {
        Ok(select(&self.records.lock(), predicate))
    }

    fn find(&self, id: TodoId) -> Result<Option<TodoRecord>, StoreError> {
        Ok(self.records.lock().get(&id).cloned())
    }

    fn with_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut committed = self.records.lock();
        let mut staged = committed.clone();
        let output = body(&mut MemoryTransaction { staged: &mut staged })?;
        *committed = staged;
        Ok(output)
    }
}
