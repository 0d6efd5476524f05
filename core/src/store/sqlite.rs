//! SQLite record store.
//!
//! One `todos` table. Both state axes are stored as their ordinals and
//! timestamps as Unix milliseconds; decoding either back is checked, and a
//! row that does not decode is reported as `StoreError::Corrupt`.

use std::path::Path;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{Predicate, RecordStore, StoreTransaction};
use crate::error::StoreError;
use crate::state::{DeletionState, SyncState};
use crate::types::{TodoId, TodoRecord};

/// Current schema version
const CURRENT_VERSION: i64 = 1;

const COLUMNS: &str =
    "id, owner_id, title, completed, updated_at, sync_state, deletion_state, deleted_at, last_synced_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open a store at the given path, creating it if it doesn't exist.
    ///
    /// Runs migrations automatically.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        let mode: String = conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        if !mode.eq_ignore_ascii_case("wal") {
            return Err(StoreError::Unavailable(format!("journal mode stuck at {mode}")));
        }
        Self::from_connection(conn)
    }

    /// Open an in-memory store (useful for testing)
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        migrate(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        get_version(&self.conn.lock())
    }
}

fn get_version(conn: &Connection) -> Result<i64, StoreError> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        [],
        |row| row.get(0),
    )?;
    if !exists {
        return Ok(0);
    }
    Ok(conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
        row.get(0)
    })?)
}

fn migrate(conn: &mut Connection) -> Result<(), StoreError> {
    let version = get_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(StoreError::Unavailable(format!(
            "schema version {version} is newer than supported version {CURRENT_VERSION}"
        )));
    }
    if version < 1 {
        let tx = conn.transaction()?;
        tx.execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS todos (
                id INTEGER PRIMARY KEY,
                owner_id INTEGER NOT NULL,
                title TEXT NOT NULL,
                completed INTEGER NOT NULL DEFAULT 0,
                updated_at INTEGER NOT NULL,
                sync_state INTEGER NOT NULL DEFAULT 0,
                deletion_state INTEGER NOT NULL DEFAULT 0,
                deleted_at INTEGER,
                last_synced_at INTEGER
            );
            CREATE INDEX IF NOT EXISTS idx_todos_sync_state ON todos(sync_state);
            CREATE INDEX IF NOT EXISTS idx_todos_deletion ON todos(deletion_state, updated_at DESC);
            INSERT INTO schema_version (version) VALUES (1);",
        )?;
        tx.commit()?;
    }
    Ok(())
}

/// WHERE/ORDER BY fragment for a predicate. Only enum ordinals are
/// interpolated.
fn predicate_sql(predicate: Predicate) -> String {
    let not_synchronized = SyncState::NotSynchronized.as_ordinal();
    let in_flight = SyncState::SynchronizationPending.as_ordinal();
    let not_deleted = DeletionState::NotDeleted.as_ordinal();
    let pending = DeletionState::DeletionPending.as_ordinal();
    let deleted = DeletionState::Deleted.as_ordinal();
    match predicate {
        Predicate::All => "ORDER BY id".to_string(),
        Predicate::Visible => {
            format!("WHERE deletion_state = {not_deleted} ORDER BY updated_at DESC, id")
        }
        Predicate::NotSynchronized => format!(
            "WHERE sync_state = {not_synchronized} AND deletion_state != {deleted} ORDER BY id"
        ),
        Predicate::DeletionPending => {
            format!("WHERE deletion_state = {pending} ORDER BY updated_at DESC, id")
        }
        Predicate::Deleted => format!("WHERE deletion_state = {deleted} ORDER BY id"),
        Predicate::InFlight => format!("WHERE sync_state = {in_flight} ORDER BY id"),
    }
}

/// A row exactly as stored, before the checked decode.
struct RawTodo {
    id: i64,
    owner_id: i64,
    title: String,
    completed: bool,
    updated_at: i64,
    sync_state: i64,
    deletion_state: i64,
    deleted_at: Option<i64>,
    last_synced_at: Option<i64>,
}

impl RawTodo {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            owner_id: row.get(1)?,
            title: row.get(2)?,
            completed: row.get::<_, i64>(3)? != 0,
            updated_at: row.get(4)?,
            sync_state: row.get(5)?,
            deletion_state: row.get(6)?,
            deleted_at: row.get(7)?,
            last_synced_at: row.get(8)?,
        })
    }
}

impl TryFrom<RawTodo> for TodoRecord {
    type Error = StoreError;

    fn try_from(raw: RawTodo) -> Result<Self, StoreError> {
        let corrupt = |reason: String| StoreError::Corrupt { id: raw.id, reason };
        let timestamp = |millis: i64| {
            DateTime::<Utc>::from_timestamp_millis(millis)
                .ok_or_else(|| corrupt(format!("timestamp {millis} out of range")))
        };
        Ok(TodoRecord {
            id: TodoId::new(raw.id),
            owner_id: raw.owner_id,
            title: raw.title.clone(),
            completed: raw.completed,
            updated_at: timestamp(raw.updated_at)?,
            sync_state: SyncState::from_ordinal(raw.sync_state)
                .ok_or_else(|| corrupt(format!("unknown sync state {}", raw.sync_state)))?,
            deletion_state: DeletionState::from_ordinal(raw.deletion_state)
                .ok_or_else(|| corrupt(format!("unknown deletion state {}", raw.deletion_state)))?,
            deleted_at: raw.deleted_at.map(timestamp).transpose()?,
            last_synced_at: raw.last_synced_at.map(timestamp).transpose()?,
        })
    }
}

fn select(conn: &Connection, predicate: Predicate) -> Result<Vec<TodoRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM todos {}", predicate_sql(predicate));
    let mut stmt = conn.prepare(&sql)?;
    let raw = stmt
        .query_map([], RawTodo::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter().map(TodoRecord::try_from).collect()
}

fn find(conn: &Connection, id: TodoId) -> Result<Option<TodoRecord>, StoreError> {
    let sql = format!("SELECT {COLUMNS} FROM todos WHERE id = ?1");
    let raw = conn
        .query_row(&sql, params![id.get()], RawTodo::from_row)
        .optional()?;
    raw.map(TodoRecord::try_from).transpose()
}

struct SqliteTransaction<'a> {
    tx: &'a rusqlite::Transaction<'a>,
}

impl StoreTransaction for SqliteTransaction<'_> {
    fn query(&self, predicate: Predicate) -> Result<Vec<TodoRecord>, StoreError> {
        select(self.tx, predicate)
    }

    fn find(&self, id: TodoId) -> Result<Option<TodoRecord>, StoreError> {
        find(self.tx, id)
    }

    fn save(&mut self, record: &TodoRecord) -> Result<(), StoreError> {
        self.tx.execute(
            "INSERT INTO todos (id, owner_id, title, completed, updated_at, sync_state, deletion_state, deleted_at, last_synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                title = excluded.title,
                completed = excluded.completed,
                updated_at = excluded.updated_at,
                sync_state = excluded.sync_state,
                deletion_state = excluded.deletion_state,
                deleted_at = excluded.deleted_at,
                last_synced_at = excluded.last_synced_at",
            params![
                record.id.get(),
                record.owner_id,
                record.title,
                i64::from(record.completed),
                record.updated_at.timestamp_millis(),
                record.sync_state.as_ordinal(),
                record.deletion_state.as_ordinal(),
                record.deleted_at.map(|at| at.timestamp_millis()),
                record.last_synced_at.map(|at| at.timestamp_millis()),
            ],
        )?;
        Ok(())
    }

    fn purge(&mut self, id: TodoId) -> Result<bool, StoreError> {
        let rows = self
            .tx
            .execute("DELETE FROM todos WHERE id = ?1", params![id.get()])?;
        Ok(rows > 0)
    }
}

impl RecordStore for SqliteStore {
    fn query(&self, predicate: Predicate) -> Result<Vec<TodoRecord>, StoreError> {
        select(&self.conn.lock(), predicate)
    }

    fn find(&self, id: TodoId) -> Result<Option<TodoRecord>, StoreError> {
        find(&self.conn.lock(), id)
    }

    fn with_transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn StoreTransaction) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut conn = self.conn.lock();
        let tx = conn.transaction().map_err(StoreError::from)?;
        // Dropping `tx` without committing rolls back.
        let output = body(&mut SqliteTransaction { tx: &tx })?;
        tx.commit().map_err(StoreError::from)?;
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::timestamp_now;
    use pretty_assertions::assert_eq;

    fn setup() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn record(id: i64) -> TodoRecord {
        TodoRecord::new_local(TodoId::new(id), 4, format!("todo {id}"), timestamp_now())
    }

    fn insert(store: &SqliteStore, record: &TodoRecord) {
        store
            .with_transaction(|txn| -> Result<(), StoreError> { txn.save(record) })
            .unwrap();
    }

    #[test]
    fn test_migrations_set_version() {
        let store = setup();
        assert_eq!(store.schema_version().unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_save_and_find_roundtrip_all_fields() {
        let store = setup();
        let mut original = record(1);
        original.completed = true;
        original.sync_state = SyncState::SynchronizationPending;
        original.deletion_state = DeletionState::DeletionPending;
        original.deleted_at = Some(timestamp_now());
        original.last_synced_at = Some(timestamp_now());
        insert(&store, &original);

        let fetched = store.find(TodoId::new(1)).unwrap().unwrap();
        assert_eq!(fetched, original);
    }

    #[test]
    fn test_save_upserts() {
        let store = setup();
        let mut todo = record(1);
        insert(&store, &todo);
        todo.title = "renamed".into();
        insert(&store, &todo);

        let all = store.query(Predicate::All).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "renamed");
    }

    #[test]
    fn test_failed_transaction_rolls_back() {
        let store = setup();
        insert(&store, &record(1));

        let result = store.with_transaction(|txn| -> Result<(), StoreError> {
            txn.save(&record(2))?;
            assert!(txn.purge(TodoId::new(1))?);
            Err(StoreError::Unavailable("simulated".into()))
        });
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        let ids: Vec<i64> = store
            .query(Predicate::All)
            .unwrap()
            .iter()
            .map(|r| r.id.get())
            .collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_predicates_match_memory_semantics() {
        let store = setup();
        let mut synced = record(1);
        synced.sync_state = SyncState::Synchronized;
        let mut trashed = record(2);
        trashed.deletion_state = DeletionState::DeletionPending;
        let mut deleted = record(3);
        deleted.deletion_state = DeletionState::Deleted;
        let live = record(4);
        let mut in_flight = record(5);
        in_flight.sync_state = SyncState::SynchronizationPending;
        for todo in [&synced, &trashed, &deleted, &live, &in_flight] {
            insert(&store, todo);
        }

        let ids = |predicate| -> Vec<i64> {
            store
                .query(predicate)
                .unwrap()
                .iter()
                .map(|r| r.id.get())
                .collect()
        };
        assert_eq!(ids(Predicate::NotSynchronized), vec![2, 4]);
        assert_eq!(ids(Predicate::DeletionPending), vec![2]);
        assert_eq!(ids(Predicate::Deleted), vec![3]);
        assert_eq!(ids(Predicate::InFlight), vec![5]);
        let mut visible = ids(Predicate::Visible);
        visible.sort_unstable();
        assert_eq!(visible, vec![1, 4, 5]);
    }

    #[test]
    fn test_unknown_ordinal_is_reported_as_corrupt() {
        let store = setup();
        insert(&store, &record(9));
        store
            .conn
            .lock()
            .execute("UPDATE todos SET sync_state = 7 WHERE id = 9", [])
            .unwrap();

        let err = store.find(TodoId::new(9)).unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { id: 9, .. }));
    }

    #[test]
    fn test_open_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("todos.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            insert(&store, &record(5));
        }
        let store = SqliteStore::open(&path).unwrap();
        assert!(store.find(TodoId::new(5)).unwrap().is_some());
        assert_eq!(store.schema_version().unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_file_store_uses_wal() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("todos.db")).unwrap();
        let mode: String = store
            .conn
            .lock()
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(mode, "wal");
    }
}
