//! Domain types for the todo synchronization engine.
//!
//! # Design
//! `TodoRecord` is the locally persisted row, carrying both state axes and
//! the bookkeeping timestamps. `RemoteTodo` is the wire DTO exchanged with the
//! service of record and deliberately carries none of the local state; the
//! two are converted explicitly at the remote boundary.

use std::fmt;

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::state::{DeletionState, SyncState};

/// Locally generated ids are ten decimal digits.
const LOCAL_ID_RANGE: std::ops::Range<i64> = 1_000_000_000..10_000_000_000;

/// Stable integer identity of a todo, either assigned by the remote or
/// generated locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(i64);

impl TodoId {
    pub const fn new(raw: i64) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> i64 {
        self.0
    }

    /// Draw a random ten-digit id for a record created on this device.
    pub fn random_local() -> Self {
        Self(rand::thread_rng().gen_range(LOCAL_ID_RANGE))
    }
}

impl From<i64> for TodoId {
    fn from(raw: i64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A todo as exchanged with the remote: `{id, ownerId, title, completed}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTodo {
    pub id: TodoId,
    #[serde(alias = "userId")]
    pub owner_id: i64,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
}

/// A locally edited subset of fields. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TodoEdit {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl TodoEdit {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.completed.is_none()
    }
}

/// A todo as persisted in the local record store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoRecord {
    pub id: TodoId,
    pub owner_id: i64,
    pub title: String,
    pub completed: bool,
    pub updated_at: DateTime<Utc>,
    pub sync_state: SyncState,
    pub deletion_state: DeletionState,
    pub deleted_at: Option<DateTime<Utc>>,
    /// Last time the remote acknowledged this record. `None` means the
    /// record has never existed remotely.
    pub last_synced_at: Option<DateTime<Utc>>,
}

impl TodoRecord {
    /// A record freshly created on this device, waiting for its first push.
    pub fn new_local(id: TodoId, owner_id: i64, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            owner_id,
            title: title.into(),
            completed: false,
            updated_at: now,
            sync_state: SyncState::NotSynchronized,
            deletion_state: DeletionState::NotDeleted,
            deleted_at: None,
            last_synced_at: None,
        }
    }

    /// An empty, not yet persisted record used by find-or-create.
    pub fn scaffold(id: TodoId, now: DateTime<Utc>) -> Self {
        Self::new_local(id, 0, String::new(), now)
    }

    /// Build a record exactly as the remote describes it, already synchronized.
    pub fn from_remote(remote: &RemoteTodo, now: DateTime<Utc>) -> Self {
        let mut record = Self::scaffold(remote.id, now);
        record.overwrite_from(remote, now);
        record
    }

    pub fn to_remote(&self) -> RemoteTodo {
        RemoteTodo {
            id: self.id,
            owner_id: self.owner_id,
            title: self.title.clone(),
            completed: self.completed,
        }
    }

    /// True when the user-visible content equals the remote payload.
    pub fn content_matches(&self, remote: &RemoteTodo) -> bool {
        self.id == remote.id
            && self.owner_id == remote.owner_id
            && self.title == remote.title
            && self.completed == remote.completed
    }

    /// Accept the remote payload as the new content of this record.
    pub fn overwrite_from(&mut self, remote: &RemoteTodo, now: DateTime<Utc>) {
        self.id = remote.id;
        self.owner_id = remote.owner_id;
        self.title = remote.title.clone();
        self.completed = remote.completed;
        self.sync_state = SyncState::Synchronized;
        self.updated_at = now;
        self.last_synced_at = Some(now);
    }

    /// Apply a local edit to the content fields. Returns whether anything changed.
    pub fn apply_edit(&mut self, edit: &TodoEdit) -> bool {
        let mut changed = false;
        if let Some(title) = &edit.title {
            changed |= *title != self.title;
            self.title.clone_from(title);
        }
        if let Some(completed) = edit.completed {
            changed |= completed != self.completed;
            self.completed = completed;
        }
        changed
    }

    /// Never pushed and not in flight: nothing remote needs to hear about it.
    pub fn is_local_only(&self) -> bool {
        self.last_synced_at.is_none() && self.sync_state == SyncState::NotSynchronized
    }

    pub fn is_visible(&self) -> bool {
        self.deletion_state == DeletionState::NotDeleted
    }

    /// Candidate for the content-sync pass.
    pub fn is_push_eligible(&self) -> bool {
        self.sync_state == SyncState::NotSynchronized && self.deletion_state != DeletionState::Deleted
    }

    /// Candidate for the deletion-sync pass.
    pub fn is_purge_eligible(&self) -> bool {
        self.deletion_state.is_terminal()
    }
}

/// Current UTC time truncated to milliseconds, the precision the stores keep.
pub(crate) fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}
