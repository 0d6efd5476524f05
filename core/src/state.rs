//! Per-record synchronization state machine.
//!
//! # Design
//! Two orthogonal axes, each a plain enum persisted as its ordinal. The
//! transition functions are pure: they take the current state and an event
//! and return the next state, or a `TransitionError` for an illegal pair.
//! Callers (the engine) decide when to persist the result.
//!
//! ```text
//! sync:      NotSynchronized --SyncStarted--> SynchronizationPending --SyncSucceeded--> Synchronized
//!                 ^                                |                                       |
//!                 +----------- SyncFailed ---------+---------------------------------------+
//!            (LocalEdit from any state goes to NotSynchronized)
//!
//! deletion:  NotDeleted --SoftDeleteRequested--> DeletionPending --HardDeleteRequested--> Deleted
//!                 ^                                   |                                    (terminal, purged)
//!                 +--------- RestoreRequested --------+
//!            (HardDeleteRequested is also accepted directly from NotDeleted)
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Whether a record's local content has been acknowledged by the remote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncState {
    NotSynchronized,
    SynchronizationPending,
    Synchronized,
}

/// Events driving the sync axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    LocalEdit,
    SyncStarted,
    SyncSucceeded,
    SyncFailed,
}

/// Soft-delete, confirmed-delete, purge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeletionState {
    NotDeleted,
    DeletionPending,
    Deleted,
}

/// Events driving the deletion axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionEvent {
    SoftDeleteRequested,
    HardDeleteRequested,
    RestoreRequested,
    DeleteSucceeded,
    DeleteFailed,
}

/// An event that is not legal in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot apply {event} while {from}")]
pub struct TransitionError {
    pub from: &'static str,
    pub event: &'static str,
}

impl TransitionError {
    pub const fn new(from: &'static str, event: &'static str) -> Self {
        Self { from, event }
    }
}

impl SyncState {
    pub const fn as_ordinal(self) -> i64 {
        match self {
            SyncState::NotSynchronized => 0,
            SyncState::SynchronizationPending => 1,
            SyncState::Synchronized => 2,
        }
    }

    pub const fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(SyncState::NotSynchronized),
            1 => Some(SyncState::SynchronizationPending),
            2 => Some(SyncState::Synchronized),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            SyncState::NotSynchronized => "not synchronized",
            SyncState::SynchronizationPending => "synchronization pending",
            SyncState::Synchronized => "synchronized",
        }
    }

    /// Compute the next sync state for `event`.
    pub fn apply(self, event: SyncEvent) -> Result<Self, TransitionError> {
        use SyncState::*;
        match (self, event) {
            (_, SyncEvent::LocalEdit) => Ok(NotSynchronized),
            (NotSynchronized, SyncEvent::SyncStarted) => Ok(SynchronizationPending),
            (SynchronizationPending, SyncEvent::SyncSucceeded) => Ok(Synchronized),
            (_, SyncEvent::SyncFailed) => Ok(NotSynchronized),
            (from, event) => Err(TransitionError::new(from.name(), event.name())),
        }
    }

    /// A local edit exists that the remote has not acknowledged yet.
    pub const fn has_unacknowledged_edit(self) -> bool {
        matches!(self, SyncState::NotSynchronized | SyncState::SynchronizationPending)
    }
}

impl SyncEvent {
    pub const fn name(self) -> &'static str {
        match self {
            SyncEvent::LocalEdit => "local edit",
            SyncEvent::SyncStarted => "sync start",
            SyncEvent::SyncSucceeded => "sync success",
            SyncEvent::SyncFailed => "sync failure",
        }
    }
}

impl DeletionState {
    pub const fn as_ordinal(self) -> i64 {
        match self {
            DeletionState::NotDeleted => 0,
            DeletionState::DeletionPending => 1,
            DeletionState::Deleted => 2,
        }
    }

    pub const fn from_ordinal(ordinal: i64) -> Option<Self> {
        match ordinal {
            0 => Some(DeletionState::NotDeleted),
            1 => Some(DeletionState::DeletionPending),
            2 => Some(DeletionState::Deleted),
            _ => None,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            DeletionState::NotDeleted => "not deleted",
            DeletionState::DeletionPending => "deletion pending",
            DeletionState::Deleted => "deleted",
        }
    }

    /// Compute the next deletion state for `event`.
    pub fn apply(self, event: DeletionEvent) -> Result<Self, TransitionError> {
        use DeletionState::*;
        match (self, event) {
            (NotDeleted, DeletionEvent::SoftDeleteRequested) => Ok(DeletionPending),
            (NotDeleted | DeletionPending, DeletionEvent::HardDeleteRequested) => Ok(Deleted),
            (DeletionPending, DeletionEvent::RestoreRequested) => Ok(NotDeleted),
            (Deleted, DeletionEvent::DeleteSucceeded | DeletionEvent::DeleteFailed) => Ok(Deleted),
            (from, event) => Err(TransitionError::new(from.name(), event.name())),
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, DeletionState::Deleted)
    }
}

impl DeletionEvent {
    pub const fn name(self) -> &'static str {
        match self {
            DeletionEvent::SoftDeleteRequested => "soft delete",
            DeletionEvent::HardDeleteRequested => "hard delete",
            DeletionEvent::RestoreRequested => "restore",
            DeletionEvent::DeleteSucceeded => "delete success",
            DeletionEvent::DeleteFailed => "delete failure",
        }
    }
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
