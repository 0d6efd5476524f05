//! Offline-first synchronization engine for todo records.
//!
//! # Overview
//! Records are created, edited, and deleted against a local store first.
//! `SyncEngine::run_reconciliation_cycle` later pushes unsynchronized edits to
//! the remote service of record, adopts its canonical copies, and carries
//! confirmed deletions through to a purge.
//!
//! # Design
//! - Per-record state lives on two independent axes (`state`), each a pure
//!   transition function persisted as an ordinal.
//! - `store` is the only persistence contract: predicate queries and scoped
//!   transactions. `MemoryStore` and `SqliteStore` implement it.
//! - `client` builds `HttpRequest`s and parses `HttpResponse`s without doing
//!   I/O; `transport` performs the round-trip; `remote` joins the two behind
//!   the `RemoteClient` trait the engine talks to.
//! - `merge` holds the decision table for importing remote records.

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod http;
pub mod merge;
pub mod remote;
pub mod state;
pub mod store;
pub mod transport;
pub mod types;

pub use client::TodoClient;
pub use config::{EngineConfig, MissingRemotePolicy, RemoteConfig};
pub use engine::{CycleReport, HardDeleteOutcome, PassOutcome, SyncEngine};
pub use error::{ApiError, Result, StoreError, SyncError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use merge::{ImportSummary, MergeDecision, SkipReason};
pub use remote::{HttpRemote, RemoteClient};
pub use state::{DeletionEvent, DeletionState, SyncEvent, SyncState, TransitionError};
pub use store::{MemoryStore, Predicate, RecordStore, SqliteStore, StoreTransaction};
pub use transport::{Transport, UreqTransport};
pub use types::{RemoteTodo, TodoEdit, TodoId, TodoRecord};
