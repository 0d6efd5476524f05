use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Sync(#[from] todo_sync::SyncError),
    #[error(transparent)]
    Store(#[from] todo_sync::StoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Todo title cannot be empty")]
    EmptyTitle,
    #[error("Nothing to change: pass --title, --done or --undone")]
    EmptyEdit,
    #[error("Sync aborted: {0}")]
    SyncAborted(String),
}
