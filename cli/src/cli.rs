use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:3000";

#[derive(Parser)]
#[command(name = "todo-sync")]
#[command(about = "Offline-first todo list that reconciles with a remote service")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the local database file
    #[arg(long, global = true, env = "TODO_SYNC_DB", value_name = "PATH", default_value = "todo-sync.db")]
    pub db: PathBuf,

    /// Base URL of the service of record
    #[arg(long, global = true, env = "TODO_SYNC_SERVER", value_name = "URL", default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Timeout for each remote request
    #[arg(long, global = true, value_name = "SECS", default_value_t = 10)]
    pub timeout_secs: u64,
}

impl Cli {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create a todo locally
    #[command(alias = "new")]
    Add {
        /// Todo title
        title: Vec<String>,
        /// Owner id recorded with the todo
        #[arg(long, default_value_t = 1)]
        owner: i64,
    },
    /// Change the title or completion of a todo
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        /// Mark as completed
        #[arg(long, conflicts_with = "undone")]
        done: bool,
        /// Mark as not completed
        #[arg(long)]
        undone: bool,
    },
    /// List todos (newest first)
    List {
        /// Show the trash instead
        #[arg(long)]
        trash: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Move a todo to the trash, or delete it for good with --hard
    Delete {
        id: i64,
        #[arg(long)]
        hard: bool,
    },
    /// Take a todo back out of the trash
    Restore { id: i64 },
    /// Run one reconciliation cycle
    Sync {
        /// Also import the remote's full list
        #[arg(long)]
        pull: bool,
    },
    /// Reconcile periodically until interrupted
    Watch {
        #[arg(long, value_name = "SECS", default_value_t = 30)]
        interval_secs: u64,
        /// Also import the remote's full list each cycle
        #[arg(long)]
        pull: bool,
    },
}
