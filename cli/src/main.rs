//! todo-sync - offline-first todo list from the command line
//!
//! Every command works against the local database; `sync` and `watch` are
//! the only ones that talk to the remote.

mod cli;
mod commands;
mod error;


use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::common::Settings;
use crate::commands::delete::run_delete;
use crate::commands::edit::{build_edit, run_edit};
use crate::commands::list::run_list;
use crate::commands::restore::run_restore;
use crate::commands::sync::{run_sync, run_watch};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("todo_sync=info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings {
        db: cli.db.clone(),
        server: cli.server.clone(),
        timeout: cli.timeout(),
    };

    match cli.command {
        Commands::Add { title, owner } => run_add(&title, owner, &settings)?,
        Commands::Edit {
            id,
            title,
            done,
            undone,
        } => {
            let edit = build_edit(title, done, undone)?;
            run_edit(id, &edit, &settings)?;
        }
        Commands::List { trash, json } => run_list(trash, json, &settings)?,
        Commands::Delete { id, hard } => run_delete(id, hard, &settings)?,
        Commands::Restore { id } => run_restore(id, &settings)?,
        Commands::Sync { pull } => run_sync(pull, &settings).await?,
        Commands::Watch { interval_secs, pull } => {
            run_watch(Duration::from_secs(interval_secs.max(1)), pull, &settings).await?;
        }
    }
    Ok(())
}
