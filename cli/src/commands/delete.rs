use todo_sync::{EngineConfig, HardDeleteOutcome, TodoId};

use crate::commands::common::{open_engine, Settings};
use crate::error::CliError;

pub fn run_delete(id: i64, hard: bool, settings: &Settings) -> Result<(), CliError> {
    let engine = open_engine(settings, EngineConfig::default())?;
    let id = TodoId::new(id);

    if !hard {
        engine.request_soft_delete(id)?;
        println!("{id} moved to trash");
        return Ok(());
    }
    match engine.request_hard_delete(id)? {
        HardDeleteOutcome::Purged => println!("{id} deleted"),
        HardDeleteOutcome::Scheduled => println!("{id} deleted, remote copy removed on next sync"),
    }
    Ok(())
}
