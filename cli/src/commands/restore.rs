use todo_sync::{EngineConfig, TodoId};

use crate::commands::common::{format_record_line, open_engine, Settings};
use crate::error::CliError;

pub fn run_restore(id: i64, settings: &Settings) -> Result<(), CliError> {
    let engine = open_engine(settings, EngineConfig::default())?;
    let record = engine.request_restore(TodoId::new(id))?;

    println!("{}", format_record_line(&record));
    Ok(())
}
