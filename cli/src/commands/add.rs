use todo_sync::EngineConfig;

use crate::commands::common::{normalize_title, open_engine, Settings};
use crate::error::CliError;

pub fn run_add(title_parts: &[String], owner: i64, settings: &Settings) -> Result<(), CliError> {
    let title = normalize_title(title_parts).ok_or(CliError::EmptyTitle)?;

    let engine = open_engine(settings, EngineConfig::default())?;
    let record = engine.create_local(title, owner)?;

    println!("{}", record.id);
    Ok(())
}
