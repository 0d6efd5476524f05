use todo_sync::EngineConfig;

use crate::commands::common::{format_record_line, open_engine, Settings};
use crate::error::CliError;

pub fn run_list(trash: bool, as_json: bool, settings: &Settings) -> Result<(), CliError> {
    let engine = open_engine(settings, EngineConfig::default())?;
    let records = if trash {
        engine.list_trash()?
    } else {
        engine.list_visible()?
    };

    if as_json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("{}", if trash { "Trash is empty." } else { "No todos." });
        return Ok(());
    }
    for record in &records {
        println!("{}", format_record_line(record));
    }
    Ok(())
}
