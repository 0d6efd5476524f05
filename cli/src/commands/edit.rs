use todo_sync::{EngineConfig, TodoEdit, TodoId};

use crate::commands::common::{format_record_line, open_engine, Settings};
use crate::error::CliError;

pub fn build_edit(title: Option<String>, done: bool, undone: bool) -> Result<TodoEdit, CliError> {
    let title = match title {
        Some(title) if title.trim().is_empty() => return Err(CliError::EmptyTitle),
        Some(title) => Some(title.trim().to_string()),
        None => None,
    };
    let completed = match (done, undone) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };
    let edit = TodoEdit { title, completed };
    if edit.is_empty() {
        return Err(CliError::EmptyEdit);
    }
    Ok(edit)
}

pub fn run_edit(id: i64, edit: &TodoEdit, settings: &Settings) -> Result<(), CliError> {
    let engine = open_engine(settings, EngineConfig::default())?;
    let record = engine.edit_local(TodoId::new(id), edit)?;

    println!("{}", format_record_line(&record));
    Ok(())
}
