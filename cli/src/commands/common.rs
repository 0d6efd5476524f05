use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use todo_sync::{
    CycleReport, EngineConfig, HttpRemote, PassOutcome, RemoteConfig, SqliteStore, SyncEngine, SyncError, TodoRecord,
};

use crate::error::CliError;

pub type Engine = SyncEngine<SqliteStore, HttpRemote>;

/// Where the store lives and how to reach the remote.
#[derive(Debug, Clone)]
pub struct Settings {
    pub db: PathBuf,
    pub server: String,
    pub timeout: Duration,
}

pub fn open_engine(settings: &Settings, config: EngineConfig) -> Result<Engine, CliError> {
    let store = open_store(&settings.db)?;
    let remote = HttpRemote::from_config(&RemoteConfig::new(&settings.server).with_timeout(settings.timeout));
    Ok(SyncEngine::new(Arc::new(store), Arc::new(remote), config))
}

fn open_store(path: &Path) -> Result<SqliteStore, CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(SqliteStore::open(path)?)
}

pub fn normalize_title(parts: &[String]) -> Option<String> {
    let joined = parts.join(" ");
    let trimmed = joined.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

pub fn format_record_line(record: &TodoRecord) -> String {
    let mark = if record.completed { "x" } else { " " };
    let updated = record.updated_at.with_timezone(&Local).format("%Y-%m-%d %H:%M");
    format!("[{mark}] {}  {}  ({updated}, {})", record.id, record.title, record.sync_state)
}

pub fn describe_pass(outcome: &Result<PassOutcome, SyncError>) -> String {
    match outcome {
        Ok(PassOutcome::Idle) => "nothing to do".to_string(),
        Ok(PassOutcome::Completed { records }) => format!("{records} record(s) reconciled"),
        Ok(PassOutcome::Imported(summary)) => format!(
            "{} inserted, {} updated, {} kept local",
            summary.inserted, summary.updated, summary.skipped
        ),
        Ok(PassOutcome::RolledBack { records, cause }) => {
            format!("{records} record(s) rolled back, will retry ({cause})")
        }
        Err(err) => format!("failed: {err}"),
    }
}

pub fn report_lines(report: &CycleReport) -> Vec<String> {
    let mut lines = vec![
        format!("content:  {}", describe_pass(&report.content)),
        format!("deletion: {}", describe_pass(&report.deletion)),
    ];
    if let Some(pull) = &report.pull {
        lines.push(format!("pull:     {}", describe_pass(pull)));
    }
    lines
}
