use std::time::Duration;

use todo_sync::{CycleReport, EngineConfig};
use tracing::{info, warn};

use crate::commands::common::{open_engine, report_lines, Engine, Settings};
use crate::error::CliError;

pub async fn run_sync(pull: bool, settings: &Settings) -> Result<(), CliError> {
    let engine = open_engine(settings, EngineConfig::default().with_pull_on_cycle(pull))?;
    let report = engine.run_reconciliation_cycle().await;
    print_report(&report);
    check_report(&report)
}

/// Run a cycle every `interval` until Ctrl-C. A cycle is never interrupted
/// midway; the signal is honoured between cycles.
pub async fn run_watch(interval: Duration, pull: bool, settings: &Settings) -> Result<(), CliError> {
    let engine = open_engine(settings, EngineConfig::default().with_pull_on_cycle(pull))?;
    info!(interval_secs = interval.as_secs(), "watching");

    loop {
        watch_cycle(&engine).await;
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                info!("interrupted, stopping");
                return Ok(());
            }
            _ = tokio::time::sleep(interval) => {}
        }
    }
}

async fn watch_cycle(engine: &Engine) {
    let report = engine.run_reconciliation_cycle().await;
    print_report(&report);
    if let Err(err) = check_report(&report) {
        warn!(%err, "cycle aborted, retrying after the interval");
    }
}

fn print_report(report: &CycleReport) {
    for line in report_lines(report) {
        println!("{line}");
    }
}

/// Local failures make the command fail; remote failures were rolled back
/// and are retried by the next sync.
pub fn check_report(report: &CycleReport) -> Result<(), CliError> {
    let errors: Vec<String> = report.errors().map(ToString::to_string).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(CliError::SyncAborted(errors.join("; ")))
    }
}
