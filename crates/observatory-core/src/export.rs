use chrono::{DateTime, Utc};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ExportError;
use crate::history::{History, HistoryRow, TIMESTAMP_FORMAT};

pub const COLUMNS: [&str; 12] = [
    "timestamp",
    "provider",
    "model",
    "prompt",
    "total_tokens",
    "response_time",
    "total_cost",
    "tokens_per_second",
    "full_prompt",
    "full_response",
    "request_json",
    "response_json",
];

/// Aggregate row appended after the per-call rows. JSON columns stay empty.
pub fn summary_row(history: &History, now: DateTime<Utc>) -> HistoryRow {
    let summary = history.session_summary();
    HistoryRow {
        timestamp: now.format(TIMESTAMP_FORMAT).to_string(),
        provider: "SUMMARY".into(),
        model: "All Models".into(),
        prompt: "Session Summary".into(),
        total_tokens: summary.total_tokens,
        response_time: summary.mean_response_time,
        total_cost: summary.total_cost,
        tokens_per_second: summary.mean_tokens_per_second,
        full_prompt: String::new(),
        full_response: String::new(),
        request_json: String::new(),
        response_json: String::new(),
    }
}

pub fn write_csv<W: Write>(writer: W, history: &History) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    for row in history.to_table() {
        csv.serialize(row)?;
    }
    csv.serialize(summary_row(history, Utc::now()))?;
    csv.flush()?;
    Ok(())
}

pub fn export_filename(now: DateTime<Utc>) -> String {
    format!("llm_session_data_{}.csv", now.format("%Y%m%d_%H%M%S"))
}

/// Writes the session CSV into `dir` and returns its path.
pub fn export_to_file(dir: &Path, history: &History) -> Result<PathBuf, ExportError> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(export_filename(Utc::now()));
    let file = std::fs::File::create(&path)?;
    write_csv(file, history)?;
    tracing::info!(path = %path.display(), rows = history.len() + 1, "session data exported");
    Ok(path)
}
