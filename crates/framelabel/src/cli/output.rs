//! Shared output helpers: export writing, progress bar, run summary.

use framelabel_core::export::{self, ApiType, ExportFormat};
use framelabel_core::{BatchSummary, ChunkProgress, ResultEntry};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Render `records` and write them to `output`, or stdout when absent.
pub fn write_export(
    records: &[Value],
    format: ExportFormat,
    api_type: ApiType,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let bytes = export::format(records, format, api_type)?;
    match output {
        Some(path) => {
            std::fs::write(path, &bytes)?;
            tracing::info!("Output written to {:?}", path);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(&bytes)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Records for export: processed results as-is, skipped tasks as their input.
///
/// When `extra` is given (one raw event per task), each event's fields are
/// merged under the result's own fields.
pub fn summary_records(summary: &BatchSummary, extra: Option<&[Value]>) -> anyhow::Result<Vec<Value>> {
    let mut records = Vec::with_capacity(summary.results.len());
    for (i, entry) in summary.results.iter().enumerate() {
        let mut record = match entry {
            ResultEntry::Processed(result) => serde_json::to_value(result)?,
            ResultEntry::Skipped(task) => serde_json::to_value(task)?,
        };
        if let Some(Value::Object(event)) = extra.and_then(|events| events.get(i)) {
            if let Value::Object(fields) = &mut record {
                for (key, value) in event {
                    fields.entry(key.clone()).or_insert_with(|| value.clone());
                }
            }
        }
        records.push(record);
    }
    Ok(records)
}

/// Progress bar advanced once per finished chunk.
pub fn create_progress_bar(total: u64) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        )
        .map(|s| s.progress_chars("##-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message("starting...");
    pb
}

pub fn update_progress(pb: &ProgressBar, progress: &ChunkProgress) {
    pb.set_position(progress.completed as u64);
    pb.set_message(format!(
        "chunk {}/{} | {} ok, {} failed",
        progress.chunk_index + 1,
        progress.chunk_count,
        progress.processed_count,
        progress.error_count
    ));
}

/// Print a formatted summary table to stderr.
pub fn print_summary(summary: &BatchSummary, elapsed: Duration) {
    eprintln!();
    eprintln!("  ====================================");
    eprintln!("             Labeling Summary");
    eprintln!("  ====================================");
    eprintln!("    Backend:      {:>8}", summary.model_used);
    eprintln!("    Labeled:      {:>8}", summary.processed_count);
    if summary.error_count > 0 {
        eprintln!("    Failed:       {:>8}", summary.error_count);
    }
    let skipped = summary.results.len() - summary.processed().count();
    if skipped > 0 {
        eprintln!("    Skipped:      {:>8}", skipped);
    }
    eprintln!("  ------------------------------------");
    eprintln!("    Prompt tok:   {:>8}", summary.prompt_tokens);
    eprintln!("    Output tok:   {:>8}", summary.completion_tokens);
    eprintln!("    Total tok:    {:>8}", summary.total_tokens);
    eprintln!("    Duration:     {:>7.1}s", elapsed.as_secs_f64());
    eprintln!("  ====================================");
}
