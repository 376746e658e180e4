//! The `framelabel label` command: label a list of images and export the results.

use super::output::{create_progress_bar, print_summary, summary_records, update_progress, write_export};
use super::types::{Backend, OutputFormat};
use clap::Args;
use framelabel_core::events::task_from_value;
use framelabel_core::export::ApiType;
use framelabel_core::{BackendKind, Config, FrameLabel, ImageSource, ImageTask};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the `label` command.
#[derive(Args, Debug)]
pub struct LabelArgs {
    /// Image URLs, file paths, or @list.json (array of URLs or event objects)
    #[arg(required = true)]
    pub inputs: Vec<String>,

    /// Prompt sent with every image (defaults to [batch].default_prompt)
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Vision-language backend
    #[arg(short, long, value_enum, default_value = "gpt")]
    pub backend: Backend,

    /// Model name (backend-specific), overrides the configured default
    #[arg(short, long)]
    pub model: Option<String>,

    /// Images labeled concurrently per chunk
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Only label these zero-based positions (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,

    /// CSV column schema: events, images, or generic
    #[arg(long, default_value = "images")]
    pub api_type: String,

    /// Put the underlying failure cause into detailedError
    #[arg(long)]
    pub show_errors: bool,
}

/// Execute the label command.
pub async fn execute(args: LabelArgs, mut config: Config) -> anyhow::Result<()> {
    if args.show_errors {
        config.batch.expose_error_details = true;
    }
    let prompt = args
        .prompt
        .clone()
        .unwrap_or_else(|| config.batch.default_prompt.clone());

    let (tasks, events) = resolve_inputs(&args.inputs)?;
    if tasks.is_empty() {
        tracing::warn!("No images found in the given inputs");
        return Ok(());
    }
    tracing::info!("Resolved {} image(s)", tasks.len());

    let app = FrameLabel::new(config)?;
    let kind = BackendKind::from(args.backend);
    let mut processor = app.processor(kind, args.model.as_deref())?;
    if let Some(size) = args.batch_size {
        processor = processor.with_batch_size(size);
    }

    let selection = (!args.select.is_empty()).then_some(args.select.as_slice());
    let total = selection.map_or(tasks.len(), |s| s.len()) as u64;
    let progress = create_progress_bar(total);
    let start = Instant::now();

    let summary = processor
        .process_with_progress(&tasks, &prompt, selection, |p| update_progress(&progress, p))
        .await;
    progress.finish_and_clear();

    if let Some(reason) = &summary.error {
        anyhow::bail!("Labeling rejected: {reason}");
    }

    let extra = events.iter().any(Value::is_object).then_some(events.as_slice());
    let records = summary_records(&summary, extra)?;
    write_export(
        &records,
        args.format.into(),
        ApiType::parse(&args.api_type),
        args.output.as_deref(),
    )?;

    print_summary(&summary, start.elapsed());
    Ok(())
}

/// Expand CLI inputs into tasks, in order. Returns the raw item for each task
/// so event metadata can be carried into the export.
fn resolve_inputs(inputs: &[String]) -> anyhow::Result<(Vec<ImageTask>, Vec<Value>)> {
    let mut tasks = Vec::new();
    let mut raw = Vec::new();

    for input in inputs {
        if let Some(list) = input.strip_prefix('@') {
            let path = shellexpand::tilde(list).into_owned();
            let content = std::fs::read_to_string(&path)
                .map_err(|e| anyhow::anyhow!("Failed to read input list {path}: {e}"))?;
            let items: Vec<Value> = serde_json::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Input list {path} is not a JSON array: {e}"))?;
            for item in items {
                let index = tasks.len();
                match task_from_value(&item, index, index as i64 + 1) {
                    Some(task) => {
                        tasks.push(task);
                        raw.push(item);
                    }
                    None => tracing::warn!("Skipping entry in {path}: no image reference"),
                }
            }
        } else {
            let index = tasks.len();
            tasks.push(ImageTask::new(ImageSource::parse(input), index));
            raw.push(Value::String(input.clone()));
        }
    }
    Ok((tasks, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_resolve_inputs_mixes_refs_and_lists() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        write!(
            list,
            r#"["https://x/2.jpg", {{"image": "https://x/3.jpg", "serialNumber": 77}}, {{"camera": "gate"}}]"#
        )
        .unwrap();

        let inputs = vec![
            "https://x/1.jpg".to_string(),
            format!("@{}", list.path().display()),
            "./local/4.png".to_string(),
        ];
        let (tasks, raw) = resolve_inputs(&inputs).unwrap();

        assert_eq!(tasks.len(), 4);
        assert_eq!(raw.len(), 4);
        let indices: Vec<usize> = tasks.iter().map(|t| t.original_index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
        assert_eq!(tasks[2].serial_number, 77);
        assert_eq!(tasks[3].image_ref, ImageSource::File(PathBuf::from("./local/4.png")));
    }

    #[test]
    fn test_resolve_inputs_rejects_non_array_list() {
        let mut list = tempfile::NamedTempFile::new().unwrap();
        write!(list, r#"{{"image": "https://x/1.jpg"}}"#).unwrap();
        let inputs = vec![format!("@{}", list.path().display())];
        assert!(resolve_inputs(&inputs).is_err());
    }
}
