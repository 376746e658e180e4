//! The `framelabel events` command: fetch a page from the camera image source,
//! optionally labeling it.

use super::output::{create_progress_bar, print_summary, summary_records, update_progress, write_export};
use super::types::{Backend, OutputFormat};
use clap::Args;
use framelabel_core::export::ApiType;
use framelabel_core::{BackendKind, Config, FrameLabel};
use std::path::PathBuf;
use std::time::Instant;

/// Arguments for the `events` command.
#[derive(Args, Debug)]
pub struct EventsArgs {
    /// Zero-based page number
    #[arg(long, default_value = "0")]
    pub page: u32,

    /// Label the page's images instead of printing the raw page
    #[arg(long)]
    pub label: bool,

    /// Prompt sent with every image (defaults to [batch].default_prompt)
    #[arg(short, long)]
    pub prompt: Option<String>,

    /// Vision-language backend
    #[arg(short, long, value_enum, default_value = "gpt")]
    pub backend: Backend,

    /// Model name (backend-specific)
    #[arg(short, long)]
    pub model: Option<String>,

    /// Images labeled concurrently per chunk
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Output file (defaults to stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format for labeled results
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: OutputFormat,
}

/// Execute the events command.
pub async fn execute(args: EventsArgs, config: Config) -> anyhow::Result<()> {
    let prompt = args
        .prompt
        .clone()
        .unwrap_or_else(|| config.batch.default_prompt.clone());
    let app = FrameLabel::new(config)?;

    let page = app.events()?.fetch_page(args.page).await?;
    tracing::info!(
        "Page {} of {}: {} image(s), {} event(s) total",
        page.page + 1,
        page.total_pages,
        page.tasks.len(),
        page.total
    );

    if !args.label {
        let json = serde_json::to_string_pretty(&page)?;
        match &args.output {
            Some(path) => std::fs::write(path, json)?,
            None => println!("{json}"),
        }
        return Ok(());
    }

    let mut processor = app.processor(BackendKind::from(args.backend), args.model.as_deref())?;
    if let Some(size) = args.batch_size {
        processor = processor.with_batch_size(size);
    }

    let progress = create_progress_bar(page.tasks.len() as u64);
    let start = Instant::now();
    let summary = processor
        .process_with_progress(&page.tasks, &prompt, None, |p| update_progress(&progress, p))
        .await;
    progress.finish_and_clear();

    if let Some(reason) = &summary.error {
        anyhow::bail!("Labeling rejected: {reason}");
    }

    let records = summary_records(&summary, Some(&page.events))?;
    write_export(
        &records,
        args.format.into(),
        ApiType::Events,
        args.output.as_deref(),
    )?;
    print_summary(&summary, start.elapsed());
    Ok(())
}
