//! The `framelabel estimate` command: projected spend before a run.

use super::types::Backend;
use clap::Args;
use framelabel_core::{BackendKind, Config, RateTable};

/// Arguments for the `estimate` command.
#[derive(Args, Debug)]
pub struct EstimateArgs {
    /// Number of images to price
    #[arg(short, long)]
    pub images: u64,

    /// Vision-language backend
    #[arg(short, long, value_enum, default_value = "gpt")]
    pub backend: Backend,

    /// Model name; unknown or absent models use the backend's legacy rate
    #[arg(short, long)]
    pub model: Option<String>,

    /// Print the estimate as JSON
    #[arg(long)]
    pub json: bool,

    /// List models with built-in or configured rates
    #[arg(long)]
    pub list_models: bool,
}

/// Execute the estimate command.
pub async fn execute(args: EstimateArgs, config: Config) -> anyhow::Result<()> {
    let rates = RateTable::new(config.pricing);

    if args.list_models {
        for model in rates.models() {
            println!("{model}");
        }
        return Ok(());
    }

    let backend = BackendKind::from(args.backend);
    let estimate = rates
        .estimate(args.images, backend, args.model.as_deref())
        .ok_or_else(|| anyhow::anyhow!("{} images is too many to estimate", args.images))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&estimate)?);
        return Ok(());
    }

    let model = args.model.as_deref().unwrap_or("(legacy rate)");
    println!("  {} images on {backend} {model}", args.images);
    println!("    Input:   {:>12} tokens   ${:>10.4}", estimate.input_tokens, estimate.input_cost);
    println!("    Output:  {:>12} tokens   ${:>10.4}", estimate.output_tokens, estimate.output_cost);
    println!("    Total:   {:>12} tokens   ${:>10.4}", estimate.total_tokens, estimate.total_cost);
    Ok(())
}
