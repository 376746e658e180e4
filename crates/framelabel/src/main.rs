//! FrameLabel CLI - label camera images with vision-language models.
//!
//! Fetches images (URLs, local files, or a page from the camera image source),
//! sends each one with a prompt to GPT or Gemini, and exports the labels as
//! JSON or CSV. The same pipeline is served over HTTP by `framelabel serve`.
//!
//! # Usage
//!
//! ```bash
//! # Label two images with Gemini
//! framelabel label https://cdn.example.com/1.jpg ./porch.jpg --backend gemini -p "Who is there?"
//!
//! # Label a page of camera events and export CSV
//! framelabel events --page 0 --label --format csv --output page0.csv
//!
//! # Price a run up front
//! framelabel estimate --images 5000 --backend gpt --model gpt-4o-mini
//!
//! # Serve the HTTP API
//! framelabel serve --port 8787
//! ```

use clap::{Parser, Subcommand};

mod cli;
mod logging;
mod server;

/// FrameLabel - batch image labeling with vision-language models.
#[derive(Parser, Debug)]
#[command(name = "framelabel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Label images and export the results
    Label(cli::label::LabelArgs),

    /// Fetch (and optionally label) a page from the camera image source
    Events(cli::events::EventsArgs),

    /// Estimate token usage and cost for a number of images
    Estimate(cli::estimate::EstimateArgs),

    /// Browse and purge the response log
    Logs(cli::logs::LogsArgs),

    /// Run the HTTP API
    Serve(cli::serve::ServeArgs),

    /// View and manage configuration
    Config(cli::config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logging isn't initialized yet, so config warnings go through eprintln.
    let config = match framelabel_core::Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!(
                "Warning: Failed to load config: {e}\n  \
                 Using default configuration. Check your config file with `framelabel config path`."
            );
            framelabel_core::Config::default()
        }
    };
    logging::init_from_config(&config, cli.verbose, cli.json_logs);

    tracing::debug!("FrameLabel v{}", framelabel_core::VERSION);

    match cli.command {
        Commands::Label(args) => cli::label::execute(args, config).await,
        Commands::Events(args) => cli::events::execute(args, config).await,
        Commands::Estimate(args) => cli::estimate::execute(args, config).await,
        Commands::Logs(args) => cli::logs::execute(args, config).await,
        Commands::Serve(args) => cli::serve::execute(args, config).await,
        Commands::Config(args) => cli::config::execute(args).await,
    }
}
