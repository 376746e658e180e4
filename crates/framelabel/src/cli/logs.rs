//! The `framelabel logs` command: browse and sweep the response log.

use chrono::NaiveDate;
use clap::{Args, Subcommand};
use framelabel_core::{Config, FileResponseLog};

/// Arguments for the `logs` command.
#[derive(Args, Debug)]
pub struct LogsArgs {
    #[command(subcommand)]
    pub command: LogsCommand,
}

/// Subcommands for response log management.
#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// List log files, newest first
    List {
        /// First UTC date to include (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,

        /// Last UTC date to include (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,

        /// Print the listing as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print one log file
    View {
        /// Log filename as shown by `logs list`
        filename: String,
    },

    /// Delete log files
    Purge {
        /// Only delete files older than this many days (0 deletes everything)
        #[arg(long, default_value = "0")]
        older_than_days: u32,
    },
}

/// Execute the logs command.
pub async fn execute(args: LogsArgs, config: Config) -> anyhow::Result<()> {
    let log = FileResponseLog::new(config.response_log_dir());

    match args.command {
        LogsCommand::List { start, end, json } => {
            let files = log.list(start, end)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&files)?);
            } else if files.is_empty() {
                eprintln!("No response logs in {}", log.dir().display());
            } else {
                for file in &files {
                    println!(
                        "{} {}  {:<7} {:<24} {:>8}  {}",
                        file.date, file.time, file.backend, file.model, file.size_bytes, file.filename
                    );
                }
            }
        }

        LogsCommand::View { filename } => {
            println!("{}", log.read(&filename)?);
        }

        LogsCommand::Purge { older_than_days } => {
            let removed = log.purge(older_than_days)?;
            tracing::info!("Removed {removed} response log file(s)");
            println!("Removed {removed} file(s) from {}", log.dir().display());
        }
    }

    Ok(())
}
