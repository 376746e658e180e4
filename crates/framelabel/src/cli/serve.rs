//! The `framelabel serve` command: run the HTTP API.

use crate::server;
use clap::Args;
use framelabel_core::{Config, FrameLabel};

/// Arguments for the `serve` command.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind (defaults to [server].host)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind (defaults to [server].port)
    #[arg(short, long)]
    pub port: Option<u16>,
}

/// Execute the serve command.
pub async fn execute(args: ServeArgs, config: Config) -> anyhow::Result<()> {
    let host = args.host.unwrap_or_else(|| config.server.host.clone());
    let port = args.port.unwrap_or(config.server.port);
    let app = FrameLabel::new(config)?;
    server::start_server(app, &host, port).await
}
