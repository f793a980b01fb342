//! `acm serve`: run the HTTP backend

use anyhow::{Context, Result};
use clap::Parser;
use scholar_core::config::ScholarConfig;
use scholar_server::{run_server, ServeConfig};

#[derive(Parser, Debug)]
pub struct ServeArgs {
    /// Interface to bind (default: API_HOST or 0.0.0.0)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to listen on (default: API_PORT, PORT or 5055)
    #[arg(long, short)]
    pub port: Option<u16>,
}

pub async fn run_serve(args: ServeArgs) -> Result<()> {
    // The hosted backend is configured by environment alone, so a missing file is fine
    let config = ScholarConfig::load_or_default()?;
    let serve = ServeConfig::from_config(&config)
        .with_host(args.host)
        .with_port(args.port);

    tracing::info!("Starting acm backend on {}", serve.address());
    run_server(&config, serve).await.context("Server error")?;
    Ok(())
}
