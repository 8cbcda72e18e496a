mod cli;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use conecta::{AppState, Config};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Logs go to stderr so command output stays clean
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting Conecta v{}", env!("CARGO_PKG_VERSION"));
    info!("Backend: {}", config.backend_url);

    let state = AppState::init(config).await?;

    if let Err(e) = cli::run(cli.command, &state).await {
        eprintln!("Error: {}", e.user_message());
        std::process::exit(1);
    }

    Ok(())
}
