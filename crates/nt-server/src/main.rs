use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use nt_server::{AppState, ServerConfig, app};

/// REST server for the news reading time tracker.
#[derive(Debug, Parser)]
#[command(name = "nt-server", version, about, long_about = None)]
struct Args {
    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to listen on, overriding the configuration.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config =
        ServerConfig::load_from(args.config.as_deref()).context("failed to load configuration")?;
    if let Some(bind) = args.bind {
        config.bind = bind;
    }

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level))
    };
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    tracing::debug!(?config, "loaded configuration");

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind))?;
    tracing::info!(bind = %config.bind, db = %config.database_path.display(), "nt-server listening");

    let state = Arc::new(AppState::new(config));
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutting down");
    }
}
