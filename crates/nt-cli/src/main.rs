use std::fs::File;
use std::io::{self, BufWriter, Write};

use anyhow::{Context, Result};
use clap::Parser;
use nt_client::ApiClient;
use tracing_subscriber::EnvFilter;

use nt_cli::commands::util::{connect, open_session, parse_key, print_notices};
use nt_cli::commands::{
    distribute, export, health, import, reset, run, settings, sources, stats, status,
};
use nt_cli::{Cli, Commands, Config, SessionDriver, SettingsAction, SourcesAction};

/// Waits for pending flushes and reports what happened on stderr.
async fn close_session(driver: &mut SessionDriver<ApiClient>) -> Result<()> {
    driver.finish().await;
    print_notices(&mut io::stderr(), driver)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let Some(command) = cli.command else {
        // No subcommand, show help
        use clap::CommandFactory;
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let config =
        Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match command {
        Commands::Health => {
            let client = connect(&config)?;
            health::run(&mut out, &client).await?;
        }
        Commands::Stats { json } => {
            let client = connect(&config)?;
            stats::run(&mut out, &client, json).await?;
        }
        Commands::Status => {
            let mut driver = open_session(&config).await?;
            status::run(&mut out, &driver)?;
            close_session(&mut driver).await?;
        }
        Commands::Run { source } => {
            let source = source.as_deref().map(parse_key).transpose()?;
            let mut driver = open_session(&config).await?;
            run::run(&mut out, &mut driver, source, config.refresh_interval()).await?;
            close_session(&mut driver).await?;
        }
        Commands::Sources(action) => {
            let mut driver = open_session(&config).await?;
            match action {
                SourcesAction::List { json } => sources::list(&mut out, &driver, json)?,
                SourcesAction::Add { name, icon, url } => {
                    sources::add(&mut driver, name, icon, url).await?;
                }
                SourcesAction::Remove { key } => sources::remove(&mut driver, &key).await?,
                SourcesAction::Allocate { key, minutes } => {
                    sources::allocate(&mut driver, &key, minutes).await?;
                }
            }
            close_session(&mut driver).await?;
        }
        Commands::Distribute { minutes } => {
            let mut driver = open_session(&config).await?;
            distribute::run(&mut out, &mut driver, minutes).await?;
            close_session(&mut driver).await?;
        }
        Commands::Settings(action) => {
            let mut driver = open_session(&config).await?;
            match action {
                SettingsAction::Show => settings::show(&mut out, &driver)?,
                SettingsAction::Set { limit, auto_start } => {
                    settings::set(&mut out, &mut driver, limit, auto_start).await?;
                }
            }
            close_session(&mut driver).await?;
        }
        Commands::Reset => {
            let mut driver = open_session(&config).await?;
            reset::run(&mut out, &mut driver).await?;
            close_session(&mut driver).await?;
        }
        Commands::Export { file } => {
            let mut driver = open_session(&config).await?;
            match file {
                Some(path) => {
                    let file = File::create(&path)
                        .with_context(|| format!("failed to create {}", path.display()))?;
                    let mut writer = BufWriter::new(file);
                    export::run(&mut writer, &driver).await?;
                    writer.flush().context("failed to write export")?;
                    writeln!(out, "Exported to {}", path.display())?;
                }
                None => export::run(&mut out, &driver).await?,
            }
            close_session(&mut driver).await?;
        }
        Commands::Import { file } => {
            let mut driver = open_session(&config).await?;
            import::run(&mut out, &mut driver, &file).await?;
            close_session(&mut driver).await?;
        }
    }

    Ok(())
}
