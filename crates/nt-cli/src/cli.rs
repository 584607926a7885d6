//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// News reading time tracker.
///
/// Budgets daily reading time across news sources and tracks it against a
/// countdown timer, persisted through the tracker server.
#[derive(Debug, Parser)]
#[command(name = "nt", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show today's remaining time and per-source progress.
    Status,

    /// Run an interactive reading session.
    Run {
        /// Source to select and start immediately.
        source: Option<String>,
    },

    /// Manage news sources.
    #[command(subcommand)]
    Sources(SourcesAction),

    /// Split the daily limit evenly across all sources.
    Distribute {
        /// Minutes to distribute; saved as the new daily limit.
        minutes: Option<u32>,
    },

    /// Show or change settings.
    #[command(subcommand)]
    Settings(SettingsAction),

    /// Show today's usage statistics.
    Stats {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Clear today's usage for every source.
    Reset,

    /// Write sources, settings and stats to a JSON backup.
    Export {
        /// Output file (stdout if omitted).
        file: Option<PathBuf>,
    },

    /// Restore settings and allocations from a JSON backup.
    Import {
        /// Backup file written by `nt export`.
        file: PathBuf,
    },

    /// Check that the server is reachable.
    Health,
}

/// Source subcommands.
#[derive(Debug, Subcommand)]
pub enum SourcesAction {
    /// List sources with today's usage.
    List {
        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Add a source and redistribute the daily limit evenly.
    Add {
        /// Display name; the key is derived from it.
        name: String,

        /// Icon shown next to the name.
        #[arg(long)]
        icon: Option<String>,

        /// Homepage of the source.
        #[arg(long)]
        url: Option<String>,
    },

    /// Delete a source and its usage history.
    Remove {
        /// Source key (e.g. `bbc-football`).
        key: String,
    },

    /// Set one source's daily allocation.
    Allocate {
        /// Source key (e.g. `bbc-football`).
        key: String,

        /// Allocation in minutes.
        minutes: u32,
    },
}

/// Settings subcommands.
#[derive(Debug, Subcommand)]
pub enum SettingsAction {
    /// Print the current settings.
    Show,

    /// Change one or more settings.
    Set {
        /// Daily limit in minutes.
        #[arg(long)]
        limit: Option<u32>,

        /// Start the timer as soon as a source is selected.
        #[arg(long)]
        auto_start: Option<bool>,
    },
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_allocate_with_minutes() {
        let cli = Cli::try_parse_from(["nt", "sources", "allocate", "cnn", "12"]).unwrap();
        match cli.command {
            Some(Commands::Sources(SourcesAction::Allocate { key, minutes })) => {
                assert_eq!(key, "cnn");
                assert_eq!(minutes, 12);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_settings_set_flags() {
        let cli = Cli::try_parse_from([
            "nt",
            "-v",
            "settings",
            "set",
            "--limit",
            "45",
            "--auto-start",
            "true",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Some(Commands::Settings(SettingsAction::Set {
                limit: Some(45),
                auto_start: Some(true)
            }))
        ));
    }
}
