//! CLI subcommand implementations.

pub mod distribute;
pub mod export;
pub mod health;
pub mod import;
pub mod reset;
pub mod run;
pub mod settings;
pub mod sources;
pub mod stats;
pub mod status;
pub mod util;
