//! News reading time tracker CLI library.
//!
//! The [`SessionDriver`] is the adapter between the pure timer state machine
//! in `nt-core` and the outside world: the store, the local cache and the
//! terminal.

mod cli;
pub mod commands;
mod config;
pub mod display;
pub mod driver;
#[cfg(test)]
mod testing;

pub use cli::{Cli, Commands, SettingsAction, SourcesAction};
pub use config::{Config, dirs_state_path};
pub use driver::{Notice, NoticeLevel, SessionDriver, SyncOutcome};
