//! Core domain logic for the news reading time tracker.
//!
//! This crate contains the fundamental types and logic for:
//! - Sources: news feeds with a daily time allocation each
//! - Allocation: even distribution of a time budget and daily statistics
//! - Timer: the reading-session state machine and the side effects it requests
//! - Sync: online/offline mode and the local cache snapshot
//!
//! Nothing here performs I/O. The [`UsageStore`] trait is the boundary to the
//! system of record.

mod allocation;
pub mod api;
mod source;
mod store;
pub mod sync;
pub mod timer;
mod types;

pub use allocation::{
    Allocation, AllocationError, DailyStats, compute_daily_stats, distribute_evenly,
};
pub use source::{DEFAULT_SOURCES, DailyUsage, DefaultSource, Settings, Source, overrun};
pub use store::{StoreError, StoreResult, UsageStore};
pub use sync::{CacheSnapshot, SyncMode, SyncPolicy, WriteOutcome};
pub use timer::{
    Effect, RefreshScope, SessionSnapshot, SourceStatus, SourceTimer, TimerState,
    TimerStateMachine, TrackedSource, Warning,
};
pub use types::{
    DEFAULT_ALLOCATION_SECS, DEFAULT_ICON, DEFAULT_TIME_LIMIT_SECS, MAX_ALLOCATION_SECS,
    MAX_TIME_LIMIT_SECS, MIN_ALLOCATION_SECS, MIN_TIME_LIMIT_SECS, SourceKey, ValidationError,
    validate_allocation, validate_time_limit, validate_usage,
};
