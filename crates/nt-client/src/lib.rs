//! Client side of the news reading time tracker.
//!
//! - [`ApiClient`]: the [`nt_core::UsageStore`] implementation backed by the
//!   REST surface, with a per-request timeout
//! - [`LocalCache`]: the snapshot file used when the store is unreachable

mod cache;
mod client;

pub use cache::{CacheError, LocalCache};
pub use client::{ApiClient, ClientError, DEFAULT_TIMEOUT};
