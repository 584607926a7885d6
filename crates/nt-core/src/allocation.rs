//! Time budget distribution and daily statistics.
//!
//! # Algorithm Summary
//!
//! Even distribution splits a whole number of minutes across `n` sources:
//!
//! 1. `base = floor(total / n)`, `remainder = total mod n`
//! 2. The first `remainder` sources (in the order given) receive `base + 1`
//!    minutes, the rest receive `base`
//! 3. Minutes are converted to seconds
//!
//! The allocations always sum to exactly `total` minutes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::DailyUsage;
use crate::types::SourceKey;

/// Errors from budget distribution.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AllocationError {
    /// There were no sources to distribute time across.
    #[error("no sources to distribute time across")]
    NoSources,
}

/// Allocation computed for a single source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub source_key: SourceKey,
    pub allocated_secs: i64,
}

/// Splits `total_minutes` evenly across `sources`, in the order given.
pub fn distribute_evenly(
    total_minutes: u32,
    sources: &[SourceKey],
) -> Result<Vec<Allocation>, AllocationError> {
    if sources.is_empty() {
        return Err(AllocationError::NoSources);
    }
    let total = u64::from(total_minutes);
    let count = sources.len() as u64;
    let base = total / count;
    let remainder = total % count;

    Ok(sources
        .iter()
        .zip(0_u64..)
        .map(|(key, index)| {
            let minutes = if index < remainder { base + 1 } else { base };
            Allocation {
                source_key: key.clone(),
                // At most u32::MAX minutes, so seconds fit comfortably in i64.
                allocated_secs: i64::try_from(minutes * 60).unwrap_or(i64::MAX),
            }
        })
        .collect())
}

/// Aggregate usage across all sources for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub total_time_used: i64,
    pub total_sessions: i64,
    pub total_overrun: i64,
    pub sources_used: i64,
    /// Rounded mean seconds per session; 0 when there were no sessions.
    #[serde(default)]
    pub average_session_time: i64,
}

/// Sums a day's usage rows.
pub fn compute_daily_stats(rows: &[DailyUsage]) -> DailyStats {
    let mut stats = rows.iter().fold(DailyStats::default(), |mut acc, row| {
        acc.total_time_used += row.used_secs;
        acc.total_sessions += row.sessions;
        acc.total_overrun += row.overrun_secs;
        acc.sources_used += 1;
        acc
    });
    if stats.total_sessions > 0 {
        stats.average_session_time =
            (stats.total_time_used + stats.total_sessions / 2) / stats.total_sessions;
    }
    stats
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn keys(names: &[&str]) -> Vec<SourceKey> {
        names.iter().map(|n| SourceKey::new(*n).unwrap()).collect()
    }

    fn usage(key: &str, used: i64, sessions: i64, overrun: i64) -> DailyUsage {
        DailyUsage {
            source_key: SourceKey::new(key).unwrap(),
            date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
            used_secs: used,
            sessions,
            overrun_secs: overrun,
        }
    }

    #[test]
    fn distribute_gives_remainder_to_first_sources() {
        let allocations = distribute_evenly(32, &keys(&["a", "b", "c"])).unwrap();
        let secs: Vec<i64> = allocations.iter().map(|a| a.allocated_secs).collect();
        assert_eq!(secs, vec![11 * 60, 11 * 60, 10 * 60]);
        assert_eq!(allocations[0].source_key.as_str(), "a");
        assert_eq!(allocations[2].source_key.as_str(), "c");
    }

    #[test]
    fn distribute_sums_exactly_and_stays_within_a_minute_of_base() {
        let pool = keys(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j", "k"]);
        for n in 1..=pool.len() {
            for total in 0..=150_u32 {
                let allocations = distribute_evenly(total, &pool[..n]).unwrap();
                let sum: i64 = allocations.iter().map(|a| a.allocated_secs).sum();
                assert_eq!(sum, i64::from(total) * 60, "total={total} n={n}");

                let base = i64::from(total) / n as i64 * 60;
                for allocation in &allocations {
                    let diff = allocation.allocated_secs - base;
                    assert!((0..=60).contains(&diff), "total={total} n={n}");
                }
            }
        }
    }

    #[test]
    fn distribute_with_fewer_minutes_than_sources() {
        let allocations = distribute_evenly(2, &keys(&["a", "b", "c"])).unwrap();
        let secs: Vec<i64> = allocations.iter().map(|a| a.allocated_secs).collect();
        assert_eq!(secs, vec![60, 60, 0]);
    }

    #[test]
    fn distribute_rejects_empty_source_list() {
        assert_eq!(distribute_evenly(30, &[]), Err(AllocationError::NoSources));
    }

    #[test]
    fn stats_of_no_rows_are_zero() {
        assert_eq!(compute_daily_stats(&[]), DailyStats::default());
    }

    #[test]
    fn stats_sum_rows_and_average_sessions() {
        let rows = vec![usage("a", 301, 1, 1), usage("b", 100, 2, 0)];
        let stats = compute_daily_stats(&rows);
        assert_eq!(stats.total_time_used, 401);
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.total_overrun, 1);
        assert_eq!(stats.sources_used, 2);
        assert_eq!(stats.average_session_time, 134);
    }

    #[test]
    fn stats_without_sessions_do_not_divide() {
        let stats = compute_daily_stats(&[usage("a", 45, 0, 0)]);
        assert_eq!(stats.total_time_used, 45);
        assert_eq!(stats.average_session_time, 0);
    }
}
