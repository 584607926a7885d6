//! Reading-session timer state machine.
//!
//! [`TimerStateMachine`] owns the transient session: which source is selected,
//! per-source counters, and the running daily total. It performs no I/O.
//! Every operation returns the side effects the caller must carry out
//! (start/stop the 1-second ticker, flush usage, clear remote usage, reload
//! sources) as a list of [`Effect`]s, in the order they should run.
//!
//! # States
//!
//! ```text
//! Idle ──select──▶ Selected ──start──▶ Running ──pause──▶ Paused
//!                                        │  ▲                │
//!                                        │  └─────start──────┘
//!                                        └─daily limit─▶ DailyLimitReached
//! any ──reset──▶ Idle
//! ```
//!
//! Reaching a source's allocation is a soft limit: an
//! [`Effect::AllocationReached`] is raised once per run and the timer keeps
//! going. Reaching the daily limit is hard: the ticker stops and only
//! [`TimerStateMachine::reset`] leaves [`TimerState::DailyLimitReached`].

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::allocation::Allocation;
use crate::api::{SourceView, UsageRequest};
use crate::source::{Settings, overrun};
use crate::types::SourceKey;

/// Number of ticks between periodic usage flushes.
pub const FLUSH_EVERY_TICKS: u32 = 10;

/// Lifecycle state of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerState {
    /// No source selected, not running.
    Idle,
    /// A source is chosen but the ticker has not started.
    Selected,
    /// The ticker is running against the current source.
    Running,
    /// Stopped with elapsed time retained.
    Paused,
    /// The daily limit was hit; terminal until reset.
    DailyLimitReached,
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Selected => "selected",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::DailyLimitReached => "daily limit reached",
        };
        write!(f, "{s}")
    }
}

/// Counters for one source, all in seconds except `sessions`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceTimer {
    pub allocated: i64,
    pub used: i64,
    pub sessions: i64,
    #[serde(rename = "overrunTime")]
    pub overrun: i64,
}

impl SourceTimer {
    /// A timer with nothing used yet.
    pub const fn new(allocated: i64) -> Self {
        Self {
            allocated,
            used: 0,
            sessions: 0,
            overrun: 0,
        }
    }

    /// Seconds left before the allocation is reached, never negative.
    pub const fn remaining(&self) -> i64 {
        let left = self.allocated - self.used;
        if left > 0 { left } else { 0 }
    }

    /// Whether the source is under, exactly at, or past its allocation.
    pub const fn status(&self) -> SourceStatus {
        if self.used > self.allocated {
            SourceStatus::Overrun
        } else if self.used == self.allocated {
            SourceStatus::Complete
        } else {
            SourceStatus::Under
        }
    }

    fn zero(&mut self) {
        self.used = 0;
        self.sessions = 0;
        self.overrun = 0;
    }
}

/// Display classification of a source's usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceStatus {
    Under,
    Complete,
    Overrun,
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Under => "under",
            Self::Complete => "complete",
            Self::Overrun => "overrun",
        };
        write!(f, "{s}")
    }
}

/// A source as tracked by the session: identity for display plus counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedSource {
    pub key: SourceKey,
    pub name: String,
    pub icon: String,
    pub timer: SourceTimer,
}

impl From<SourceView> for TrackedSource {
    fn from(view: SourceView) -> Self {
        Self {
            timer: SourceTimer {
                allocated: view.allocated,
                used: view.used,
                sessions: view.sessions,
                overrun: view.overrun_time,
            },
            key: view.key,
            name: view.name,
            icon: view.icon,
        }
    }
}

/// A user-visible warning raised when an operation is refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    UnknownSource(SourceKey),
    NoSourceSelected,
    DailyLimitReached,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownSource(key) => write!(f, "Unknown news source: {key}"),
            Self::NoSourceSelected => write!(f, "Please select a news source first."),
            Self::DailyLimitReached => write!(f, "Daily time limit reached! Please reset."),
        }
    }
}

/// A side effect requested by the state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Begin firing [`TimerStateMachine::tick`] once per second.
    StartTicker,
    /// Cancel the ticker so no further ticks fire.
    StopTicker,
    /// Persist the given counters for today (fire-and-forget).
    Flush(UsageRequest),
    /// Delete today's usage rows in the store.
    ClearRemoteUsage,
    /// Re-read the source list and merge it with [`TimerStateMachine::apply_remote`].
    ReloadSources,
    /// The current source reached its allocation. It keeps running.
    AllocationReached { source_key: SourceKey },
    /// The daily limit was reached and the session stopped.
    DailyLimitReached,
    /// The operation was refused; nothing changed.
    Warn(Warning),
}

/// How much of a remote source list to adopt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshScope {
    /// Take definitions and counters, except for the running source's counters.
    Full,
    /// Take definitions (names, allocations, added/removed sources) but keep
    /// every local counter.
    DefinitionsOnly,
}

/// Full session state, as written to the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub sources: Vec<TrackedSource>,
    pub settings: Settings,
    #[serde(rename = "dailyUsedSeconds")]
    pub daily_used: i64,
}

/// The client-side session controller.
#[derive(Debug, Clone)]
pub struct TimerStateMachine {
    state: TimerState,
    settings: Settings,
    sources: Vec<TrackedSource>,
    current: Option<SourceKey>,
    daily_used: i64,
    /// Whether the allocation event already fired during the current run.
    allocation_notified: bool,
    ticks_since_flush: u32,
}

impl TimerStateMachine {
    /// Creates an idle session from loaded sources and settings.
    ///
    /// The daily total is the sum of every source's used time. A session
    /// loaded at or past the limit starts in [`TimerState::DailyLimitReached`].
    pub fn new(settings: Settings, sources: Vec<TrackedSource>) -> Self {
        let daily_used = sources.iter().map(|s| s.timer.used).sum();
        let state = if daily_used >= settings.total_time_limit_secs {
            TimerState::DailyLimitReached
        } else {
            TimerState::Idle
        };
        Self {
            state,
            settings,
            sources,
            current: None,
            daily_used,
            allocation_notified: false,
            ticks_since_flush: 0,
        }
    }

    /// Creates a session from a remote source listing.
    pub fn from_remote(settings: Settings, views: Vec<SourceView>) -> Self {
        Self::new(settings, views.into_iter().map(TrackedSource::from).collect())
    }

    /// Restores a session from a cached snapshot.
    ///
    /// The cached daily total is kept as-is rather than recomputed, since the
    /// snapshot is the display of record while offline.
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let mut machine = Self::new(snapshot.settings, snapshot.sources);
        machine.daily_used = snapshot.daily_used;
        machine.state = if machine.daily_used >= machine.settings.total_time_limit_secs {
            TimerState::DailyLimitReached
        } else {
            TimerState::Idle
        };
        machine
    }

    /// Captures the state written to the local cache.
    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            sources: self.sources.clone(),
            settings: self.settings,
            daily_used: self.daily_used,
        }
    }

    pub const fn state(&self) -> TimerState {
        self.state
    }

    pub const fn settings(&self) -> Settings {
        self.settings
    }

    pub const fn current_source(&self) -> Option<&SourceKey> {
        self.current.as_ref()
    }

    pub const fn daily_used(&self) -> i64 {
        self.daily_used
    }

    /// Seconds left of the daily limit, never negative.
    pub const fn daily_remaining(&self) -> i64 {
        let left = self.settings.total_time_limit_secs - self.daily_used;
        if left > 0 { left } else { 0 }
    }

    pub fn is_running(&self) -> bool {
        self.state == TimerState::Running
    }

    /// Sources in display order.
    pub fn sources(&self) -> &[TrackedSource] {
        &self.sources
    }

    /// Source keys in display order.
    pub fn source_keys(&self) -> Vec<SourceKey> {
        self.sources.iter().map(|s| s.key.clone()).collect()
    }

    pub fn source(&self, key: &SourceKey) -> Option<&TrackedSource> {
        self.sources.iter().find(|s| &s.key == key)
    }

    fn position(&self, key: &SourceKey) -> Option<usize> {
        self.sources.iter().position(|s| &s.key == key)
    }

    /// Chooses the source to read and starts its timer.
    ///
    /// A different source that is running is paused (and flushed) first.
    /// Selecting the source that is already running changes nothing.
    pub fn select_source(&mut self, key: &SourceKey) -> Vec<Effect> {
        if self.position(key).is_none() {
            debug!(source = %key, "ignoring selection of unknown source");
            return vec![Effect::Warn(Warning::UnknownSource(key.clone()))];
        }

        let mut effects = Vec::new();
        if self.state == TimerState::Running {
            if self.current.as_ref() == Some(key) {
                return effects;
            }
            effects.extend(self.pause());
        }

        self.current = Some(key.clone());
        if self.state != TimerState::DailyLimitReached {
            self.state = TimerState::Selected;
        }
        effects.extend(self.start());
        effects
    }

    /// Starts ticking against the current source.
    pub fn start(&mut self) -> Vec<Effect> {
        let Some(key) = self.current.clone() else {
            return vec![Effect::Warn(Warning::NoSourceSelected)];
        };
        if self.state == TimerState::Running {
            return Vec::new();
        }
        if self.state == TimerState::DailyLimitReached
            || self.daily_used >= self.settings.total_time_limit_secs
        {
            self.state = TimerState::DailyLimitReached;
            return vec![Effect::Warn(Warning::DailyLimitReached)];
        }

        self.state = TimerState::Running;
        self.allocation_notified = false;
        info!(source = %key, "timer started");
        vec![Effect::StartTicker]
    }

    /// Advances the running session by one second.
    ///
    /// Ticks outside [`TimerState::Running`] are ignored, so a tick that was
    /// already scheduled when the timer stopped is harmless.
    pub fn tick(&mut self) -> Vec<Effect> {
        if self.state != TimerState::Running {
            return Vec::new();
        }
        let Some(index) = self.current.as_ref().and_then(|key| self.position(key)) else {
            return Vec::new();
        };

        self.daily_used += 1;
        self.ticks_since_flush += 1;
        let source = &mut self.sources[index];
        source.timer.used += 1;
        source.timer.overrun = overrun(source.timer.used, source.timer.allocated);

        let mut effects = Vec::new();
        if source.timer.used >= source.timer.allocated && !self.allocation_notified {
            self.allocation_notified = true;
            source.timer.sessions += 1;
            info!(source = %source.key, used = source.timer.used, "allocation reached");
            effects.push(Effect::AllocationReached {
                source_key: source.key.clone(),
            });
        }

        let mut flushed = false;
        if self.ticks_since_flush >= FLUSH_EVERY_TICKS {
            if let Some(flush) = self.take_flush() {
                effects.push(Effect::Flush(flush));
                flushed = true;
            }
        }

        if self.daily_used >= self.settings.total_time_limit_secs {
            effects.extend(self.hit_daily_limit(flushed));
        }
        effects
    }

    /// Stops ticking and flushes the current source.
    pub fn pause(&mut self) -> Vec<Effect> {
        if self.state != TimerState::Running {
            return Vec::new();
        }
        self.state = TimerState::Paused;
        info!(source = ?self.current.as_ref().map(SourceKey::as_str), "timer paused");
        let mut effects = vec![Effect::StopTicker];
        effects.extend(self.take_flush().map(Effect::Flush));
        effects
    }

    /// Zeroes today's usage locally and asks for the remote rows to be cleared
    /// and the source list reloaded.
    pub fn reset(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.state == TimerState::Running {
            effects.push(Effect::StopTicker);
        }

        for source in &mut self.sources {
            source.timer.zero();
        }
        self.daily_used = 0;
        self.current = None;
        self.state = TimerState::Idle;
        self.allocation_notified = false;
        self.ticks_since_flush = 0;
        info!("session reset");

        effects.push(Effect::ClearRemoteUsage);
        effects.push(Effect::ReloadSources);
        effects
    }

    /// Replaces the settings, enforcing a lowered limit immediately.
    pub fn set_settings(&mut self, settings: Settings) -> Vec<Effect> {
        self.settings = settings;
        if self.state == TimerState::Running
            && self.daily_used >= self.settings.total_time_limit_secs
        {
            return self.hit_daily_limit(false);
        }
        Vec::new()
    }

    /// Changes one source's allocation and recomputes its overrun.
    pub fn set_allocation(&mut self, key: &SourceKey, allocated_secs: i64) -> Vec<Effect> {
        let Some(index) = self.position(key) else {
            return vec![Effect::Warn(Warning::UnknownSource(key.clone()))];
        };
        let timer = &mut self.sources[index].timer;
        timer.allocated = allocated_secs;
        timer.overrun = overrun(timer.used, allocated_secs);
        if self.current.as_ref() == Some(key) && timer.used < allocated_secs {
            // Raising the allocation above usage makes a new crossing possible.
            self.allocation_notified = false;
        }
        Vec::new()
    }

    /// Applies a batch of allocations, e.g. from an even redistribution.
    pub fn apply_allocations(&mut self, allocations: &[Allocation]) -> Vec<Effect> {
        allocations
            .iter()
            .flat_map(|a| self.set_allocation(&a.source_key, a.allocated_secs))
            .collect()
    }

    /// Starts tracking a newly created source. Existing keys are left alone.
    pub fn add_source(&mut self, source: TrackedSource) {
        if self.position(&source.key).is_none() {
            self.daily_used += source.timer.used;
            self.sources.push(source);
        }
    }

    /// Stops tracking a deleted source, stopping the session if it was current.
    pub fn remove_source(&mut self, key: &SourceKey) -> Vec<Effect> {
        let Some(index) = self.position(key) else {
            return vec![Effect::Warn(Warning::UnknownSource(key.clone()))];
        };
        let mut effects = Vec::new();
        if self.current.as_ref() == Some(key) {
            if self.state == TimerState::Running {
                effects.push(Effect::StopTicker);
            }
            self.current = None;
            if self.state != TimerState::DailyLimitReached {
                self.state = TimerState::Idle;
            }
        }
        let removed = self.sources.remove(index);
        self.daily_used -= removed.timer.used;
        effects
    }

    /// Merges a source listing read from the store.
    ///
    /// While running, the current source's counters are never replaced by the
    /// remote values, which are at best one flush behind; its definition
    /// (name, icon, allocation) is still refreshed. A running source missing
    /// from the listing stays tracked.
    pub fn apply_remote(&mut self, views: Vec<SourceView>, scope: RefreshScope) {
        let running = if self.state == TimerState::Running {
            self.current.clone()
        } else {
            None
        };

        let mut merged: Vec<TrackedSource> = Vec::with_capacity(views.len());
        for view in views {
            let keep_counters =
                scope == RefreshScope::DefinitionsOnly || running.as_ref() == Some(&view.key);
            let local = self.source(&view.key).map(|s| s.timer);
            let mut tracked = TrackedSource::from(view);
            if keep_counters {
                let allocated = tracked.timer.allocated;
                tracked.timer = local.unwrap_or_default();
                tracked.timer.allocated = allocated;
                tracked.timer.overrun = overrun(tracked.timer.used, allocated);
            }
            merged.push(tracked);
        }

        if let Some(key) = &running {
            if !merged.iter().any(|s| &s.key == key) {
                if let Some(local) = self.source(key) {
                    merged.push(local.clone());
                }
            }
        }

        self.sources = merged;
        self.daily_used = self.sources.iter().map(|s| s.timer.used).sum();

        let current_gone = self
            .current
            .as_ref()
            .is_some_and(|key| self.position(key).is_none());
        if current_gone {
            self.current = None;
            if matches!(self.state, TimerState::Selected | TimerState::Paused) {
                self.state = TimerState::Idle;
            }
        }
        debug!(sources = self.sources.len(), ?scope, "merged remote sources");
    }

    fn hit_daily_limit(&mut self, already_flushed: bool) -> Vec<Effect> {
        self.state = TimerState::DailyLimitReached;
        info!(used = self.daily_used, "daily limit reached");
        let mut effects = vec![Effect::StopTicker, Effect::DailyLimitReached];
        if !already_flushed {
            effects.extend(self.take_flush().map(Effect::Flush));
        }
        effects
    }

    /// Builds a flush of the current source's counters and restarts the
    /// periodic flush count.
    fn take_flush(&mut self) -> Option<UsageRequest> {
        self.ticks_since_flush = 0;
        let key = self.current.as_ref()?;
        let source = self.source(key)?;
        Some(UsageRequest {
            source_key: source.key.clone(),
            time_used: source.timer.used,
            sessions: source.timer.sessions,
            overrun_time: source.timer.overrun,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> SourceKey {
        SourceKey::new(name).unwrap()
    }

    fn tracked(name: &str, allocated: i64, used: i64) -> TrackedSource {
        TrackedSource {
            key: key(name),
            name: name.to_uppercase(),
            icon: "📰".to_string(),
            timer: SourceTimer {
                allocated,
                used,
                sessions: 0,
                overrun: overrun(used, allocated),
            },
        }
    }

    fn machine(limit: i64) -> TimerStateMachine {
        TimerStateMachine::new(
            Settings {
                total_time_limit_secs: limit,
                auto_start: false,
            },
            vec![tracked("a", 300, 0), tracked("b", 120, 0)],
        )
    }

    fn run_ticks(m: &mut TimerStateMachine, n: usize) -> Vec<Effect> {
        (0..n).flat_map(|_| m.tick()).collect()
    }

    fn flushes(effects: &[Effect]) -> Vec<&UsageRequest> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Flush(req) => Some(req),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn new_session_is_idle_with_summed_usage() {
        let m = TimerStateMachine::new(
            Settings::default(),
            vec![tracked("a", 300, 20), tracked("b", 300, 22)],
        );
        assert_eq!(m.state(), TimerState::Idle);
        assert_eq!(m.daily_used(), 42);
        assert_eq!(m.daily_remaining(), 1800 - 42);
    }

    #[test]
    fn start_without_selection_warns() {
        let mut m = machine(1800);
        assert_eq!(m.start(), vec![Effect::Warn(Warning::NoSourceSelected)]);
        assert_eq!(m.state(), TimerState::Idle);
    }

    #[test]
    fn select_unknown_source_changes_nothing() {
        let mut m = machine(1800);
        let effects = m.select_source(&key("nope"));
        assert_eq!(effects, vec![Effect::Warn(Warning::UnknownSource(key("nope")))]);
        assert_eq!(m.state(), TimerState::Idle);
        assert!(m.current_source().is_none());
    }

    #[test]
    fn select_source_auto_starts() {
        let mut m = machine(1800);
        assert_eq!(m.select_source(&key("a")), vec![Effect::StartTicker]);
        assert_eq!(m.state(), TimerState::Running);
        assert_eq!(m.current_source(), Some(&key("a")));
    }

    #[test]
    fn reselecting_running_source_is_a_no_op() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        assert!(m.select_source(&key("a")).is_empty());
        assert!(m.is_running());
    }

    #[test]
    fn switching_sources_pauses_and_flushes_the_previous_one() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 3);

        let effects = m.select_source(&key("b"));
        assert_eq!(
            effects,
            vec![
                Effect::StopTicker,
                Effect::Flush(UsageRequest {
                    source_key: key("a"),
                    time_used: 3,
                    sessions: 0,
                    overrun_time: 0,
                }),
                Effect::StartTicker,
            ]
        );
        assert_eq!(m.current_source(), Some(&key("b")));
        assert!(m.is_running());
    }

    #[test]
    fn ticks_count_used_and_overrun() {
        let mut m = TimerStateMachine::new(Settings::default(), vec![tracked("a", 60, 0)]);
        m.select_source(&key("a"));
        for n in 1..=90_i64 {
            m.tick();
            let timer = m.source(&key("a")).unwrap().timer;
            assert_eq!(timer.used, n);
            assert_eq!(timer.overrun, (n - 60).max(0));
        }
        assert_eq!(m.daily_used(), 90);
    }

    #[test]
    fn flushes_every_tenth_tick() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        let effects = run_ticks(&mut m, 25);
        let sent: Vec<i64> = flushes(&effects).iter().map(|f| f.time_used).collect();
        assert_eq!(sent, vec![10, 20]);
    }

    #[test]
    fn allocation_reached_fires_once_and_keeps_running() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        let effects = run_ticks(&mut m, 301);

        let reached: Vec<&Effect> = effects
            .iter()
            .filter(|e| matches!(e, Effect::AllocationReached { .. }))
            .collect();
        assert_eq!(
            reached,
            vec![&Effect::AllocationReached {
                source_key: key("a")
            }]
        );

        let timer = m.source(&key("a")).unwrap().timer;
        assert_eq!(timer.used, 301);
        assert_eq!(timer.overrun, 1);
        assert_eq!(timer.sessions, 1);
        assert_eq!(timer.status(), SourceStatus::Overrun);
        assert!(m.is_running());
    }

    #[test]
    fn allocation_reached_fires_again_on_a_new_run() {
        let mut m = machine(1800);
        m.select_source(&key("b"));
        run_ticks(&mut m, 125);
        m.pause();
        m.start();
        let effects = run_ticks(&mut m, 1);
        assert!(effects.contains(&Effect::AllocationReached {
            source_key: key("b")
        }));
        assert_eq!(m.source(&key("b")).unwrap().timer.sessions, 2);
    }

    #[test]
    fn daily_limit_stops_the_session_and_flushes() {
        let mut m = machine(60);
        m.select_source(&key("a"));
        let effects = run_ticks(&mut m, 60);

        assert_eq!(m.state(), TimerState::DailyLimitReached);
        assert!(effects.contains(&Effect::StopTicker));
        assert!(effects.contains(&Effect::DailyLimitReached));
        // The 60th tick is also a periodic flush; it is not sent twice.
        let last_tick_flushes = flushes(&effects)
            .into_iter()
            .filter(|f| f.time_used == 60)
            .count();
        assert_eq!(last_tick_flushes, 1);

        assert!(m.tick().is_empty());
        assert_eq!(m.daily_used(), 60);
    }

    #[test]
    fn daily_limit_is_terminal_until_reset() {
        let mut m = machine(60);
        m.select_source(&key("a"));
        run_ticks(&mut m, 60);

        assert_eq!(m.start(), vec![Effect::Warn(Warning::DailyLimitReached)]);
        assert_eq!(m.select_source(&key("b")), vec![Effect::Warn(Warning::DailyLimitReached)]);

        // Raising the limit does not lift it either.
        m.set_settings(Settings {
            total_time_limit_secs: 600,
            auto_start: false,
        });
        assert_eq!(m.start(), vec![Effect::Warn(Warning::DailyLimitReached)]);

        m.reset();
        assert_eq!(m.state(), TimerState::Idle);
        assert_eq!(m.select_source(&key("a")), vec![Effect::StartTicker]);
    }

    #[test]
    fn lowering_the_limit_below_usage_stops_a_running_session() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 90);
        let effects = m.set_settings(Settings {
            total_time_limit_secs: 60,
            auto_start: false,
        });
        assert_eq!(m.state(), TimerState::DailyLimitReached);
        assert_eq!(effects[0], Effect::StopTicker);
        assert!(effects.contains(&Effect::DailyLimitReached));
    }

    #[test]
    fn pause_stops_and_flushes() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 4);
        let effects = m.pause();
        assert_eq!(effects[0], Effect::StopTicker);
        assert_eq!(flushes(&effects)[0].time_used, 4);
        assert_eq!(m.state(), TimerState::Paused);
        assert!(m.tick().is_empty());
        assert!(m.pause().is_empty());
    }

    #[test]
    fn reset_zeroes_everything_and_requests_clear_then_reload() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 305);

        let effects = m.reset();
        assert_eq!(
            effects,
            vec![
                Effect::StopTicker,
                Effect::ClearRemoteUsage,
                Effect::ReloadSources
            ]
        );
        assert_eq!(m.state(), TimerState::Idle);
        assert_eq!(m.daily_used(), 0);
        assert!(m.current_source().is_none());
        for source in m.sources() {
            assert_eq!(source.timer, SourceTimer::new(source.timer.allocated));
        }
    }

    fn view(name: &str, allocated: i64, used: i64) -> SourceView {
        SourceView {
            key: key(name),
            name: name.to_uppercase(),
            icon: "📰".to_string(),
            url: None,
            favicon_url: None,
            allocated,
            used,
            sessions: 0,
            overrun_time: overrun(used, allocated),
        }
    }

    #[test]
    fn remote_refresh_never_clobbers_the_running_source() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 15);

        m.apply_remote(
            vec![view("a", 600, 10), view("b", 120, 40), view("c", 300, 5)],
            RefreshScope::Full,
        );

        let a = m.source(&key("a")).unwrap().timer;
        assert_eq!((a.allocated, a.used), (600, 15));
        assert_eq!(m.source(&key("b")).unwrap().timer.used, 40);
        assert!(m.source(&key("c")).is_some());
        assert_eq!(m.daily_used(), 15 + 40 + 5);
        assert!(m.is_running());
    }

    #[test]
    fn remote_refresh_keeps_a_running_source_missing_remotely() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 2);
        m.apply_remote(vec![view("b", 120, 0)], RefreshScope::Full);
        assert_eq!(m.source(&key("a")).unwrap().timer.used, 2);
        assert_eq!(m.sources().len(), 2);
    }

    #[test]
    fn remote_refresh_adopts_counters_when_not_running() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 15);
        m.pause();
        m.apply_remote(vec![view("a", 300, 10)], RefreshScope::Full);
        assert_eq!(m.source(&key("a")).unwrap().timer.used, 10);
        assert_eq!(m.daily_used(), 10);
    }

    #[test]
    fn definitions_only_refresh_keeps_zeroed_counters() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 30);
        m.reset();
        m.apply_remote(
            vec![view("a", 300, 30), view("d", 300, 12)],
            RefreshScope::DefinitionsOnly,
        );
        assert_eq!(m.daily_used(), 0);
        assert_eq!(m.source(&key("a")).unwrap().timer.used, 0);
        assert_eq!(m.source(&key("d")).unwrap().timer.used, 0);
        assert!(m.source(&key("b")).is_none());
    }

    #[test]
    fn removing_the_current_source_stops_the_session() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 5);
        assert_eq!(m.remove_source(&key("a")), vec![Effect::StopTicker]);
        assert_eq!(m.state(), TimerState::Idle);
        assert_eq!(m.daily_used(), 0);
        assert_eq!(m.sources().len(), 1);
    }

    #[test]
    fn raising_allocation_rearms_the_allocation_event() {
        let mut m = machine(1800);
        m.select_source(&key("b"));
        run_ticks(&mut m, 120);
        m.set_allocation(&key("b"), 180);
        assert_eq!(m.source(&key("b")).unwrap().timer.overrun, 0);
        let effects = run_ticks(&mut m, 60);
        assert!(effects.contains(&Effect::AllocationReached {
            source_key: key("b")
        }));
    }

    #[test]
    fn snapshot_round_trips_through_json() {
        let mut m = machine(1800);
        m.select_source(&key("a"));
        run_ticks(&mut m, 7);
        m.pause();

        let json = serde_json::to_string(&m.snapshot()).unwrap();
        assert!(json.contains("\"dailyUsedSeconds\":7"));
        let restored = TimerStateMachine::from_snapshot(serde_json::from_str(&json).unwrap());
        assert_eq!(restored.daily_used(), 7);
        assert_eq!(restored.state(), TimerState::Idle);
        assert_eq!(restored.source(&key("a")).unwrap().timer.used, 7);
    }
}
