//! The session driver: the I/O side of the timer state machine.
//!
//! [`SessionDriver`] feeds user actions and ticks into a
//! [`TimerStateMachine`], carries out the [`Effect`]s it returns against a
//! [`UsageStore`], and falls back to the [`LocalCache`] whenever the store is
//! unreachable. It never blocks the timer on the store: usage flushes,
//! background source reads and replayed resets are handed to one worker task
//! that runs them one at a time, in order, and reports each outcome through
//! [`SessionDriver::join_sync`].

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use nt_client::LocalCache;
use nt_core::api::{NewSourceRequest, SourceView, UsageRequest};
use nt_core::{
    DEFAULT_ALLOCATION_SECS, DEFAULT_SOURCES, Effect, RefreshScope, Settings, SourceKey,
    SourceTimer, StoreError, StoreResult, SyncMode, SyncPolicy, TimerStateMachine, TrackedSource,
    UsageStore, WriteOutcome, distribute_evenly, validate_time_limit,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Severity of a [`Notice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A message for the user produced while handling an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Error => "error",
        };
        write!(f, "[{tag}] {}", self.message)
    }
}

/// Store work run by the background worker, in queue order.
#[derive(Debug)]
enum SyncJob {
    Flush(UsageRequest),
    Clear,
    Read,
}

#[derive(Debug)]
enum JobOutcome {
    Flushed(StoreResult<()>),
    Cleared(StoreResult<()>),
    Read(StoreResult<Vec<SourceView>>),
}

/// The result of one piece of background store work, to be handed back to
/// [`SessionDriver::sync_finished`].
#[derive(Debug)]
pub struct SyncOutcome(JobOutcome);

impl SyncOutcome {
    const fn is_read(&self) -> bool {
        matches!(self.0, JobOutcome::Read(_))
    }
}

/// Drives one client session against a store.
pub struct SessionDriver<S> {
    store: Arc<S>,
    machine: TimerStateMachine,
    policy: SyncPolicy,
    cache: LocalCache,
    jobs: mpsc::UnboundedSender<SyncJob>,
    outcomes: mpsc::UnboundedReceiver<SyncOutcome>,
    pending_jobs: usize,
    refresh_queued: bool,
    /// A reset zeroed local counters but the store still holds today's usage.
    clear_pending: bool,
    ticking: bool,
    notices: Vec<Notice>,
}

impl<S> fmt::Debug for SessionDriver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDriver")
            .field("state", &self.machine.state())
            .field("mode", &self.policy.mode())
            .field("pending_jobs", &self.pending_jobs)
            .field("clear_pending", &self.clear_pending)
            .finish_non_exhaustive()
    }
}

impl<S: UsageStore + 'static> SessionDriver<S> {
    /// Loads the session from the store, or from the local cache if the store
    /// cannot be read.
    pub async fn load(store: Arc<S>, cache: LocalCache) -> Self {
        let remote = async {
            let views = store.list_sources().await?;
            let settings = store.get_settings().await?;
            Ok::<_, StoreError>((views, settings))
        }
        .await;

        let mut policy = SyncPolicy::default();
        policy.after_read(&remote);

        let mut notices = Vec::new();
        let machine = match remote {
            Ok((views, settings)) => {
                info!(sources = views.len(), "session loaded from server");
                notices.push(Notice::success(
                    "Connected to server. Data will be saved remotely.",
                ));
                TimerStateMachine::from_remote(settings, views)
            }
            Err(err) => {
                warn!(error = %err, "failed to load from server");
                notices.push(Notice::warning(
                    "Server unavailable. Using offline mode with local storage.",
                ));
                offline_machine(&cache, &mut notices)
            }
        };

        let (jobs, queued) = mpsc::unbounded_channel();
        let (finished, outcomes) = mpsc::unbounded_channel();
        tokio::spawn(sync_worker(Arc::clone(&store), queued, finished));

        Self {
            store,
            machine,
            policy,
            cache,
            jobs,
            outcomes,
            pending_jobs: 0,
            refresh_queued: false,
            clear_pending: false,
            ticking: false,
            notices,
        }
    }

    pub const fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub const fn machine(&self) -> &TimerStateMachine {
        &self.machine
    }

    pub const fn mode(&self) -> SyncMode {
        self.policy.mode()
    }

    /// Whether the 1-second ticker should be running.
    pub const fn is_ticking(&self) -> bool {
        self.ticking
    }

    /// Whether background store work is queued or in flight.
    pub const fn has_pending_sync(&self) -> bool {
        self.pending_jobs > 0
    }

    /// Notices produced since the last call.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub async fn select(&mut self, key: &SourceKey) {
        let effects = self.machine.select_source(key);
        self.run_effects(effects).await;
    }

    pub async fn start(&mut self) {
        let effects = self.machine.start();
        self.run_effects(effects).await;
    }

    pub async fn pause(&mut self) {
        let effects = self.machine.pause();
        self.run_effects(effects).await;
    }

    pub async fn tick(&mut self) {
        let effects = self.machine.tick();
        self.run_effects(effects).await;
    }

    /// Zeroes today's usage locally and in the store.
    ///
    /// The local zeroing stands even if the store cannot be cleared; the clear
    /// is then replayed on the next successful read.
    pub async fn reset(&mut self) {
        let effects = self.machine.reset();
        self.run_effects(effects).await;
        if self.clear_pending {
            self.notices.push(Notice::warning(
                "Timers reset locally. The server will be cleared once it is reachable.",
            ));
        } else {
            self.notices.push(Notice::success("All timers reset."));
        }
        self.save_if_offline();
    }

    /// Saves new settings, applying them locally unless the store rejects them.
    pub async fn set_settings(&mut self, settings: Settings) {
        if let Err(err) = validate_time_limit(settings.total_time_limit_secs) {
            self.notices.push(Notice::error(err.to_string()));
            return;
        }
        let result = self.store.set_settings(&settings).await;
        if self.accepted("update settings", &result) {
            let effects = self.machine.set_settings(settings);
            self.run_effects(effects).await;
        }
        self.save_if_offline();
    }

    /// Changes one source's allocation.
    pub async fn set_allocation(&mut self, key: &SourceKey, allocated_secs: i64) {
        if self.machine.source(key).is_none() {
            self.notices
                .push(Notice::warning(format!("Unknown news source: {key}")));
            return;
        }
        let result = self.store.set_allocation(key, allocated_secs).await;
        if self.accepted(&format!("update allocation of {key}"), &result) {
            let effects = self.machine.set_allocation(key, allocated_secs);
            self.run_effects(effects).await;
        }
        self.save_if_offline();
    }

    /// Creates a source in the store, then redistributes the daily limit
    /// evenly across all sources.
    pub async fn add_source(&mut self, request: NewSourceRequest) {
        let name = request.name.trim().to_string();
        match self.store.add_source(&request).await {
            Ok(view) => {
                info!(key = %view.key, "source added");
                self.machine.add_source(TrackedSource::from(view));
                let minutes = self.limit_minutes();
                self.push_distribution(minutes).await;
                self.notices.push(Notice::success(format!(
                    "New source \"{name}\" added! Time has been redistributed evenly."
                )));
            }
            Err(err) => {
                self.write_failed("add source", &err);
                self.notices
                    .push(Notice::error(format!("Failed to add new source: {err}")));
            }
        }
        self.save_if_offline();
    }

    /// Deletes a source from the store and stops tracking it.
    pub async fn remove_source(&mut self, key: &SourceKey) {
        match self.store.delete_source(key).await {
            Ok(()) | Err(StoreError::NotFound(_)) => {
                let effects = self.machine.remove_source(key);
                self.run_effects(effects).await;
                self.notices
                    .push(Notice::success(format!("Source {key} removed.")));
            }
            Err(err) => {
                self.write_failed("remove source", &err);
                self.notices
                    .push(Notice::error(format!("Failed to remove {key}: {err}")));
            }
        }
        self.save_if_offline();
    }

    /// Splits the daily limit, or `minutes` saved as the new limit, evenly
    /// across all sources in display order.
    pub async fn distribute(&mut self, minutes: Option<u32>) {
        let minutes = match minutes {
            Some(minutes) => {
                let settings = Settings {
                    total_time_limit_secs: i64::from(minutes) * 60,
                    ..self.machine.settings()
                };
                self.set_settings(settings).await;
                if self.machine.settings() != settings {
                    return;
                }
                minutes
            }
            None => self.limit_minutes(),
        };
        self.push_distribution(minutes).await;
        self.save_if_offline();
    }

    /// Re-reads the source list from the store and waits for the merge.
    ///
    /// Online, remote counters replace local ones except for the running
    /// source. Coming back from offline, local counters win and are pushed to
    /// the store.
    pub async fn refresh(&mut self) {
        self.begin_refresh();
        while let Some(outcome) = self.join_sync().await {
            let read = outcome.is_read();
            self.sync_finished(outcome);
            if read {
                break;
            }
        }
    }

    /// Queues a source read on the background worker. At most one read is
    /// queued at a time; its result arrives through [`Self::join_sync`].
    pub fn begin_refresh(&mut self) {
        if !self.refresh_queued {
            self.refresh_queued = self.queue(SyncJob::Read);
        }
    }

    /// Waits for the oldest queued piece of background store work.
    ///
    /// Returns `None` at once when nothing is queued. Cancel safe.
    pub async fn join_sync(&mut self) -> Option<SyncOutcome> {
        if self.pending_jobs == 0 {
            return None;
        }
        let outcome = self.outcomes.recv().await;
        match &outcome {
            Some(outcome) => {
                self.pending_jobs -= 1;
                if outcome.is_read() {
                    self.refresh_queued = false;
                }
            }
            None => {
                error!("sync worker stopped");
                self.pending_jobs = 0;
                self.refresh_queued = false;
            }
        }
        outcome
    }

    /// Applies the outcome of background store work.
    pub fn sync_finished(&mut self, outcome: SyncOutcome) {
        match outcome.0 {
            JobOutcome::Flushed(result) => self.flushed(result),
            JobOutcome::Cleared(result) => self.cleared(result),
            JobOutcome::Read(result) => self.sources_read(result),
        }
    }

    /// Waits for every queued flush and clear; the last step before exiting.
    pub async fn finish(&mut self) {
        self.drain_pending().await;
        self.save_if_offline();
    }

    /// Waits for all queued work. Reads queued before now are dropped, since
    /// the caller is about to change local state they did not see.
    async fn drain_pending(&mut self) {
        while let Some(outcome) = self.join_sync().await {
            if outcome.is_read() {
                debug!("dropping superseded source read");
            } else {
                self.sync_finished(outcome);
            }
        }
    }

    fn flushed(&mut self, result: StoreResult<()>) {
        match result {
            Ok(()) => debug!("usage flushed"),
            Err(err) => {
                self.write_failed("save usage", &err);
                if !err.is_unavailable() {
                    self.notices
                        .push(Notice::error(format!("Failed to save usage: {err}")));
                }
            }
        }
    }

    fn cleared(&mut self, result: StoreResult<()>) {
        match result {
            Ok(()) => {
                info!("replayed reset of today's usage");
                self.clear_pending = false;
            }
            Err(err) => self.write_failed("reset usage", &err),
        }
    }

    fn sources_read(&mut self, result: StoreResult<Vec<SourceView>>) {
        let was_offline = self.policy.is_offline();
        self.policy.after_read(&result);
        match result {
            Ok(views) => {
                let resync = was_offline || self.clear_pending;
                // Work queued after the read carries counters it did not see.
                let scope = if resync || self.pending_jobs > 0 {
                    RefreshScope::DefinitionsOnly
                } else {
                    RefreshScope::Full
                };
                self.machine.apply_remote(views, scope);
                if resync {
                    self.push_local_state();
                }
                if was_offline {
                    self.notices.push(Notice::success(
                        "Reconnected to server. Local progress is being synced.",
                    ));
                }
            }
            Err(err) => {
                debug!(error = %err, "background refresh failed");
                self.save_if_offline();
            }
        }
    }

    async fn run_effects(&mut self, effects: Vec<Effect>) {
        let mut reload_scope = RefreshScope::Full;
        for effect in effects {
            match effect {
                Effect::StartTicker => self.ticking = true,
                Effect::StopTicker => self.ticking = false,
                Effect::Flush(usage) => self.queue_flush(usage),
                Effect::ClearRemoteUsage => {
                    if !self.clear_remote_usage().await {
                        reload_scope = RefreshScope::DefinitionsOnly;
                    }
                }
                Effect::ReloadSources => self.reload(reload_scope).await,
                Effect::AllocationReached { source_key } => {
                    let name = self
                        .machine
                        .source(&source_key)
                        .map_or_else(|| source_key.to_string(), |s| s.name.clone());
                    self.notices.push(Notice::warning(format!(
                        "⚠️ {name} allocated time reached! You can continue but it will reduce time for other sources."
                    )));
                }
                Effect::DailyLimitReached => {
                    self.notices.push(Notice::error(
                        "⏰ Daily time limit reached! All timers stopped.",
                    ));
                }
                Effect::Warn(warning) => self.notices.push(Notice::warning(warning.to_string())),
            }
        }
    }

    fn queue(&mut self, job: SyncJob) -> bool {
        if self.jobs.send(job).is_ok() {
            self.pending_jobs += 1;
            true
        } else {
            error!("sync worker stopped, job dropped");
            false
        }
    }

    fn queue_flush(&mut self, usage: UsageRequest) {
        self.queue(SyncJob::Flush(usage));
    }

    /// Makes the store match local counters: replays an unsent reset, then
    /// pushes every source with usage. Sources without usage have no row.
    fn push_local_state(&mut self) {
        if self.clear_pending {
            self.queue(SyncJob::Clear);
        }
        let usages: Vec<UsageRequest> = self
            .machine
            .sources()
            .iter()
            .filter(|s| s.timer.used > 0 || s.timer.sessions > 0)
            .map(|s| UsageRequest {
                source_key: s.key.clone(),
                time_used: s.timer.used,
                sessions: s.timer.sessions,
                overrun_time: s.timer.overrun,
            })
            .collect();
        for usage in usages {
            self.queue_flush(usage);
        }
    }

    /// Clears today's usage in the store after in-flight flushes have landed,
    /// so none of them can write old counters back.
    async fn clear_remote_usage(&mut self) -> bool {
        self.drain_pending().await;
        self.clear_pending = true;
        match self.store.clear_today().await {
            Ok(()) => {
                self.clear_pending = false;
                true
            }
            Err(err) => {
                self.write_failed("reset usage", &err);
                self.notices.push(Notice::error(format!(
                    "Failed to reset data on server: {err}"
                )));
                false
            }
        }
    }

    async fn reload(&mut self, scope: RefreshScope) {
        let result = self.store.list_sources().await;
        self.policy.after_read(&result);
        match result {
            Ok(views) => self.machine.apply_remote(views, scope),
            Err(err) => debug!(error = %err, "source reload failed"),
        }
    }

    /// Pushes an even split of `minutes` and applies every allocation the
    /// store did not reject.
    async fn push_distribution(&mut self, minutes: u32) {
        let allocations = match distribute_evenly(minutes, &self.machine.source_keys()) {
            Ok(allocations) => allocations,
            Err(err) => {
                self.notices.push(Notice::error(err.to_string()));
                return;
            }
        };

        let mut accepted = Vec::with_capacity(allocations.len());
        for allocation in allocations {
            let result = self
                .store
                .set_allocation(&allocation.source_key, allocation.allocated_secs)
                .await;
            let label = format!("update allocation of {}", allocation.source_key);
            if self.accepted(&label, &result) {
                accepted.push(allocation);
            }
        }
        let effects = self.machine.apply_allocations(&accepted);
        self.run_effects(effects).await;
        info!(minutes, sources = accepted.len(), "time distributed");
    }

    /// Whether a write should take effect locally: it reached the store, or
    /// the store is unreachable and the change lives in the cache for now.
    fn accepted(&mut self, action: &str, result: &StoreResult<()>) -> bool {
        match result {
            Ok(()) => true,
            Err(err) if err.is_unavailable() => {
                self.write_failed(action, err);
                true
            }
            Err(err) => {
                self.notices
                    .push(Notice::error(format!("Failed to {action}: {err}")));
                false
            }
        }
    }

    /// Switches to offline mode when the store could not be reached.
    fn write_failed(&mut self, action: &str, err: &StoreError) {
        if !err.is_unavailable() {
            warn!(action, error = %err, "store rejected write");
            return;
        }
        let was_offline = self.policy.is_offline();
        if self.policy.after_write(&Err::<(), _>(err)) == WriteOutcome::CacheFallback {
            if !was_offline {
                self.notices.push(Notice::warning(
                    "Server unavailable. Progress is saved locally until it is back.",
                ));
            }
            self.save_cache();
        }
    }

    fn save_if_offline(&mut self) {
        if self.policy.is_offline() {
            self.save_cache();
        }
    }

    fn save_cache(&mut self) {
        if let Err(err) = self.cache.save(self.machine.snapshot()) {
            error!(error = %err, "failed to save local cache");
            self.notices
                .push(Notice::error(format!("Failed to save local cache: {err}")));
        }
    }

    fn limit_minutes(&self) -> u32 {
        u32::try_from(self.machine.settings().total_time_limit_secs / 60).unwrap_or(0)
    }
}

/// Runs queued store work one job at a time, so a later flush never lands
/// before an earlier one and a read sees every write queued before it.
async fn sync_worker<S: UsageStore + ?Sized>(
    store: Arc<S>,
    mut jobs: mpsc::UnboundedReceiver<SyncJob>,
    outcomes: mpsc::UnboundedSender<SyncOutcome>,
) {
    while let Some(job) = jobs.recv().await {
        let outcome = match job {
            SyncJob::Flush(usage) => {
                debug!(source = %usage.source_key, used = usage.time_used, "sending usage");
                JobOutcome::Flushed(store.record_usage(&usage).await)
            }
            SyncJob::Clear => JobOutcome::Cleared(store.clear_today().await),
            SyncJob::Read => JobOutcome::Read(store.list_sources().await),
        };
        if outcomes.send(SyncOutcome(outcome)).is_err() {
            break;
        }
    }
}

/// Builds the offline session from the cache, or from the default sources.
fn offline_machine(cache: &LocalCache, notices: &mut Vec<Notice>) -> TimerStateMachine {
    match cache.load() {
        Ok(Some(snapshot)) if snapshot.is_from(Utc::now().date_naive()) => {
            info!(path = %cache.path().display(), "restored session from local cache");
            TimerStateMachine::from_snapshot(snapshot.session)
        }
        Ok(Some(snapshot)) => {
            info!(saved_at = %snapshot.saved_at, "local cache is from an earlier day");
            let sources = snapshot
                .session
                .sources
                .into_iter()
                .map(|s| TrackedSource {
                    timer: SourceTimer::new(s.timer.allocated),
                    ..s
                })
                .collect();
            TimerStateMachine::new(snapshot.session.settings, sources)
        }
        Ok(None) => default_machine(),
        Err(err) => {
            error!(error = %err, "failed to read local cache");
            notices.push(Notice::error(format!("Failed to read local cache: {err}")));
            default_machine()
        }
    }
}

fn default_machine() -> TimerStateMachine {
    let sources = DEFAULT_SOURCES
        .iter()
        .filter_map(|d| {
            let key = SourceKey::new(d.key).ok()?;
            Some(TrackedSource {
                key,
                name: d.name.to_string(),
                icon: d.icon.to_string(),
                timer: SourceTimer::new(DEFAULT_ALLOCATION_SECS),
            })
        })
        .collect();
    TimerStateMachine::new(Settings::default(), sources)
}

#[cfg(test)]
mod tests {
    use nt_core::{SessionSnapshot, TimerState};

    use super::*;
    use crate::testing::FakeStore;

    fn key(s: &str) -> SourceKey {
        SourceKey::new(s).unwrap()
    }

    fn temp_cache() -> (tempfile::TempDir, LocalCache) {
        let temp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(temp.path().join("cache.json"));
        (temp, cache)
    }

    async fn ticks(driver: &mut SessionDriver<FakeStore>, n: usize) {
        for _ in 0..n {
            driver.tick().await;
        }
    }

    fn has_notice(notices: &[Notice], level: NoticeLevel, needle: &str) -> bool {
        notices
            .iter()
            .any(|n| n.level == level && n.message.contains(needle))
    }

    #[tokio::test]
    async fn load_online_and_flush_on_pause() {
        let store = FakeStore::with_sources(&[("a", 300), ("b", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;
        assert_eq!(driver.mode(), SyncMode::Online);
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Success,
            "Connected to server"
        ));

        driver.select(&key("a")).await;
        assert!(driver.is_ticking());
        ticks(&mut driver, 25).await;
        driver.pause().await;
        assert!(!driver.is_ticking());
        driver.finish().await;

        let usage = store.usage("a").unwrap();
        assert_eq!(usage.time_used, 25);
        assert_eq!(driver.machine().daily_used(), 25);
    }

    #[tokio::test]
    async fn unreachable_store_loads_defaults_offline() {
        let store = Arc::new(FakeStore::default());
        store.set_offline(true);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(store, cache).await;

        assert_eq!(driver.mode(), SyncMode::Offline);
        assert_eq!(driver.machine().sources().len(), 6);
        assert_eq!(driver.machine().settings(), Settings::default());
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Warning,
            "Using offline mode"
        ));
    }

    #[tokio::test]
    async fn failed_flush_keeps_timer_running_and_writes_cache() {
        let store = FakeStore::with_sources(&[("a", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache.clone()).await;

        driver.select(&key("a")).await;
        store.set_offline(true);
        ticks(&mut driver, 10).await;
        while let Some(outcome) = driver.join_sync().await {
            driver.sync_finished(outcome);
        }

        assert_eq!(driver.mode(), SyncMode::Offline);
        assert!(driver.is_ticking());
        assert_eq!(driver.machine().state(), TimerState::Running);
        let cached = cache.load().unwrap().unwrap();
        assert_eq!(cached.session.daily_used, 10);
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Warning,
            "Server unavailable"
        ));
    }

    #[tokio::test]
    async fn cached_session_from_today_is_restored_offline() {
        let (_temp, cache) = temp_cache();
        let snapshot = SessionSnapshot {
            sources: vec![TrackedSource {
                key: key("a"),
                name: "A".to_string(),
                icon: "📰".to_string(),
                timer: SourceTimer {
                    allocated: 300,
                    used: 42,
                    sessions: 0,
                    overrun: 0,
                },
            }],
            settings: Settings {
                total_time_limit_secs: 600,
                auto_start: false,
            },
            daily_used: 42,
        };
        cache.save(snapshot).unwrap();

        let store = Arc::new(FakeStore::default());
        store.set_offline(true);
        let driver = SessionDriver::load(store, cache).await;
        assert_eq!(driver.machine().daily_used(), 42);
        assert_eq!(driver.machine().settings().total_time_limit_secs, 600);
    }

    #[tokio::test]
    async fn reset_clears_store_after_pending_flushes() {
        let store = FakeStore::with_sources(&[("a", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        driver.select(&key("a")).await;
        ticks(&mut driver, 10).await;
        driver.reset().await;
        driver.finish().await;

        assert!(store.usage("a").is_none());
        assert_eq!(store.inner.lock().unwrap().clears, 1);
        assert_eq!(driver.machine().state(), TimerState::Idle);
        assert_eq!(driver.machine().daily_used(), 0);
        assert!(!driver.is_ticking());
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Success,
            "All timers reset."
        ));
    }

    #[tokio::test]
    async fn failed_reset_still_zeroes_locally_and_reports() {
        let store = FakeStore::with_sources(&[("a", 300)]);
        store
            .record_usage(&UsageRequest {
                source_key: key("a"),
                time_used: 120,
                sessions: 0,
                overrun_time: 0,
            })
            .await
            .unwrap();
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;
        assert_eq!(driver.machine().daily_used(), 120);

        store.set_offline(true);
        driver.reset().await;

        assert_eq!(driver.machine().daily_used(), 0);
        assert_eq!(driver.mode(), SyncMode::Offline);
        let notices = driver.take_notices();
        assert!(has_notice(
            &notices,
            NoticeLevel::Error,
            "Failed to reset data on server"
        ));
        assert!(has_notice(&notices, NoticeLevel::Warning, "Timers reset locally."));
        assert!(!has_notice(&notices, NoticeLevel::Success, "All timers reset."));
    }

    #[tokio::test]
    async fn reset_made_offline_is_replayed_on_reconnect() {
        let store = FakeStore::with_sources(&[("a", 300), ("b", 300)]);
        store
            .record_usage(&UsageRequest {
                source_key: key("a"),
                time_used: 120,
                sessions: 1,
                overrun_time: 0,
            })
            .await
            .unwrap();
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        store.set_offline(true);
        driver.reset().await;
        assert_eq!(driver.machine().daily_used(), 0);

        store.set_offline(false);
        driver.refresh().await;
        assert_eq!(driver.mode(), SyncMode::Online);
        assert_eq!(driver.machine().daily_used(), 0);
        driver.finish().await;

        assert!(store.usage("a").is_none());
        assert_eq!(store.inner.lock().unwrap().clears, 1);

        // A later online refresh has nothing stale left to adopt.
        driver.refresh().await;
        assert_eq!(driver.machine().daily_used(), 0);
        assert_eq!(driver.machine().source(&key("a")).unwrap().timer.used, 0);
    }

    #[tokio::test]
    async fn usage_after_an_offline_reset_survives_the_replayed_clear() {
        let store = FakeStore::with_sources(&[("a", 300)]);
        store
            .record_usage(&UsageRequest {
                source_key: key("a"),
                time_used: 200,
                sessions: 0,
                overrun_time: 0,
            })
            .await
            .unwrap();
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        store.set_offline(true);
        driver.reset().await;
        driver.select(&key("a")).await;
        ticks(&mut driver, 7).await;
        driver.pause().await;
        driver.finish().await;

        store.set_offline(false);
        driver.refresh().await;
        driver.finish().await;

        assert_eq!(store.usage("a").unwrap().time_used, 7);
        driver.refresh().await;
        assert_eq!(driver.machine().daily_used(), 7);
    }

    #[tokio::test]
    async fn daily_limit_stops_the_ticker() {
        let store = FakeStore::with_sources(&[("a", 300)]);
        store.inner.lock().unwrap().settings = Settings {
            total_time_limit_secs: 60,
            auto_start: false,
        };
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        driver.select(&key("a")).await;
        ticks(&mut driver, 60).await;
        assert!(!driver.is_ticking());
        assert_eq!(driver.machine().state(), TimerState::DailyLimitReached);

        driver.take_notices();
        driver.start().await;
        assert!(!driver.is_ticking());
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Warning,
            "Daily time limit reached"
        ));

        driver.finish().await;
        assert_eq!(store.usage("a").unwrap().time_used, 60);
    }

    #[tokio::test]
    async fn adding_a_source_redistributes_the_limit() {
        let store = FakeStore::with_sources(&[("a", 300), ("b", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        driver.add_source(NewSourceRequest::named("Extra")).await;

        // 30 minutes over three sources.
        for k in ["a", "b", "extra"] {
            assert_eq!(store.allocation(k), 600);
            assert_eq!(driver.machine().source(&key(k)).unwrap().timer.allocated, 600);
        }
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Success,
            "New source \"Extra\" added!"
        ));

        driver.add_source(NewSourceRequest::named("extra")).await;
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Error,
            "Source already exists"
        ));
        assert_eq!(driver.mode(), SyncMode::Online);
    }

    #[tokio::test]
    async fn rejected_allocations_are_reported_not_applied() {
        let store = FakeStore::with_sources(&[("a", 300), ("b", 300), ("c", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        // Two minutes over three sources leaves the last one with 0 s.
        driver.distribute(Some(2)).await;

        assert_eq!(store.allocation("a"), 60);
        assert_eq!(store.allocation("c"), 300);
        assert_eq!(driver.machine().source(&key("c")).unwrap().timer.allocated, 300);
        assert_eq!(driver.machine().settings().total_time_limit_secs, 120);
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Error,
            "update allocation of c"
        ));
    }

    #[tokio::test]
    async fn out_of_range_limit_is_refused_before_the_store() {
        let store = FakeStore::with_sources(&[("a", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        driver.distribute(Some(500)).await;

        assert_eq!(driver.machine().settings(), Settings::default());
        assert_eq!(store.allocation("a"), 300);
        assert!(has_notice(
            &driver.take_notices(),
            NoticeLevel::Error,
            "Total time limit"
        ));
    }

    #[tokio::test]
    async fn offline_settings_change_applies_locally() {
        let store = FakeStore::with_sources(&[("a", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache.clone()).await;

        store.set_offline(true);
        let settings = Settings {
            total_time_limit_secs: 900,
            auto_start: true,
        };
        driver.set_settings(settings).await;

        assert_eq!(driver.machine().settings(), settings);
        assert_eq!(driver.mode(), SyncMode::Offline);
        assert_eq!(cache.load().unwrap().unwrap().session.settings, settings);
    }

    #[tokio::test]
    async fn reconnect_pushes_local_progress() {
        let store = FakeStore::with_sources(&[("a", 300), ("b", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        driver.select(&key("a")).await;
        store.set_offline(true);
        ticks(&mut driver, 15).await;
        driver.pause().await;
        while let Some(outcome) = driver.join_sync().await {
            driver.sync_finished(outcome);
        }
        assert_eq!(driver.mode(), SyncMode::Offline);
        assert!(store.usage("a").is_none());

        store.set_offline(false);
        driver.refresh().await;
        driver.finish().await;

        assert_eq!(driver.mode(), SyncMode::Online);
        assert_eq!(driver.machine().daily_used(), 15);
        assert_eq!(store.usage("a").unwrap().time_used, 15);
    }

    #[tokio::test]
    async fn online_refresh_keeps_running_source_counters() {
        let store = FakeStore::with_sources(&[("a", 300), ("b", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        driver.select(&key("a")).await;
        ticks(&mut driver, 5).await;
        store
            .record_usage(&UsageRequest {
                source_key: key("b"),
                time_used: 30,
                sessions: 0,
                overrun_time: 0,
            })
            .await
            .unwrap();
        driver.refresh().await;

        let machine = driver.machine();
        assert_eq!(machine.source(&key("a")).unwrap().timer.used, 5);
        assert_eq!(machine.source(&key("b")).unwrap().timer.used, 30);
        assert!(machine.is_running());
    }

    #[tokio::test]
    async fn removing_the_running_source_stops_the_session() {
        let store = FakeStore::with_sources(&[("a", 300), ("b", 300)]);
        let (_temp, cache) = temp_cache();
        let mut driver = SessionDriver::load(Arc::clone(&store), cache).await;

        driver.select(&key("a")).await;
        driver.remove_source(&key("a")).await;

        assert!(!driver.is_ticking());
        assert!(driver.machine().source(&key("a")).is_none());
        assert_eq!(store.allocation("a"), -1);
    }
}
