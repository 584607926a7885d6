//! In-memory store for driver and session tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use nt_core::api::{NewSourceRequest, SourceView, UsageRequest};
use nt_core::{
    DEFAULT_ALLOCATION_SECS, DailyStats, Settings, SourceKey, StoreError, StoreResult, UsageStore,
    validate_allocation, validate_time_limit,
};

/// In-memory store with a switch that makes every call fail as unreachable,
/// and one that makes source reads hang until a timeout.
#[derive(Default)]
pub struct FakeStore {
    offline: AtomicBool,
    slow_reads: AtomicBool,
    pub inner: Mutex<FakeData>,
}

#[derive(Default)]
pub struct FakeData {
    pub sources: Vec<SourceView>,
    pub settings: Settings,
    pub usage: HashMap<SourceKey, UsageRequest>,
    pub clears: usize,
}

impl FakeStore {
    pub fn with_sources(keys: &[(&str, i64)]) -> Arc<Self> {
        let store = Self::default();
        store.inner.lock().unwrap().sources = keys
            .iter()
            .map(|(k, allocated)| view(k, *allocated))
            .collect();
        Arc::new(store)
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Source reads wait out a 10 s timeout, then fail as unreachable.
    pub fn set_slow_reads(&self, slow: bool) {
        self.slow_reads.store(slow, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }

    pub fn usage(&self, key: &str) -> Option<UsageRequest> {
        self.inner.lock().unwrap().usage.get(key).cloned()
    }

    pub fn allocation(&self, key: &str) -> i64 {
        let data = self.inner.lock().unwrap();
        data.sources
            .iter()
            .find(|s| s.key.as_str() == key)
            .map_or(-1, |s| s.allocated)
    }
}

pub fn view(key: &str, allocated: i64) -> SourceView {
    SourceView {
        key: SourceKey::new(key).unwrap(),
        name: key.to_uppercase(),
        icon: "📰".to_string(),
        url: None,
        favicon_url: None,
        allocated,
        used: 0,
        sessions: 0,
        overrun_time: 0,
    }
}

#[async_trait]
impl UsageStore for FakeStore {
    async fn list_sources(&self) -> StoreResult<Vec<SourceView>> {
        if self.slow_reads.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(10)).await;
            return Err(StoreError::Unavailable("request timed out".to_string()));
        }
        self.check()?;
        let data = self.inner.lock().unwrap();
        Ok(data
            .sources
            .iter()
            .map(|s| {
                let mut s = s.clone();
                if let Some(u) = data.usage.get(&s.key) {
                    s.used = u.time_used;
                    s.sessions = u.sessions;
                    s.overrun_time = u.overrun_time;
                }
                s
            })
            .collect())
    }

    async fn add_source(&self, request: &NewSourceRequest) -> StoreResult<SourceView> {
        self.check()?;
        let key = SourceKey::from_name(&request.name)?;
        let mut data = self.inner.lock().unwrap();
        if data.sources.iter().any(|s| s.key == key) {
            return Err(StoreError::Conflict("Source already exists".to_string()));
        }
        let created = view(key.as_str(), DEFAULT_ALLOCATION_SECS);
        data.sources.push(created.clone());
        Ok(created)
    }

    async fn delete_source(&self, key: &SourceKey) -> StoreResult<()> {
        self.check()?;
        let mut data = self.inner.lock().unwrap();
        let before = data.sources.len();
        data.sources.retain(|s| &s.key != key);
        data.usage.remove(key);
        if data.sources.len() == before {
            return Err(StoreError::NotFound("Source not found".to_string()));
        }
        Ok(())
    }

    async fn set_allocation(&self, key: &SourceKey, allocated_secs: i64) -> StoreResult<()> {
        self.check()?;
        validate_allocation(allocated_secs)?;
        let mut data = self.inner.lock().unwrap();
        let source = data
            .sources
            .iter_mut()
            .find(|s| &s.key == key)
            .ok_or_else(|| StoreError::NotFound("Source not found".to_string()))?;
        source.allocated = allocated_secs;
        Ok(())
    }

    async fn get_settings(&self) -> StoreResult<Settings> {
        self.check()?;
        Ok(self.inner.lock().unwrap().settings)
    }

    async fn set_settings(&self, settings: &Settings) -> StoreResult<()> {
        self.check()?;
        validate_time_limit(settings.total_time_limit_secs)?;
        self.inner.lock().unwrap().settings = *settings;
        Ok(())
    }

    async fn record_usage(&self, usage: &UsageRequest) -> StoreResult<()> {
        self.check()?;
        self.inner
            .lock()
            .unwrap()
            .usage
            .insert(usage.source_key.clone(), usage.clone());
        Ok(())
    }

    async fn stats(&self) -> StoreResult<DailyStats> {
        self.check()?;
        Ok(DailyStats::default())
    }

    async fn clear_today(&self) -> StoreResult<()> {
        self.check()?;
        let mut data = self.inner.lock().unwrap();
        data.usage.clear();
        data.clears += 1;
        Ok(())
    }
}

