//! JSON-file local cache used while the store is unreachable.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use nt_core::{CacheSnapshot, SessionSnapshot};
use thiserror::Error;
use tracing::debug;

/// Local cache errors.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// A single snapshot file, overwritten wholesale on every save.
#[derive(Debug, Clone)]
pub struct LocalCache {
    path: PathBuf,
}

impl LocalCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the snapshot, or `None` if nothing was ever saved.
    pub fn load(&self) -> Result<Option<CacheSnapshot>, CacheError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let snapshot = serde_json::from_str(&contents).map_err(|source| {
                    CacheError::Parse {
                        path: self.path.clone(),
                        source,
                    }
                })?;
                Ok(Some(snapshot))
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(self.io_error(source)),
        }
    }

    /// Replaces the cached snapshot with `session`.
    pub fn save(&self, session: SessionSnapshot) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| CacheError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let snapshot = CacheSnapshot::new(session);
        let json = serde_json::to_string_pretty(&snapshot).map_err(|source| CacheError::Parse {
            path: self.path.clone(),
            source,
        })?;

        // Readers never see a partially written file.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(|source| self.io_error(source))?;
        fs::rename(&tmp, &self.path).map_err(|source| self.io_error(source))?;
        debug!(path = %self.path.display(), "local cache saved");
        Ok(())
    }

    fn io_error(&self, source: io::Error) -> CacheError {
        CacheError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use nt_core::{Settings, SourceKey, SourceTimer, TrackedSource};

    use super::*;

    fn session(daily_used: i64) -> SessionSnapshot {
        SessionSnapshot {
            sources: vec![TrackedSource {
                key: SourceKey::new("cnn").unwrap(),
                name: "CNN".to_string(),
                icon: "🌍".to_string(),
                timer: SourceTimer {
                    allocated: 300,
                    used: daily_used,
                    sessions: 0,
                    overrun: 0,
                },
            }],
            settings: Settings::default(),
            daily_used,
        }
    }

    #[test]
    fn missing_file_loads_as_none() {
        let temp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(temp.path().join("cache.json"));
        assert!(cache.load().unwrap().is_none());
    }

    #[test]
    fn save_overwrites_the_whole_snapshot() {
        let temp = tempfile::tempdir().unwrap();
        let cache = LocalCache::new(temp.path().join("state/nt/cache.json"));

        cache.save(session(10)).unwrap();
        cache.save(session(25)).unwrap();

        let loaded = cache.load().unwrap().unwrap();
        assert_eq!(loaded.session, session(25));
        assert!(!temp.path().join("state/nt/cache.json.tmp").exists());
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("cache.json");
        fs::write(&path, "{ nope").unwrap();
        let err = LocalCache::new(&path).load().unwrap_err();
        assert!(matches!(err, CacheError::Parse { .. }));
    }
}
