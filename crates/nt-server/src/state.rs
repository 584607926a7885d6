//! Shared application state and store access.

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDate};
use nt_db::Database;
use tokio::sync::OnceCell;
use tokio::time::timeout;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::ApiError;

/// State shared by every request handler.
pub struct AppState {
    config: ServerConfig,
    /// Opened and seeded on first use. Concurrent first requests wait for the
    /// single initialization instead of racing it.
    db: OnceCell<Arc<Mutex<Database>>>,
}

impl AppState {
    /// Creates state whose database is opened lazily from `config.database_path`.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Creates state around an already opened database.
    pub fn with_database(config: ServerConfig, db: Database) -> Self {
        Self {
            config,
            db: OnceCell::new_with(Some(Arc::new(Mutex::new(db)))),
        }
    }

    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// The date usage is recorded against.
    pub fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    /// Runs `f` against the database on the blocking pool.
    ///
    /// Fails with [`ApiError::Unavailable`] if the store cannot be opened or
    /// the operation does not finish within the configured timeout.
    pub async fn with_db<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&mut Database) -> Result<T, ApiError> + Send + 'static,
        T: Send + 'static,
    {
        let db = Arc::clone(self.database().await?);
        let task = tokio::task::spawn_blocking(move || {
            let mut guard = db
                .lock()
                .map_err(|_| ApiError::Internal("database mutex poisoned".to_string()))?;
            f(&mut guard)
        });
        match timeout(self.config.store_timeout(), task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(ApiError::Internal(format!("store task failed: {join}"))),
            Err(_) => Err(ApiError::Unavailable(format!(
                "store did not respond within {}s",
                self.config.store_timeout_secs
            ))),
        }
    }

    async fn database(&self) -> Result<&Arc<Mutex<Database>>, ApiError> {
        self.db
            .get_or_try_init(|| async {
                let path = self.config.database_path.clone();
                let seed = self.config.seed_defaults;
                let open = tokio::task::spawn_blocking(move || -> Result<Database, ApiError> {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent).map_err(|e| {
                            ApiError::Unavailable(format!(
                                "failed to create {}: {e}",
                                parent.display()
                            ))
                        })?;
                    }
                    let mut db = Database::open(&path)
                        .map_err(|e| ApiError::Unavailable(format!("failed to open store: {e}")))?;
                    if seed && db.seed_defaults()? {
                        debug!("store seeded with defaults");
                    }
                    info!(path = %path.display(), "store initialized");
                    Ok(db)
                });
                match timeout(self.config.store_timeout(), open).await {
                    Ok(Ok(db)) => Ok(Arc::new(Mutex::new(db?))),
                    Ok(Err(join)) => Err(ApiError::Internal(format!("store init failed: {join}"))),
                    Err(_) => Err(ApiError::Unavailable(
                        "store initialization timed out".to_string(),
                    )),
                }
            })
            .await
    }
}
