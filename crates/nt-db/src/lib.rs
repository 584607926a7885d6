//! Storage layer for the news reading time tracker.
//!
//! Provides persistence for sources, daily usage, and settings using `rusqlite`.
//!
//! # Thread Safety
//!
//! [`Database`] wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! The server keeps it behind a mutex and runs queries on the blocking pool.
//!
//! # Schema
//!
//! - `news_sources`: one row per source, `key` unique. Allocation lives in
//!   `default_allocation` (seconds).
//! - `daily_usages`: at most one row per `(source_id, date)`. Dates are TEXT
//!   `YYYY-MM-DD`. Rows are deleted with their source.
//! - `user_settings`: logically a singleton; the newest row wins.

use std::path::Path;

use chrono::NaiveDate;
use nt_core::api::SourceView;
use nt_core::{DEFAULT_ALLOCATION_SECS, DEFAULT_SOURCES, DailyUsage, Settings, Source, SourceKey};
use rusqlite::types::Type;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, params};
use thiserror::Error;
use tracing::{debug, info};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A source with this key already exists.
    #[error("source already exists: {0}")]
    DuplicateKey(SourceKey),
}

impl DbError {
    /// Whether the failure means the store is temporarily unusable rather
    /// than that the operation was wrong.
    pub fn is_unavailable(&self) -> bool {
        match self {
            Self::Sqlite(rusqlite::Error::SqliteFailure(e, _)) => matches!(
                e.code,
                ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen
            ),
            _ => false,
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The schema is initialized on open. Default data is not seeded; see
    /// [`Database::seed_defaults`].
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS news_sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT UNIQUE NOT NULL,
                name TEXT NOT NULL,
                icon TEXT NOT NULL,
                url TEXT,
                favicon_url TEXT,
                default_allocation INTEGER NOT NULL DEFAULT 300,
                is_active INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );

            -- date: 'YYYY-MM-DD'
            CREATE TABLE IF NOT EXISTS daily_usages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER NOT NULL,
                date TEXT NOT NULL,
                time_used INTEGER NOT NULL DEFAULT 0,
                sessions INTEGER NOT NULL DEFAULT 0,
                overrun_time INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (source_id) REFERENCES news_sources(id) ON DELETE CASCADE,
                UNIQUE (source_id, date)
            );

            CREATE INDEX IF NOT EXISTS idx_daily_usages_date ON daily_usages(date);

            CREATE TABLE IF NOT EXISTS user_settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                total_time_limit INTEGER NOT NULL DEFAULT 1800,
                auto_start INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
            ",
        )?;
        Ok(())
    }

    /// Inserts the default sources and settings into an empty store.
    ///
    /// Returns whether anything was seeded. A store that already has sources
    /// is left alone, even if every default was deleted.
    pub fn seed_defaults(&mut self) -> Result<bool, DbError> {
        let tx = self.conn.transaction()?;
        let count: i64 = tx.query_row("SELECT COUNT(*) FROM news_sources", [], |row| row.get(0))?;
        if count > 0 {
            return Ok(false);
        }
        {
            let mut stmt = tx.prepare(
                "INSERT INTO news_sources (key, name, icon, default_allocation) VALUES (?, ?, ?, ?)",
            )?;
            for source in DEFAULT_SOURCES {
                stmt.execute(params![
                    source.key,
                    source.name,
                    source.icon,
                    DEFAULT_ALLOCATION_SECS
                ])?;
            }
        }
        let has_settings: Option<i64> = tx
            .query_row("SELECT id FROM user_settings LIMIT 1", [], |row| row.get(0))
            .optional()?;
        if has_settings.is_none() {
            let defaults = Settings::default();
            tx.execute(
                "INSERT INTO user_settings (total_time_limit, auto_start) VALUES (?, ?)",
                params![defaults.total_time_limit_secs, defaults.auto_start],
            )?;
        }
        tx.commit()?;
        info!(sources = DEFAULT_SOURCES.len(), "seeded default data");
        Ok(true)
    }

    /// Lists active sources in creation order.
    pub fn list_sources(&self) -> Result<Vec<Source>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT key, name, icon, url, favicon_url, default_allocation, is_active
            FROM news_sources
            WHERE is_active = 1
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], source_from_row)?;
        let mut sources = Vec::new();
        for row in rows {
            sources.push(row?);
        }
        Ok(sources)
    }

    /// Looks up a source by key, active or not.
    pub fn source_by_key(&self, key: &SourceKey) -> Result<Option<Source>, DbError> {
        let source = self
            .conn
            .query_row(
                "
                SELECT key, name, icon, url, favicon_url, default_allocation, is_active
                FROM news_sources
                WHERE key = ?
                ",
                [key.as_str()],
                source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    /// Inserts a new source.
    ///
    /// Fails with [`DbError::DuplicateKey`] if the key is taken.
    pub fn insert_source(&mut self, source: &Source) -> Result<(), DbError> {
        let result = self.conn.execute(
            "
            INSERT INTO news_sources (key, name, icon, url, favicon_url, default_allocation, is_active)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            ",
            params![
                source.key.as_str(),
                source.name,
                source.icon,
                source.url,
                source.favicon_url,
                source.allocated_secs,
                source.active,
            ],
        );
        match result {
            Ok(_) => {
                debug!(key = %source.key, "inserted source");
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(DbError::DuplicateKey(source.key.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Sets a source's allocation. Returns false if the key is unknown.
    pub fn update_allocation(&mut self, key: &SourceKey, seconds: i64) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "UPDATE news_sources SET default_allocation = ? WHERE key = ?",
            params![seconds, key.as_str()],
        )?;
        Ok(changed > 0)
    }

    /// Deletes a source and, by cascade, all of its usage rows.
    ///
    /// Returns false if the key is unknown.
    pub fn delete_source(&mut self, key: &SourceKey) -> Result<bool, DbError> {
        let changed = self
            .conn
            .execute("DELETE FROM news_sources WHERE key = ?", [key.as_str()])?;
        Ok(changed > 0)
    }

    /// Writes a usage row, overwriting any existing counters for the same
    /// source and date.
    ///
    /// Returns false if the source key is unknown.
    pub fn upsert_usage(&mut self, usage: &DailyUsage) -> Result<bool, DbError> {
        let changed = self.conn.execute(
            "
            INSERT INTO daily_usages (source_id, date, time_used, sessions, overrun_time)
            SELECT id, ?2, ?3, ?4, ?5 FROM news_sources WHERE key = ?1
            ON CONFLICT (source_id, date) DO UPDATE SET
                time_used = excluded.time_used,
                sessions = excluded.sessions,
                overrun_time = excluded.overrun_time
            ",
            params![
                usage.source_key.as_str(),
                format_date(usage.date),
                usage.used_secs,
                usage.sessions,
                usage.overrun_secs,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Lists the usage rows for a date, in source creation order.
    pub fn daily_usages(&self, date: NaiveDate) -> Result<Vec<DailyUsage>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT ns.key, du.date, du.time_used, du.sessions, du.overrun_time
            FROM daily_usages du
            JOIN news_sources ns ON du.source_id = ns.id
            WHERE du.date = ?
            ORDER BY ns.id ASC
            ",
        )?;
        let rows = stmt.query_map([format_date(date)], |row| {
            Ok(DailyUsage {
                source_key: key_column(row, 0)?,
                date: date_column(row, 1)?,
                used_secs: row.get(2)?,
                sessions: row.get(3)?,
                overrun_secs: row.get(4)?,
            })
        })?;
        let mut usages = Vec::new();
        for row in rows {
            usages.push(row?);
        }
        Ok(usages)
    }

    /// Lists active sources joined with their usage for a date.
    ///
    /// Sources without a usage row report zero usage.
    pub fn sources_with_usage(&self, date: NaiveDate) -> Result<Vec<SourceView>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT ns.key, ns.name, ns.icon, ns.url, ns.favicon_url, ns.default_allocation,
                   COALESCE(du.time_used, 0), COALESCE(du.sessions, 0), COALESCE(du.overrun_time, 0)
            FROM news_sources ns
            LEFT JOIN daily_usages du ON du.source_id = ns.id AND du.date = ?
            WHERE ns.is_active = 1
            ORDER BY ns.id ASC
            ",
        )?;
        let rows = stmt.query_map([format_date(date)], |row| {
            Ok(SourceView {
                key: key_column(row, 0)?,
                name: row.get(1)?,
                icon: row.get(2)?,
                url: row.get(3)?,
                favicon_url: row.get(4)?,
                allocated: row.get(5)?,
                used: row.get(6)?,
                sessions: row.get(7)?,
                overrun_time: row.get(8)?,
            })
        })?;
        let mut views = Vec::new();
        for row in rows {
            views.push(row?);
        }
        Ok(views)
    }

    /// Deletes every usage row for a date. Returns the number removed.
    pub fn clear_usage(&mut self, date: NaiveDate) -> Result<usize, DbError> {
        let removed = self
            .conn
            .execute("DELETE FROM daily_usages WHERE date = ?", [format_date(date)])?;
        info!(%date, removed, "cleared daily usage");
        Ok(removed)
    }

    /// Returns the persisted settings, if any were ever saved.
    pub fn settings(&self) -> Result<Option<Settings>, DbError> {
        let settings = self
            .conn
            .query_row(
                "SELECT total_time_limit, auto_start FROM user_settings ORDER BY id DESC LIMIT 1",
                [],
                |row| {
                    Ok(Settings {
                        total_time_limit_secs: row.get(0)?,
                        auto_start: row.get(1)?,
                    })
                },
            )
            .optional()?;
        Ok(settings)
    }

    /// Saves the settings, updating the existing row if there is one.
    pub fn save_settings(&mut self, settings: &Settings) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        let existing: Option<i64> = tx
            .query_row(
                "SELECT id FROM user_settings ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        match existing {
            Some(id) => {
                tx.execute(
                    "
                    UPDATE user_settings
                    SET total_time_limit = ?, auto_start = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE id = ?
                    ",
                    params![settings.total_time_limit_secs, settings.auto_start, id],
                )?;
            }
            None => {
                tx.execute(
                    "INSERT INTO user_settings (total_time_limit, auto_start) VALUES (?, ?)",
                    params![settings.total_time_limit_secs, settings.auto_start],
                )?;
            }
        }
        tx.commit()?;
        Ok(())
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    Ok(Source {
        key: key_column(row, 0)?,
        name: row.get(1)?,
        icon: row.get(2)?,
        url: row.get(3)?,
        favicon_url: row.get(4)?,
        allocated_secs: row.get(5)?,
        active: row.get(6)?,
    })
}

fn key_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<SourceKey> {
    let raw: String = row.get(idx)?;
    SourceKey::new(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}
