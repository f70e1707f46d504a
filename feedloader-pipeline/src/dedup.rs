//! Persistent set of links that have already been handed to the daemon.
//!
//! One SQLite table keyed by the link itself. [`DedupStore::has_seen`] is a
//! single INSERT: the primary-key conflict is the "seen before" answer, so
//! two scanners racing on the same link can never both see it as new.
//! Rows are append-only.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, ErrorCode, OptionalExtension};

use feedloader_core::LinkRecord;

use crate::error::DedupError;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS links (
    link    TEXT PRIMARY KEY NOT NULL,
    seen_at TEXT NOT NULL
);
";

/// How long a writer waits for a concurrent scanner's lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct DedupStore {
    conn: Connection,
    path: PathBuf,
}

impl DedupStore {
    /// Open or create the store, creating parent directories as needed.
    pub fn open(path: &Path) -> Result<Self, DedupError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| DedupError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let open_err = |source| DedupError::Open {
            path: path.to_path_buf(),
            source,
        };
        let conn = Connection::open(path).map_err(open_err)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;
        tracing::debug!(path = %path.display(), "opened link store");
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record `link` and report whether it had been recorded before.
    ///
    /// Returns `false` exactly once per distinct link over the store's
    /// lifetime. Only non-conflict failures are errors.
    pub fn has_seen(&self, link: &str) -> Result<bool, DedupError> {
        let inserted = self.conn.execute(
            "INSERT INTO links (link, seen_at) VALUES (?1, ?2)",
            (link, Utc::now().to_rfc3339()),
        );
        match inserted {
            Ok(_) => {
                tracing::debug!(link, "new link recorded");
                Ok(false)
            }
            Err(err) if err.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                tracing::debug!(link, "link seen before");
                Ok(true)
            }
            Err(err) => Err(DedupError::Query(err)),
        }
    }

    /// Read-only lookup; never records anything.
    pub fn contains(&self, link: &str) -> Result<Option<LinkRecord>, DedupError> {
        let row = self
            .conn
            .query_row(
                "SELECT link, seen_at FROM links WHERE link = ?1",
                [link],
                |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
            )
            .optional()?;
        Ok(row.map(|(link, seen_at)| LinkRecord {
            link,
            // Rows written by other tools may carry SQLite's own timestamp
            // format; fall back to the epoch rather than failing the lookup.
            seen_at: DateTime::<Utc>::from_str(&seen_at).unwrap_or_default(),
        }))
    }

    pub fn count(&self) -> Result<u64, DedupError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM links", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
