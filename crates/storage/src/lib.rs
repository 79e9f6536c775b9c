//! SQLite storage implementation for the pilot-mem worker.
//!
//! One logical writer per process: the connection lives behind a mutex and
//! all writes serialize through it. Readers share the same handle; WAL mode
//! keeps them from blocking each other.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Result;
use rusqlite::Connection;
use serde::Serialize;

mod migrations;
mod observations;
mod pending_queue;
mod plans;
mod prompts;
mod retention;
mod sessions;
mod summaries;

#[cfg(test)]
mod tests;

pub use pending_queue::PendingRow;
pub use retention::{PruneStats, RetentionPolicy};
pub use sessions::DashboardSession;

/// Generic page of results from a `LIMIT n+1` probe.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    /// Items in the current page.
    pub items: Vec<T>,
    /// Whether another page exists past this one.
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

/// Handle to the worker's SQLite database.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

pub(crate) fn lock_conn<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>> {
    mutex
        .lock()
        .map_err(|e: PoisonError<_>| anyhow::anyhow!("database lock poisoned: {e}"))
}

pub(crate) fn log_row_error<T>(result: rusqlite::Result<T>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::warn!("row read error: {e}");
            None
        }
    }
}

impl Store {
    /// Opens (or creates) the database at `db_path` and runs migrations.
    ///
    /// # Errors
    /// Returns an error when the file cannot be opened or a migration fails;
    /// callers treat this as fatal.
    pub fn open(db_path: &Path) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "busy_timeout", 5_000)?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let store = Self { conn: Arc::new(Mutex::new(conn)) };

        let conn = lock_conn(&store.conn)?;
        migrations::run_migrations(&conn)?;
        drop(conn);

        Ok(store)
    }

    pub(crate) fn with_conn<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = lock_conn(&self.conn)?;
        f(&conn)
    }

    pub(crate) fn with_conn_mut<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T>,
    ) -> Result<T> {
        let mut conn = lock_conn(&self.conn)?;
        f(&mut conn)
    }

    /// Lists all distinct project names, newest activity first.
    pub fn get_all_projects(&self) -> Result<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT project, MAX(created_at_epoch) AS latest FROM observations
                 WHERE deleted_at_epoch IS NULL
                 GROUP BY project ORDER BY latest DESC",
            )?;
            let projects = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .filter_map(log_row_error)
                .collect();
            Ok(projects)
        })
    }
}
