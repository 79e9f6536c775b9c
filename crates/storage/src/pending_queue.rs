//! Durable per-session FIFO of pending messages.
//!
//! Producers append; consumers claim-and-delete atomically. Once claimed, a
//! row is gone and the in-memory processor owns it. A crash before handling
//! loses the in-flight payload, which is acceptable because the hook that
//! produced it re-sends on its next tick.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row, Transaction};

use pilot_mem_core::{parse_payload, PendingMessage, WorkerError};

use crate::Store;

/// One raw queue row; the payload is still an opaque blob.
#[derive(Debug, Clone)]
pub struct PendingRow {
    /// Monotonic row id.
    pub id: i64,
    /// Session database id.
    pub session_db_id: i64,
    /// Opaque JSON payload.
    pub payload: String,
    /// When the row was enqueued, epoch milliseconds.
    pub created_at_epoch: i64,
}

impl PendingRow {
    /// Parses the opaque payload into a typed message.
    ///
    /// # Errors
    /// Returns [`WorkerError::Corruption`] on a malformed payload.
    pub fn to_pending_message(&self) -> Result<PendingMessage, WorkerError> {
        Ok(PendingMessage {
            id: self.id,
            session_db_id: self.session_db_id,
            payload: parse_payload(&self.payload)?,
            created_at_epoch: self.created_at_epoch,
        })
    }
}

fn row_to_pending(row: &Row<'_>) -> rusqlite::Result<PendingRow> {
    Ok(PendingRow {
        id: row.get(0)?,
        session_db_id: row.get(1)?,
        payload: row.get(2)?,
        created_at_epoch: row.get(3)?,
    })
}

fn claim_one(tx: &Transaction<'_>, session_db_id: i64) -> Result<Option<PendingRow>> {
    let row = tx
        .query_row(
            "SELECT id, session_id, payload, created_at_epoch FROM pending_messages
             WHERE session_id = ?1 ORDER BY id ASC LIMIT 1",
            params![session_db_id],
            row_to_pending,
        )
        .optional()?;
    if let Some(ref claimed) = row {
        tx.execute("DELETE FROM pending_messages WHERE id = ?1", params![claimed.id])?;
    }
    Ok(row)
}

impl Store {
    /// Appends a payload to the session's queue and returns the row id.
    pub fn enqueue(&self, session_db_id: i64, payload: &str, now_epoch: i64) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pending_messages (session_id, payload, created_at_epoch)
                 VALUES (?1, ?2, ?3)",
                params![session_db_id, payload, now_epoch],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Atomically selects and deletes the oldest row for the session.
    /// Concurrent claimers never observe the same row.
    pub fn claim_and_delete(&self, session_db_id: i64) -> Result<Option<PendingRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            let row = claim_one(&tx, session_db_id)?;
            tx.commit()?;
            Ok(row)
        })
    }

    /// Atomically claims up to `limit` oldest rows for the session, in
    /// enqueue order.
    pub fn claim_and_delete_batch(
        &self,
        session_db_id: i64,
        limit: usize,
    ) -> Result<Vec<PendingRow>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction_with_behavior(rusqlite::TransactionBehavior::Immediate)?;
            let mut rows = Vec::new();
            while rows.len() < limit {
                match claim_one(&tx, session_db_id)? {
                    Some(row) => rows.push(row),
                    None => break,
                }
            }
            tx.commit()?;
            Ok(rows)
        })
    }

    /// Pending rows for one session.
    pub fn pending_count_for_session(&self, session_db_id: i64) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 = conn.query_row(
                "SELECT COUNT(*) FROM pending_messages WHERE session_id = ?1",
                params![session_db_id],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    /// Pending rows across all sessions; the dashboard's queue depth.
    pub fn pending_total(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let count: u64 =
                conn.query_row("SELECT COUNT(*) FROM pending_messages", [], |row| row.get(0))?;
            Ok(count)
        })
    }
}
