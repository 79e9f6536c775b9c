//! Session rows: creation, memory-id remap, dashboard listing, delete.

use anyhow::Result;
use rusqlite::{params, OptionalExtension};
use serde::Serialize;

use pilot_mem_core::{PlanStatus, SdkSession, SessionStatus};

use crate::{log_row_error, Store};

/// One row of the dashboard session list: active sessions joined with their
/// plan association, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSession {
    #[serde(rename = "sessionDbId")]
    pub session_db_id: i64,
    #[serde(rename = "contentSessionId")]
    pub content_session_id: String,
    pub project: String,
    pub status: SessionStatus,
    #[serde(rename = "startedAt")]
    pub started_at_epoch: i64,
    #[serde(rename = "planPath")]
    pub plan_path: Option<String>,
    #[serde(rename = "planStatus")]
    pub plan_status: Option<PlanStatus>,
}

fn row_to_session(row: &rusqlite::Row<'_>) -> rusqlite::Result<SdkSession> {
    let status_str: String = row.get(4)?;
    let status = status_str
        .parse()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    Ok(SdkSession {
        id: row.get(0)?,
        content_session_id: row.get(1)?,
        memory_session_id: row.get(2)?,
        project: row.get(3)?,
        status,
        started_at_epoch: row.get(5)?,
    })
}

const SESSION_COLUMNS: &str =
    "id, content_session_id, memory_session_id, project, status, started_at_epoch";

impl Store {
    /// Creates a session for `content_session_id`, or returns the existing
    /// row's id when one already exists. The memory session id starts equal
    /// to the content session id until the editor re-keys it.
    pub fn create_session(
        &self,
        content_session_id: &str,
        project: &str,
        initial_prompt: Option<&str>,
        now_epoch: i64,
    ) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO sessions
                     (content_session_id, memory_session_id, project, status, started_at_epoch)
                 VALUES (?1, ?1, ?2, 'active', ?3)",
                params![content_session_id, project, now_epoch],
            )?;
            let id: i64 = tx.query_row(
                "SELECT id FROM sessions WHERE content_session_id = ?1",
                params![content_session_id],
                |row| row.get(0),
            )?;
            if inserted > 0 {
                if let Some(prompt) = initial_prompt.filter(|p| !p.trim().is_empty()) {
                    tx.execute(
                        "INSERT INTO user_prompts
                             (content_session_id, prompt_number, prompt_text, project,
                              created_at_epoch)
                         VALUES (?1, 1, ?2, ?3, ?4)",
                        params![content_session_id, prompt, project, now_epoch],
                    )?;
                }
            }
            tx.commit()?;
            Ok(id)
        })
    }

    pub fn get_session(&self, session_db_id: i64) -> Result<Option<SdkSession>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1"),
                params![session_db_id],
                row_to_session,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    pub fn get_session_by_content_id(&self, content_session_id: &str) -> Result<Option<SdkSession>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE content_session_id = ?1"),
                params![content_session_id],
                row_to_session,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Rewrites the memory session id and re-keys every observation and
    /// summary row that referenced the old one, in a single transaction.
    /// The remap commits before any insert under the new id, so orphaned
    /// rows cannot exist.
    pub fn update_memory_session_id(&self, session_db_id: i64, new_memory_id: &str) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let old_memory_id: String = tx.query_row(
                "SELECT memory_session_id FROM sessions WHERE id = ?1",
                params![session_db_id],
                |row| row.get(0),
            )?;
            if old_memory_id != new_memory_id {
                tx.execute(
                    "UPDATE sessions SET memory_session_id = ?1 WHERE id = ?2",
                    params![new_memory_id, session_db_id],
                )?;
                tx.execute(
                    "UPDATE observations SET memory_session_id = ?1 WHERE memory_session_id = ?2",
                    params![new_memory_id, old_memory_id],
                )?;
                tx.execute(
                    "UPDATE session_summaries SET memory_session_id = ?1
                     WHERE memory_session_id = ?2",
                    params![new_memory_id, old_memory_id],
                )?;
            }
            tx.commit()?;
            Ok(())
        })
    }

    pub fn set_session_status(&self, session_db_id: i64, status: SessionStatus) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE sessions SET status = ?1 WHERE id = ?2",
                params![status.as_str(), session_db_id],
            )?;
            Ok(())
        })
    }

    /// Deletes a session and everything keyed to it. The plan association
    /// goes via `ON DELETE CASCADE`; observation, summary, prompt, and
    /// pending rows are removed in the same transaction.
    pub fn delete_session(&self, session_db_id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let session = tx
                .query_row(
                    "SELECT memory_session_id, content_session_id FROM sessions WHERE id = ?1",
                    params![session_db_id],
                    |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
                )
                .optional()?;
            let Some((memory_id, content_id)) = session else {
                tx.commit()?;
                return Ok(false);
            };
            tx.execute(
                "DELETE FROM observations WHERE memory_session_id = ?1",
                params![memory_id],
            )?;
            tx.execute(
                "DELETE FROM session_summaries WHERE memory_session_id = ?1",
                params![memory_id],
            )?;
            tx.execute(
                "DELETE FROM user_prompts WHERE content_session_id = ?1",
                params![content_id],
            )?;
            tx.execute(
                "DELETE FROM pending_messages WHERE session_id = ?1",
                params![session_db_id],
            )?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_db_id])?;
            tx.commit()?;
            Ok(true)
        })
    }

    /// Active sessions with their plan association, newest first.
    pub fn get_dashboard_sessions(&self) -> Result<Vec<DashboardSession>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT s.id, s.content_session_id, s.project, s.status, s.started_at_epoch,
                        p.plan_path, p.plan_status
                 FROM sessions s
                 LEFT JOIN session_plans p ON p.session_db_id = s.id
                 WHERE s.status = 'active'
                 ORDER BY s.started_at_epoch DESC",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let status: String = row.get(3)?;
                    let plan_status: Option<String> = row.get(6)?;
                    Ok(DashboardSession {
                        session_db_id: row.get(0)?,
                        content_session_id: row.get(1)?,
                        project: row.get(2)?,
                        status: status
                            .parse()
                            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
                        started_at_epoch: row.get(4)?,
                        plan_path: row.get(5)?,
                        plan_status: plan_status
                            .map(|s| {
                                s.parse().map_err(|e| {
                                    rusqlite::Error::ToSqlConversionFailure(Box::new(e))
                                })
                            })
                            .transpose()?,
                    })
                })?
                .filter_map(log_row_error)
                .collect();
            Ok(rows)
        })
    }
}
