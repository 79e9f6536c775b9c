//! Session→plan association rows.

use anyhow::Result;
use rusqlite::{params, OptionalExtension, Row};

use pilot_mem_core::{PlanStatus, SessionPlan, WorkerError};

use crate::Store;

const PLAN_COLUMNS: &str =
    "session_db_id, plan_path, plan_status, created_at_epoch, updated_at_epoch";

fn row_to_plan(row: &Row<'_>) -> rusqlite::Result<SessionPlan> {
    let status: String = row.get(2)?;
    Ok(SessionPlan {
        session_db_id: row.get(0)?,
        plan_path: row.get(1)?,
        plan_status: status
            .parse()
            .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?,
        created_at_epoch: row.get(3)?,
        updated_at_epoch: row.get(4)?,
    })
}

impl Store {
    /// Associates a session with a plan, replacing any prior association.
    pub fn upsert_plan_association(
        &self,
        session_db_id: i64,
        plan_path: &str,
        plan_status: PlanStatus,
        now_epoch: i64,
    ) -> Result<SessionPlan> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_plans
                     (session_db_id, plan_path, plan_status, created_at_epoch, updated_at_epoch)
                 VALUES (?1, ?2, ?3, ?4, ?4)
                 ON CONFLICT(session_db_id) DO UPDATE SET
                     plan_path = excluded.plan_path,
                     plan_status = excluded.plan_status,
                     updated_at_epoch = excluded.updated_at_epoch",
                params![session_db_id, plan_path, plan_status.as_str(), now_epoch],
            )?;
            conn.query_row(
                &format!("SELECT {PLAN_COLUMNS} FROM session_plans WHERE session_db_id = ?1"),
                params![session_db_id],
                row_to_plan,
            )
            .map_err(Into::into)
        })
    }

    pub fn get_plan_for_session(&self, session_db_id: i64) -> Result<Option<SessionPlan>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {PLAN_COLUMNS} FROM session_plans WHERE session_db_id = ?1"),
                params![session_db_id],
                row_to_plan,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Looks up a plan association through the externally supplied session id.
    pub fn get_plan_by_content_session_id(
        &self,
        content_session_id: &str,
    ) -> Result<Option<SessionPlan>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!(
                    "SELECT {} FROM session_plans p
                     JOIN sessions s ON s.id = p.session_db_id
                     WHERE s.content_session_id = ?1",
                    PLAN_COLUMNS
                        .split(", ")
                        .map(|c| format!("p.{c}"))
                        .collect::<Vec<_>>()
                        .join(", ")
                ),
                params![content_session_id],
                row_to_plan,
            )
            .optional()
            .map_err(Into::into)
        })
    }

    /// Updates the status of an existing association.
    ///
    /// # Errors
    /// Returns [`WorkerError::NotFound`] (wrapped) when the session has no
    /// plan association.
    pub fn update_plan_status(
        &self,
        session_db_id: i64,
        plan_status: PlanStatus,
        now_epoch: i64,
    ) -> Result<SessionPlan> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE session_plans SET plan_status = ?1, updated_at_epoch = ?2
                 WHERE session_db_id = ?3",
                params![plan_status.as_str(), now_epoch, session_db_id],
            )?;
            if updated == 0 {
                return Err(WorkerError::NotFound(format!(
                    "no plan association for session {session_db_id}"
                ))
                .into());
            }
            conn.query_row(
                &format!("SELECT {PLAN_COLUMNS} FROM session_plans WHERE session_db_id = ?1"),
                params![session_db_id],
                row_to_plan,
            )
            .map_err(Into::into)
        })
    }

    /// Removes a session's plan association. Returns whether a row existed.
    pub fn clear_plan_association(&self, session_db_id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM session_plans WHERE session_db_id = ?1",
                params![session_db_id],
            )?;
            Ok(deleted > 0)
        })
    }
}
