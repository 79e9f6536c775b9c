//! Session summary rows.

use anyhow::Result;
use rusqlite::{params, Row};

use pilot_mem_core::SessionSummary;

use crate::{log_row_error, Page, Store};

const SUMMARY_COLUMNS: &str = "id, memory_session_id, project, request, investigated, learned, \
                               completed, next_steps, created_at_epoch";

fn row_to_summary(row: &Row<'_>) -> rusqlite::Result<SessionSummary> {
    Ok(SessionSummary {
        id: row.get(0)?,
        memory_session_id: row.get(1)?,
        project: row.get(2)?,
        request: row.get(3)?,
        investigated: row.get(4)?,
        learned: row.get(5)?,
        completed: row.get(6)?,
        next_steps: row.get(7)?,
        created_at_epoch: row.get(8)?,
    })
}

impl Store {
    /// Inserts a summary and returns its database id.
    pub fn insert_summary(&self, summary: &SessionSummary) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO session_summaries
                     (memory_session_id, project, request, investigated, learned, completed,
                      next_steps, created_at_epoch)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    summary.memory_session_id,
                    summary.project,
                    summary.request,
                    summary.investigated,
                    summary.learned,
                    summary.completed,
                    summary.next_steps,
                    summary.created_at_epoch,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Most recent summaries for a project, newest first.
    pub fn get_recent_summaries(&self, project: &str, limit: usize) -> Result<Vec<SessionSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SUMMARY_COLUMNS} FROM session_summaries
                 WHERE project = ?1 AND deleted_at_epoch IS NULL
                 ORDER BY created_at_epoch DESC, id DESC LIMIT ?2"
            ))?;
            let rows = stmt
                .query_map(params![project, limit], row_to_summary)?
                .filter_map(log_row_error)
                .collect();
            Ok(rows)
        })
    }

    /// Plan-scoped variant of [`Store::get_recent_summaries`]: keeps
    /// summaries from sessions on `plan_path` or with no association.
    pub fn get_recent_summaries_excluding_other_plans(
        &self,
        project: &str,
        plan_path: &str,
        limit: usize,
    ) -> Result<Vec<SessionSummary>> {
        self.with_conn(|conn| {
            let columns = SUMMARY_COLUMNS
                .split(", ")
                .map(|c| format!("m.{c}"))
                .collect::<Vec<_>>()
                .join(", ");
            let mut stmt = conn.prepare(&format!(
                "SELECT {columns} FROM session_summaries m
                 LEFT JOIN sessions s ON s.memory_session_id = m.memory_session_id
                 LEFT JOIN session_plans sp ON sp.session_db_id = s.id
                 WHERE m.project = ?1 AND m.deleted_at_epoch IS NULL
                   AND (sp.plan_path IS NULL OR sp.plan_path = ?2)
                 ORDER BY m.created_at_epoch DESC, m.id DESC LIMIT ?3"
            ))?;
            let rows = stmt
                .query_map(params![project, plan_path, limit], row_to_summary)?
                .filter_map(log_row_error)
                .collect();
            Ok(rows)
        })
    }

    /// Paginated summaries, newest first, `LIMIT n+1` probe.
    pub fn get_summaries_paginated(
        &self,
        offset: usize,
        limit: usize,
        project: Option<&str>,
    ) -> Result<Page<SessionSummary>> {
        self.with_conn(|conn| {
            let probe = limit + 1;
            let mut items: Vec<SessionSummary> = match project {
                Some(p) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SUMMARY_COLUMNS} FROM session_summaries
                         WHERE project = ?1 AND deleted_at_epoch IS NULL
                         ORDER BY created_at_epoch DESC, id DESC LIMIT ?2 OFFSET ?3"
                    ))?;
                    let rows: Vec<SessionSummary> = stmt
                        .query_map(params![p, probe, offset], row_to_summary)?
                        .filter_map(log_row_error)
                        .collect();
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {SUMMARY_COLUMNS} FROM session_summaries
                         WHERE deleted_at_epoch IS NULL
                         ORDER BY created_at_epoch DESC, id DESC LIMIT ?1 OFFSET ?2"
                    ))?;
                    let rows: Vec<SessionSummary> = stmt
                        .query_map(params![probe, offset], row_to_summary)?
                        .filter_map(log_row_error)
                        .collect();
                    rows
                }
            };
            let has_more = items.len() > limit;
            items.truncate(limit);
            Ok(Page { items, has_more })
        })
    }
}
