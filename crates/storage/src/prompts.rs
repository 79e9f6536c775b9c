//! User prompt rows, ordered by prompt number within a session.

use anyhow::Result;
use rusqlite::{params, Row};

use pilot_mem_core::UserPrompt;

use crate::{log_row_error, Page, Store};

fn row_to_prompt(row: &Row<'_>) -> rusqlite::Result<UserPrompt> {
    Ok(UserPrompt {
        id: row.get(0)?,
        content_session_id: row.get(1)?,
        prompt_number: row.get(2)?,
        prompt_text: row.get(3)?,
        project: row.get(4)?,
        created_at_epoch: row.get(5)?,
    })
}

impl Store {
    /// Records a prompt with the next prompt number for its session.
    pub fn insert_user_prompt(
        &self,
        content_session_id: &str,
        prompt_text: &str,
        project: Option<&str>,
        now_epoch: i64,
    ) -> Result<UserPrompt> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let next_number: u32 = tx.query_row(
                "SELECT COALESCE(MAX(prompt_number), 0) + 1 FROM user_prompts
                 WHERE content_session_id = ?1",
                params![content_session_id],
                |row| row.get(0),
            )?;
            tx.execute(
                "INSERT INTO user_prompts
                     (content_session_id, prompt_number, prompt_text, project, created_at_epoch)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![content_session_id, next_number, prompt_text, project, now_epoch],
            )?;
            let id = tx.last_insert_rowid();
            tx.commit()?;
            Ok(UserPrompt {
                id,
                content_session_id: content_session_id.to_owned(),
                prompt_number: next_number,
                prompt_text: prompt_text.to_owned(),
                project: project.map(ToOwned::to_owned),
                created_at_epoch: now_epoch,
            })
        })
    }

    /// Paginated prompts, newest first, `LIMIT n+1` probe.
    pub fn get_prompts_paginated(
        &self,
        offset: usize,
        limit: usize,
        project: Option<&str>,
    ) -> Result<Page<UserPrompt>> {
        self.with_conn(|conn| {
            let probe = limit + 1;
            let columns = "id, content_session_id, prompt_number, prompt_text, project, \
                           created_at_epoch";
            let mut items: Vec<UserPrompt> = match project {
                Some(p) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {columns} FROM user_prompts WHERE project = ?1
                         ORDER BY created_at_epoch DESC, id DESC LIMIT ?2 OFFSET ?3"
                    ))?;
                    let rows: Vec<UserPrompt> = stmt
                        .query_map(params![p, probe, offset], row_to_prompt)?
                        .filter_map(log_row_error)
                        .collect();
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {columns} FROM user_prompts
                         ORDER BY created_at_epoch DESC, id DESC LIMIT ?1 OFFSET ?2"
                    ))?;
                    let rows: Vec<UserPrompt> = stmt
                        .query_map(params![probe, offset], row_to_prompt)?
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
