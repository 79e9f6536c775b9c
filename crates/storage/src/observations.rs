//! Observation rows: insert, pagination, and the context query families.

use anyhow::Result;
use rusqlite::{params, Row, ToSql};

use pilot_mem_core::{sanitize_project_path, Observation, ObservationType};

use crate::{log_row_error, Page, Store};

const OBSERVATION_COLUMNS: &str = "id, memory_session_id, project, observation_type, title, \
                                   subtitle, narrative, facts, concepts, files_read, \
                                   files_modified, discovery_tokens, created_at_epoch";

fn row_to_observation(row: &Row<'_>) -> rusqlite::Result<Observation> {
    let type_str: String = row.get(3)?;
    let observation_type: ObservationType = type_str
        .parse()
        .map_err(|e: String| rusqlite::Error::ToSqlConversionFailure(e.into()))?;
    let project: String = row.get(2)?;
    let json_list = |idx: usize| -> rusqlite::Result<Vec<String>> {
        let raw: String = row.get(idx)?;
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    };
    let sanitize = |paths: Vec<String>| {
        paths
            .into_iter()
            .map(|p| sanitize_project_path(&p, &project))
            .collect()
    };
    let files_read = sanitize(json_list(9)?);
    let files_modified = sanitize(json_list(10)?);
    Ok(Observation {
        id: row.get(0)?,
        memory_session_id: row.get(1)?,
        project,
        observation_type,
        title: row.get(4)?,
        subtitle: row.get(5)?,
        narrative: row.get(6)?,
        facts: json_list(7)?,
        concepts: json_list(8)?,
        files_read,
        files_modified,
        discovery_tokens: row.get(11)?,
        created_at_epoch: row.get(12)?,
    })
}

impl Store {
    /// Inserts an observation and returns its database id.
    pub fn insert_observation(&self, obs: &Observation) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO observations
                     (memory_session_id, project, observation_type, title, subtitle, narrative,
                      facts, concepts, files_read, files_modified, discovery_tokens,
                      created_at_epoch)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    obs.memory_session_id,
                    obs.project,
                    obs.observation_type.as_str(),
                    obs.title,
                    obs.subtitle,
                    obs.narrative,
                    serde_json::to_string(&obs.facts)?,
                    serde_json::to_string(&obs.concepts)?,
                    serde_json::to_string(&obs.files_read)?,
                    serde_json::to_string(&obs.files_modified)?,
                    obs.discovery_tokens,
                    obs.created_at_epoch,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Paginated observations, newest first. Probes with `LIMIT n+1` to
    /// learn whether another page exists without a second COUNT.
    pub fn get_observations_paginated(
        &self,
        offset: usize,
        limit: usize,
        project: Option<&str>,
    ) -> Result<Page<Observation>> {
        self.with_conn(|conn| {
            let probe = limit + 1;
            let mut items: Vec<Observation> = match project {
                Some(p) => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {OBSERVATION_COLUMNS} FROM observations
                         WHERE project = ?1 AND deleted_at_epoch IS NULL
                         ORDER BY created_at_epoch DESC, id DESC LIMIT ?2 OFFSET ?3"
                    ))?;
                    let rows: Vec<Observation> = stmt
                        .query_map(params![p, probe, offset], row_to_observation)?
                        .filter_map(log_row_error)
                        .collect();
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(&format!(
                        "SELECT {OBSERVATION_COLUMNS} FROM observations
                         WHERE deleted_at_epoch IS NULL
                         ORDER BY created_at_epoch DESC, id DESC LIMIT ?1 OFFSET ?2"
                    ))?;
                    let rows: Vec<Observation> = stmt
                        .query_map(params![probe, offset], row_to_observation)?
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

    /// Unscoped context query: project plus optional type membership and
    /// concept intersection, newest first.
    pub fn query_observations(
        &self,
        project: &str,
        types: &[ObservationType],
        concepts: &[String],
        limit: usize,
    ) -> Result<Vec<Observation>> {
        self.query_observations_inner(project, None, types, concepts, limit)
    }

    /// Plan-scoped context query: rows whose owning session is associated
    /// with `plan_path` or has no association at all. Rows associated with a
    /// different plan are excluded.
    pub fn query_observations_excluding_other_plans(
        &self,
        project: &str,
        plan_path: &str,
        types: &[ObservationType],
        concepts: &[String],
        limit: usize,
    ) -> Result<Vec<Observation>> {
        self.query_observations_inner(project, Some(plan_path), types, concepts, limit)
    }

    fn query_observations_inner(
        &self,
        project: &str,
        plan_path: Option<&str>,
        types: &[ObservationType],
        concepts: &[String],
        limit: usize,
    ) -> Result<Vec<Observation>> {
        self.with_conn(|conn| {
            let mut sql = format!(
                "SELECT {} FROM observations o
                 LEFT JOIN sessions s ON s.memory_session_id = o.memory_session_id
                 LEFT JOIN session_plans sp ON sp.session_db_id = s.id
                 WHERE o.project = ?1 AND o.deleted_at_epoch IS NULL",
                qualified_columns()
            );
            let mut args: Vec<Box<dyn ToSql>> = vec![Box::new(project.to_owned())];

            if let Some(plan) = plan_path {
                args.push(Box::new(plan.to_owned()));
                sql.push_str(&format!(
                    " AND (sp.plan_path IS NULL OR sp.plan_path = ?{})",
                    args.len()
                ));
            }
            if !types.is_empty() {
                let placeholders: Vec<String> = types
                    .iter()
                    .map(|t| {
                        args.push(Box::new(t.as_str().to_owned()));
                        format!("?{}", args.len())
                    })
                    .collect();
                sql.push_str(&format!(
                    " AND o.observation_type IN ({})",
                    placeholders.join(", ")
                ));
            }
            if !concepts.is_empty() {
                let placeholders: Vec<String> = concepts
                    .iter()
                    .map(|c| {
                        args.push(Box::new(c.clone()));
                        format!("?{}", args.len())
                    })
                    .collect();
                sql.push_str(&format!(
                    " AND EXISTS (SELECT 1 FROM json_each(o.concepts)
                                  WHERE json_each.value IN ({}))",
                    placeholders.join(", ")
                ));
            }
            args.push(Box::new(limit as i64));
            sql.push_str(&format!(
                " ORDER BY o.created_at_epoch DESC, o.id DESC LIMIT ?{}",
                args.len()
            ));

            let mut stmt = conn.prepare(&sql)?;
            let refs: Vec<&dyn ToSql> = args.iter().map(AsRef::as_ref).collect();
            let rows = stmt
                .query_map(refs.as_slice(), row_to_observation)?
                .filter_map(log_row_error)
                .collect();
            Ok(rows)
        })
    }
}

fn qualified_columns() -> String {
    OBSERVATION_COLUMNS
        .split(", ")
        .map(|c| format!("o.{c}"))
        .collect::<Vec<_>>()
        .join(", ")
}
