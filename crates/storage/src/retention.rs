//! Age- and count-bounded pruning of observations and summaries.

use anyhow::Result;
use rusqlite::params;
use serde::{Deserialize, Serialize};

use pilot_mem_core::{ObservationType, RETENTION_DELETE_CHUNK};

use crate::Store;

/// Policy consulted on every retention run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionPolicy {
    /// Whether pruning runs at all; a disabled policy makes runs no-ops.
    pub enabled: bool,
    /// Rows older than this many days are pruned.
    pub max_age_days: u32,
    /// At most this many observations are kept per project.
    pub max_count: u32,
    /// Observation types never pruned.
    pub exclude_types: Vec<ObservationType>,
    /// Mark rows deleted instead of removing them.
    pub soft_delete: bool,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_age_days: 90,
            max_count: 2_000,
            exclude_types: vec![ObservationType::Decision],
            soft_delete: false,
        }
    }
}

/// Counts from one retention run.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PruneStats {
    /// Observations pruned.
    pub observations: u64,
    /// Summaries pruned.
    pub summaries: u64,
}

impl Store {
    /// Runs one retention pass. Deletes chunk at
    /// [`RETENTION_DELETE_CHUNK`] rows so a large sweep never holds the
    /// writer for long.
    pub fn prune(&self, policy: &RetentionPolicy, now_epoch: i64) -> Result<PruneStats> {
        if !policy.enabled {
            return Ok(PruneStats::default());
        }
        let cutoff = now_epoch - i64::from(policy.max_age_days) * 86_400_000;
        let mut stats = PruneStats::default();

        let type_guard = if policy.exclude_types.is_empty() {
            String::new()
        } else {
            let excluded: Vec<String> = policy
                .exclude_types
                .iter()
                .map(|t| format!("'{}'", t.as_str()))
                .collect();
            format!(" AND observation_type NOT IN ({})", excluded.join(", "))
        };

        // Age bound.
        stats.observations += self.prune_chunked(
            &format!(
                "SELECT id FROM observations
                 WHERE created_at_epoch < ?1 AND deleted_at_epoch IS NULL{type_guard}
                 LIMIT {RETENTION_DELETE_CHUNK}"
            ),
            "observations",
            cutoff,
            policy.soft_delete,
            now_epoch,
        )?;
        stats.summaries += self.prune_chunked(
            &format!(
                "SELECT id FROM session_summaries
                 WHERE created_at_epoch < ?1 AND deleted_at_epoch IS NULL
                 LIMIT {RETENTION_DELETE_CHUNK}"
            ),
            "session_summaries",
            cutoff,
            policy.soft_delete,
            now_epoch,
        )?;

        // Count bound: keep the newest `max_count` observations per project.
        let over_cap: Vec<i64> = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT id FROM (
                     SELECT id, ROW_NUMBER() OVER (
                         PARTITION BY project ORDER BY created_at_epoch DESC, id DESC
                     ) AS rank
                     FROM observations WHERE deleted_at_epoch IS NULL{type_guard}
                 ) WHERE rank > ?1"
            ))?;
            let ids = stmt
                .query_map(params![policy.max_count], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<i64>>>()?;
            Ok(ids)
        })?;
        for chunk in over_cap.chunks(RETENTION_DELETE_CHUNK) {
            stats.observations +=
                self.remove_ids("observations", chunk, policy.soft_delete, now_epoch)?;
        }

        Ok(stats)
    }

    /// Repeatedly claims chunks matched by `select_sql` until none remain.
    fn prune_chunked(
        &self,
        select_sql: &str,
        table: &str,
        cutoff: i64,
        soft_delete: bool,
        now_epoch: i64,
    ) -> Result<u64> {
        let mut total = 0u64;
        loop {
            let ids: Vec<i64> = self.with_conn(|conn| {
                let mut stmt = conn.prepare(select_sql)?;
                let ids = stmt
                    .query_map(params![cutoff], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<i64>>>()?;
                Ok(ids)
            })?;
            if ids.is_empty() {
                break;
            }
            total += self.remove_ids(table, &ids, soft_delete, now_epoch)?;
        }
        Ok(total)
    }

    fn remove_ids(
        &self,
        table: &str,
        ids: &[i64],
        soft_delete: bool,
        now_epoch: i64,
    ) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.with_conn(|conn| {
            let mut args: Vec<&dyn rusqlite::ToSql> = Vec::with_capacity(ids.len() + 1);
            let sql = if soft_delete {
                args.push(&now_epoch);
                let placeholders: Vec<String> =
                    (0..ids.len()).map(|i| format!("?{}", i + 2)).collect();
                format!(
                    "UPDATE {table} SET deleted_at_epoch = ?1 WHERE id IN ({})",
                    placeholders.join(", ")
                )
            } else {
                let placeholders: Vec<String> =
                    (0..ids.len()).map(|i| format!("?{}", i + 1)).collect();
                format!("DELETE FROM {table} WHERE id IN ({})", placeholders.join(", "))
            };
            for id in ids {
                args.push(id);
            }
            let changed = conn.execute(&sql, args.as_slice())?;
            Ok(changed as u64)
        })
    }
}
