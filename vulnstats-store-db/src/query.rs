// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Read query operations for the statistics database.

use rusqlite::types::Value;
use rusqlite::{OptionalExtension, Row, params, params_from_iter};
use vulnstats_core::{NamespaceId, Rollup, SeverityCounts, TraversalPath};

use crate::connection::StatsDb;
use crate::error::Result;
use crate::types::{
    Namespace, NamespaceStatistic, RawStatistic, counts_columns, kind_column, path_column,
    unix_to_system_time,
};

/// Largest number of namespaces aggregated by one statement.
pub const MAX_AGGREGATION_BATCH: usize = 100;

const STATISTIC_COLUMNS: &str = "id, namespace_id, traversal_ids, \
     total, critical, high, medium, low, unknown, info, created_at, updated_at";

fn statistic_from_row(row: &Row<'_>) -> rusqlite::Result<NamespaceStatistic> {
    Ok(NamespaceStatistic {
        id: row.get(0)?,
        namespace_id: row.get(1)?,
        traversal_path: path_column(row, 2)?,
        counts: counts_columns(row, 3)?,
        created_at: unix_to_system_time(row.get(10)?),
        updated_at: unix_to_system_time(row.get(11)?),
    })
}

fn placeholders(count: usize, group: &str) -> String {
    vec![group; count].join(", ")
}

impl StatsDb {
    /// Resolve namespace ids to traversal paths.
    ///
    /// Ids that are unknown, scheduled for deletion or belong to project
    /// pseudo-namespaces are skipped without error.
    pub fn resolve_namespaces(&self, ids: &[NamespaceId]) -> Result<Vec<TraversalPath>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            SELECT traversal_ids
            FROM namespaces
            WHERE id IN ({})
              AND type = 'Group'
              AND deleted_at IS NULL
            ORDER BY traversal_ids
            "#,
            placeholders(ids.len(), "?")
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let paths = stmt
            .query_map(params_from_iter(ids), |row| path_column(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(paths)
    }

    /// Compute fresh rollups for a batch of namespaces.
    ///
    /// Sums every non-archived raw statistic whose path lies in
    /// `[path, next_path)` of each namespace. Namespaces without any
    /// matching rows still get an all-zero rollup, so stale counts can be
    /// driven back to zero.
    ///
    /// Callers chunk their input; batches larger than
    /// [`MAX_AGGREGATION_BATCH`] are a bug.
    pub fn aggregate_rollups(&self, paths: &[TraversalPath]) -> Result<Vec<Rollup>> {
        debug_assert!(
            paths.len() <= MAX_AGGREGATION_BATCH,
            "aggregation batch of {} exceeds {MAX_AGGREGATION_BATCH}",
            paths.len()
        );
        if paths.is_empty() {
            return Ok(Vec::new());
        }

        let sql = format!(
            r#"
            WITH batch(namespace_id, traversal_ids, next_traversal_ids) AS (
                VALUES {}
            )
            SELECT batch.traversal_ids,
                   COALESCE(SUM(s.total), 0),
                   COALESCE(SUM(s.critical), 0),
                   COALESCE(SUM(s.high), 0),
                   COALESCE(SUM(s.medium), 0),
                   COALESCE(SUM(s.low), 0),
                   COALESCE(SUM(s.unknown), 0),
                   COALESCE(SUM(s.info), 0)
            FROM batch
            LEFT JOIN vulnerability_statistics s
              ON s.archived = 0
             AND s.traversal_ids >= batch.traversal_ids
             AND s.traversal_ids < batch.next_traversal_ids
            GROUP BY batch.namespace_id, batch.traversal_ids
            ORDER BY batch.traversal_ids
            "#,
            placeholders(paths.len(), "(?, ?, ?)")
        );

        let values: Vec<Value> = paths
            .iter()
            .flat_map(|path| {
                [
                    Value::Integer(path.namespace_id()),
                    Value::Blob(path.key()),
                    Value::Blob(path.next_key()),
                ]
            })
            .collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let rollups = stmt
            .query_map(params_from_iter(values.iter()), |row| {
                Ok(Rollup::new(path_column(row, 0)?, counts_columns(row, 1)?))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rollups)
    }

    /// Stored rollup of a namespace, if one was ever written.
    pub fn find_statistic(&self, namespace_id: NamespaceId) -> Result<Option<NamespaceStatistic>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            "SELECT {STATISTIC_COLUMNS} FROM vulnerability_namespace_statistics WHERE namespace_id = ?1"
        ))?;
        Ok(stmt
            .query_row(params![namespace_id], statistic_from_row)
            .optional()?)
    }

    /// Stored counts of a namespace, all zero when nothing is stored yet.
    pub fn statistic_or_default(&self, namespace_id: NamespaceId) -> Result<SeverityCounts> {
        Ok(self
            .find_statistic(namespace_id)?
            .map(|stat| stat.counts)
            .unwrap_or_default())
    }

    /// Stored rollups of a namespace and all of its descendants.
    pub fn statistics_in_subtree(&self, path: &TraversalPath) -> Result<Vec<NamespaceStatistic>> {
        let mut stmt = self.conn.prepare_cached(&format!(
            r#"
            SELECT {STATISTIC_COLUMNS}
            FROM vulnerability_namespace_statistics
            WHERE traversal_ids >= ?1 AND traversal_ids < ?2
            ORDER BY traversal_ids
            "#
        ))?;
        let stats = stmt
            .query_map(params![path.key(), path.next_key()], statistic_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(stats)
    }

    /// Count the number of stored rollups.
    pub fn count_statistics(&self) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM vulnerability_namespace_statistics",
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Look up a namespace row, including deleted ones.
    pub fn find_namespace(&self, id: NamespaceId) -> Result<Option<Namespace>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT id, parent_id, type, traversal_ids, deleted_at
            FROM namespaces
            WHERE id = ?1
            "#,
        )?;
        Ok(stmt
            .query_row(params![id], |row| {
                Ok(Namespace {
                    id: row.get(0)?,
                    parent_id: row.get(1)?,
                    kind: kind_column(row, 2)?,
                    traversal_path: path_column(row, 3)?,
                    deleted_at: row.get::<_, Option<i64>>(4)?.map(unix_to_system_time),
                })
            })
            .optional()?)
    }

    /// Raw statistic owned directly by a namespace.
    pub fn find_raw_statistic(&self, namespace_id: NamespaceId) -> Result<Option<RawStatistic>> {
        let mut stmt = self.conn.prepare_cached(
            r#"
            SELECT namespace_id, traversal_ids, archived,
                   total, critical, high, medium, low, unknown, info, updated_at
            FROM vulnerability_statistics
            WHERE namespace_id = ?1
            "#,
        )?;
        Ok(stmt
            .query_row(params![namespace_id], |row| {
                Ok(RawStatistic {
                    namespace_id: row.get(0)?,
                    traversal_path: path_column(row, 1)?,
                    archived: row.get::<_, i64>(2)? != 0,
                    counts: counts_columns(row, 3)?,
                    updated_at: unix_to_system_time(row.get(10)?),
                })
            })
            .optional()?)
    }
}
