// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Write operations for the namespace tree and raw statistics.
//!
//! Both tables belong to the surrounding application; these helpers exist
//! for testing and for local tooling that seeds a database.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;
use vulnstats_core::{NamespaceId, SeverityCounts, TraversalPath};

use crate::connection::StatsDb;
use crate::error::{Error, Result};
use crate::types::{NamespaceKind, now_unix, path_column};

/// Parameters for registering a namespace.
#[derive(Debug, Clone)]
pub struct CreateNamespaceParams {
    pub id: NamespaceId,
    /// `None` for a root namespace
    pub parent_id: Option<NamespaceId>,
    pub kind: NamespaceKind,
}

impl CreateNamespaceParams {
    pub fn group(id: NamespaceId, parent_id: Option<NamespaceId>) -> Self {
        Self {
            id,
            parent_id,
            kind: NamespaceKind::Group,
        }
    }

    pub fn project(id: NamespaceId, parent_id: NamespaceId) -> Self {
        Self {
            id,
            parent_id: Some(parent_id),
            kind: NamespaceKind::Project,
        }
    }
}

/// Parameters for writing a namespace's raw statistic.
#[derive(Debug, Clone, Default)]
pub struct RawStatisticParams {
    pub namespace_id: NamespaceId,
    pub counts: SeverityCounts,
    pub archived: bool,
}

/// Rewrite every `traversal_ids` in `table` that lives under `from` so it
/// lives under `to` instead. Returns the number of rows rewritten.
pub(crate) fn rebase_subtree(
    conn: &Connection,
    table: &str,
    id_column: &str,
    from: &TraversalPath,
    to: &TraversalPath,
) -> Result<usize> {
    let rows = {
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {id_column}, traversal_ids FROM {table} \
             WHERE traversal_ids >= ?1 AND traversal_ids < ?2"
        ))?;
        stmt.query_map(params![from.key(), from.next_key()], |row| {
            Ok((row.get::<_, i64>(0)?, path_column(row, 1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut update = conn.prepare_cached(&format!(
        "UPDATE {table} SET traversal_ids = ?2 WHERE {id_column} = ?1"
    ))?;
    let mut rewritten = 0;
    for (id, path) in rows {
        if let Some(rebased) = path.rebase(from, to) {
            rewritten += update.execute(params![id, rebased.key()])?;
        }
    }
    Ok(rewritten)
}

impl StatsDb {
    fn namespace_path(conn: &Connection, id: NamespaceId) -> Result<TraversalPath> {
        conn.query_row(
            "SELECT traversal_ids FROM namespaces WHERE id = ?1",
            params![id],
            |row| path_column(row, 0),
        )
        .optional()?
        .ok_or(Error::NamespaceNotFound(id))
    }

    /// Register a namespace below its parent.
    ///
    /// Returns the traversal path assigned to it.
    pub fn create_namespace(&self, params: &CreateNamespaceParams) -> Result<TraversalPath> {
        let path = match params.parent_id {
            Some(parent) => Self::namespace_path(&self.conn, parent)?.child(params.id)?,
            None => TraversalPath::root(params.id)?,
        };

        self.conn.execute(
            r#"
            INSERT INTO namespaces (id, parent_id, type, traversal_ids)
            VALUES (?1, ?2, ?3, ?4)
            "#,
            params![params.id, params.parent_id, params.kind.as_str(), path.key()],
        )?;
        Ok(path)
    }

    /// Mark a namespace as scheduled for deletion.
    pub fn delete_namespace(&self, id: NamespaceId) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE namespaces SET deleted_at = ?2 WHERE id = ?1 AND deleted_at IS NULL",
            params![id, now_unix()],
        )?;
        Ok(rows > 0)
    }

    /// Move a namespace below a new parent (or make it a root).
    ///
    /// Rewrites the paths of the whole subtree in the namespaces and raw
    /// statistics tables. Rollups are left alone; moving those is the job of
    /// [`StatsDb::apply_move`]. Returns `(old_path, new_path)`.
    pub fn transfer_namespace(
        &mut self,
        id: NamespaceId,
        new_parent_id: Option<NamespaceId>,
    ) -> Result<(TraversalPath, TraversalPath)> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let old_path = Self::namespace_path(&tx, id)?;
        let new_path = match new_parent_id {
            Some(parent) => Self::namespace_path(&tx, parent)?.child(id)?,
            None => TraversalPath::root(id)?,
        };

        tx.execute(
            "UPDATE namespaces SET parent_id = ?2 WHERE id = ?1",
            params![id, new_parent_id],
        )?;
        let namespaces = rebase_subtree(&tx, "namespaces", "id", &old_path, &new_path)?;
        let raw = rebase_subtree(
            &tx,
            "vulnerability_statistics",
            "namespace_id",
            &old_path,
            &new_path,
        )?;
        tx.commit()?;

        debug!(
            namespace_id = id,
            %old_path,
            %new_path,
            namespaces,
            raw,
            "Transferred namespace"
        );
        Ok((old_path, new_path))
    }

    /// Insert or replace the raw statistic a namespace owns directly.
    pub fn upsert_raw_statistic(&self, params: &RawStatisticParams) -> Result<()> {
        let path = Self::namespace_path(&self.conn, params.namespace_id)?;
        let c = &params.counts;
        self.conn.execute(
            r#"
            INSERT INTO vulnerability_statistics
                (namespace_id, traversal_ids, archived,
                 total, critical, high, medium, low, unknown, info, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            ON CONFLICT (namespace_id) DO UPDATE SET
                traversal_ids = excluded.traversal_ids,
                archived = excluded.archived,
                total = excluded.total,
                critical = excluded.critical,
                high = excluded.high,
                medium = excluded.medium,
                low = excluded.low,
                unknown = excluded.unknown,
                info = excluded.info,
                updated_at = excluded.updated_at
            "#,
            params![
                params.namespace_id,
                path.key(),
                params.archived,
                c.total,
                c.critical,
                c.high,
                c.medium,
                c.low,
                c.unknown,
                c.info,
                now_unix(),
            ],
        )?;
        Ok(())
    }

    /// Flag a raw statistic as archived (or unarchive it).
    pub fn set_raw_statistic_archived(
        &self,
        namespace_id: NamespaceId,
        archived: bool,
    ) -> Result<bool> {
        let rows = self.conn.execute(
            "UPDATE vulnerability_statistics SET archived = ?2, updated_at = ?3 WHERE namespace_id = ?1",
            params![namespace_id, archived, now_unix()],
        )?;
        Ok(rows > 0)
    }

    /// Remove a raw statistic.
    pub fn delete_raw_statistic(&self, namespace_id: NamespaceId) -> Result<bool> {
        let rows = self.conn.execute(
            "DELETE FROM vulnerability_statistics WHERE namespace_id = ?1",
            params![namespace_id],
        )?;
        Ok(rows > 0)
    }
}
