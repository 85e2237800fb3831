// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Write operations for stored rollups.
//!
//! Every public operation here runs in one `IMMEDIATE` transaction: the
//! write lock is taken up front, so a concurrent writer blocks until the
//! whole batch has committed and never sees half of it.

use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use tracing::debug;
use vulnstats_core::propagation::coalesce;
use vulnstats_core::{Delta, Diff, MovePlan, Rollup};

use crate::connection::StatsDb;
use crate::error::Result;
use crate::schema::COUNT_COLUMNS;
use crate::types::{counts_columns, now_unix};
use crate::write::rebase_subtree;

const UPSERT_SQL: &str = r#"
INSERT INTO vulnerability_namespace_statistics
    (namespace_id, traversal_ids,
     total, critical, high, medium, low, unknown, info, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
ON CONFLICT (namespace_id) DO UPDATE SET
    traversal_ids = excluded.traversal_ids,
    total = excluded.total,
    critical = excluded.critical,
    high = excluded.high,
    medium = excluded.medium,
    low = excluded.low,
    unknown = excluded.unknown,
    info = excluded.info,
    updated_at = excluded.updated_at
"#;

// Parameters are reused in the update arm so a missing row starts from zero
// and an existing one adds onto its current value, both floored at zero.
const APPLY_DELTA_SQL: &str = r#"
INSERT INTO vulnerability_namespace_statistics
    (namespace_id, traversal_ids,
     total, critical, high, medium, low, unknown, info, created_at, updated_at)
VALUES (?1, ?2,
        MAX(?3, 0), MAX(?4, 0), MAX(?5, 0), MAX(?6, 0), MAX(?7, 0), MAX(?8, 0), MAX(?9, 0),
        ?10, ?10)
ON CONFLICT (namespace_id) DO UPDATE SET
    traversal_ids = excluded.traversal_ids,
    total = MAX(total + ?3, 0),
    critical = MAX(critical + ?4, 0),
    high = MAX(high + ?5, 0),
    medium = MAX(medium + ?6, 0),
    low = MAX(low + ?7, 0),
    unknown = MAX(unknown + ?8, 0),
    info = MAX(info + ?9, 0),
    updated_at = excluded.updated_at
"#;

fn apply_rows(conn: &Connection, rows: &[Delta], now: i64) -> Result<()> {
    let mut stmt = conn.prepare_cached(APPLY_DELTA_SQL)?;
    for row in rows {
        let c = &row.counts;
        stmt.execute(params![
            row.namespace_id,
            row.traversal_path.key(),
            c.total,
            c.critical,
            c.high,
            c.medium,
            c.low,
            c.unknown,
            c.info,
            now,
        ])?;
    }
    Ok(())
}

impl StatsDb {
    /// Store fresh rollups and return how each one differs from what was
    /// stored before.
    ///
    /// One diff per input row, zero diffs included. Reading the previous
    /// value and writing the new one happen in the same transaction, so
    /// storing the same rollup twice yields an all-zero diff the second time.
    pub fn upsert_and_diff(&mut self, rollups: &[Rollup]) -> Result<Vec<Diff>> {
        if rollups.is_empty() {
            return Ok(Vec::new());
        }

        let now = now_unix();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut diffs = Vec::with_capacity(rollups.len());
        {
            let mut previous = tx.prepare_cached(&format!(
                "SELECT {COUNT_COLUMNS} FROM vulnerability_namespace_statistics WHERE namespace_id = ?1"
            ))?;
            let mut upsert = tx.prepare_cached(UPSERT_SQL)?;

            for rollup in rollups {
                let old = previous
                    .query_row(params![rollup.namespace_id], |row| counts_columns(row, 0))
                    .optional()?;
                let c = &rollup.counts;
                upsert.execute(params![
                    rollup.namespace_id,
                    rollup.traversal_path.key(),
                    c.total,
                    c.critical,
                    c.high,
                    c.medium,
                    c.low,
                    c.unknown,
                    c.info,
                    now,
                ])?;
                diffs.push(Diff::between(old.as_ref(), rollup));
            }
        }
        tx.commit()?;

        debug!(rows = rollups.len(), "Upserted namespace statistics");
        Ok(diffs)
    }

    /// Add deltas onto stored rollups, flooring every field at zero.
    ///
    /// Deltas for the same `(namespace_id, traversal_path)` are summed
    /// first. Rows that do not exist yet are created. Each row takes the
    /// supplied traversal path. Returns the number of rows written.
    ///
    /// Not idempotent: applying the same deltas twice counts them twice.
    pub fn apply_deltas(&mut self, deltas: &[Delta]) -> Result<usize> {
        let rows = coalesce(deltas);
        if rows.is_empty() {
            return Ok(0);
        }

        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        apply_rows(&tx, &rows, now_unix())?;
        tx.commit()?;

        debug!(rows = rows.len(), "Applied namespace statistics deltas");
        Ok(rows.len())
    }

    /// Move a namespace's contribution from its old ancestors to its new
    /// ones and rewrite the stored paths of its subtree.
    ///
    /// Subtraction and addition are applied as two batches inside a single
    /// transaction.
    pub fn apply_move(&mut self, plan: &MovePlan) -> Result<()> {
        if plan.is_noop() {
            return Ok(());
        }

        let now = now_unix();
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        apply_rows(&tx, &coalesce(&plan.subtract), now)?;
        apply_rows(&tx, &coalesce(&plan.add), now)?;
        let rebased = rebase_subtree(
            &tx,
            "vulnerability_namespace_statistics",
            "id",
            &plan.old_path,
            &plan.new_path,
        )?;
        tx.commit()?;

        debug!(
            namespace_id = plan.namespace_id,
            old_path = %plan.old_path,
            new_path = %plan.new_path,
            rebased,
            "Moved namespace statistics"
        );
        Ok(())
    }
}
