// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Recomputing namespace rollups and pushing their changes up the tree.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};
use vulnstats_core::propagation::{self, ADD};
use vulnstats_core::{Diff, MovePlan, NamespaceId, TraversalPath};

use crate::config::{AdjustmentConfig, AggregationStrategy};
use crate::error::{AdjustmentError, Result};
use crate::lease::statistics_lease_key;
use crate::store::StatisticsStore;
use crate::telemetry::{NoopTelemetry, Telemetry, TrackingEvent};

/// What [`AdjustmentService::move_namespace`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Ancestors were adjusted and the subtree's paths rewritten.
    Applied,
    /// The namespace has no stored rollup yet.
    NothingStored,
    /// The stored path already is the new path.
    Unchanged,
    /// The lease stayed busy; retry later.
    Skipped,
}

pub struct AdjustmentService<S> {
    store: S,
    config: AdjustmentConfig,
    telemetry: Arc<dyn Telemetry>,
}

impl<S: StatisticsStore> AdjustmentService<S> {
    pub fn new(store: S, config: AdjustmentConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store,
            config,
            telemetry: Arc::new(NoopTelemetry),
        })
    }

    pub fn with_telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = telemetry;
        self
    }

    pub fn config(&self) -> &AdjustmentConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Recompute the rollups of `namespace_ids` and store them.
    ///
    /// Returns the non-zero diffs against the previously stored rollups.
    /// Ids that do not resolve to a live group are skipped. Input is
    /// processed in chunks of `batch_size`, each committed and logged on its
    /// own. When a chunk fails, earlier chunks stay stored, are still
    /// tracked, and their diffs come back in
    /// [`AdjustmentError::PartiallyApplied`].
    ///
    /// Rejects more than `max_namespace_ids` ids before touching the store.
    pub fn recalculate(&mut self, namespace_ids: &[NamespaceId]) -> Result<Vec<Diff>> {
        let max = self.config.max_namespace_ids;
        if namespace_ids.len() > max {
            return Err(AdjustmentError::InputTooLarge {
                given: namespace_ids.len(),
                max,
            });
        }

        let mut seen = HashSet::with_capacity(namespace_ids.len());
        let ids: Vec<NamespaceId> = namespace_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        let mut changed = Vec::new();
        let result = self.recalculate_chunks(&ids, &mut changed);
        self.track(&changed);
        match result {
            Ok(()) => Ok(changed),
            Err(source) if changed.is_empty() => Err(source.into()),
            Err(source) => Err(AdjustmentError::PartiallyApplied {
                committed: changed,
                source,
            }),
        }
    }

    fn recalculate_chunks(
        &mut self,
        ids: &[NamespaceId],
        changed: &mut Vec<Diff>,
    ) -> vulnstats_store_db::Result<()> {
        for chunk in ids.chunks(self.config.batch_size) {
            let paths = self.store.resolve_namespaces(chunk)?;
            if paths.is_empty() {
                continue;
            }
            let rollups = self.store.aggregate_rollups(&paths)?;
            let diffs = self.store.upsert_and_diff(&rollups)?;
            debug!(
                requested = chunk.len(),
                resolved = paths.len(),
                "Recalculated namespace statistics chunk"
            );
            for diff in diffs.into_iter().filter(|diff| !diff.is_zero()) {
                log_diff(&diff);
                changed.push(diff);
            }
        }
        Ok(())
    }

    /// Recompute one group and apply its change to every ancestor.
    ///
    /// Runs under the namespace's statistics lease. Groups whose root is
    /// configured for [`AggregationStrategy::LegacyAdditive`] are left alone.
    pub fn recalculate_and_propagate(&mut self, namespace_id: NamespaceId) -> Result<()> {
        let Some(path) = self
            .store
            .resolve_namespaces(&[namespace_id])?
            .into_iter()
            .next()
        else {
            debug!(namespace_id, "Namespace not found, nothing to recalculate");
            return Ok(());
        };

        if self.config.strategy_for(path.root_id()) == AggregationStrategy::LegacyAdditive {
            debug!(
                namespace_id,
                root_id = path.root_id(),
                "Statistics maintained by legacy additive updates"
            );
            return Ok(());
        }

        self.in_lock(&statistics_lease_key(namespace_id), |this| {
            let diffs = this.recalculate(&[namespace_id])?;
            // the namespace's own row is already current
            let for_ancestors: Vec<Diff> = diffs.iter().filter_map(Diff::for_parent).collect();
            this.propagate(&for_ancestors)?;
            Ok(())
        })
    }

    /// Apply diffs to their namespaces and every ancestor.
    ///
    /// Deltas for shared ancestors are summed so each row is written once.
    /// Returns the number of rows written.
    pub fn propagate(&mut self, diffs: &[Diff]) -> Result<usize> {
        let deltas = propagation::propagate(diffs, ADD);
        if deltas.is_empty() {
            return Ok(0);
        }
        let rows = self.store.apply_deltas(&deltas)?;
        debug!(diffs = diffs.len(), rows, "Propagated statistics diffs");
        Ok(rows)
    }

    /// Move a namespace's stored statistics to `new_path`.
    ///
    /// Its counts are subtracted from the old ancestors and added to the new
    /// ones, and the paths of its subtree are rewritten, all in one
    /// transaction under the namespace's statistics lease. A busy lease is
    /// not an error: the move is skipped and can be retried.
    ///
    /// `new_path` must end in `namespace_id` and must not run through the
    /// namespace's own subtree.
    pub fn move_namespace(
        &mut self,
        namespace_id: NamespaceId,
        new_path: &TraversalPath,
    ) -> Result<MoveOutcome> {
        if new_path.namespace_id() != namespace_id {
            return Err(invalid_move(
                namespace_id,
                new_path,
                "path must end in the namespace id",
            ));
        }
        if new_path.ancestors().any(|a| a.namespace_id() == namespace_id) {
            return Err(invalid_move(
                namespace_id,
                new_path,
                "namespace cannot be its own ancestor",
            ));
        }

        let key = statistics_lease_key(namespace_id);
        match self.in_lock(&key, |this| this.move_locked(namespace_id, new_path)) {
            Err(AdjustmentError::LeaseContention { key }) => {
                warn!(namespace_id, %key, "Skipping namespace move, lease is busy");
                Ok(MoveOutcome::Skipped)
            }
            other => other,
        }
    }

    fn move_locked(
        &mut self,
        namespace_id: NamespaceId,
        new_path: &TraversalPath,
    ) -> Result<MoveOutcome> {
        let Some(stored) = self.store.find_statistic(namespace_id)? else {
            return Ok(MoveOutcome::NothingStored);
        };
        if stored.traversal_path == *new_path {
            return Ok(MoveOutcome::Unchanged);
        }

        let subtree = self.store.statistics_in_subtree(&stored.traversal_path)?;
        if subtree
            .iter()
            .any(|row| new_path.ancestors().any(|a| a.namespace_id() == row.namespace_id))
        {
            return Err(invalid_move(
                namespace_id,
                new_path,
                "new parent lies inside the namespace's own subtree",
            ));
        }

        let plan = MovePlan::new(stored.traversal_path, new_path.clone(), stored.counts);
        self.store.apply_move(&plan)?;
        info!(
            namespace_id,
            old_path = %plan.old_path,
            new_path = %plan.new_path,
            "Moved namespace statistics"
        );
        Ok(MoveOutcome::Applied)
    }

    fn track(&self, changed: &[Diff]) {
        if changed.is_empty() {
            return;
        }
        let event = TrackingEvent::adjustment(changed.iter().map(|d| d.namespace_id).collect());
        if let Err(e) = self.telemetry.track_event(&event) {
            warn!(event = event.name, error = %e, "Failed to track event");
        }
    }
}

fn invalid_move(
    namespace_id: NamespaceId,
    new_path: &TraversalPath,
    reason: &'static str,
) -> AdjustmentError {
    AdjustmentError::InvalidMove {
        namespace_id,
        new_path: new_path.clone(),
        reason,
    }
}

fn log_diff(diff: &Diff) {
    match serde_json::to_string(&diff.counts.changes()) {
        Ok(changes) => info!(
            namespace_id = diff.namespace_id,
            traversal_path = %diff.traversal_path,
            %changes,
            "Namespace vulnerability statistics changed"
        ),
        Err(e) => debug!(
            namespace_id = diff.namespace_id,
            error = %e,
            "Failed to render statistics changes"
        ),
    }
}
