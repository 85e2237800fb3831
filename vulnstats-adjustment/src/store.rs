// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! The storage operations the adjustment service needs.

use std::time::Duration;

use vulnstats_core::{Delta, Diff, MovePlan, NamespaceId, Rollup, TraversalPath};
use vulnstats_store_db::{LeaseToken, NamespaceStatistic, Result, StatsDb};

/// Storage seam of [`crate::AdjustmentService`].
///
/// [`StatsDb`] is the production implementation. Tests wrap it to observe
/// which calls reach the database.
pub trait StatisticsStore {
    /// Traversal paths of the live groups among `ids`, ordered by path.
    fn resolve_namespaces(&self, ids: &[NamespaceId]) -> Result<Vec<TraversalPath>>;

    /// Fresh rollups for at most [`vulnstats_store_db::MAX_AGGREGATION_BATCH`] paths.
    fn aggregate_rollups(&self, paths: &[TraversalPath]) -> Result<Vec<Rollup>>;

    fn upsert_and_diff(&mut self, rollups: &[Rollup]) -> Result<Vec<Diff>>;

    fn apply_deltas(&mut self, deltas: &[Delta]) -> Result<usize>;

    fn find_statistic(&self, namespace_id: NamespaceId) -> Result<Option<NamespaceStatistic>>;

    /// Stored rollups of the namespace at `path` and all its descendants.
    fn statistics_in_subtree(&self, path: &TraversalPath) -> Result<Vec<NamespaceStatistic>>;

    fn apply_move(&mut self, plan: &MovePlan) -> Result<()>;

    fn try_obtain_lease(&self, key: &str, ttl: Duration) -> Result<Option<LeaseToken>>;

    fn cancel_lease(&self, token: &LeaseToken) -> Result<bool>;
}

impl StatisticsStore for StatsDb {
    fn resolve_namespaces(&self, ids: &[NamespaceId]) -> Result<Vec<TraversalPath>> {
        StatsDb::resolve_namespaces(self, ids)
    }

    fn aggregate_rollups(&self, paths: &[TraversalPath]) -> Result<Vec<Rollup>> {
        StatsDb::aggregate_rollups(self, paths)
    }

    fn upsert_and_diff(&mut self, rollups: &[Rollup]) -> Result<Vec<Diff>> {
        StatsDb::upsert_and_diff(self, rollups)
    }

    fn apply_deltas(&mut self, deltas: &[Delta]) -> Result<usize> {
        StatsDb::apply_deltas(self, deltas)
    }

    fn find_statistic(&self, namespace_id: NamespaceId) -> Result<Option<NamespaceStatistic>> {
        StatsDb::find_statistic(self, namespace_id)
    }

    fn statistics_in_subtree(&self, path: &TraversalPath) -> Result<Vec<NamespaceStatistic>> {
        StatsDb::statistics_in_subtree(self, path)
    }

    fn apply_move(&mut self, plan: &MovePlan) -> Result<()> {
        StatsDb::apply_move(self, plan)
    }

    fn try_obtain_lease(&self, key: &str, ttl: Duration) -> Result<Option<LeaseToken>> {
        StatsDb::try_obtain_lease(self, key, ttl)
    }

    fn cancel_lease(&self, token: &LeaseToken) -> Result<bool> {
        StatsDb::cancel_lease(self, token)
    }
}
