// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! End-to-end tests for the adjustment service on top of SQLite.

use std::cell::Cell;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use vulnstats_adjustment::{
    ADJUSTMENT_EVENT, AdjustmentConfig, AdjustmentError, AdjustmentService, LeaseConfig,
    MoveOutcome, StatisticsStore, Telemetry, TelemetryError, TrackingEvent, statistics_lease_key,
};
use vulnstats_core::{
    Delta, Diff, MovePlan, NamespaceId, Rollup, SeverityCounts, TraversalPath, TraversalPathError,
};
use vulnstats_store_db::{
    CreateNamespaceParams, LeaseToken, NamespaceStatistic, OpenMode, RawStatisticParams, StatsDb,
};

fn path(ids: &[NamespaceId]) -> TraversalPath {
    TraversalPath::new(ids.to_vec()).unwrap()
}

fn counts(total: i64, critical: i64, high: i64) -> SeverityCounts {
    SeverityCounts {
        total,
        critical,
        high,
        ..Default::default()
    }
}

fn set_raw(db: &StatsDb, namespace_id: NamespaceId, counts: SeverityCounts) {
    db.upsert_raw_statistic(&RawStatisticParams {
        namespace_id,
        counts,
        archived: false,
    })
    .unwrap();
}

fn stored(db: &StatsDb, namespace_id: NamespaceId) -> SeverityCounts {
    db.statistic_or_default(namespace_id).unwrap()
}

/// root(1) -> group(2) -> project(3), project 3 owning
/// `{total: 5, critical: 2, high: 3}`.
fn seeded_db() -> StatsDb {
    let db = StatsDb::open_memory().unwrap();
    db.create_namespace(&CreateNamespaceParams::group(1, None))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::group(2, Some(1)))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::project(3, 2))
        .unwrap();
    set_raw(&db, 3, counts(5, 2, 3));
    db
}

fn fast_lease_config() -> AdjustmentConfig {
    AdjustmentConfig {
        lease: LeaseConfig {
            ttl_secs: 60,
            retries: 1,
            retry_delay_millis: 1,
        },
        ..AdjustmentConfig::default()
    }
}

/// Counts the calls that reach the wrapped database.
struct CountingStore {
    inner: StatsDb,
    resolve_calls: Cell<usize>,
    aggregate_calls: Cell<usize>,
    upsert_calls: Cell<usize>,
    largest_batch: Cell<usize>,
    /// Fail the n-th `upsert_and_diff` call (1-based)
    fail_upsert: Option<usize>,
}

impl CountingStore {
    fn new(inner: StatsDb) -> Self {
        Self {
            inner,
            resolve_calls: Cell::new(0),
            aggregate_calls: Cell::new(0),
            upsert_calls: Cell::new(0),
            largest_batch: Cell::new(0),
            fail_upsert: None,
        }
    }

    fn total_calls(&self) -> usize {
        self.resolve_calls.get() + self.aggregate_calls.get() + self.upsert_calls.get()
    }
}

impl StatisticsStore for CountingStore {
    fn resolve_namespaces(
        &self,
        ids: &[NamespaceId],
    ) -> vulnstats_store_db::Result<Vec<TraversalPath>> {
        self.resolve_calls.set(self.resolve_calls.get() + 1);
        self.largest_batch
            .set(self.largest_batch.get().max(ids.len()));
        self.inner.resolve_namespaces(ids)
    }

    fn aggregate_rollups(&self, paths: &[TraversalPath]) -> vulnstats_store_db::Result<Vec<Rollup>> {
        self.aggregate_calls.set(self.aggregate_calls.get() + 1);
        self.inner.aggregate_rollups(paths)
    }

    fn upsert_and_diff(&mut self, rollups: &[Rollup]) -> vulnstats_store_db::Result<Vec<Diff>> {
        self.upsert_calls.set(self.upsert_calls.get() + 1);
        if self.fail_upsert == Some(self.upsert_calls.get()) {
            return Err(vulnstats_store_db::Error::NamespaceNotFound(
                rollups[0].namespace_id,
            ));
        }
        self.inner.upsert_and_diff(rollups)
    }

    fn apply_deltas(&mut self, deltas: &[Delta]) -> vulnstats_store_db::Result<usize> {
        self.inner.apply_deltas(deltas)
    }

    fn find_statistic(
        &self,
        namespace_id: NamespaceId,
    ) -> vulnstats_store_db::Result<Option<NamespaceStatistic>> {
        self.inner.find_statistic(namespace_id)
    }

    fn statistics_in_subtree(
        &self,
        path: &TraversalPath,
    ) -> vulnstats_store_db::Result<Vec<NamespaceStatistic>> {
        self.inner.statistics_in_subtree(path)
    }

    fn apply_move(&mut self, plan: &MovePlan) -> vulnstats_store_db::Result<()> {
        self.inner.apply_move(plan)
    }

    fn try_obtain_lease(
        &self,
        key: &str,
        ttl: Duration,
    ) -> vulnstats_store_db::Result<Option<LeaseToken>> {
        self.inner.try_obtain_lease(key, ttl)
    }

    fn cancel_lease(&self, token: &LeaseToken) -> vulnstats_store_db::Result<bool> {
        self.inner.cancel_lease(token)
    }
}

#[derive(Default)]
struct RecordingTelemetry {
    events: Mutex<Vec<TrackingEvent>>,
}

impl Telemetry for RecordingTelemetry {
    fn track_event(&self, event: &TrackingEvent) -> Result<(), TelemetryError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

struct FailingTelemetry;

impl Telemetry for FailingTelemetry {
    fn track_event(&self, _event: &TrackingEvent) -> Result<(), TelemetryError> {
        Err(TelemetryError::Unavailable("sink is down".into()))
    }
}

#[test_log::test]
fn test_recalculate_end_to_end() {
    let telemetry = Arc::new(RecordingTelemetry::default());
    let mut service = AdjustmentService::new(seeded_db(), AdjustmentConfig::default())
        .unwrap()
        .with_telemetry(telemetry.clone());

    let diffs = service.recalculate(&[1, 2]).unwrap();
    assert_eq!(diffs.len(), 2);
    for (diff, expected_path) in diffs.iter().zip([path(&[1]), path(&[1, 2])]) {
        assert_eq!(diff.traversal_path, expected_path);
        assert_eq!(diff.counts, counts(5, 2, 3));
    }
    assert_eq!(stored(service.store(), 1), counts(5, 2, 3));
    assert_eq!(stored(service.store(), 2), counts(5, 2, 3));

    let again = service.recalculate(&[1, 2]).unwrap();
    assert!(again.is_empty());

    let events = telemetry.events.lock().unwrap();
    assert_eq!(
        *events,
        vec![TrackingEvent {
            name: ADJUSTMENT_EVENT,
            namespace_ids: vec![1, 2],
        }]
    );
}

#[test]
fn test_unchanged_namespace_is_filtered_out() {
    let db = seeded_db();
    db.create_namespace(&CreateNamespaceParams::group(4, Some(1)))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::project(5, 4))
        .unwrap();
    let mut service = AdjustmentService::new(db, AdjustmentConfig::default()).unwrap();
    service.recalculate(&[1, 2, 4]).unwrap();

    set_raw(service.store(), 5, counts(1, 0, 1));
    let diffs = service.recalculate(&[1, 2, 4]).unwrap();

    let changed: Vec<NamespaceId> = diffs.iter().map(|d| d.namespace_id).collect();
    assert_eq!(changed, vec![1, 4]);
    assert!(diffs.iter().all(|d| d.counts == counts(1, 0, 1)));
}

#[test]
fn test_batch_of_exactly_the_cap_is_chunked() {
    let ids: Vec<NamespaceId> = (1..=1000).collect();
    let mut service =
        AdjustmentService::new(CountingStore::new(seeded_db()), AdjustmentConfig::default())
            .unwrap();

    let diffs = service.recalculate(&ids).unwrap();
    assert_eq!(diffs.len(), 2);

    let store = service.store();
    assert_eq!(store.resolve_calls.get(), 10);
    assert_eq!(store.largest_batch.get(), 100);
    // only the first chunk holds live groups
    assert_eq!(store.aggregate_calls.get(), 1);
    assert_eq!(store.upsert_calls.get(), 1);
}

#[test]
fn test_batch_above_the_cap_never_reaches_the_store() {
    let ids: Vec<NamespaceId> = (1..=1001).collect();
    let mut service =
        AdjustmentService::new(CountingStore::new(seeded_db()), AdjustmentConfig::default())
            .unwrap();

    let err = service.recalculate(&ids).unwrap_err();
    assert!(matches!(
        err,
        AdjustmentError::InputTooLarge {
            given: 1001,
            max: 1000
        }
    ));
    assert_eq!(service.store().total_calls(), 0);
    assert_eq!(service.store().inner.count_statistics().unwrap(), 0);
}

#[test]
fn test_smaller_configured_batch_size() {
    let config = AdjustmentConfig {
        batch_size: 1,
        ..AdjustmentConfig::default()
    };
    let mut service = AdjustmentService::new(CountingStore::new(seeded_db()), config).unwrap();

    let diffs = service.recalculate(&[1, 2, 3]).unwrap();
    assert_eq!(diffs.len(), 2);
    assert_eq!(service.store().resolve_calls.get(), 3);
    assert_eq!(service.store().upsert_calls.get(), 2);
}

#[test_log::test]
fn test_failing_telemetry_does_not_fail_recalculation() {
    let mut service = AdjustmentService::new(seeded_db(), AdjustmentConfig::default())
        .unwrap()
        .with_telemetry(Arc::new(FailingTelemetry));

    let diffs = service.recalculate(&[2]).unwrap();
    assert_eq!(diffs.len(), 1);
    assert_eq!(stored(service.store(), 2), counts(5, 2, 3));
}

#[test_log::test]
fn test_failed_chunk_reports_committed_diffs() {
    let telemetry = Arc::new(RecordingTelemetry::default());
    let config = AdjustmentConfig {
        batch_size: 1,
        ..AdjustmentConfig::default()
    };
    let mut store = CountingStore::new(seeded_db());
    store.fail_upsert = Some(2);
    let mut service = AdjustmentService::new(store, config)
        .unwrap()
        .with_telemetry(telemetry.clone());

    let err = service.recalculate(&[1, 2]).unwrap_err();
    let AdjustmentError::PartiallyApplied { committed, source } = err else {
        panic!("expected a partial failure");
    };
    assert!(matches!(
        source,
        vulnstats_store_db::Error::NamespaceNotFound(2)
    ));
    assert_eq!(committed.len(), 1);
    assert_eq!(committed[0].namespace_id, 1);
    assert_eq!(committed[0].counts, counts(5, 2, 3));

    assert_eq!(stored(&service.store().inner, 1), counts(5, 2, 3));
    assert!(service.store().inner.find_statistic(2).unwrap().is_none());
    assert_eq!(
        *telemetry.events.lock().unwrap(),
        vec![TrackingEvent::adjustment(vec![1])]
    );
}

#[test]
fn test_failed_first_chunk_is_a_plain_store_error() {
    let mut store = CountingStore::new(seeded_db());
    store.fail_upsert = Some(1);
    let mut service = AdjustmentService::new(store, AdjustmentConfig::default()).unwrap();

    let err = service.recalculate(&[1, 2]).unwrap_err();
    assert!(matches!(err, AdjustmentError::Store(_)));
    assert!(err.is_retryable());
}

#[test]
fn test_archiving_drives_rollups_down() {
    let mut service = AdjustmentService::new(seeded_db(), AdjustmentConfig::default()).unwrap();
    service.recalculate(&[1, 2]).unwrap();

    service
        .store()
        .set_raw_statistic_archived(3, true)
        .unwrap();
    let diffs = service.recalculate(&[1, 2]).unwrap();

    assert_eq!(diffs.len(), 2);
    assert!(diffs.iter().all(|d| d.counts == -counts(5, 2, 3)));
    assert_eq!(stored(service.store(), 1), SeverityCounts::ZERO);
}

/// root(1) -> group(2) -> group(5) -> project(6)
#[test_log::test]
fn test_recalculate_and_propagate_updates_ancestors() {
    let db = seeded_db();
    db.create_namespace(&CreateNamespaceParams::group(5, Some(2)))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::project(6, 5))
        .unwrap();
    let mut service = AdjustmentService::new(db, AdjustmentConfig::default()).unwrap();
    service.recalculate(&[1, 2, 5]).unwrap();

    set_raw(service.store(), 6, counts(4, 4, 0));
    service.recalculate_and_propagate(5).unwrap();

    assert_eq!(stored(service.store(), 5), counts(4, 4, 0));
    assert_eq!(stored(service.store(), 2), counts(9, 6, 3));
    assert_eq!(stored(service.store(), 1), counts(9, 6, 3));

    // propagated values agree with a full recompute
    assert!(service.recalculate(&[1, 2, 5]).unwrap().is_empty());
    assert!(
        !service
            .store()
            .lease_held(&statistics_lease_key(5))
            .unwrap()
    );
}

#[test]
fn test_recalculate_and_propagate_skips_legacy_roots() {
    let config = AdjustmentConfig {
        legacy_roots: vec![1],
        ..AdjustmentConfig::default()
    };
    let mut service = AdjustmentService::new(seeded_db(), config).unwrap();

    service.recalculate_and_propagate(2).unwrap();
    assert_eq!(service.store().count_statistics().unwrap(), 0);
}

#[test]
fn test_recalculate_and_propagate_unknown_namespace() {
    let mut service = AdjustmentService::new(seeded_db(), AdjustmentConfig::default()).unwrap();
    service.recalculate_and_propagate(404).unwrap();
    service.recalculate_and_propagate(3).unwrap();
    assert_eq!(service.store().count_statistics().unwrap(), 0);
}

#[test]
fn test_propagate_merges_shared_ancestors() {
    let mut service = AdjustmentService::new(seeded_db(), AdjustmentConfig::default()).unwrap();
    let diffs = vec![
        Diff {
            namespace_id: 2,
            traversal_path: path(&[1, 2]),
            counts: counts(2, 0, 0),
        },
        Diff {
            namespace_id: 4,
            traversal_path: path(&[1, 4]),
            counts: counts(3, 1, 0),
        },
    ];

    assert_eq!(service.propagate(&diffs).unwrap(), 3);
    assert_eq!(stored(service.store(), 1), counts(5, 1, 0));
    assert_eq!(stored(service.store(), 2), counts(2, 0, 0));
    assert_eq!(stored(service.store(), 4), counts(3, 1, 0));
}

/// Group 2 moves from root 1 to root 9.
#[test_log::test]
fn test_move_namespace_between_roots() {
    let db = seeded_db();
    db.create_namespace(&CreateNamespaceParams::group(9, None))
        .unwrap();
    let mut service = AdjustmentService::new(db, fast_lease_config()).unwrap();
    service.recalculate(&[1, 2, 9]).unwrap();

    let (old_path, new_path) = service
        .store_mut()
        .transfer_namespace(2, Some(9))
        .unwrap();
    assert_eq!(old_path, path(&[1, 2]));
    assert_eq!(new_path, path(&[9, 2]));

    let outcome = service.move_namespace(2, &new_path).unwrap();
    assert_eq!(outcome, MoveOutcome::Applied);

    let store = service.store();
    assert_eq!(stored(store, 1), SeverityCounts::ZERO);
    assert_eq!(stored(store, 9), counts(5, 2, 3));
    assert_eq!(stored(store, 2), counts(5, 2, 3));
    assert_eq!(
        store.find_statistic(2).unwrap().unwrap().traversal_path,
        new_path
    );
    assert!(!store.lease_held(&statistics_lease_key(2)).unwrap());

    // moved rollups agree with a full recompute
    assert!(service.recalculate(&[1, 2, 9]).unwrap().is_empty());

    assert_eq!(
        service.move_namespace(2, &new_path).unwrap(),
        MoveOutcome::Unchanged
    );
}

/// root(1) -> group(2) -> group(5) -> project(6); 2 cannot move below 5.
#[test]
fn test_move_into_own_subtree_is_rejected() {
    let db = seeded_db();
    db.create_namespace(&CreateNamespaceParams::group(5, Some(2)))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::project(6, 5))
        .unwrap();
    set_raw(&db, 6, counts(4, 0, 0));
    let mut service = AdjustmentService::new(db, fast_lease_config()).unwrap();
    service.recalculate(&[1, 2, 5]).unwrap();
    let before: Vec<_> = [1, 2, 5]
        .iter()
        .map(|&id| service.store().find_statistic(id).unwrap().unwrap())
        .collect();

    assert_eq!(
        TraversalPath::new(vec![1, 2, 5, 2]),
        Err(TraversalPathError::DuplicateId(2))
    );
    let err = service.move_namespace(2, &path(&[1, 5, 2])).unwrap_err();
    assert!(matches!(
        err,
        AdjustmentError::InvalidMove { namespace_id: 2, .. }
    ));

    let after: Vec<_> = [1, 2, 5]
        .iter()
        .map(|&id| service.store().find_statistic(id).unwrap().unwrap())
        .collect();
    assert_eq!(before, after);
    assert!(!service.store().lease_held(&statistics_lease_key(2)).unwrap());
}

#[test]
fn test_busy_lease_skips_move_and_blocks_propagation() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("stats.sqlite");

    let db = StatsDb::open(&db_path, OpenMode::Create).unwrap();
    db.create_namespace(&CreateNamespaceParams::group(1, None))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::group(2, Some(1)))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::group(9, None))
        .unwrap();
    db.create_namespace(&CreateNamespaceParams::project(3, 2))
        .unwrap();
    set_raw(&db, 3, counts(5, 2, 3));
    let mut service = AdjustmentService::new(db, fast_lease_config()).unwrap();
    service.recalculate(&[1, 2, 9]).unwrap();

    let other = StatsDb::open(&db_path, OpenMode::ReadWrite).unwrap();
    let key = statistics_lease_key(2);
    let token = other
        .try_obtain_lease(&key, Duration::from_secs(60))
        .unwrap()
        .unwrap();

    let outcome = service.move_namespace(2, &path(&[9, 2])).unwrap();
    assert_eq!(outcome, MoveOutcome::Skipped);
    assert_eq!(stored(service.store(), 1), counts(5, 2, 3));
    assert_eq!(stored(service.store(), 9), SeverityCounts::ZERO);

    let err = service.recalculate_and_propagate(2).unwrap_err();
    assert!(matches!(err, AdjustmentError::LeaseContention { .. }));
    assert!(err.is_retryable());

    assert!(other.cancel_lease(&token).unwrap());
    assert_eq!(
        service.move_namespace(2, &path(&[9, 2])).unwrap(),
        MoveOutcome::Applied
    );
    assert_eq!(stored(&other, 9), counts(5, 2, 3));
}
