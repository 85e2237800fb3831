// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Best-effort tracking events.
//!
//! Sinks may fail; the service logs the failure and carries on.

use prometheus::{IntCounterVec, Opts, Registry};
use vulnstats_core::NamespaceId;

use crate::error::TelemetryError;

/// Fired once per `recalculate` call that changed at least one namespace.
pub const ADJUSTMENT_EVENT: &str = "activate_namespace_statistics_adjustment_service";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingEvent {
    pub name: &'static str,
    /// Namespaces whose rollup changed
    pub namespace_ids: Vec<NamespaceId>,
}

impl TrackingEvent {
    pub fn adjustment(namespace_ids: Vec<NamespaceId>) -> Self {
        Self {
            name: ADJUSTMENT_EVENT,
            namespace_ids,
        }
    }
}

pub trait Telemetry: Send + Sync {
    fn track_event(&self, event: &TrackingEvent) -> Result<(), TelemetryError>;
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn track_event(&self, _event: &TrackingEvent) -> Result<(), TelemetryError> {
        Ok(())
    }
}

/// Counts tracking events in Prometheus.
#[derive(Clone, Debug)]
pub struct PrometheusTelemetry {
    /// Events tracked, labeled by event name
    pub events_total: IntCounterVec,
    /// Namespaces reported across all events, labeled by event name
    pub namespaces_total: IntCounterVec,
}

impl PrometheusTelemetry {
    /// Create the counters and register them with `registry`.
    ///
    /// # Arguments
    /// * `prefix` - Prefix for metric names (e.g., "vulnstats")
    /// * `registry` - Prometheus registry to register metrics with
    pub fn new(prefix: &str, registry: &Registry) -> Result<Self, prometheus::Error> {
        let events_total = IntCounterVec::new(
            Opts::new(
                format!("{prefix}_tracking_events_total"),
                "Total number of statistics adjustment events",
            ),
            &["event"],
        )?;

        let namespaces_total = IntCounterVec::new(
            Opts::new(
                format!("{prefix}_adjusted_namespaces_total"),
                "Total number of namespaces whose statistics changed",
            ),
            &["event"],
        )?;

        registry.register(Box::new(events_total.clone()))?;
        registry.register(Box::new(namespaces_total.clone()))?;

        Ok(Self {
            events_total,
            namespaces_total,
        })
    }
}

impl Telemetry for PrometheusTelemetry {
    fn track_event(&self, event: &TrackingEvent) -> Result<(), TelemetryError> {
        self.events_total
            .get_metric_with_label_values(&[event.name])?
            .inc();
        self.namespaces_total
            .get_metric_with_label_values(&[event.name])?
            .inc_by(event.namespace_ids.len() as u64);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prometheus_counts_events_and_namespaces() {
        let registry = Registry::new();
        let telemetry = PrometheusTelemetry::new("vulnstats", &registry).unwrap();

        telemetry
            .track_event(&TrackingEvent::adjustment(vec![1, 2]))
            .unwrap();
        telemetry
            .track_event(&TrackingEvent::adjustment(vec![3]))
            .unwrap();

        let events = telemetry.events_total.with_label_values(&[ADJUSTMENT_EVENT]);
        let namespaces = telemetry
            .namespaces_total
            .with_label_values(&[ADJUSTMENT_EVENT]);
        assert_eq!(events.get(), 2);
        assert_eq!(namespaces.get(), 3);

        assert_eq!(registry.gather().len(), 2);
    }

    #[test]
    fn test_registering_twice_fails() {
        let registry = Registry::new();
        PrometheusTelemetry::new("vulnstats", &registry).unwrap();
        assert!(PrometheusTelemetry::new("vulnstats", &registry).is_err());
    }
}
