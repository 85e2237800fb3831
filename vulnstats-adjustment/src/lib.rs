// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Keeping namespace vulnerability statistics current.
//!
//! [`AdjustmentService`] recomputes the rollups of a batch of namespaces,
//! stores them, and returns what changed. The changes are then pushed to
//! every ancestor as deltas instead of rescanning their subtrees.
//!
//! **Architecture**: This is the Service Layer, on top of
//! `vulnstats-store-db` and `vulnstats-core`.
//!
//! # Example
//!
//! ```ignore
//! use vulnstats_adjustment::{AdjustmentConfig, AdjustmentService};
//! use vulnstats_store_db::{OpenMode, StatsDb};
//!
//! let db = StatsDb::open("stats.sqlite", OpenMode::ReadWrite)?;
//! let mut service = AdjustmentService::new(db, AdjustmentConfig::default())?;
//! let changed = service.recalculate(&[1, 2])?;
//! service.recalculate_and_propagate(5)?;
//! ```

mod adjustment;
pub mod config;
pub mod error;
mod lease;
pub mod store;
pub mod telemetry;

pub use adjustment::{AdjustmentService, MoveOutcome};
pub use config::{AdjustmentConfig, AggregationStrategy, LeaseConfig};
pub use error::{AdjustmentError, ConfigError, Result, TelemetryError};
pub use lease::statistics_lease_key;
pub use store::StatisticsStore;
pub use telemetry::{
    ADJUSTMENT_EVENT, NoopTelemetry, PrometheusTelemetry, Telemetry, TrackingEvent,
};
