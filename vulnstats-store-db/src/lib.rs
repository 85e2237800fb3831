// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! SQLite database interface for namespace vulnerability statistics.
//!
//! This crate stores the per-namespace rollups and computes them from the
//! raw per-namespace statistics written by vulnerability ingestion.
//!
//! **Architecture**: This is the Database Layer. It persists the types from
//! `vulnstats-core` and is driven by `vulnstats-adjustment`.
//!
//! # Key Features
//!
//! - Subtree range scans over traversal-path keys
//! - Batch aggregation of raw statistics into rollups
//! - Upsert-with-diff and floored delta application, one transaction each
//! - Exclusive leases shared by every connection to the same file
//! - In-memory database for testing
//!
//! # Example
//!
//! ```ignore
//! use vulnstats_store_db::{StatsDb, OpenMode};
//!
//! let mut db = StatsDb::open("stats.sqlite", OpenMode::Create)?;
//! let paths = db.resolve_namespaces(&[1, 2])?;
//! let rollups = db.aggregate_rollups(&paths)?;
//! for diff in db.upsert_and_diff(&rollups)? {
//!     println!("{}: {:?}", diff.traversal_path, diff.counts.changes());
//! }
//! ```

mod connection;
mod error;
mod lease;
mod query;
mod rollup;
mod schema;
mod types;
mod write;

pub use connection::{OpenMode, StatsDb};
pub use error::{Error, Result};
pub use query::MAX_AGGREGATION_BATCH;
pub use schema::SCHEMA_VERSION;
pub use types::*;
pub use write::{CreateNamespaceParams, RawStatisticParams};
