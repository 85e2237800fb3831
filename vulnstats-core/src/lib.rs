// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Core semantics of namespace vulnerability statistics.
//!
//! Pure types and algorithms with no I/O:
//!
//! - [`TraversalPath`]: a namespace's position in the tree, encoded as a
//!   sortable key so subtrees become key ranges
//! - [`SeverityCounts`]: total and per-severity counts
//! - [`Rollup`] / [`Diff`]: freshly computed statistics and the change
//!   against what was stored before
//! - [`propagation`]: expanding diffs over the ancestor chain, merging them
//!   per namespace and planning namespace moves
//!
//! **Architecture**: This is the Core Layer. `vulnstats-store-db` persists
//! these types and `vulnstats-adjustment` drives them.

pub mod counts;
pub mod diff;
pub mod propagation;
pub mod traversal;

pub use counts::{SeverityCounts, StatisticField};
pub use diff::{Diff, Rollup};
pub use propagation::{Delta, MovePlan};
pub use traversal::{NamespaceId, TraversalPath, TraversalPathError};
