// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Turning one namespace's diff into deltas for its whole ancestor chain.
//!
//! An ancestor's rollup includes every descendant, so a change at `{1,2,5}`
//! has to land on namespaces 1, 2 and 5. Deltas from several diffs are
//! summed per namespace before they reach the store: the batch upsert can
//! touch each row only once.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use serde::{Deserialize, Serialize};

use crate::counts::SeverityCounts;
use crate::diff::Diff;
use crate::traversal::{NamespaceId, TraversalPath};

/// Add a contribution.
pub const ADD: i64 = 1;
/// Retract a contribution.
pub const SUBTRACT: i64 = -1;

/// A signed change to apply to one stored rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub namespace_id: NamespaceId,
    pub traversal_path: TraversalPath,
    pub counts: SeverityCounts,
}

impl Delta {
    pub fn new(traversal_path: TraversalPath, counts: SeverityCounts) -> Self {
        Self {
            namespace_id: traversal_path.namespace_id(),
            traversal_path,
            counts,
        }
    }
}

/// One delta per namespace on the diff's path, root first, self included.
pub fn expand(diff: &Diff, coefficient: i64) -> Vec<Delta> {
    let counts = diff.counts.scaled(coefficient);
    diff.traversal_path
        .lineage()
        .map(|path| Delta::new(path, counts))
        .collect()
}

/// Sum deltas per namespace.
///
/// A namespace seen under several paths keeps the greatest one, so the
/// result does not depend on input order. Deltas that cancel out completely
/// are dropped. Output is ordered by namespace id.
pub fn merge(deltas: impl IntoIterator<Item = Delta>) -> Vec<Delta> {
    let mut merged: BTreeMap<NamespaceId, Delta> = BTreeMap::new();
    for delta in deltas {
        match merged.entry(delta.namespace_id) {
            Entry::Vacant(slot) => {
                slot.insert(delta);
            }
            Entry::Occupied(mut slot) => {
                let acc = slot.get_mut();
                acc.counts += delta.counts;
                if delta.traversal_path > acc.traversal_path {
                    acc.traversal_path = delta.traversal_path;
                }
            }
        }
    }
    merged.into_values().filter(|d| !d.counts.is_zero()).collect()
}

/// Sum deltas that address the same `(namespace_id, traversal_path)` row.
///
/// Unlike [`merge`] this keeps zero rows, since applying one still refreshes
/// the stored path and timestamp.
pub fn coalesce(deltas: &[Delta]) -> Vec<Delta> {
    let mut rows: BTreeMap<(NamespaceId, TraversalPath), SeverityCounts> = BTreeMap::new();
    for delta in deltas {
        *rows
            .entry((delta.namespace_id, delta.traversal_path.clone()))
            .or_default() += delta.counts;
    }
    rows.into_iter()
        .map(|((namespace_id, traversal_path), counts)| Delta {
            namespace_id,
            traversal_path,
            counts,
        })
        .collect()
}

/// Expand every diff and merge the result into one batch.
pub fn propagate(diffs: &[Diff], coefficient: i64) -> Vec<Delta> {
    merge(diffs.iter().flat_map(|diff| expand(diff, coefficient)))
}

/// Deltas for moving a namespace to a new position in the tree.
///
/// The namespace's stored counts are retracted from its old ancestors and
/// added to its new ones. Its own row and its descendants' rows keep their
/// counts; only their stored paths change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan {
    pub namespace_id: NamespaceId,
    pub old_path: TraversalPath,
    pub new_path: TraversalPath,
    pub subtract: Vec<Delta>,
    pub add: Vec<Delta>,
}

impl MovePlan {
    pub fn new(old_path: TraversalPath, new_path: TraversalPath, counts: SeverityCounts) -> Self {
        let subtract = old_path
            .ancestors()
            .map(|path| Delta::new(path, counts.scaled(SUBTRACT)))
            .collect();
        let add = new_path
            .ancestors()
            .map(|path| Delta::new(path, counts.scaled(ADD)))
            .collect();
        Self {
            namespace_id: new_path.namespace_id(),
            old_path,
            new_path,
            subtract,
            add,
        }
    }

    pub fn is_noop(&self) -> bool {
        self.old_path == self.new_path
    }
}
