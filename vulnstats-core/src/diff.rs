// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Rollups and the diffs between consecutive rollups of a namespace.

use serde::{Deserialize, Serialize};

use crate::counts::SeverityCounts;
use crate::traversal::{NamespaceId, TraversalPath};

/// Counts summed over a namespace and all of its descendants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rollup {
    pub namespace_id: NamespaceId,
    pub traversal_path: TraversalPath,
    pub counts: SeverityCounts,
}

impl Rollup {
    pub fn new(traversal_path: TraversalPath, counts: SeverityCounts) -> Self {
        Self {
            namespace_id: traversal_path.namespace_id(),
            traversal_path,
            counts,
        }
    }
}

/// `new - old` for one namespace's rollup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    pub namespace_id: NamespaceId,
    pub traversal_path: TraversalPath,
    pub counts: SeverityCounts,
}

impl Diff {
    /// Field-wise `new - old`; a missing previous value counts as zero.
    pub fn between(old: Option<&SeverityCounts>, new: &Rollup) -> Self {
        let old = old.copied().unwrap_or(SeverityCounts::ZERO);
        Self {
            namespace_id: new.namespace_id,
            traversal_path: new.traversal_path.clone(),
            counts: new.counts - old,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.counts.is_zero()
    }

    /// The same change addressed to the parent namespace.
    ///
    /// Used once the namespace's own row is already up to date, so only the
    /// strict ancestors still need the delta. `None` for a root.
    pub fn for_parent(&self) -> Option<Diff> {
        let parent = self.traversal_path.parent()?;
        Some(Diff {
            namespace_id: parent.namespace_id(),
            traversal_path: parent,
            counts: self.counts,
        })
    }
}
