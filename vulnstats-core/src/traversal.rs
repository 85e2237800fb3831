// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Traversal paths: a namespace's position in the hierarchy as the ordered
//! list of ancestor ids, root first and the namespace itself last.
//!
//! Paths are persisted as fixed-width keys so the database can compare them
//! bytewise. Every component is written as a big-endian `u64`, which makes
//! `memcmp` order identical to lexicographic array order. The subtree of a
//! namespace is then the half-open key range `[key, next_key)`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Database id of a namespace.
pub type NamespaceId = i64;

const COMPONENT_WIDTH: usize = std::mem::size_of::<u64>();

/// Errors produced when constructing or decoding a [`TraversalPath`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraversalPathError {
    #[error("traversal path must contain at least one namespace id")]
    Empty,

    #[error("namespace id {0} is not positive")]
    NonPositive(i64),

    #[error("namespace id {0} appears more than once")]
    DuplicateId(i64),

    #[error("traversal key of {0} bytes is not a non-zero multiple of 8")]
    InvalidKeyLength(usize),

    #[error("invalid traversal path literal '{0}'")]
    Parse(String),
}

/// Ordered ancestor ids of a namespace, ending with the namespace itself.
///
/// Always non-empty and made of distinct positive ids.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<NamespaceId>", into = "Vec<NamespaceId>")]
pub struct TraversalPath(Vec<NamespaceId>);

impl TraversalPath {
    pub fn new(ids: Vec<NamespaceId>) -> Result<Self, TraversalPathError> {
        if ids.is_empty() {
            return Err(TraversalPathError::Empty);
        }
        if let Some(&bad) = ids.iter().find(|&&id| id <= 0) {
            return Err(TraversalPathError::NonPositive(bad));
        }
        for (i, id) in ids.iter().enumerate() {
            if ids[..i].contains(id) {
                return Err(TraversalPathError::DuplicateId(*id));
            }
        }
        Ok(Self(ids))
    }

    /// Path of a root namespace.
    pub fn root(id: NamespaceId) -> Result<Self, TraversalPathError> {
        Self::new(vec![id])
    }

    pub fn ids(&self) -> &[NamespaceId] {
        &self.0
    }

    /// The namespace this path points at (the last component).
    pub fn namespace_id(&self) -> NamespaceId {
        self.0[self.0.len() - 1]
    }

    pub fn root_id(&self) -> NamespaceId {
        self.0[0]
    }

    pub fn depth(&self) -> usize {
        self.0.len()
    }

    pub fn is_root(&self) -> bool {
        self.0.len() == 1
    }

    /// Path of the parent namespace, `None` for a root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            None
        } else {
            Some(Self(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn child(&self, id: NamespaceId) -> Result<Self, TraversalPathError> {
        if id <= 0 {
            return Err(TraversalPathError::NonPositive(id));
        }
        if self.0.contains(&id) {
            return Err(TraversalPathError::DuplicateId(id));
        }
        let mut ids = self.0.clone();
        ids.push(id);
        Ok(Self(ids))
    }

    /// Every prefix of this path from the root down to the path itself.
    ///
    /// `{1,2,5}` yields `{1}`, `{1,2}` and `{1,2,5}`.
    pub fn lineage(&self) -> impl Iterator<Item = TraversalPath> + '_ {
        (1..=self.0.len()).map(move |len| Self(self.0[..len].to_vec()))
    }

    /// Strict ancestors, root first. Empty for a root namespace.
    pub fn ancestors(&self) -> impl Iterator<Item = TraversalPath> + '_ {
        self.lineage().take(self.0.len() - 1)
    }

    /// Whether `other` is this namespace or one of its descendants.
    pub fn contains(&self, other: &TraversalPath) -> bool {
        other.0.starts_with(&self.0)
    }

    /// Replace the `from` prefix of this path with `to`.
    ///
    /// Returns `None` when the path does not live under `from`, or when the
    /// result would repeat an id.
    pub fn rebase(&self, from: &TraversalPath, to: &TraversalPath) -> Option<Self> {
        let rest = self.0.strip_prefix(from.0.as_slice())?;
        let mut ids = Vec::with_capacity(to.0.len() + rest.len());
        ids.extend_from_slice(&to.0);
        ids.extend_from_slice(rest);
        Self::new(ids).ok()
    }

    /// Sortable key: big-endian components, lowest key of the subtree.
    pub fn key(&self) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.0.len() * COMPONENT_WIDTH);
        for &id in &self.0 {
            key.extend_from_slice(&(id as u64).to_be_bytes());
        }
        key
    }

    /// Exclusive upper bound of the subtree: the key with the last
    /// component incremented by one.
    ///
    /// Components are positive `i64`s so the increment always fits in `u64`.
    pub fn next_key(&self) -> Vec<u8> {
        let mut key = self.key();
        let last = key.len() - COMPONENT_WIDTH;
        let bumped = (self.namespace_id() as u64) + 1;
        key[last..].copy_from_slice(&bumped.to_be_bytes());
        key
    }

    /// Decode a key produced by [`TraversalPath::key`].
    pub fn from_key(key: &[u8]) -> Result<Self, TraversalPathError> {
        if key.is_empty() || key.len() % COMPONENT_WIDTH != 0 {
            return Err(TraversalPathError::InvalidKeyLength(key.len()));
        }
        let ids = key
            .chunks_exact(COMPONENT_WIDTH)
            .map(|chunk| {
                let mut buf = [0u8; COMPONENT_WIDTH];
                buf.copy_from_slice(chunk);
                u64::from_be_bytes(buf) as i64
            })
            .collect();
        Self::new(ids)
    }
}

impl TryFrom<Vec<NamespaceId>> for TraversalPath {
    type Error = TraversalPathError;

    fn try_from(ids: Vec<NamespaceId>) -> Result<Self, Self::Error> {
        Self::new(ids)
    }
}

impl From<TraversalPath> for Vec<NamespaceId> {
    fn from(path: TraversalPath) -> Self {
        path.0
    }
}

/// Array literal form, e.g. `{1,2,5}`.
impl fmt::Display for TraversalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, id) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{id}")?;
        }
        f.write_str("}")
    }
}

impl FromStr for TraversalPath {
    type Err = TraversalPathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let inner = s
            .trim()
            .strip_prefix('{')
            .and_then(|rest| rest.strip_suffix('}'))
            .ok_or_else(|| TraversalPathError::Parse(s.to_owned()))?;
        if inner.trim().is_empty() {
            return Err(TraversalPathError::Empty);
        }
        let ids = inner
            .split(',')
            .map(|part| {
                part.trim()
                    .parse::<NamespaceId>()
                    .map_err(|_| TraversalPathError::Parse(s.to_owned()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(ids)
    }
}
