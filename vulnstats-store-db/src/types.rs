// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Database row types.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::Row;
use rusqlite::types::Type;
use vulnstats_core::{NamespaceId, Rollup, SeverityCounts, TraversalPath};

/// Kind of a row in the namespaces table.
///
/// Only groups carry rollups; every project owns a pseudo-namespace that
/// shows up in traversal paths but is never aggregated itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceKind {
    Group,
    Project,
}

impl NamespaceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamespaceKind::Group => "Group",
            NamespaceKind::Project => "Project",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "Group" => Some(NamespaceKind::Group),
            "Project" => Some(NamespaceKind::Project),
            _ => None,
        }
    }
}

/// A row from the namespaces table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub id: NamespaceId,
    pub parent_id: Option<NamespaceId>,
    pub kind: NamespaceKind,
    pub traversal_path: TraversalPath,
    /// Set once the namespace is scheduled for deletion
    pub deleted_at: Option<SystemTime>,
}

/// Authoritative counts for the vulnerabilities a namespace owns directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatistic {
    pub namespace_id: NamespaceId,
    pub traversal_path: TraversalPath,
    /// Archived rows are kept but excluded from rollups
    pub archived: bool,
    pub counts: SeverityCounts,
    pub updated_at: SystemTime,
}

/// A stored rollup row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceStatistic {
    /// Database row ID
    pub id: i64,
    pub namespace_id: NamespaceId,
    pub traversal_path: TraversalPath,
    pub counts: SeverityCounts,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl NamespaceStatistic {
    pub fn rollup(&self) -> Rollup {
        Rollup::new(self.traversal_path.clone(), self.counts)
    }
}

/// Proof of holding an exclusive lease; needed to cancel it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaseToken {
    pub key: String,
    pub uuid: String,
    pub expires_at: SystemTime,
}

/// Convert Unix timestamp to SystemTime.
pub(crate) fn unix_to_system_time(timestamp: i64) -> SystemTime {
    if timestamp >= 0 {
        UNIX_EPOCH + Duration::from_secs(timestamp as u64)
    } else {
        UNIX_EPOCH - Duration::from_secs((-timestamp) as u64)
    }
}

/// Convert SystemTime to Unix timestamp.
pub(crate) fn system_time_to_unix(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(duration) => duration.as_secs() as i64,
        Err(e) => -(e.duration().as_secs() as i64),
    }
}

pub(crate) fn now_unix() -> i64 {
    system_time_to_unix(SystemTime::now())
}

/// Read a `traversal_ids` BLOB column.
pub(crate) fn path_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<TraversalPath> {
    let key: Vec<u8> = row.get(idx)?;
    TraversalPath::from_key(&key)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Blob, Box::new(e)))
}

pub(crate) fn kind_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<NamespaceKind> {
    let kind: String = row.get(idx)?;
    NamespaceKind::parse(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown namespace type '{kind}'").into(),
        )
    })
}

/// Read the seven count columns starting at `start`.
pub(crate) fn counts_columns(row: &Row<'_>, start: usize) -> rusqlite::Result<SeverityCounts> {
    Ok(SeverityCounts {
        total: row.get(start)?,
        critical: row.get(start + 1)?,
        high: row.get(start + 2)?,
        medium: row.get(start + 3)?,
        low: row.get(start + 4)?,
        unknown: row.get(start + 5)?,
        info: row.get(start + 6)?,
    })
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_unix_time_roundtrip() {
        let now = SystemTime::now();
        let unix = system_time_to_unix(now);
        let back = unix_to_system_time(unix);
        // Allow 1 second tolerance due to subsecond truncation
        let diff = now.duration_since(back).unwrap_or_default();
        assert!(diff.as_secs() <= 1);
    }

    #[rstest]
    #[case::group("Group", Some(NamespaceKind::Group))]
    #[case::project("Project", Some(NamespaceKind::Project))]
    #[case::user("User", None)]
    #[case::lowercase("group", None)]
    fn test_namespace_kind_names(#[case] name: &str, #[case] expected: Option<NamespaceKind>) {
        assert_eq!(NamespaceKind::parse(name), expected);
        if let Some(kind) = expected {
            assert_eq!(kind.as_str(), name);
        }
    }
}
