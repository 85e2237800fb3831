// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

use thiserror::Error;
use vulnstats_core::{Diff, NamespaceId, TraversalPath};

pub type Result<T> = std::result::Result<T, AdjustmentError>;

#[derive(Error, Debug)]
pub enum AdjustmentError {
    #[error("Too many namespace ids: got {given}, at most {max} allowed")]
    InputTooLarge { given: usize, max: usize },

    #[error("Store error: {0}")]
    Store(#[from] vulnstats_store_db::Error),

    /// A chunk failed after earlier chunks had committed; `committed` holds
    /// their non-zero diffs so they can still be propagated.
    #[error(
        "Store error after {count} changed namespaces were committed: {source}",
        count = .committed.len()
    )]
    PartiallyApplied {
        committed: Vec<Diff>,
        #[source]
        source: vulnstats_store_db::Error,
    },

    #[error("Could not obtain lease '{key}'")]
    LeaseContention { key: String },

    #[error("Cannot move namespace {namespace_id} to {new_path}: {reason}")]
    InvalidMove {
        namespace_id: NamespaceId,
        new_path: TraversalPath,
        reason: &'static str,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl AdjustmentError {
    /// Whether retrying the whole call later can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AdjustmentError::LeaseContention { .. }
                | AdjustmentError::Store(_)
                | AdjustmentError::PartiallyApplied { .. }
        )
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("Invalid configuration: {reason}")]
    Invalid { reason: String },
}

/// Failures of best-effort tracking; logged, never returned to callers.
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Prometheus error: {0}")]
    Prometheus(#[from] prometheus::Error),

    #[error("Tracking sink unavailable: {0}")]
    Unavailable(String),
}
