// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Error types for statistics database operations.

use std::path::PathBuf;

use thiserror::Error;
use vulnstats_core::{NamespaceId, TraversalPathError};

/// Result type for statistics database operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during statistics database operations.
#[derive(Error, Debug)]
pub enum Error {
    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to open database with context
    #[error("Failed to open database at '{path}': {source}")]
    DatabaseOpen {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Database file not found
    #[error("Database not found at: {0}")]
    DatabaseNotFound(PathBuf),

    /// Schema version mismatch
    #[error("Schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch { expected: i32, found: i32 },

    /// Traversal path rejected on the way in
    #[error("Invalid traversal path: {0}")]
    InvalidTraversalPath(#[from] TraversalPathError),

    /// Namespace row missing from the namespaces table
    #[error("Namespace not found: {0}")]
    NamespaceNotFound(NamespaceId),

    /// No randomness available for lease tokens
    #[error("Failed to generate lease token: {0}")]
    Entropy(#[from] getrandom::Error),
}
