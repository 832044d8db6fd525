//! Error types for Pantograph operations.
//!
//! This module provides the main error type [`PantographError`] which wraps
//! the error conditions that can occur while loading, editing, and exporting
//! diagrams.

use std::io;

use thiserror::Error;

use pantograph_core::element::ConnectError;
use pantograph_core::model::ValidationError;

/// The main error type for Pantograph operations.
#[derive(Debug, Error)]
pub enum PantographError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The document failed schema validation. Raised on load and on
    /// clipboard paste; the working set is left untouched.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A connection was rejected by a capability flag or a type's verify
    /// hook. The edge set is left untouched.
    #[error("Connection rejected: {0}")]
    Connect(#[from] ConnectError),

    #[error("Unknown element kind '{0}'")]
    UnknownKind(String),

    #[error("No node with id '{0}'")]
    NodeNotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] crate::storage::StorageError),
}
