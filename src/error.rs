//! Run-level error type.
//!
//! Each phase has its own error enum; [`SyncError`] wraps the ones that abort
//! a run and adds the catalog consistency failures found during
//! reconciliation.

use thiserror::Error;

use crate::catalog::{OverrideError, UnknownItemError};
use crate::export::ExportError;
use crate::remote::TransportError;
use crate::sheet::FetchError;

/// Errors that abort a sync run.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Settings could not be resolved.
    #[error("configuration error: {0}")]
    Config(String),

    /// A spreadsheet tab could not be fetched.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The override file could not be loaded.
    #[error(transparent)]
    Overrides(#[from] OverrideError),

    /// A requested item is not in the catalog.
    #[error(transparent)]
    UnknownItem(#[from] UnknownItemError),

    /// A fatal mirror failure: listing, connectivity or timeout.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An item is neither on the mirror nor downloadable.
    #[error("item '{target}' ({id}) is not on the mirror and has no download source")]
    MissingSource {
        /// Target name of the item.
        target: String,
        /// Catalog id of the item.
        id: String,
    },

    /// Directories on the mirror match no catalog item.
    #[error("{} orphan(s) on the mirror: {}", names.len(), names.join(", "))]
    Orphans {
        /// Every orphan name, sorted.
        names: Vec<String>,
    },

    /// The exported catalog could not be written.
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Local file system failure outside a single item's transfer.
    #[error("IO error at {path}: {source}")]
    Io {
        /// The path involved.
        path: String,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The operator interrupted the run.
    #[error("interrupted")]
    Interrupted,
}

impl SyncError {
    /// Creates a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error.
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
