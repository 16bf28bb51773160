//! Error types for Artesia core.

use crate::ids::IdError;
use crate::StyleId;

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, ArtesiaError>;

/// Errors raised by core lookups and configuration.
#[derive(Debug, thiserror::Error)]
pub enum ArtesiaError {
    /// The style identifier does not resolve in the catalog.
    #[error("style not found: {style_id}")]
    StyleNotFound {
        /// The style that was not found.
        style_id: StyleId,
    },

    /// The same style identifier appears twice in a catalog.
    #[error("duplicate style in catalog: {style_id}")]
    DuplicateStyle {
        /// The repeated identifier.
        style_id: StyleId,
    },

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),

    /// Catalog file could not be read.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
