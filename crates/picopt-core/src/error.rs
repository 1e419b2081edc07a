//! Pipeline error taxonomy
//!
//! One cycle reports at most one error: the first failure observed while
//! joining per-asset tasks. Component errors ([`MatchError`],
//! [`CodecError`], [`CacheError`]) fold into [`PipelineError`] here.

use crate::cache::CacheError;
use crate::codec::CodecError;
use crate::matcher::MatchError;
use std::path::PathBuf;

/// Top-level pipeline error
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Invalid configuration, surfaced before any asset is touched
    #[error("configuration error: {0}")]
    Config(#[from] MatchError),

    /// A codec chain failed while optimizing one asset
    #[error("codec failed for {asset}: {source}")]
    Codec {
        /// Asset filename the failure belongs to
        asset: String,
        /// Underlying codec failure
        source: CodecError,
    },

    /// Cache read-through failed for one asset
    #[error("cache failure for {asset}: {source}")]
    Cache {
        /// Asset filename the failure belongs to
        asset: String,
        /// Underlying cache failure
        source: CacheError,
    },

    /// Filesystem read/write failure
    #[error("i/o error at {path}: {source}")]
    Io {
        /// Path the operation touched
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },

    /// A spawned asset task aborted before producing a result
    #[error("asset task aborted: {0}")]
    TaskAborted(String),
}

impl PipelineError {
    /// Whether this error was raised before any I/O or dispatch began
    #[inline]
    #[must_use]
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
