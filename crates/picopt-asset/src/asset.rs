//! Named build artifacts
//!
//! An [`Asset`] is what the pipeline enumerates and optimizes: a filename
//! paired with an immutable content buffer. Optimization never mutates
//! the buffer in place; it produces a replacement.

use crate::hash::ContentHash;
use bytes::Bytes;

/// A named, in-memory build artifact
///
/// `content` is an immutable, cheap-to-clone buffer. Replacing an asset
/// means committing a new `Asset` (or new buffer) under the same name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// Logical filename within the build (or source path for external files)
    pub name: String,
    /// Content bytes at enumeration time
    pub content: Bytes,
}

impl Asset {
    /// Create an asset from a name and content
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Content length in bytes
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.content.len()
    }

    /// Whether the asset is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Blake3 hash of the content
    #[inline]
    #[must_use]
    pub fn content_hash(&self) -> ContentHash {
        ContentHash::of(&self.content)
    }
}
