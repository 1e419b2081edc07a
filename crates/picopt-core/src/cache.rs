//! Content-addressed disk cache
//!
//! Optimized buffers persist as flat files under a configured root, one
//! file per cache key, holding raw bytes. No manifest, no metadata, no
//! expiry. A key that resolves to a readable file is a hit and skips the
//! compute entirely; anything else (including a read failure during the
//! probe) is a miss.
//!
//! Known limitation: two concurrent misses for the same key both compute
//! and both write the entry. Under the standing assumption of
//! deterministic codecs the duplicate work is wasted but harmless; both
//! writers produce identical bytes.

use crate::codec::CodecError;
use bytes::Bytes;
use picopt_asset::{fs, ContentHash};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

/// How cache keys are derived from an asset
///
/// A store uses exactly one policy for its lifetime; mixing policies in
/// one directory would split hit rates unpredictably.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Hash the content bytes (default): identical bytes under different
    /// names share one entry, and changed content can never serve stale
    /// results
    #[default]
    Content,
    /// Hash the logical filename: cheaper, but stale results survive
    /// content changes until the cache directory is cleared
    Path,
}

/// Hit/miss counters for one store
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CacheStats {
    /// Lookups served from disk
    pub hits: u64,
    /// Lookups that invoked the compute function
    pub misses: u64,
}

/// Disk-backed store mapping cache keys to optimized buffers
#[derive(Debug)]
pub struct DiskCache {
    root: PathBuf,
    policy: KeyPolicy,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DiskCache {
    /// Open a store rooted at `root` (created lazily on first write)
    #[inline]
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, policy: KeyPolicy) -> Self {
        Self {
            root: root.into(),
            policy,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Cache root directory
    #[inline]
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Key-derivation policy fixed at construction
    #[inline]
    #[must_use]
    pub fn policy(&self) -> KeyPolicy {
        self.policy
    }

    /// Derive the cache key for an asset under this store's policy
    #[must_use]
    pub fn key_for(&self, name: &str, content: &Bytes) -> ContentHash {
        match self.policy {
            KeyPolicy::Content => ContentHash::of(content),
            KeyPolicy::Path => ContentHash::of(name.as_bytes()),
        }
    }

    /// Look up an entry, computing and storing it on a miss
    ///
    /// On a hit the stored bytes come back and `compute` never runs. On a
    /// miss `compute` runs, its output is written through (creating the
    /// root directory as needed), and the output is returned.
    ///
    /// # Errors
    /// Compute failures and cache-write failures propagate; lookup
    /// failures do not (they degrade to a miss).
    pub async fn get_or_compute<F, Fut>(
        &self,
        name: &str,
        content: &Bytes,
        compute: F,
    ) -> Result<Bytes, CacheError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Bytes, CodecError>>,
    {
        let key = self.key_for(name, content);
        let entry = self.root.join(key.to_hex());

        if fs::exists(&entry).await {
            // A readable entry is a hit; an unreadable one degrades to a miss
            if let Ok(cached) = fs::read(&entry).await {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(asset = name, key = %key.short(), "cache hit");
                return Ok(cached);
            }
            tracing::warn!(asset = name, key = %key.short(), "cache entry unreadable, recomputing");
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(asset = name, key = %key.short(), "cache miss");

        let computed = compute().await?;
        fs::write(&entry, &computed)
            .await
            .map_err(|source| CacheError::Write {
                path: entry,
                source,
            })?;

        Ok(computed)
    }

    /// Counters accumulated since construction
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

/// Errors from the cache store
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// The compute function (codec chain) failed
    #[error(transparent)]
    Compute(#[from] CodecError),

    /// Writing an entry back to disk failed
    #[error("cache write failed at {path}: {source}")]
    Write {
        /// Entry path the write targeted
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}
