//! Async filesystem wrappers
//!
//! Thin helpers over `tokio::fs` with the exact semantics the pipeline
//! relies on: `write` creates missing parent directories, and `exists`
//! reports `false` on any access failure instead of erroring (a cache
//! probe that cannot read its entry is a miss, not a fault).

use bytes::Bytes;
use std::io;
use std::path::Path;
use tokio::fs;

/// Read a file's full contents
///
/// # Errors
/// Propagates the underlying I/O error (missing file, permissions).
pub async fn read(path: impl AsRef<Path>) -> io::Result<Bytes> {
    let data = fs::read(path).await?;
    Ok(Bytes::from(data))
}

/// Write a buffer to a file, creating parent directories as needed
///
/// # Errors
/// Propagates directory-creation and write failures.
pub async fn write(path: impl AsRef<Path>, data: &[u8]) -> io::Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !exists(parent).await {
            fs::create_dir_all(parent).await?;
        }
    }
    fs::write(path, data).await
}

/// Check whether a path is accessible
///
/// Any failure (missing path, permission denied) reports `false`.
pub async fn exists(path: impl AsRef<Path>) -> bool {
    fs::metadata(path).await.is_ok()
}
