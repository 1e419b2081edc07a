//! Pluggable compression backends
//!
//! A [`Codec`] is an opaque transform from buffer to buffer; picopt never
//! looks inside the algorithm. Configured codecs form a [`CodecChain`]
//! applied as one logical operation: each codec's output feeds the next.
//!
//! [`CommandCodec`] adapts external compressor binaries (optipng,
//! gifsicle, and friends) that read the image on stdin and write the
//! result to stdout.

use async_trait::async_trait;
use std::fmt::{self, Debug, Formatter};
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// One compression backend
#[async_trait]
pub trait Codec: Send + Sync {
    /// Stable backend name used in errors and logs
    fn name(&self) -> &str;

    /// Compress a buffer, returning the transformed bytes
    ///
    /// The output need not be smaller; the compressor layer decides
    /// whether it is worth keeping.
    ///
    /// # Errors
    /// Any backend failure; the error aborts the owning asset's task.
    async fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError>;
}

/// Ordered codec list applied as a single transform
///
/// An empty chain is the identity transform.
#[derive(Clone, Default)]
pub struct CodecChain {
    codecs: Vec<Arc<dyn Codec>>,
}

impl CodecChain {
    /// Create an empty chain
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a codec, keeping application order
    #[must_use]
    pub fn with(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codecs.push(codec);
        self
    }

    /// Append a codec in place
    pub fn push(&mut self, codec: Arc<dyn Codec>) {
        self.codecs.push(codec);
    }

    /// Whether any codec is configured
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codecs.is_empty()
    }

    /// Number of configured codecs
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.codecs.len()
    }

    /// Configured backend names, in application order
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        self.codecs.iter().map(|c| c.name()).collect()
    }

    /// Run the full chain over a buffer
    ///
    /// # Errors
    /// The first codec failure aborts the chain.
    pub async fn apply(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut current = input.to_vec();
        for codec in &self.codecs {
            tracing::trace!(codec = codec.name(), len = current.len(), "applying codec");
            current = codec.compress(&current).await?;
        }
        Ok(current)
    }
}

impl Debug for CodecChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CodecChain").field(&self.names()).finish()
    }
}

/// Codec backed by an external binary piped via stdin/stdout
#[derive(Debug, Clone)]
pub struct CommandCodec {
    name: String,
    program: String,
    args: Vec<String>,
}

impl CommandCodec {
    /// Configure an external compressor invocation
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        program: impl Into<String>,
        args: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            program: program.into(),
            args: args.into_iter().collect(),
        }
    }
}

#[async_trait]
impl Codec for CommandCodec {
    fn name(&self) -> &str {
        &self.name
    }

    async fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CodecError::Spawn {
                codec: self.name.clone(),
                source,
            })?;

        let stdin = child.stdin.take();
        let feed = async {
            if let Some(mut stdin) = stdin {
                // A child that exits without reading (reported via its own
                // status below) breaks the pipe; that is not our failure
                match stdin.write_all(input).await {
                    Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => return Err(e),
                    _ => {}
                }
                // Dropping stdin closes the pipe so the child sees EOF
            }
            Ok::<(), std::io::Error>(())
        };

        // Drain stdout while feeding stdin; a large image would otherwise
        // fill the pipe and deadlock both processes
        let (fed, output) = tokio::join!(feed, child.wait_with_output());
        fed.map_err(|source| CodecError::Pipe {
            codec: self.name.clone(),
            source,
        })?;
        let output = output.map_err(|source| CodecError::Pipe {
            codec: self.name.clone(),
            source,
        })?;

        if !output.status.success() {
            return Err(CodecError::Failed {
                codec: self.name.clone(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(output.stdout)
    }
}

/// Errors from a compression backend
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Backend reported a failure
    #[error("codec {codec} failed: {message}")]
    Failed {
        /// Backend name
        codec: String,
        /// Backend-reported detail
        message: String,
    },

    /// External binary could not be started
    #[error("codec {codec} could not spawn: {source}")]
    Spawn {
        /// Backend name
        codec: String,
        /// Underlying spawn error
        source: std::io::Error,
    },

    /// Stdin/stdout plumbing to the external binary failed
    #[error("codec {codec} pipe error: {source}")]
    Pipe {
        /// Backend name
        codec: String,
        /// Underlying I/O error
        source: std::io::Error,
    },
}
