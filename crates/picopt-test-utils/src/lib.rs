//! Testing utilities for the picopt workspace
//!
//! Shared codec stubs, asset fixtures, and tracing setup.

#![allow(missing_docs)]

use async_trait::async_trait;
use bytes::Bytes;
use picopt_core::{AssetMap, Codec, CodecError};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::sync::Once;
use std::time::Duration;

/// Codec that always returns a fixed buffer and counts invocations
#[derive(Debug, Clone)]
pub struct StubCodec {
    output: Vec<u8>,
    calls: Arc<AtomicUsize>,
}

impl StubCodec {
    pub fn new(output: impl Into<Vec<u8>>) -> Self {
        Self {
            output: output.into(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Stub producing `len` identical bytes
    pub fn with_output_len(len: usize) -> Self {
        Self::new(vec![0xAB; len])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Codec for StubCodec {
    fn name(&self) -> &str {
        "stub"
    }

    async fn compress(&self, _input: &[u8]) -> Result<Vec<u8>, CodecError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.output.clone())
    }
}

/// Codec that fails for one specific marker byte pattern, succeeds otherwise
#[derive(Debug, Clone)]
pub struct FailOnMarkerCodec {
    marker: u8,
    output_len: usize,
}

impl FailOnMarkerCodec {
    /// Fails whenever the input starts with `marker`; otherwise returns
    /// `output_len` bytes
    pub fn new(marker: u8, output_len: usize) -> Self {
        Self { marker, output_len }
    }
}

#[async_trait]
impl Codec for FailOnMarkerCodec {
    fn name(&self) -> &str {
        "fail-on-marker"
    }

    async fn compress(&self, input: &[u8]) -> Result<Vec<u8>, CodecError> {
        if input.first() == Some(&self.marker) {
            return Err(CodecError::Failed {
                codec: "fail-on-marker".to_string(),
                message: "marker byte rejected".to_string(),
            });
        }
        Ok(vec![0xCD; self.output_len])
    }
}

/// Codec that always fails
#[derive(Debug, Clone, Default)]
pub struct FailingCodec;

#[async_trait]
impl Codec for FailingCodec {
    fn name(&self) -> &str {
        "failing"
    }

    async fn compress(&self, _input: &[u8]) -> Result<Vec<u8>, CodecError> {
        Err(CodecError::Failed {
            codec: "failing".to_string(),
            message: "always fails".to_string(),
        })
    }
}

/// Codec that sleeps and records the peak number of concurrent calls
#[derive(Debug, Clone)]
pub struct DelayCodec {
    delay: Duration,
    output_len: usize,
    current: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl DelayCodec {
    pub fn new(delay: Duration, output_len: usize) -> Self {
        Self {
            delay,
            output_len,
            current: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Highest number of simultaneously running `compress` calls observed
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Codec for DelayCodec {
    fn name(&self) -> &str {
        "delay"
    }

    async fn compress(&self, _input: &[u8]) -> Result<Vec<u8>, CodecError> {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.current.fetch_sub(1, Ordering::SeqCst);
        Ok(vec![0xEF; self.output_len])
    }
}

/// Build a shared asset map from (name, content) pairs
pub fn asset_map<I, N, C>(entries: I) -> Arc<AssetMap>
where
    I: IntoIterator<Item = (N, C)>,
    N: Into<String>,
    C: Into<Bytes>,
{
    let map = AssetMap::new();
    for (name, content) in entries {
        map.insert(name.into(), content.into());
    }
    Arc::new(map)
}

/// A buffer of `len` identical bytes
pub fn filler(len: usize, byte: u8) -> Bytes {
    Bytes::from(vec![byte; len])
}

/// Initialize tracing once per test binary, honoring `RUST_LOG`
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
