//! picopt core pipeline
//!
//! A build-pipeline asset post-processor: it takes the in-memory image
//! assets a bundler produced, recompresses each through a pluggable codec
//! chain, and commits the result only when it got smaller. An out-of-band
//! mode reads image files from disk and writes optimized copies to a
//! destination directory. A content-addressed disk cache skips
//! recompression work across builds.
//!
//! # Components
//!
//! - [`Matcher`]: compiled filename/size filters
//! - [`Codec`] / [`CodecChain`]: opaque compression backends
//! - [`compressor::optimize`]: the shrink-or-original gate
//! - [`DiskCache`]: content-addressed result store
//! - [`Throttle`]: concurrency admission control
//! - [`Pipeline`]: the per-cycle orchestrator tying it all together
//!
//! # Example
//!
//! ```rust,ignore
//! use picopt_core::{MatchSpec, OptimizerConfig, Pipeline};
//!
//! let config = OptimizerConfig::new()
//!     .with_test(MatchSpec::glob("**/*.{png,jpg,gif,svg}"))
//!     .with_cache_dir(".picopt-cache")
//!     .with_codec(my_codec);
//! let pipeline = Pipeline::new(config)?;
//! let summary = pipeline.run_cycle(&assets).await?;
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

mod cache;
mod codec;
mod config;
mod error;
mod matcher;
mod pipeline;
mod throttle;

pub mod compressor;

pub use cache::{CacheError, CacheStats, DiskCache, KeyPolicy};
pub use codec::{Codec, CodecChain, CodecError, CommandCodec};
pub use config::{ExternalImages, OptimizerConfig, ValueOrSupplier};
pub use error::PipelineError;
pub use matcher::{MatchError, MatchSpec, Matcher, PredicateFn, SizePolicy};
pub use pipeline::{AssetMap, CyclePhase, CycleSummary, Pipeline};
pub use throttle::Throttle;

// Re-export the asset foundation for downstream convenience
pub use picopt_asset::{Asset, ContentHash};
