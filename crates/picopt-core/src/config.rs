//! Pipeline configuration
//!
//! Every knob has a default; a bare [`OptimizerConfig::new`] yields a
//! pipeline that matches every asset, runs no codecs, caches nothing,
//! and bounds concurrency at the core count. The struct is built once
//! at construction time and treated as immutable afterwards.

use crate::cache::KeyPolicy;
use crate::codec::CodecChain;
use crate::matcher::MatchSpec;
use crate::throttle::Throttle;
use std::fmt::{self, Debug, Formatter};
use std::path::PathBuf;
use std::sync::Arc;

/// A value that is either given directly or produced by a supplier
///
/// Replaces "if it's a function, call it" dynamic dispatch with an
/// explicit tagged union; [`ValueOrSupplier::resolve`] is invoked exactly
/// once per build cycle at enumeration time.
#[derive(Clone)]
pub enum ValueOrSupplier<T> {
    /// A fixed value
    Static(T),
    /// A function producing the value when the cycle resolves it
    Supplier(Arc<dyn Fn() -> T + Send + Sync>),
}

impl<T: Clone> ValueOrSupplier<T> {
    /// Resolve to a concrete value
    #[must_use]
    pub fn resolve(&self) -> T {
        match self {
            Self::Static(value) => value.clone(),
            Self::Supplier(f) => f(),
        }
    }
}

impl<T> ValueOrSupplier<T> {
    /// Wrap a supplier function
    #[inline]
    pub fn supplier(f: impl Fn() -> T + Send + Sync + 'static) -> Self {
        Self::Supplier(Arc::new(f))
    }
}

impl<T: Debug> Debug for ValueOrSupplier<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(v) => f.debug_tuple("Static").field(v).finish(),
            Self::Supplier(_) => f.write_str("Supplier(..)"),
        }
    }
}

impl<T> From<T> for ValueOrSupplier<T> {
    fn from(value: T) -> Self {
        Self::Static(value)
    }
}

/// Out-of-band image sources processed outside the bundler's asset graph
#[derive(Debug, Clone)]
pub struct ExternalImages {
    /// Base directory source paths are taken relative to
    pub context: PathBuf,
    /// Files to read, compress, and write out
    pub sources: ValueOrSupplier<Vec<PathBuf>>,
    /// Output root; sources mirror their context-relative path under it
    pub destination: ValueOrSupplier<PathBuf>,
}

impl Default for ExternalImages {
    fn default() -> Self {
        Self {
            context: PathBuf::from("."),
            sources: ValueOrSupplier::Static(Vec::new()),
            destination: ValueOrSupplier::Static(PathBuf::from(".")),
        }
    }
}

impl ExternalImages {
    /// Start from defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the context directory
    #[must_use]
    pub fn with_context(mut self, context: impl Into<PathBuf>) -> Self {
        self.context = context.into();
        self
    }

    /// Set the source list (static or supplied)
    #[must_use]
    pub fn with_sources(mut self, sources: impl Into<ValueOrSupplier<Vec<PathBuf>>>) -> Self {
        self.sources = sources.into();
        self
    }

    /// Set the destination root (static or supplied)
    #[must_use]
    pub fn with_destination(mut self, destination: impl Into<ValueOrSupplier<PathBuf>>) -> Self {
        self.destination = destination.into();
        self
    }
}

/// Full pipeline configuration
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Skip all processing when set
    pub disable: bool,
    /// Asset filters; empty means match everything
    pub test: Vec<MatchSpec>,
    /// Exclusive lower size bound in bytes
    pub min_file_size: u64,
    /// Inclusive upper size bound in bytes
    pub max_file_size: u64,
    /// Maximum concurrent compression tasks
    pub max_concurrency: usize,
    /// Cache root; `None` disables caching entirely
    pub cache_dir: Option<PathBuf>,
    /// How cache keys are derived
    pub cache_key: KeyPolicy,
    /// Out-of-band sources
    pub external: ExternalImages,
    /// Configured compression backends
    pub codecs: CodecChain,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            disable: false,
            test: Vec::new(),
            min_file_size: 0,
            max_file_size: u64::MAX,
            max_concurrency: Throttle::default_limit(),
            cache_dir: None,
            cache_key: KeyPolicy::default(),
            external: ExternalImages::default(),
            codecs: CodecChain::new(),
        }
    }
}

impl OptimizerConfig {
    /// Start from defaults
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Disable or re-enable the whole pipeline
    #[must_use]
    pub fn disabled(mut self, disable: bool) -> Self {
        self.disable = disable;
        self
    }

    /// Append one asset filter
    #[must_use]
    pub fn with_test(mut self, spec: MatchSpec) -> Self {
        self.test.push(spec);
        self
    }

    /// Set both size bounds (exclusive min, inclusive max)
    #[must_use]
    pub fn with_size_bounds(mut self, min: u64, max: u64) -> Self {
        self.min_file_size = min;
        self.max_file_size = max;
        self
    }

    /// Set the concurrency limit
    #[must_use]
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Enable the cache under the given root
    #[must_use]
    pub fn with_cache_dir(mut self, root: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(root.into());
        self
    }

    /// Set the cache key policy
    #[must_use]
    pub fn with_cache_key(mut self, policy: KeyPolicy) -> Self {
        self.cache_key = policy;
        self
    }

    /// Configure external image processing
    #[must_use]
    pub fn with_external(mut self, external: ExternalImages) -> Self {
        self.external = external;
        self
    }

    /// Append one codec to the chain
    #[must_use]
    pub fn with_codec(mut self, codec: Arc<dyn crate::codec::Codec>) -> Self {
        self.codecs.push(codec);
        self
    }
}
