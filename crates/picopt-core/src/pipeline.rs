//! Pipeline orchestrator
//!
//! Coordinates one build cycle: enumerate candidate assets (the bundler's
//! in-memory mapping plus any configured external sources), filter them
//! through the matcher, route each match through the cache and codec
//! chain under the throttle, and commit results: in-memory replacement
//! for bundler assets, mirrored file writes for external ones.
//!
//! A cycle moves through `Idle → Enumerating → Dispatching → Joining →
//! {Committed | Failed}`. All dispatched tasks are awaited even after a
//! failure; the first error observed (in dispatch order) is the one
//! reported, and siblings that already committed stay committed. There is
//! no rollback and no retry.

use crate::cache::DiskCache;
use crate::codec::CodecChain;
use crate::compressor;
use crate::config::OptimizerConfig;
use crate::error::PipelineError;
use crate::matcher::{Matcher, SizePolicy};
use crate::throttle::Throttle;
use bytes::Bytes;
use dashmap::DashMap;
use futures::future::join_all;
use picopt_asset::{fs, Asset};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// Mutable filename → content mapping shared with the build collaborator
///
/// Each task writes only its own key, so concurrent commits never
/// conflict.
pub type AssetMap = DashMap<String, Bytes>;

/// Orchestrator lifecycle within one build cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CyclePhase {
    /// Waiting for the build collaborator's "assets ready" signal
    Idle,
    /// Collecting in-memory assets and resolving external sources
    Enumerating,
    /// Matching assets and submitting tasks to the throttle
    Dispatching,
    /// Awaiting every submitted task
    Joining,
    /// All tasks done, results committed
    Committed,
    /// At least one task failed; the first error is reported
    Failed,
}

/// What one build cycle accomplished
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct CycleSummary {
    /// Assets seen during enumeration (in-memory + external)
    pub enumerated: usize,
    /// Assets that passed the matcher
    pub matched: usize,
    /// Assets replaced with a strictly smaller buffer
    pub optimized: usize,
    /// Lookups served from the disk cache this cycle
    pub cache_hits: u64,
    /// Total bytes shaved off across all commits
    pub bytes_saved: u64,
    /// External files written to the destination
    pub external_written: usize,
    /// Wall-clock duration of the cycle
    pub elapsed_ms: u64,
}

/// Per-task outcome folded into the [`CycleSummary`]
#[derive(Debug, Clone, Copy, Default)]
struct TaskReport {
    matched: bool,
    shrunk: bool,
    bytes_saved: u64,
    external_written: bool,
}

/// The optimization pipeline
///
/// Built once from an [`OptimizerConfig`]; matcher compilation happens
/// here, so configuration mistakes surface before any asset or file is
/// touched. Run one cycle per "assets ready" signal via
/// [`Pipeline::process`] or [`Pipeline::run_cycle`].
#[derive(Debug)]
pub struct Pipeline {
    config: OptimizerConfig,
    matcher: Matcher,
    cache: Option<Arc<DiskCache>>,
    throttle: Throttle,
}

impl Pipeline {
    /// Build a pipeline from configuration
    ///
    /// # Errors
    /// [`PipelineError::Config`] when a match spec fails to compile.
    pub fn new(config: OptimizerConfig) -> Result<Self, PipelineError> {
        let matcher = Matcher::compile(
            &config.test,
            SizePolicy::new(config.min_file_size, config.max_file_size),
        )?;
        let cache = config
            .cache_dir
            .as_ref()
            .map(|root| Arc::new(DiskCache::new(root, config.cache_key)));
        let throttle = Throttle::new(config.max_concurrency);

        Ok(Self {
            config,
            matcher,
            cache,
            throttle,
        })
    }

    /// Configuration this pipeline was built from
    #[inline]
    #[must_use]
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// The shared throttle (exposed for observability)
    #[inline]
    #[must_use]
    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Run one build cycle over the given asset mapping
    ///
    /// Every matched asset is processed independently up to the
    /// concurrency limit; completion is the join of all per-asset tasks.
    ///
    /// # Errors
    /// The first per-asset failure observed, after every sibling task has
    /// been awaited. Assets committed before the failure stay committed.
    pub async fn run_cycle(&self, assets: &Arc<AssetMap>) -> Result<CycleSummary, PipelineError> {
        if self.config.disable {
            tracing::debug!("pipeline disabled, skipping cycle");
            return Ok(CycleSummary::default());
        }

        let started = Instant::now();
        let cache_hits_before = self.cache.as_ref().map_or(0, |c| c.stats().hits);
        let mut summary = CycleSummary::default();

        // Enumerating: snapshot the in-memory mapping in stable order and
        // resolve the external source list exactly once
        self.trace_phase(CyclePhase::Enumerating);
        let mut in_memory: Vec<Asset> = assets
            .iter()
            .map(|entry| Asset::new(entry.key().clone(), entry.value().clone()))
            .collect();
        in_memory.sort_by(|a, b| a.name.cmp(&b.name));

        let externals = self.config.external.sources.resolve();
        let destination = self.config.external.destination.resolve();
        summary.enumerated = in_memory.len() + externals.len();
        tracing::info!(
            in_memory = in_memory.len(),
            external = externals.len(),
            "cycle enumerated assets"
        );

        // Dispatching: matcher runs synchronously for in-memory assets;
        // external files are matched inside their task once read
        self.trace_phase(CyclePhase::Dispatching);
        let mut handles: Vec<JoinHandle<Result<TaskReport, PipelineError>>> = Vec::new();

        for asset in in_memory {
            if !self.matcher.is_match(&asset.name, asset.len() as u64) {
                tracing::debug!(asset = %asset.name, "skipped by matcher");
                continue;
            }
            summary.matched += 1;
            handles.push(self.spawn_in_memory_task(asset, Arc::clone(assets)));
        }

        for source in externals {
            handles.push(self.spawn_external_task(source, destination.clone()));
        }

        // Joining: await everything; capture the first failure in dispatch
        // order but never abort siblings early
        self.trace_phase(CyclePhase::Joining);
        let mut first_error: Option<PipelineError> = None;
        for joined in join_all(handles).await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(join_err) => Err(PipelineError::TaskAborted(join_err.to_string())),
            };
            match outcome {
                Ok(report) => {
                    // In-memory matches were already counted at dispatch;
                    // external tasks report theirs here
                    if report.matched {
                        summary.matched += 1;
                    }
                    if report.shrunk {
                        summary.optimized += 1;
                    }
                    summary.bytes_saved += report.bytes_saved;
                    if report.external_written {
                        summary.external_written += 1;
                    }
                }
                Err(error) => {
                    tracing::warn!(%error, "asset task failed");
                    if first_error.is_none() {
                        first_error = Some(error);
                    }
                }
            }
        }

        if let Some(error) = first_error {
            self.trace_phase(CyclePhase::Failed);
            tracing::error!(%error, "cycle failed");
            return Err(error);
        }

        summary.cache_hits = self
            .cache
            .as_ref()
            .map_or(0, |c| c.stats().hits.saturating_sub(cache_hits_before));
        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        self.trace_phase(CyclePhase::Committed);
        tracing::info!(
            matched = summary.matched,
            optimized = summary.optimized,
            bytes_saved = summary.bytes_saved,
            elapsed_ms = summary.elapsed_ms,
            "cycle committed"
        );
        Ok(summary)
    }

    /// Collaborator entry point: run one cycle and signal completion
    ///
    /// Invokes `on_done` exactly once, with `None` on success or the
    /// captured error on failure, matching the build system's
    /// completion-callback contract. The cycle result is also returned
    /// for callers that prefer `Result` handling.
    ///
    /// # Errors
    /// Same as [`Pipeline::run_cycle`].
    pub async fn process<F>(
        &self,
        assets: &Arc<AssetMap>,
        on_done: F,
    ) -> Result<CycleSummary, PipelineError>
    where
        F: FnOnce(Option<&PipelineError>),
    {
        let result = self.run_cycle(assets).await;
        match &result {
            Ok(_) => on_done(None),
            Err(error) => on_done(Some(error)),
        }
        result
    }

    /// Optimize one in-memory asset and commit it back to its map slot
    fn spawn_in_memory_task(
        &self,
        asset: Asset,
        assets: Arc<AssetMap>,
    ) -> JoinHandle<Result<TaskReport, PipelineError>> {
        let throttle = self.throttle.clone();
        let chain = self.config.codecs.clone();
        let cache = self.cache.clone();

        tokio::spawn(async move {
            throttle
                .run(async move {
                    let before = asset.content.len();
                    let optimized =
                        optimize_through_cache(&asset.name, &asset.content, &chain, cache.as_deref())
                            .await?;

                    let after = optimized.len();
                    assets.insert(asset.name.clone(), optimized);
                    tracing::debug!(asset = %asset.name, before, after, "committed in-memory asset");

                    Ok(TaskReport {
                        // counted at dispatch time for in-memory assets
                        matched: false,
                        shrunk: after < before,
                        bytes_saved: (before as u64).saturating_sub(after as u64),
                        external_written: false,
                    })
                })
                .await
        })
    }

    /// Read, match, optimize, and write one external source file
    fn spawn_external_task(
        &self,
        source: PathBuf,
        destination: PathBuf,
    ) -> JoinHandle<Result<TaskReport, PipelineError>> {
        let throttle = self.throttle.clone();
        let chain = self.config.codecs.clone();
        let cache = self.cache.clone();
        let matcher = self.matcher.clone();
        let context = self.config.external.context.clone();

        tokio::spawn(async move {
            throttle
                .run(async move {
                    let full_source = if source.is_absolute() {
                        source.clone()
                    } else {
                        context.join(&source)
                    };
                    let relative = relative_to(&full_source, &context);
                    // Externals are known by their context-relative name, the
                    // same form in-memory asset names take. Matching the
                    // absolute resolution would defeat globs like `img/*.png`
                    // since `*` never crosses `/`.
                    let name = relative.to_string_lossy().into_owned();

                    let content =
                        fs::read(&full_source)
                            .await
                            .map_err(|source| PipelineError::Io {
                                path: full_source.clone(),
                                source,
                            })?;

                    if !matcher.is_match(&name, content.len() as u64) {
                        tracing::debug!(asset = %name, "external file skipped by matcher");
                        return Ok(TaskReport::default());
                    }

                    let before = content.len();
                    let optimized =
                        optimize_through_cache(&name, &content, &chain, cache.as_deref()).await?;
                    let after = optimized.len();

                    let target = destination.join(&relative);
                    fs::write(&target, &optimized)
                        .await
                        .map_err(|source| PipelineError::Io {
                            path: target.clone(),
                            source,
                        })?;
                    tracing::debug!(asset = %name, target = %target.display(), "wrote external asset");

                    Ok(TaskReport {
                        matched: true,
                        shrunk: after < before,
                        bytes_saved: (before as u64).saturating_sub(after as u64),
                        external_written: true,
                    })
                })
                .await
        })
    }

    fn trace_phase(&self, phase: CyclePhase) {
        tracing::debug!(?phase, "pipeline phase");
    }
}

/// Route a buffer through the cache when enabled, else compress directly
async fn optimize_through_cache(
    name: &str,
    content: &Bytes,
    chain: &CodecChain,
    cache: Option<&DiskCache>,
) -> Result<Bytes, PipelineError> {
    match cache {
        Some(store) => store
            .get_or_compute(name, content, || compressor::optimize(content, chain))
            .await
            .map_err(|source| PipelineError::Cache {
                asset: name.to_string(),
                source,
            }),
        None => compressor::optimize(content, chain)
            .await
            .map_err(|source| PipelineError::Codec {
                asset: name.to_string(),
                source,
            }),
    }
}

/// Mirror a source path under the destination root
///
/// Paths outside the context fall back to their file name; reproducing
/// the original's `..`-bearing relative paths would let an external
/// source escape the destination directory.
fn relative_to(source: &Path, context: &Path) -> PathBuf {
    source.strip_prefix(context).map_or_else(
        |_| {
            source
                .file_name()
                .map_or_else(|| source.to_path_buf(), PathBuf::from)
        },
        Path::to_path_buf,
    )
}
