//! End-to-end pipeline behavior
//!
//! Exercises full build cycles: matching, caching, throttling, failure
//! surfacing, and the external-image pass.

use bytes::Bytes;
use picopt_core::{
    ExternalImages, MatchSpec, OptimizerConfig, Pipeline, PipelineError, ValueOrSupplier,
};
use picopt_test_utils::{
    asset_map, filler, init_tracing, DelayCodec, FailOnMarkerCodec, StubCodec,
};
use pretty_assertions::assert_eq;
use regex::Regex;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn png_regex() -> MatchSpec {
    MatchSpec::regex(Regex::new(r"\.png$").unwrap())
}

#[tokio::test]
async fn end_to_end_replaces_matching_asset_only() {
    init_tracing();

    let codec = StubCodec::with_output_len(600);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_codec(Arc::new(codec.clone()));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map([
        ("icon.png", filler(1000, 1)),
        ("readme.txt", filler(1000, 2)),
    ]);

    let summary = pipeline.run_cycle(&assets).await.unwrap();

    assert_eq!(summary.enumerated, 2);
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.optimized, 1);
    assert_eq!(summary.bytes_saved, 400);

    // icon.png got the 600-byte optimized buffer
    assert_eq!(assets.get("icon.png").unwrap().len(), 600);
    // readme.txt was never submitted to the compressor
    assert_eq!(assets.get("readme.txt").unwrap().len(), 1000);
    assert_eq!(codec.calls(), 1);
}

#[tokio::test]
async fn size_bounds_filter_assets() {
    let codec = StubCodec::with_output_len(10);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_size_bounds(100, 200)
        .with_codec(Arc::new(codec.clone()));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map([
        ("at-min.png", filler(100, 1)),   // exclusive lower bound: rejected
        ("in-range.png", filler(150, 2)), // accepted
        ("at-max.png", filler(200, 3)),   // inclusive upper bound: accepted
        ("too-big.png", filler(201, 4)),  // rejected
    ]);

    let summary = pipeline.run_cycle(&assets).await.unwrap();

    assert_eq!(summary.matched, 2);
    assert_eq!(assets.get("at-min.png").unwrap().len(), 100);
    assert_eq!(assets.get("in-range.png").unwrap().len(), 10);
    assert_eq!(assets.get("at-max.png").unwrap().len(), 10);
    assert_eq!(assets.get("too-big.png").unwrap().len(), 201);
}

#[tokio::test]
async fn concurrency_stays_within_limit() {
    init_tracing();

    let codec = DelayCodec::new(Duration::from_millis(30), 10);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_max_concurrency(2)
        .with_codec(Arc::new(codec.clone()));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map((0..5).map(|i| (format!("img-{i}.png"), filler(100, i as u8))));

    let summary = pipeline.run_cycle(&assets).await.unwrap();

    assert_eq!(summary.matched, 5);
    assert_eq!(summary.optimized, 5);
    assert!(
        codec.peak_concurrency() <= 2,
        "peak concurrency {} exceeded limit",
        codec.peak_concurrency()
    );
    // All five committed despite the bound
    for i in 0..5 {
        assert_eq!(assets.get(&format!("img-{i}.png")).unwrap().len(), 10);
    }
}

#[tokio::test]
async fn one_failure_surfaces_while_siblings_commit() {
    init_tracing();

    // Fails only for the asset whose content starts with 0xFF
    let codec = FailOnMarkerCodec::new(0xFF, 50);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_codec(Arc::new(codec));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map([
        ("a.png", filler(100, 1)),
        ("broken.png", filler(100, 0xFF)),
        ("c.png", filler(100, 3)),
    ]);

    let callbacks = AtomicUsize::new(0);
    let result = pipeline
        .process(&assets, |error| {
            callbacks.fetch_add(1, Ordering::SeqCst);
            let error = error.expect("completion callback must carry the failure");
            assert!(error.to_string().contains("broken.png"));
        })
        .await;

    assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    match result {
        Err(PipelineError::Codec { asset, .. }) => assert_eq!(asset, "broken.png"),
        other => panic!("expected codec error, got {other:?}"),
    }

    // The failed asset keeps its original content; siblings committed
    assert_eq!(assets.get("broken.png").unwrap().len(), 100);
    assert_eq!(assets.get("a.png").unwrap().len(), 50);
    assert_eq!(assets.get("c.png").unwrap().len(), 50);
}

#[tokio::test]
async fn completion_callback_gets_none_on_success() {
    let config = OptimizerConfig::new().with_test(png_regex());
    let pipeline = Pipeline::new(config).unwrap();
    let assets = asset_map([("a.png", filler(100, 1))]);

    let callbacks = AtomicUsize::new(0);
    let result = pipeline
        .process(&assets, |error| {
            callbacks.fetch_add(1, Ordering::SeqCst);
            assert!(error.is_none());
        })
        .await;

    assert!(result.is_ok());
    assert_eq!(callbacks.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn enabled_cache_skips_recompression_across_cycles() {
    init_tracing();

    let cache_dir = tempfile::tempdir().unwrap();
    let codec = StubCodec::with_output_len(600);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_cache_dir(cache_dir.path())
        .with_codec(Arc::new(codec.clone()));
    let pipeline = Pipeline::new(config).unwrap();

    // Two cycles over identical source content, as two consecutive builds
    // would produce
    let first = asset_map([("icon.png", filler(1000, 7))]);
    let summary1 = pipeline.run_cycle(&first).await.unwrap();
    assert_eq!(summary1.cache_hits, 0);
    assert_eq!(first.get("icon.png").unwrap().len(), 600);

    let second = asset_map([("icon.png", filler(1000, 7))]);
    let summary2 = pipeline.run_cycle(&second).await.unwrap();
    assert_eq!(summary2.cache_hits, 1);
    assert_eq!(second.get("icon.png").unwrap().len(), 600);

    // The codec ran exactly once across both runs
    assert_eq!(codec.calls(), 1);
}

#[tokio::test]
async fn disabled_cache_recompresses_every_cycle() {
    let codec = StubCodec::with_output_len(600);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_codec(Arc::new(codec.clone()));
    let pipeline = Pipeline::new(config).unwrap();

    for _ in 0..2 {
        let assets = asset_map([("icon.png", filler(1000, 7))]);
        pipeline.run_cycle(&assets).await.unwrap();
    }

    assert_eq!(codec.calls(), 2);
}

#[tokio::test]
async fn external_images_mirror_into_destination() {
    init_tracing();

    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let source_file = src.path().join("img/photo.png");
    picopt_asset::fs::write(&source_file, &vec![9u8; 1000])
        .await
        .unwrap();
    let skipped_file = src.path().join("img/notes.txt");
    picopt_asset::fs::write(&skipped_file, &vec![9u8; 1000])
        .await
        .unwrap();

    let codec = StubCodec::with_output_len(600);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_external(
            ExternalImages::new()
                .with_context(src.path())
                .with_sources(vec![
                    PathBuf::from("img/photo.png"),
                    PathBuf::from("img/notes.txt"),
                ])
                .with_destination(dst.path().to_path_buf()),
        )
        .with_codec(Arc::new(codec.clone()));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map(std::iter::empty::<(String, Bytes)>());
    let summary = pipeline.run_cycle(&assets).await.unwrap();

    assert_eq!(summary.enumerated, 2);
    assert_eq!(summary.matched, 1);
    assert_eq!(summary.external_written, 1);

    // Relative path mirrored under the destination root
    let written = picopt_asset::fs::read(dst.path().join("img/photo.png"))
        .await
        .unwrap();
    assert_eq!(written.len(), 600);
    // Non-matching source produced no output
    assert!(!picopt_asset::fs::exists(dst.path().join("img/notes.txt")).await);
    assert_eq!(codec.calls(), 1);
}

#[tokio::test]
async fn external_glob_matches_context_relative_name() {
    // Globs see the source path relative to the context, so `img/*.png`
    // matches `img/photo.png` regardless of where the context lives
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let source_file = src.path().join("img/photo.png");
    picopt_asset::fs::write(&source_file, &vec![9u8; 1000])
        .await
        .unwrap();

    let codec = StubCodec::with_output_len(600);
    let config = OptimizerConfig::new()
        .with_test(MatchSpec::glob("img/*.png"))
        .with_external(
            ExternalImages::new()
                .with_context(src.path())
                .with_sources(vec![PathBuf::from("img/photo.png")])
                .with_destination(dst.path().to_path_buf()),
        )
        .with_codec(Arc::new(codec.clone()));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map(std::iter::empty::<(String, Bytes)>());
    let summary = pipeline.run_cycle(&assets).await.unwrap();

    assert_eq!(summary.matched, 1);
    assert_eq!(summary.external_written, 1);
    let written = picopt_asset::fs::read(dst.path().join("img/photo.png"))
        .await
        .unwrap();
    assert_eq!(written.len(), 600);
    assert_eq!(codec.calls(), 1);
}

#[tokio::test]
async fn external_sources_from_supplier_resolve_once_per_cycle() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let source_file = src.path().join("a.png");
    picopt_asset::fs::write(&source_file, &vec![1u8; 500])
        .await
        .unwrap();

    let resolutions = Arc::new(AtomicUsize::new(0));
    let resolutions_inner = Arc::clone(&resolutions);

    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_external(
            ExternalImages::new()
                .with_context(src.path())
                .with_sources(ValueOrSupplier::supplier(move || {
                    resolutions_inner.fetch_add(1, Ordering::SeqCst);
                    vec![PathBuf::from("a.png")]
                }))
                .with_destination(dst.path().to_path_buf()),
        )
        .with_codec(Arc::new(StubCodec::with_output_len(100)));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map(std::iter::empty::<(String, Bytes)>());
    pipeline.run_cycle(&assets).await.unwrap();
    assert_eq!(resolutions.load(Ordering::SeqCst), 1);

    pipeline.run_cycle(&assets).await.unwrap();
    assert_eq!(resolutions.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn missing_external_source_surfaces_io_error() {
    let src = tempfile::tempdir().unwrap();
    let dst = tempfile::tempdir().unwrap();

    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_external(
            ExternalImages::new()
                .with_context(src.path())
                .with_sources(vec![PathBuf::from("ghost.png")])
                .with_destination(dst.path().to_path_buf()),
        );
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map(std::iter::empty::<(String, Bytes)>());
    let err = pipeline.run_cycle(&assets).await.unwrap_err();
    assert!(matches!(err, PipelineError::Io { .. }));
}

#[tokio::test]
async fn grown_codec_output_never_replaces_asset() {
    // The "optimized" buffer is bigger; the original must win
    let codec = StubCodec::with_output_len(2000);
    let config = OptimizerConfig::new()
        .with_test(png_regex())
        .with_codec(Arc::new(codec));
    let pipeline = Pipeline::new(config).unwrap();

    let assets = asset_map([("icon.png", filler(1000, 5))]);
    let summary = pipeline.run_cycle(&assets).await.unwrap();

    assert_eq!(summary.optimized, 0);
    assert_eq!(summary.bytes_saved, 0);
    let committed = assets.get("icon.png").unwrap();
    assert_eq!(&committed[..], &filler(1000, 5)[..]);
}
