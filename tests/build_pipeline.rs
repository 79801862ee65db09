/// End-to-end builds through the library: resolve, fetch sources, compute,
/// publish, and skip what is already published.
mod common;

use std::sync::Arc;

use common::{FakeSource, Workspace};
use gddp::build::{BuildOptions, Builder};
use gddp::formula;
use gddp::key::YearSpan;
use gddp::raster::{GridCodec, RasterCodec};
use gddp::store::StoreClient;

const REQUESTED: &str = "gt-q99_pr_rcp85_CCSM4_2050_nexgddp.tif";
const BASELINE_PERCENTILE: &str = "abs-q99_pr_historical_CCSM4_1970-1970_nexgddp.tif";
const BASELINE_YEAR: &str = "q99_pr_historical_CCSM4_1970_nexgddp.tif";
const PROJECTION_PERCENTILE: &str = "q99_pr_rcp85_CCSM4_2050_nexgddp.tif";

fn source() -> FakeSource {
    FakeSource {
        historical: vec![5.0, 5.0, 5.0],
        projection: vec![10.0, 0.0, 10.0],
    }
}

fn builder(workspace: &Workspace, source: Option<FakeSource>, options: BuildOptions) -> Builder {
    builder_with_store(workspace.store(source), options)
}

fn builder_with_store(store: StoreClient, options: BuildOptions) -> Builder {
    let registry = formula::standard(YearSpan::Range(1970, 1970)).unwrap();
    Builder::new(Arc::new(registry), Arc::new(store), Arc::new(GridCodec), options)
}

fn options() -> BuildOptions {
    BuildOptions {
        max_workers: 2,
        ..BuildOptions::default()
    }
}

#[test]
fn test_exceedance_build_publishes_chain() {
    let workspace = Workspace::new();
    let report = builder(&workspace, Some(source()), options())
        .build(&[REQUESTED.to_string()])
        .unwrap();

    assert!(report.is_success());
    let mut built = report.built.clone();
    built.sort();
    assert_eq!(built, vec![BASELINE_PERCENTILE, REQUESTED, BASELINE_YEAR]);
    assert_eq!(report.skipped.len(), 2);

    for key in &report.built {
        assert!(workspace.published(key).is_file(), "{} not published", key);
    }

    // Two of the three projection days exceed the baseline 99th percentile
    let output = GridCodec.read(&workspace.cache_dir().join(REQUESTED)).unwrap();
    assert_eq!(output.bands(), 1);
    assert_eq!(output.data(), &[2.0, 2.0]);
}

#[test]
fn test_second_build_skips_published_artifacts() {
    let workspace = Workspace::new();
    builder(&workspace, Some(source()), options())
        .build(&[REQUESTED.to_string()])
        .unwrap();

    // New client, empty cache: existence comes from the remote listing
    std::fs::remove_dir_all(workspace.cache_dir()).unwrap();
    let report = builder(&workspace, None, options())
        .build(&[REQUESTED.to_string()])
        .unwrap();

    assert!(report.built.is_empty());
    assert_eq!(report.skipped, vec![REQUESTED.to_string()]);
}

#[test]
fn test_synchronous_build_matches_concurrent() {
    let build = |synchronous: bool| {
        let workspace = Workspace::new();
        let report = builder(
            &workspace,
            Some(source()),
            BuildOptions {
                synchronous,
                ..options()
            },
        )
        .build(&[REQUESTED.to_string()])
        .unwrap();
        let output = GridCodec.read(&workspace.published(REQUESTED)).unwrap();
        (report, output.data().to_vec())
    };

    let (sequential, sequential_output) = build(true);
    let (concurrent, concurrent_output) = build(false);

    assert_eq!(sequential.built, concurrent.built);
    assert_eq!(sequential.skipped, concurrent.skipped);
    assert!(sequential.is_success() && concurrent.is_success());
    assert_eq!(sequential_output, concurrent_output);
    assert_eq!(concurrent_output, vec![2.0, 2.0]);
}

#[test]
fn test_legacy_key_publishes_canonical_artifact() {
    let workspace = Workspace::new();
    let report = builder(&workspace, Some(source()), options())
        .build(&[
            "gt-q99_pr_rcp85_CCSM4_2050.tif".to_string(),
            REQUESTED.to_string(),
        ])
        .unwrap();

    assert_eq!(report.requested, vec![REQUESTED.to_string()]);
    assert_eq!(report.built.len(), 3);
    assert!(workspace.published(REQUESTED).is_file());
    assert!(!workspace.published("gt-q99_pr_rcp85_CCSM4_2050.tif").exists());
}

#[test]
fn test_nocache_build_with_shared_source() {
    let workspace = Workspace::new();
    let store = workspace.store(Some(source())).with_nocache(true);
    // both requested keys read the same projection source
    let report = builder_with_store(
        store,
        BuildOptions {
            max_workers: 4,
            ..options()
        },
    )
    .build(&[REQUESTED.to_string(), PROJECTION_PERCENTILE.to_string()])
    .unwrap();

    assert!(report.is_success(), "{:?}", report.failed);
    let mut built = report.built.clone();
    built.sort();
    assert_eq!(
        built,
        vec![BASELINE_PERCENTILE, REQUESTED, BASELINE_YEAR, PROJECTION_PERCENTILE]
    );
    for key in &report.built {
        assert!(workspace.published(key).is_file(), "{} not published", key);
    }
    assert_eq!(GridCodec.read(&workspace.published(REQUESTED)).unwrap().data(), &[2.0, 2.0]);
    assert!(workspace.cached_files().is_empty(), "{:?}", workspace.cached_files());
}

#[test]
fn test_failed_publish_leaves_no_cached_output() {
    let workspace = Workspace::new();
    let report = builder_with_store(
        workspace.rejecting_store(source()),
        BuildOptions {
            strict: false,
            ..options()
        },
    )
    .build(&[REQUESTED.to_string()])
    .unwrap();

    assert!(!report.is_success());
    assert!(report.built.is_empty());
    for key in [BASELINE_YEAR, BASELINE_PERCENTILE, REQUESTED] {
        assert!(!workspace.cache_dir().join(key).exists(), "{} left in cache", key);
        assert!(!workspace.published(key).exists());
    }
    assert!(workspace
        .cached_files()
        .iter()
        .all(|name| !name.starts_with(".partial-")));
}

#[test]
fn test_permissive_build_records_unreachable_sources() {
    let workspace = Workspace::new();
    let report = builder(
        &workspace,
        None,
        BuildOptions {
            strict: false,
            synchronous: true,
            ..options()
        },
    )
    .build(&[REQUESTED.to_string()])
    .unwrap();

    assert!(!report.is_success());
    assert!(report.built.is_empty());
    assert!(!workspace.published(REQUESTED).exists());
}

#[test]
fn test_strict_build_fails_on_unreachable_sources() {
    let workspace = Workspace::new();
    let result = builder(&workspace, None, options()).build(&[REQUESTED.to_string()]);

    assert!(result.is_err());
    assert!(!workspace.published(REQUESTED).exists());
}
