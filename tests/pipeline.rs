mod common;

use approx::assert_abs_diff_eq;
use common::fixtures::{locator, strip, strip_with_step, MemoryImages, StubEngine};
use common::{init_logger, scratch_dir};
use mosaic_align::matching::{
    DirectedPair, DirectionStatus, IntermediateStore, LocalSmoothnessParams, MatchParams,
    PairMatcher, PipelineError,
};
use mosaic_align::mesh::{Mesh, MeshError, MeshProvider, SpringMeshParams, SpringMeshProvider};
use mosaic_align::tiles::TileSpec;
use std::fs;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

/// Spring meshes that remember which tiles they were built for.
struct CountingMeshes {
    inner: SpringMeshProvider,
    built: Arc<Mutex<Vec<usize>>>,
}

impl MeshProvider for CountingMeshes {
    fn build(&self, index: usize, tile: &TileSpec) -> Result<Mesh, MeshError> {
        self.built.lock().unwrap().push(index);
        self.inner.build(index, tile)
    }
}

fn params(target: &Path) -> MatchParams {
    MatchParams {
        mesh: SpringMeshParams {
            spring_length: 20.0,
            ..Default::default()
        },
        target_path: target.to_path_buf(),
        workers: 1,
        ..Default::default()
    }
}

fn matcher(params: MatchParams, engine: &StubEngine, images: MemoryImages) -> PairMatcher {
    PairMatcher::new(params, Box::new(engine.clone())).with_image_source(Box::new(images))
}

#[test]
fn both_directions_are_projected_into_the_mosaic() {
    init_logger();
    let dir = scratch_dir("pipeline-project");
    let engine = StubEngine::default();
    let run = matcher(params(&dir.join("corr.json")), &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();

    assert_eq!(run.records.len(), 2);
    assert_eq!(engine.directions(), vec![(0, 1), (1, 0)]);
    let forward = &run.records[0];
    assert_eq!(forward.url1, locator(0));
    assert_eq!(forward.url2, locator(1));
    assert!(!forward.is_empty());
    for record in &run.records {
        for m in &record.correspondence_point_pairs {
            assert_abs_diff_eq!(m.p1.w[0], m.p2.w[0], epsilon = 1e-9);
            assert_abs_diff_eq!(m.p1.w[1], m.p2.w[1], epsilon = 1e-9);
        }
    }
    // moving vertices on the right edge of tile 0 land 10 px into tile 1
    assert!(forward
        .correspondence_point_pairs
        .iter()
        .all(|m| (m.p1.l[0] - 100.0).abs() < 1e-9 && (m.p2.l[0] - 10.0).abs() < 1e-9));

    let written: Vec<mosaic_align::CorrespondencePair> =
        serde_json::from_str(&fs::read_to_string(dir.join("corr.json")).unwrap()).unwrap();
    assert_eq!(written, run.records);
    assert!(run.report.timings.stage("matching").is_some());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn fixed_tile_is_never_moved() {
    init_logger();
    let dir = scratch_dir("pipeline-fixed");
    let mut p = params(&dir.join("corr.json"));
    p.fixed_tiles.insert(0);
    let engine = StubEngine::default();
    let run = matcher(p, &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();

    assert_eq!(engine.directions(), vec![(1, 0)]);
    assert_eq!(run.records.len(), 2);
    assert!(run.records[0].is_empty());
    assert_eq!(run.records[0].url1, locator(0));
    assert!(!run.records[1].is_empty());
    assert_eq!(run.report.directions[0].status, DirectionStatus::Skipped);
    assert_eq!(run.report.directions[0].error, None);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn records_follow_request_order() {
    init_logger();
    let dir = scratch_dir("pipeline-order");
    let engine = StubEngine::default();
    let run = matcher(params(&dir.join("corr.json")), &engine, MemoryImages::for_strip(4, &[]))
        .run_tokens(&strip(4), &["2:3", "0:1"])
        .unwrap();

    let order: Vec<(String, String)> = run
        .records
        .iter()
        .map(|r| (r.url1.clone(), r.url2.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            (locator(2), locator(3)),
            (locator(3), locator(2)),
            (locator(0), locator(1)),
            (locator(1), locator(0)),
        ]
    );
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn resume_reuses_persisted_directions() {
    init_logger();
    let dir = scratch_dir("pipeline-resume");
    let target = dir.join("corr.json");
    let mut p = params(&target);
    p.resume = true;

    let first_engine = StubEngine::default();
    let first = matcher(p.clone(), &first_engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();
    assert_eq!(first_engine.call_count(), 2);
    assert!(dir.join("corr_0_1.json").exists());
    assert!(dir.join("corr_1_0.json").exists());

    let second_engine = StubEngine::default();
    let images = MemoryImages::for_strip(2, &[]);
    let loads = images.loads.clone();
    let second = matcher(p.clone(), &second_engine, images)
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();
    assert_eq!(second_engine.call_count(), 0);
    assert_eq!(loads.load(Ordering::SeqCst), 0, "images are loaded lazily");
    assert_eq!(second.records, first.records);
    assert_eq!(second.report.count(DirectionStatus::Loaded), 2);

    // a discarded direction is recomputed, the other one still reused
    let store = IntermediateStore::new(&target);
    assert!(store.discard(DirectedPair::new(1, 0)).unwrap());
    let third_engine = StubEngine::default();
    let third = matcher(p, &third_engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();
    assert_eq!(third_engine.directions(), vec![(1, 0)]);
    assert_eq!(third.records, first.records);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn malformed_intermediate_is_recomputed() {
    init_logger();
    let dir = scratch_dir("pipeline-malformed");
    let mut p = params(&dir.join("corr.json"));
    p.resume = true;
    fs::write(dir.join("corr_0_1.json"), "[{ truncated").unwrap();

    let engine = StubEngine::default();
    let run = matcher(p, &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();
    assert_eq!(engine.call_count(), 2);
    assert_eq!(run.report.count(DirectionStatus::Computed), 2);
    let store = IntermediateStore::new(dir.join("corr.json"));
    assert_eq!(store.load(DirectedPair::new(0, 1)).unwrap().as_ref(), Some(&run.records[0]));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_image_fails_only_its_pair() {
    init_logger();
    let dir = scratch_dir("pipeline-image");
    let engine = StubEngine::default();
    let run = matcher(params(&dir.join("corr.json")), &engine, MemoryImages::for_strip(4, &[3]))
        .run_tokens(&strip(4), &["0:1", "2:3"])
        .unwrap();

    assert_eq!(run.records.len(), 2);
    assert_eq!(engine.directions(), vec![(0, 1), (1, 0)]);
    assert_eq!(run.report.pair_failures.len(), 1);
    assert_eq!((run.report.pair_failures[0].a, run.report.pair_failures[0].b), (2, 3));
    assert_eq!(run.report.count(DirectionStatus::Failed), 2);
    assert!(run.report.directions[2]
        .error
        .as_deref()
        .unwrap()
        .contains("tile3"));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn engine_failure_fails_only_that_direction() {
    init_logger();
    let dir = scratch_dir("pipeline-engine");
    let engine = StubEngine::failing_for([1]);
    let run = matcher(params(&dir.join("corr.json")), &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();

    assert_eq!(engine.call_count(), 2);
    assert_eq!(run.records.len(), 1);
    assert_eq!(run.records[0].url1, locator(0));
    assert_eq!(run.report.directions[1].status, DirectionStatus::Failed);
    assert!(!run.report.degraded);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn nothing_is_written_when_every_direction_fails() {
    init_logger();
    let dir = scratch_dir("pipeline-allfail");
    let engine = StubEngine::failing_for([0, 1]);
    let run = matcher(params(&dir.join("corr.json")), &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();
    assert!(run.records.is_empty());
    assert!(!dir.join("corr.json").exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn bad_requests_fail_before_any_work() {
    init_logger();
    let dir = scratch_dir("pipeline-badreq");
    let engine = StubEngine::default();
    let m = matcher(params(&dir.join("corr.json")), &engine, MemoryImages::for_strip(4, &[]));

    match m.run_tokens(&strip(4), &["0:1", "1-2"]) {
        Err(PipelineError::MalformedPair(err)) => assert_eq!(err.token, "1-2"),
        other => panic!("expected malformed pair, got {other:?}"),
    }
    match m.run_tokens(&strip(4), &["0:1", "3:9"]) {
        Err(PipelineError::TileIndex { index, count, .. }) => assert_eq!((index, count), (9, 4)),
        other => panic!("expected index error, got {other:?}"),
    }
    assert_eq!(engine.call_count(), 0);
    assert!(!dir.join("corr.json").exists());
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn repeated_pairs_are_computed_once() {
    init_logger();
    let dir = scratch_dir("pipeline-repeat");
    let engine = StubEngine::default();
    let run = matcher(params(&dir.join("corr.json")), &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1", "0:1", "1:0"])
        .unwrap();
    assert_eq!(engine.call_count(), 2);
    assert_eq!(run.records.len(), 6);
    assert_eq!(run.records[0], run.records[2]);
    assert_eq!(run.records[0], run.records[5]);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn persistence_failure_degrades_but_keeps_results() {
    init_logger();
    let dir = scratch_dir("pipeline-degraded");
    let blocker = dir.join("blocker");
    fs::write(&blocker, "not a directory").unwrap();
    let mut p = params(&blocker.join("corr.json"));
    p.resume = true;

    let engine = StubEngine::default();
    let run = matcher(p, &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip(2), &["0:1"])
        .unwrap();
    assert_eq!(run.records.len(), 2);
    assert!(run.report.degraded);
    // two intermediates plus the final output
    assert_eq!(run.report.persistence_failures.len(), 3);
    assert_eq!(run.report.persistence_failures[0].direction, Some([0, 1]));
    assert_eq!(run.report.count(DirectionStatus::Computed), 2);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn smoothness_filter_drops_displaced_match() {
    init_logger();
    let dir = scratch_dir("pipeline-smoothness");
    let mut p = params(&dir.join("corr.json"));
    p.smoothness = Some(LocalSmoothnessParams::default());
    let engine = StubEngine::displacing(0);
    let run = matcher(p, &engine, MemoryImages::for_strip(2, &[]))
        .run_tokens(&strip_with_step(2, 20.0), &["0:1"])
        .unwrap();

    let forward = &run.report.directions[0];
    assert_eq!(forward.status, DirectionStatus::Computed);
    let candidates = forward.candidates.unwrap();
    assert!(candidates >= 5, "overlap should yield several matches, got {candidates}");
    assert!(forward.matches < candidates);
    assert_eq!(run.records[0].len(), forward.matches);
    // the displaced match would land 30 px off in the mosaic
    for m in &run.records[0].correspondence_point_pairs {
        assert_abs_diff_eq!(m.p1.w[1], m.p2.w[1], epsilon = 1e-6);
    }

    let reverse = &run.report.directions[1];
    assert_eq!(reverse.candidates, Some(reverse.matches));
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn shared_tile_gets_one_mesh() {
    init_logger();
    let dir = scratch_dir("pipeline-meshes");
    let p = params(&dir.join("corr.json"));
    let built = Arc::new(Mutex::new(Vec::new()));
    let meshes = CountingMeshes {
        inner: SpringMeshProvider::new(p.mesh.clone(), p.block.layer_scale),
        built: built.clone(),
    };
    let engine = StubEngine::default();
    let run = matcher(p, &engine, MemoryImages::for_strip(3, &[]))
        .with_mesh_provider(Box::new(meshes))
        .run_tokens(&strip(3), &["0:1", "1:2"])
        .unwrap();

    assert_eq!(engine.call_count(), 4);
    assert_eq!(run.report.count(DirectionStatus::Computed), 4);
    let mut indices = built.lock().unwrap().clone();
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2]);
    let _ = fs::remove_dir_all(&dir);
}
