//! Checkpoints are byte-identical across runs and across interruptions.

use geo::{polygon, Polygon};
use gst_core::{MemoryCheckpointStore, SailConfig, Slot, SphericalEngine, Stepper};

fn config() -> SailConfig {
    SailConfig {
        duration_days: 0.1,
        land_frequency: 3,
        simplify_frequency: 2,
        ..SailConfig::new(0.0, 0.0, 20.0)
    }
}

fn island() -> Vec<Polygon<f64>> {
    vec![polygon![
        (x: 0.3, y: -0.1),
        (x: 0.5, y: -0.1),
        (x: 0.5, y: 0.1),
        (x: 0.3, y: 0.1),
    ]]
}

fn assert_same_blobs(a: &MemoryCheckpointStore, b: &MemoryCheckpointStore, nstep: usize) {
    for slot in Slot::ALL {
        for step in 0..nstep {
            assert_eq!(a.blob(slot, step), b.blob(slot, step), "{slot} step {step}");
        }
    }
}

#[test]
fn test_two_runs_write_identical_checkpoints() {
    let config = config();
    let engine = SphericalEngine::new();
    let obstacles = island();

    let first = MemoryCheckpointStore::new();
    let second = MemoryCheckpointStore::new();
    Stepper::new(&config, &engine, &first, &obstacles).unwrap().run().unwrap();
    Stepper::new(&config, &engine, &second, &obstacles).unwrap().run().unwrap();

    assert!(first.blob(Slot::Region, config.nstep() - 1).is_some());
    assert_same_blobs(&first, &second, config.nstep());
}

#[test]
fn test_interrupted_run_resumes_to_the_same_result() {
    let config = config();
    let engine = SphericalEngine::new();
    let obstacles = island();

    let reference = MemoryCheckpointStore::new();
    let expected = Stepper::new(&config, &engine, &reference, &obstacles)
        .unwrap()
        .run()
        .unwrap();

    // Stop after a few steps, as if the process had been killed.
    let interrupted = MemoryCheckpointStore::new();
    {
        let mut stepper = Stepper::new(&config, &engine, &interrupted, &obstacles).unwrap();
        for _ in 0..4 {
            stepper.advance().unwrap();
        }
        assert_eq!(stepper.next_step(), 4);
    }
    let resumed = Stepper::new(&config, &engine, &interrupted, &obstacles)
        .unwrap()
        .run()
        .unwrap();

    assert_eq!(resumed.resumed, 4);
    assert_eq!(resumed.computed, config.nstep() - 4);
    assert_eq!(resumed.region, expected.region);
    assert_same_blobs(&reference, &interrupted, config.nstep());
}

#[test]
fn test_lost_tail_is_recomputed_identically() {
    let config = config();
    let engine = SphericalEngine::new();
    let obstacles = island();

    let reference = MemoryCheckpointStore::new();
    Stepper::new(&config, &engine, &reference, &obstacles).unwrap().run().unwrap();

    let truncated = MemoryCheckpointStore::new();
    Stepper::new(&config, &engine, &truncated, &obstacles).unwrap().run().unwrap();
    truncated.truncate(5);
    assert!(truncated.blob(Slot::Region, 5).is_none());
    assert!(truncated.blob(Slot::RelevantObstacles, 6).is_none());

    let summary = Stepper::new(&config, &engine, &truncated, &obstacles)
        .unwrap()
        .run()
        .unwrap();
    assert_eq!(summary.resumed, 5);
    assert_same_blobs(&reference, &truncated, config.nstep());
}
