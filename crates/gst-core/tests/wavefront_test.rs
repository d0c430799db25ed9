//! Wavefront expansion against synthetic coastlines.
//!
//! Run with: cargo test --test wavefront_test

use std::path::Path;

use geo::{line_string, polygon, Area, BooleanOps, MultiPolygon, Point, Polygon};
use gst_core::models::{Category, Record, Shape};
use gst_core::{
    MemoryCheckpointStore, MemoryProvider, ObstacleBuilder, SailConfig, SphericalEngine, StoreLayout,
    Stepper,
};
use serde_json::json;

fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Polygon<f64> {
    polygon![(x: x0, y: y0), (x: x1, y: y0), (x: x1, y: y1), (x: x0, y: y1)]
}

const START: (f64, f64) = (-1.0, 50.7);

fn coastline() -> Polygon<f64> {
    rect(-10.0, 51.0, 10.0, 60.0)
}

/// Sail `config` against the coastline, checking every step on the way.
fn sail_to_coastline(config: &SailConfig) -> Shape {
    let land = coastline();
    let engine = SphericalEngine::new();
    let store = MemoryCheckpointStore::new();
    let start = Point::new(START.0, START.1);
    let mut stepper = Stepper::new(config, &engine, &store, std::slice::from_ref(&land)).unwrap();

    let mut last_area = 0.0;
    let mut steps = 0;
    while let Some(report) = stepper.advance().unwrap() {
        assert!(stepper.region().contains_point(&start), "step {}", report.step);
        assert!(report.area >= last_area - 1.0e-9, "step {} shrank", report.step);
        last_area = report.area;
        steps += 1;
    }
    assert_eq!(steps, config.nstep());
    stepper.region().clone()
}

fn assert_stopped_by_coastline(config: &SailConfig, region: &Shape) {
    let polygons = region.to_multi_polygon().unwrap();
    assert!(region.contains_point(&Point::new(-1.0, 49.0)));
    assert!(!region.contains_point(&Point::new(-1.0, 52.0)));

    let on_land = polygons
        .intersection(&MultiPolygon::new(vec![coastline()]))
        .unsigned_area();
    assert!(on_land < 1.0e-6, "region overlaps land by {on_land}");

    // 444 km of open sea in every direction would span about 8 degrees of latitude.
    let bounds = region.bounds().unwrap();
    assert!(bounds.max().y <= 51.0 + 1.0e-6, "{bounds:?}");
    assert!(bounds.min().y < 47.5, "{bounds:?}");

    // The coastline cuts away nearly half of the unobstructed disc.
    let radius_deg = config.max_distance_m() / gst_core::spatial::METRES_PER_DEGREE;
    let start_lat: f64 = START.1;
    let open_sea = std::f64::consts::PI * radius_deg * radius_deg / start_lat.to_radians().cos();
    assert!(region.area() < 0.75 * open_sea);
}

/// Half a day at 20 knots from the Solent, with a coastline 0.3 degrees north.
#[test]
fn test_coastline_stops_the_wavefront() {
    let config = SailConfig {
        duration_days: 0.5,
        ..SailConfig::new(START.0, START.1, 20.0)
    };
    assert!((config.max_distance_m() - 444_480.0).abs() < 1.0e-6);
    assert_eq!(config.nstep(), 44);

    let region = sail_to_coastline(&config);
    assert_stopped_by_coastline(&config, &region);
}

#[test]
fn test_coarse_steps_agree_with_the_coastline() {
    let config = SailConfig {
        duration_days: 0.5,
        precision_m: 40_000.0,
        land_frequency: 5,
        simplify_frequency: 4,
        ..SailConfig::new(START.0, START.1, 20.0)
    };
    assert_eq!(config.nstep(), 11);

    let region = sail_to_coastline(&config);
    assert_stopped_by_coastline(&config, &region);
}

fn wall_and_canal() -> MemoryProvider {
    let wall = Record::new(Shape::Polygon(rect(0.3, -3.0, 0.4, 3.0)));
    let canal = Record::new(Shape::LineString(line_string![
        (x: 0.2, y: 0.0),
        (x: 0.5, y: 0.0),
    ]))
    .with_attribute("name", json!("Test Canal"));
    MemoryProvider::new()
        .with_records(Category::Land, vec![wall])
        .with_records(Category::RiversLakeCenterlines, vec![canal])
}

fn sail_past_wall(root: &Path, canals: Vec<String>) -> Shape {
    let config = SailConfig {
        duration_days: 0.2,
        canals,
        ..SailConfig::new(0.0, 0.0, 20.0)
    };
    let provider = wall_and_canal();
    let engine = SphericalEngine::new();
    let layout = StoreLayout::new(root, &config);
    let datasets = ObstacleBuilder::new(&provider, &engine, &config)
        .threads(Some(2))
        .prepare(&layout)
        .unwrap();

    let store = MemoryCheckpointStore::new();
    Stepper::new(&config, &engine, &store, &datasets.mask)
        .unwrap()
        .run()
        .unwrap()
        .region
}

#[test]
fn test_canal_opens_a_passage_through_land() {
    let east = Point::new(0.7, 0.0);

    let dir = tempfile::tempdir().unwrap();
    let through_canal = sail_past_wall(dir.path(), vec!["Test Canal".to_string()]);
    assert!(through_canal.contains_point(&east));

    let dir = tempfile::tempdir().unwrap();
    let blocked = sail_past_wall(dir.path(), Vec::new());
    assert!(!blocked.contains_point(&east));
    assert!(blocked.contains_point(&Point::new(0.1, 0.0)));
}

#[test]
fn test_canal_sets_sharing_a_root_keep_their_own_masks() {
    let east = Point::new(0.7, 0.0);
    let dir = tempfile::tempdir().unwrap();

    let blocked = sail_past_wall(dir.path(), Vec::new());
    assert!(!blocked.contains_point(&east));

    let through_canal = sail_past_wall(dir.path(), vec!["Test Canal".to_string()]);
    assert!(through_canal.contains_point(&east));

    let blocked_again = sail_past_wall(dir.path(), Vec::new());
    assert_eq!(blocked_again, blocked);
}
