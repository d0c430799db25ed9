//! Interior-ring handling for regions and obstacle masks.

use geo::{Centroid, LineString, MultiPolygon, Point, Polygon};

use crate::engine::union_polygons;
use crate::spatial::coord_distance;

/// Fill every hole. Polygons that end up overlapping are merged.
pub fn remove_interior_rings(mp: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    if mp.0.iter().all(|p| p.interiors().is_empty()) {
        return mp.clone();
    }
    union_polygons(
        mp.0.iter()
            .map(|p| Polygon::new(p.exterior().clone(), Vec::new()))
            .collect(),
    )
}

/// Fill holes of a reachable region unless they outline an obstacle.
///
/// A hole is kept when its centroid lies within `match_distance_m` of the
/// centroid of one of `obstacle_centroids`; every other hole is an
/// unreachable pocket of sea and gets filled.
pub fn remove_interior_rings_except_obstacles(
    mp: &MultiPolygon<f64>,
    obstacle_centroids: &[Point<f64>],
    match_distance_m: f64,
) -> MultiPolygon<f64> {
    if mp.0.iter().all(|p| p.interiors().is_empty()) {
        return mp.clone();
    }

    let matches_obstacle = |hole: &LineString<f64>| {
        let Some(centroid) = Polygon::new(hole.clone(), Vec::new()).centroid() else {
            return false;
        };
        obstacle_centroids
            .iter()
            .any(|c| coord_distance(centroid.0, c.0) <= match_distance_m)
    };

    let mut stripped = 0usize;
    let polygons: Vec<Polygon<f64>> = mp
        .0
        .iter()
        .map(|p| {
            let kept: Vec<LineString<f64>> = p
                .interiors()
                .iter()
                .filter(|hole| matches_obstacle(hole))
                .cloned()
                .collect();
            stripped += p.interiors().len() - kept.len();
            Polygon::new(p.exterior().clone(), kept)
        })
        .collect();

    if stripped == 0 {
        return mp.clone();
    }
    tracing::debug!(stripped, "filled interior rings not matching an obstacle");
    union_polygons(polygons)
}
