//! Selection of the obstacles a region could meet within one epoch.

use geo::{Area, BooleanOps, BoundingRect, Centroid, Intersects, MultiPolygon, Point, Polygon, Rect};

use crate::engine::union_polygons;
use crate::models::{world_rect, Shape};

/// Relative area below which an obstacle counts as wholly inside the region.
const CONTAINMENT_EPSILON: f64 = 1.0e-9;

/// The obstacles of one epoch, in the forms the stepper needs.
#[derive(Debug, Clone)]
pub struct RelevantObstacles {
    pub polygons: Vec<Polygon<f64>>,
    /// Union of `polygons`, subtracted from the region every step.
    pub merged: Shape,
    /// Centroid of each polygon, for matching region holes.
    pub centroids: Vec<Point<f64>>,
}

impl RelevantObstacles {
    pub fn new(polygons: Vec<Polygon<f64>>) -> Self {
        let merged = Shape::MultiPolygon(union_polygons(polygons.clone()));
        let centroids = polygons.iter().filter_map(|p| p.centroid()).collect();
        Self {
            polygons,
            merged,
            centroids,
        }
    }

    pub fn from_shape(shape: &Shape) -> Self {
        Self::new(shape.polygons())
    }

    pub fn to_shape(&self) -> Shape {
        Shape::MultiPolygon(MultiPolygon::new(self.polygons.clone()))
    }

    pub fn len(&self) -> usize {
        self.polygons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.polygons.is_empty()
    }
}

fn rects_overlap(a: &Rect<f64>, b: &Rect<f64>) -> bool {
    a.min().x <= b.max().x
        && b.min().x <= a.max().x
        && a.min().y <= b.max().y
        && b.min().y <= a.max().y
}

fn rect_within(inner: &Rect<f64>, outer: &Rect<f64>) -> bool {
    inner.min().x >= outer.min().x
        && inner.max().x <= outer.max().x
        && inner.min().y >= outer.min().y
        && inner.max().y <= outer.max().y
}

/// Keep the obstacles that touch `reach` and are not already inside `region`.
///
/// `reach` is `None` when the reachable distance covers the whole globe.
pub fn filter_relevant(
    region: &Shape,
    reach: Option<&MultiPolygon<f64>>,
    obstacles: &[Polygon<f64>],
) -> Vec<Polygon<f64>> {
    let reach_rect = reach
        .map(|r| r.bounding_rect())
        .unwrap_or_else(|| Some(world_rect()));
    let Some(reach_rect) = reach_rect else {
        return Vec::new();
    };

    let inside = match region {
        Shape::Polygon(_) | Shape::MultiPolygon(_) => region.to_multi_polygon().ok(),
        _ => None,
    };
    let inside_rect = inside.as_ref().and_then(|r| r.bounding_rect());

    obstacles
        .iter()
        .filter(|obstacle| {
            let Some(rect) = obstacle.bounding_rect() else {
                return false;
            };
            if !rects_overlap(&rect, &reach_rect) {
                return false;
            }
            if let Some(reach) = reach {
                if !reach.intersects(*obstacle) {
                    return false;
                }
            }
            match (&inside, &inside_rect) {
                (Some(inside), Some(inside_rect)) if rect_within(&rect, inside_rect) => {
                    !wholly_within(obstacle, inside)
                }
                _ => true,
            }
        })
        .cloned()
        .collect()
}

fn wholly_within(obstacle: &Polygon<f64>, region: &MultiPolygon<f64>) -> bool {
    let area = obstacle.unsigned_area();
    let outside = MultiPolygon::new(vec![obstacle.clone()])
        .difference(region)
        .unsigned_area();
    outside <= CONTAINMENT_EPSILON * area.max(f64::MIN_POSITIVE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;

    fn square(x: f64, y: f64, size: f64) -> Polygon<f64> {
        polygon![
            (x: x, y: y),
            (x: x + size, y: y),
            (x: x + size, y: y + size),
            (x: x, y: y + size),
        ]
    }

    #[test]
    fn drops_obstacles_beyond_reach() {
        let region = Shape::Point(Point::new(0.0, 0.0));
        let reach = MultiPolygon::new(vec![square(-5.0, -5.0, 10.0)]);
        let near = square(2.0, 2.0, 1.0);
        let far = square(20.0, 20.0, 1.0);
        let kept = filter_relevant(&region, Some(&reach), &[near.clone(), far]);
        assert_eq!(kept, vec![near]);
    }

    #[test]
    fn drops_obstacles_already_inside_the_region() {
        let region = Shape::MultiPolygon(MultiPolygon::new(vec![square(0.0, 0.0, 10.0)]));
        let reach = MultiPolygon::new(vec![square(-5.0, -5.0, 20.0)]);
        let enclosed = square(4.0, 4.0, 1.0);
        let straddling = square(9.5, 4.0, 1.0);
        let kept = filter_relevant(&region, Some(&reach), &[enclosed, straddling.clone()]);
        assert_eq!(kept, vec![straddling]);
    }

    #[test]
    fn whole_globe_reach_keeps_everything_outside() {
        let region = Shape::Point(Point::new(0.0, 0.0));
        let obstacles = vec![square(100.0, 50.0, 1.0), square(-170.0, -60.0, 1.0)];
        assert_eq!(filter_relevant(&region, None, &obstacles).len(), 2);
    }

    #[test]
    fn relevant_set_carries_merged_union_and_centroids() {
        let relevant = RelevantObstacles::new(vec![square(0.0, 0.0, 2.0), square(1.0, 1.0, 2.0)]);
        assert_eq!(relevant.len(), 2);
        assert_eq!(relevant.merged.polygon_count(), 1);
        let c = relevant.centroids[0];
        assert!((c.x() - 1.0).abs() < 1e-12 && (c.y() - 1.0).abs() < 1e-12);
    }
}
