//! Geometry operations on longitude/latitude shapes.
//!
//! The [`GeometryEngine`] trait is the seam between the reachability
//! pipeline and the geometry kernel. [`SphericalEngine`] buffers on a
//! spherical Earth and delegates boolean operations to `geo`.

use geo::orient::{Direction, Orient};
use geo::{
    BooleanOps, BoundingRect, Contains, ConvexHull, Coord, LineString, MultiLineString,
    MultiPoint, MultiPolygon, Point, Polygon, Simplify, Translate,
};

use crate::errors::{GstError, Result};
use crate::models::{world_rect, Shape};
use crate::rings::remove_interior_rings;
use crate::spatial::{circle_points, dedup_coords, densify, enclosed_pole};

/// Tuning for one buffer operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferParams {
    /// Directions sampled around every vertex.
    pub angular_resolution: usize,
    /// Maximum vertex spacing before buffering, in degrees.
    pub fill_deg: Option<f64>,
    /// Simplification applied to the result, in degrees.
    pub simplify_deg: Option<f64>,
    /// Vertices closer than this are merged, in degrees.
    pub tolerance_deg: f64,
    pub keep_interiors: bool,
}

impl BufferParams {
    pub fn new(angular_resolution: usize, tolerance_deg: f64) -> Self {
        Self {
            angular_resolution,
            fill_deg: None,
            simplify_deg: None,
            tolerance_deg,
            keep_interiors: false,
        }
    }

    pub fn fill(mut self, fill_deg: f64) -> Self {
        self.fill_deg = (fill_deg > 0.0).then_some(fill_deg);
        self
    }

    pub fn simplify(mut self, simplify_deg: f64) -> Self {
        self.simplify_deg = (simplify_deg > 0.0).then_some(simplify_deg);
        self
    }

    pub fn keep_interiors(mut self, keep: bool) -> Self {
        self.keep_interiors = keep;
        self
    }
}

pub trait GeometryEngine: Send + Sync {
    /// Grow `shape` outward by `distance_m` meters along great circles.
    fn buffer(&self, shape: &Shape, distance_m: f64, params: &BufferParams) -> Result<Shape>;

    /// Union of polygonal shapes. Points are absorbed.
    fn union(&self, shapes: &[Shape]) -> Result<Shape>;

    /// `shape` minus the polygonal `obstacle`. Lines are clipped; a covered
    /// point leaves an empty shape.
    fn difference(&self, shape: &Shape, obstacle: &Shape) -> Result<Shape>;

    fn simplify(&self, shape: &Shape, tolerance_deg: f64) -> Shape;

    /// Describe every validity problem; empty when valid.
    fn check(&self, shape: &Shape) -> Vec<String>;

    /// Drop unusable coordinates and rings, then normalise.
    fn repair(&self, shape: &Shape) -> Result<Shape>;
}

/// Buffering on a sphere of radius [`crate::spatial::EARTH_RADIUS_M`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SphericalEngine {
    debug: bool,
}

impl SphericalEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate every produced geometry and fail on the first problem.
    pub fn with_checks(debug: bool) -> Self {
        Self { debug }
    }

    fn checked(&self, operation: &'static str, shape: Shape) -> Result<Shape> {
        if self.debug {
            let problems = self.check(&shape);
            if !problems.is_empty() {
                return Err(GstError::InvalidGeometry {
                    operation,
                    problems: problems.join("; "),
                });
            }
        }
        Ok(shape)
    }

    fn line_pieces(
        &self,
        line: &LineString<f64>,
        distance_m: f64,
        params: &BufferParams,
    ) -> Vec<MultiPolygon<f64>> {
        let line = match params.fill_deg {
            Some(fill) => densify(line, fill),
            None => line.clone(),
        };
        let coords = dedup_coords(&line.0, params.tolerance_deg);
        let discs: Vec<Disc> = coords
            .iter()
            .map(|c| Disc::around(*c, distance_m, params.angular_resolution))
            .collect();

        let mut pieces = Vec::with_capacity(discs.len());
        for disc in &discs {
            if let Disc::Cap(cap) = disc {
                pieces.push(cap.clone());
            }
        }
        if let [Disc::Ring(ring)] = discs.as_slice() {
            pieces.push(fold_into_world(ring_polygon(ring)));
        }
        for pair in discs.windows(2) {
            match (&pair[0], &pair[1]) {
                (Disc::Ring(a), Disc::Ring(b)) => pieces.push(fold_into_world(hull(a, b))),
                (Disc::Ring(ring), Disc::Cap(_)) | (Disc::Cap(_), Disc::Ring(ring)) => {
                    pieces.push(fold_into_world(ring_polygon(ring)))
                }
                (Disc::Cap(_), Disc::Cap(_)) => {}
            }
        }
        pieces
    }
}

/// Buffered footprint of one vertex.
enum Disc {
    /// Ring with longitudes continuous around the vertex.
    Ring(Vec<Coord<f64>>),
    /// Circle enclosing a pole, already folded into the world.
    Cap(MultiPolygon<f64>),
}

impl Disc {
    fn around(center: Coord<f64>, distance_m: f64, n: usize) -> Self {
        let ring = circle_points(center, distance_m, n);
        match enclosed_pole(center, distance_m) {
            None => Disc::Ring(ring),
            Some(pole_lat) => Disc::Cap(fold_into_world(polar_cap(ring, pole_lat))),
        }
    }
}

fn ring_polygon(ring: &[Coord<f64>]) -> Polygon<f64> {
    Polygon::new(LineString::new(ring.to_vec()), Vec::new())
}

/// Convex hull of two vertex rings, the second shifted next to the first.
fn hull(a: &[Coord<f64>], b: &[Coord<f64>]) -> Polygon<f64> {
    let shift = match (a.first(), b.first()) {
        (Some(ca), Some(cb)) => 360.0 * ((ca.x - cb.x) / 360.0).round(),
        _ => 0.0,
    };
    let points: Vec<Point<f64>> = a
        .iter()
        .copied()
        .chain(b.iter().map(|c| Coord {
            x: c.x + shift,
            y: c.y,
        }))
        .map(Point::from)
        .collect();
    MultiPoint::new(points).convex_hull()
}

/// Close a pole-enclosing ring along the pole so it bounds the cap.
fn polar_cap(mut ring: Vec<Coord<f64>>, pole_lat: f64) -> Polygon<f64> {
    let (Some(first), Some(last)) = (ring.first().copied(), ring.last().copied()) else {
        return Polygon::new(LineString::new(Vec::new()), Vec::new());
    };
    let turn = if last.x >= first.x { 360.0 } else { -360.0 };
    let end_x = first.x + turn;
    ring.push(Coord {
        x: end_x,
        y: first.y,
    });
    ring.push(Coord {
        x: end_x,
        y: pole_lat,
    });
    ring.push(Coord {
        x: first.x,
        y: pole_lat,
    });
    Polygon::new(LineString::new(ring), Vec::new())
}

/// Move the parts of a polygon lying past ±180 back into the world.
pub fn fold_into_world(polygon: Polygon<f64>) -> MultiPolygon<f64> {
    let Some(rect) = polygon.bounding_rect() else {
        return MultiPolygon::new(Vec::new());
    };
    if rect.min().x >= -180.0 && rect.max().x <= 180.0 {
        return MultiPolygon::new(vec![polygon]);
    }

    let world = MultiPolygon::new(vec![world_rect().to_polygon()]);
    let mut pieces = Vec::new();
    for turns in -2..=2 {
        let shift = 360.0 * f64::from(turns);
        if rect.max().x + shift <= -180.0 || rect.min().x + shift >= 180.0 {
            continue;
        }
        let moved = MultiPolygon::new(vec![polygon.translate(shift, 0.0)]);
        pieces.extend(moved.intersection(&world).0);
    }
    MultiPolygon::new(pieces)
}

/// Union of many polygon sets by pairwise reduction in input order.
///
/// Each input must be valid on its own; inputs may overlap one another.
pub fn union_all(parts: Vec<MultiPolygon<f64>>) -> MultiPolygon<f64> {
    let mut parts: Vec<MultiPolygon<f64>> =
        parts.into_iter().filter(|p| !p.0.is_empty()).collect();
    if parts.len() == 1 {
        return parts[0].union(&MultiPolygon::new(Vec::new()));
    }
    while parts.len() > 1 {
        let mut next = Vec::with_capacity(parts.len() / 2 + 1);
        let mut iter = parts.into_iter();
        while let Some(a) = iter.next() {
            match iter.next() {
                Some(b) => next.push(a.union(&b)),
                None => next.push(a),
            }
        }
        parts = next;
    }
    parts.pop().unwrap_or_else(|| MultiPolygon::new(Vec::new()))
}

/// Union polygons one by one so overlapping members are merged.
pub fn union_polygons(polygons: Vec<Polygon<f64>>) -> MultiPolygon<f64> {
    union_all(
        polygons
            .into_iter()
            .map(|p| MultiPolygon::new(vec![p]))
            .collect(),
    )
}

fn oriented(mp: MultiPolygon<f64>) -> MultiPolygon<f64> {
    mp.orient(Direction::Default)
}

fn simplify_polygons(mp: &MultiPolygon<f64>, tolerance_deg: f64) -> MultiPolygon<f64> {
    union_polygons(mp.simplify(&tolerance_deg).0)
}

/// Drop segments lying along the edge of the longitude/latitude domain.
pub fn remove_domain_edges(lines: &MultiLineString<f64>, eps: f64) -> MultiLineString<f64> {
    let on_edge = |a: &Coord<f64>, b: &Coord<f64>| {
        let lon_edge = |c: &Coord<f64>| 180.0 - c.x.abs() <= eps;
        let lat_edge = |c: &Coord<f64>| 90.0 - c.y.abs() <= eps;
        (lon_edge(a) && lon_edge(b) && a.x.signum() == b.x.signum())
            || (lat_edge(a) && lat_edge(b) && a.y.signum() == b.y.signum())
    };

    let mut out = Vec::new();
    for line in &lines.0 {
        let mut run: Vec<Coord<f64>> = Vec::new();
        for pair in line.0.windows(2) {
            if on_edge(&pair[0], &pair[1]) {
                if run.len() > 1 {
                    out.push(LineString::new(std::mem::take(&mut run)));
                }
                run.clear();
                continue;
            }
            if run.is_empty() {
                run.push(pair[0]);
            }
            run.push(pair[1]);
        }
        if run.len() > 1 {
            out.push(LineString::new(run));
        }
    }
    MultiLineString::new(out)
}

fn ring_problems(ring: &LineString<f64>, label: &str, problems: &mut Vec<String>) {
    if ring.0.len() < 4 {
        problems.push(format!("{label} has {} coordinates", ring.0.len()));
    }
    if !ring.is_closed() {
        problems.push(format!("{label} is not closed"));
    }
}

fn coord_problems(shape: &Shape, problems: &mut Vec<String>) {
    const SLACK: f64 = 1.0e-9;
    for line in shape.lines() {
        for c in &line.0 {
            if !(c.x.is_finite() && c.y.is_finite()) {
                problems.push("non-finite coordinate".to_string());
                return;
            }
            if c.x.abs() > 180.0 + SLACK || c.y.abs() > 90.0 + SLACK {
                problems.push(format!("coordinate ({}, {}) is outside the world", c.x, c.y));
                return;
            }
        }
    }
}

fn repair_ring(ring: &LineString<f64>, tolerance_deg: f64) -> Option<LineString<f64>> {
    let mut coords = dedup_coords(&ring.0, tolerance_deg);
    if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
        if first != last {
            coords.push(first);
        }
    }
    (coords.len() >= 4).then(|| LineString::new(coords))
}

impl GeometryEngine for SphericalEngine {
    fn buffer(&self, shape: &Shape, distance_m: f64, params: &BufferParams) -> Result<Shape> {
        if !(distance_m > 0.0) || shape.is_empty() {
            return Ok(shape.clone());
        }

        let mut parts = Vec::new();
        match shape {
            Shape::Point(p) => parts.extend(self.line_pieces(
                &LineString::new(vec![p.0]),
                distance_m,
                params,
            )),
            Shape::LineString(_) | Shape::MultiLineString(_) => {
                for line in shape.lines() {
                    parts.extend(self.line_pieces(&line, distance_m, params));
                }
            }
            Shape::Polygon(_) | Shape::MultiPolygon(_) => {
                parts.push(shape.to_multi_polygon()?);
                for ring in shape.lines() {
                    parts.extend(self.line_pieces(&ring, distance_m, params));
                }
            }
        }

        let mut merged = union_all(parts);
        if !params.keep_interiors {
            merged = remove_interior_rings(&merged);
        }
        if let Some(tolerance) = params.simplify_deg {
            merged = simplify_polygons(&merged, tolerance);
        }
        self.checked("buffer", Shape::MultiPolygon(oriented(merged)))
    }

    fn union(&self, shapes: &[Shape]) -> Result<Shape> {
        let mut parts = Vec::with_capacity(shapes.len());
        for shape in shapes {
            match shape {
                Shape::Point(_) => {}
                Shape::Polygon(_) | Shape::MultiPolygon(_) => parts.push(shape.to_multi_polygon()?),
                other => {
                    return Err(GstError::unexpected(
                        "Polygon or MultiPolygon",
                        other.kind().to_string(),
                    ))
                }
            }
        }
        self.checked("union", Shape::MultiPolygon(oriented(union_all(parts))))
    }

    fn difference(&self, shape: &Shape, obstacle: &Shape) -> Result<Shape> {
        let obstacle = obstacle.to_multi_polygon()?;
        match shape {
            Shape::Polygon(_) | Shape::MultiPolygon(_) => {
                let remaining = shape.to_multi_polygon()?.difference(&obstacle);
                self.checked("difference", Shape::MultiPolygon(oriented(remaining)))
            }
            Shape::LineString(_) | Shape::MultiLineString(_) => Ok(Shape::MultiLineString(
                obstacle.clip(&shape.to_multi_line_string()?, true),
            )),
            Shape::Point(p) if obstacle.contains(p) => Ok(Shape::empty_polygonal()),
            Shape::Point(_) => Ok(shape.clone()),
        }
    }

    fn simplify(&self, shape: &Shape, tolerance_deg: f64) -> Shape {
        if !(tolerance_deg > 0.0) {
            return shape.clone();
        }
        match shape {
            Shape::Point(_) => shape.clone(),
            Shape::LineString(ls) => Shape::LineString(ls.simplify(&tolerance_deg)),
            Shape::MultiLineString(mls) => Shape::MultiLineString(mls.simplify(&tolerance_deg)),
            Shape::Polygon(p) => Shape::MultiPolygon(oriented(simplify_polygons(
                &MultiPolygon::new(vec![p.clone()]),
                tolerance_deg,
            ))),
            Shape::MultiPolygon(mp) => {
                Shape::MultiPolygon(oriented(simplify_polygons(mp, tolerance_deg)))
            }
        }
    }

    fn check(&self, shape: &Shape) -> Vec<String> {
        let mut problems = Vec::new();
        coord_problems(shape, &mut problems);
        for (i, polygon) in shape.polygons().iter().enumerate() {
            ring_problems(polygon.exterior(), &format!("polygon {i} exterior"), &mut problems);
            for (j, hole) in polygon.interiors().iter().enumerate() {
                ring_problems(hole, &format!("polygon {i} interior {j}"), &mut problems);
            }
        }
        for (i, line) in shape.lines().iter().enumerate() {
            if shape.is_linear() && line.0.len() < 2 {
                problems.push(format!("line {i} has {} coordinates", line.0.len()));
            }
        }
        problems
    }

    fn repair(&self, shape: &Shape) -> Result<Shape> {
        const TOLERANCE: f64 = 0.0;
        let repaired = match shape {
            Shape::Point(_) => shape.clone(),
            Shape::LineString(_) | Shape::MultiLineString(_) => {
                let lines = shape
                    .lines()
                    .iter()
                    .map(|ls| LineString::new(dedup_coords(&ls.0, TOLERANCE)))
                    .filter(|ls| ls.0.len() >= 2)
                    .collect();
                Shape::MultiLineString(MultiLineString::new(lines))
            }
            Shape::Polygon(_) | Shape::MultiPolygon(_) => {
                let polygons = shape
                    .polygons()
                    .iter()
                    .filter_map(|p| {
                        let exterior = repair_ring(p.exterior(), TOLERANCE)?;
                        let interiors = p
                            .interiors()
                            .iter()
                            .filter_map(|r| repair_ring(r, TOLERANCE))
                            .collect();
                        Some(Polygon::new(exterior, interiors))
                    })
                    .collect();
                Shape::MultiPolygon(oriented(union_polygons(polygons)))
            }
        };
        self.checked("repair", repaired)
    }
}
