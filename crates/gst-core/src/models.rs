//! Core geometry and dataset models.

use std::fmt;

use geo::{
    Area, BoundingRect, Contains, Coord, Geometry, LineString, MultiLineString, MultiPolygon,
    Point, Polygon, Rect,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::{GstError, Result};

/// Geometry kinds a sailing run ever handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShapeKind {
    Point,
    LineString,
    MultiLineString,
    Polygon,
    MultiPolygon,
}

impl fmt::Display for ShapeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ShapeKind::Point => "Point",
            ShapeKind::LineString => "LineString",
            ShapeKind::MultiLineString => "MultiLineString",
            ShapeKind::Polygon => "Polygon",
            ShapeKind::MultiPolygon => "MultiPolygon",
        };
        f.write_str(name)
    }
}

/// A geometry value in longitude/latitude degrees.
///
/// Closed over the five kinds the pipeline produces; anything else is
/// rejected when converting from [`geo::Geometry`].
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Point(Point<f64>),
    LineString(LineString<f64>),
    MultiLineString(MultiLineString<f64>),
    Polygon(Polygon<f64>),
    MultiPolygon(MultiPolygon<f64>),
}

impl Shape {
    pub fn empty_polygonal() -> Self {
        Shape::MultiPolygon(MultiPolygon::new(Vec::new()))
    }

    pub fn kind(&self) -> ShapeKind {
        match self {
            Shape::Point(_) => ShapeKind::Point,
            Shape::LineString(_) => ShapeKind::LineString,
            Shape::MultiLineString(_) => ShapeKind::MultiLineString,
            Shape::Polygon(_) => ShapeKind::Polygon,
            Shape::MultiPolygon(_) => ShapeKind::MultiPolygon,
        }
    }

    pub fn is_polygonal(&self) -> bool {
        matches!(self, Shape::Polygon(_) | Shape::MultiPolygon(_))
    }

    pub fn is_linear(&self) -> bool {
        matches!(self, Shape::LineString(_) | Shape::MultiLineString(_))
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Shape::Point(p) => !(p.x().is_finite() && p.y().is_finite()),
            Shape::LineString(ls) => ls.0.is_empty(),
            Shape::MultiLineString(mls) => mls.0.iter().all(|ls| ls.0.is_empty()),
            Shape::Polygon(p) => p.exterior().0.is_empty(),
            Shape::MultiPolygon(mp) => mp.0.iter().all(|p| p.exterior().0.is_empty()),
        }
    }

    /// Every polygon in the shape; non-polygonal shapes yield nothing.
    pub fn polygons(&self) -> Vec<Polygon<f64>> {
        match self {
            Shape::Polygon(p) => vec![p.clone()],
            Shape::MultiPolygon(mp) => mp.0.clone(),
            _ => Vec::new(),
        }
    }

    /// Every line in the shape, polygon rings included.
    pub fn lines(&self) -> Vec<LineString<f64>> {
        match self {
            Shape::Point(_) => Vec::new(),
            Shape::LineString(ls) => vec![ls.clone()],
            Shape::MultiLineString(mls) => mls.0.clone(),
            Shape::Polygon(p) => polygon_rings(p),
            Shape::MultiPolygon(mp) => mp.0.iter().flat_map(polygon_rings).collect(),
        }
    }

    pub fn to_multi_polygon(&self) -> Result<MultiPolygon<f64>> {
        match self {
            Shape::Polygon(p) => Ok(MultiPolygon::new(vec![p.clone()])),
            Shape::MultiPolygon(mp) => Ok(mp.clone()),
            other => Err(GstError::unexpected(
                "Polygon or MultiPolygon",
                other.kind().to_string(),
            )),
        }
    }

    pub fn to_multi_line_string(&self) -> Result<MultiLineString<f64>> {
        match self {
            Shape::LineString(ls) => Ok(MultiLineString::new(vec![ls.clone()])),
            Shape::MultiLineString(mls) => Ok(mls.clone()),
            other => Err(GstError::unexpected(
                "LineString or MultiLineString",
                other.kind().to_string(),
            )),
        }
    }

    pub fn bounds(&self) -> Option<Rect<f64>> {
        match self {
            Shape::Point(p) if !self.is_empty() => Some(p.bounding_rect()),
            Shape::Point(_) => None,
            Shape::LineString(ls) => ls.bounding_rect(),
            Shape::MultiLineString(mls) => mls.bounding_rect(),
            Shape::Polygon(p) => p.bounding_rect(),
            Shape::MultiPolygon(mp) => mp.bounding_rect(),
        }
    }

    /// Planar area in square degrees.
    pub fn area(&self) -> f64 {
        match self {
            Shape::Polygon(p) => p.unsigned_area(),
            Shape::MultiPolygon(mp) => mp.unsigned_area(),
            _ => 0.0,
        }
    }

    pub fn point_count(&self) -> usize {
        match self {
            Shape::Point(_) => 1,
            _ => self.lines().iter().map(|ls| ls.0.len()).sum(),
        }
    }

    pub fn polygon_count(&self) -> usize {
        match self {
            Shape::Polygon(_) => 1,
            Shape::MultiPolygon(mp) => mp.0.len(),
            _ => 0,
        }
    }

    pub fn contains_point(&self, point: &Point<f64>) -> bool {
        match self {
            Shape::Polygon(p) => p.contains(point),
            Shape::MultiPolygon(mp) => mp.contains(point),
            _ => false,
        }
    }
}

fn polygon_rings(polygon: &Polygon<f64>) -> Vec<LineString<f64>> {
    std::iter::once(polygon.exterior().clone())
        .chain(polygon.interiors().iter().cloned())
        .collect()
}

impl From<Point<f64>> for Shape {
    fn from(value: Point<f64>) -> Self {
        Shape::Point(value)
    }
}

impl From<MultiPolygon<f64>> for Shape {
    fn from(value: MultiPolygon<f64>) -> Self {
        Shape::MultiPolygon(value)
    }
}

impl From<MultiLineString<f64>> for Shape {
    fn from(value: MultiLineString<f64>) -> Self {
        Shape::MultiLineString(value)
    }
}

impl TryFrom<Geometry<f64>> for Shape {
    type Error = GstError;

    fn try_from(value: Geometry<f64>) -> Result<Self> {
        match value {
            Geometry::Point(p) => Ok(Shape::Point(p)),
            Geometry::LineString(ls) => Ok(Shape::LineString(ls)),
            Geometry::MultiLineString(mls) => Ok(Shape::MultiLineString(mls)),
            Geometry::Polygon(p) => Ok(Shape::Polygon(p)),
            Geometry::MultiPolygon(mp) => Ok(Shape::MultiPolygon(mp)),
            other => Err(GstError::unexpected(
                "Point, LineString, MultiLineString, Polygon or MultiPolygon",
                geometry_name(&other),
            )),
        }
    }
}

fn geometry_name(geometry: &Geometry<f64>) -> &'static str {
    match geometry {
        Geometry::Point(_) => "Point",
        Geometry::Line(_) => "Line",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// One feature of a raw dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub shape: Shape,
    pub attributes: Map<String, Value>,
}

impl Record {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            attributes: Map::new(),
        }
    }

    pub fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Look up a string attribute, trying the key as given, lowercase and uppercase.
    pub fn attribute_str(&self, key: &str) -> Option<&str> {
        [key.to_string(), key.to_lowercase(), key.to_uppercase()]
            .iter()
            .find_map(|k| self.attributes.get(k))
            .and_then(Value::as_str)
    }
}

/// Raw dataset categories the builder reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Land,
    MinorIslands,
    RiversLakeCenterlines,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Land => "land",
            Category::MinorIslands => "minor_islands",
            Category::RiversLakeCenterlines => "rivers_lake_centerlines",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dataset resolution tier, crude to full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resolution {
    #[serde(rename = "c")]
    Crude,
    #[serde(rename = "l")]
    Low,
    #[serde(rename = "i")]
    Intermediate,
    #[serde(rename = "h")]
    High,
    #[serde(rename = "f")]
    Full,
}

impl Resolution {
    pub fn code(&self) -> &'static str {
        match self {
            Resolution::Crude => "c",
            Resolution::Low => "l",
            Resolution::Intermediate => "i",
            Resolution::High => "h",
            Resolution::Full => "f",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "c" => Some(Resolution::Crude),
            "l" => Some(Resolution::Low),
            "i" => Some(Resolution::Intermediate),
            "h" => Some(Resolution::High),
            "f" => Some(Resolution::Full),
            _ => None,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The whole longitude/latitude domain.
pub fn world_rect() -> Rect<f64> {
    Rect::new(
        Coord { x: -180.0, y: -90.0 },
        Coord { x: 180.0, y: 90.0 },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon, MultiPoint};

    #[test]
    fn rejects_unsupported_geometry_kinds() {
        let mp = MultiPoint::from(vec![(0.0, 0.0), (1.0, 1.0)]);
        let err = Shape::try_from(Geometry::MultiPoint(mp)).unwrap_err();
        assert!(matches!(
            err,
            GstError::UnexpectedGeometryKind { ref found, .. } if found == "MultiPoint"
        ));
    }

    #[test]
    fn polygon_lines_include_holes() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 4.0, y: 0.0), (x: 4.0, y: 4.0), (x: 0.0, y: 4.0)],
            interiors: [[(x: 1.0, y: 1.0), (x: 2.0, y: 1.0), (x: 2.0, y: 2.0), (x: 1.0, y: 2.0)]],
        );
        let shape = Shape::Polygon(poly);
        assert_eq!(shape.lines().len(), 2);
        assert!((shape.area() - 15.0).abs() < 1e-12);
        assert!(shape.contains_point(&Point::from(coord! { x: 3.0, y: 3.0 })));
        assert!(!shape.contains_point(&Point::from(coord! { x: 1.5, y: 1.5 })));
    }

    #[test]
    fn attribute_lookup_is_case_insensitive() {
        let record = Record::new(Shape::empty_polygonal()).with_attribute("NAME", "Suez Canal");
        assert_eq!(record.attribute_str("name"), Some("Suez Canal"));
        assert_eq!(record.attribute_str("Name"), Some("Suez Canal"));
        assert_eq!(record.attribute_str("featurecla"), None);
    }

    #[test]
    fn empty_shapes_are_detected() {
        assert!(Shape::empty_polygonal().is_empty());
        assert!(Shape::Point(Point::new(f64::NAN, f64::NAN)).is_empty());
        assert!(!Shape::Point(Point::new(0.0, 0.0)).is_empty());
    }
}
