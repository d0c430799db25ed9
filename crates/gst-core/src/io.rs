//! Compressed WKB and GeoJSON persistence.
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never observes a partially written geometry.

use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use geo::{Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use crate::errors::{GstError, Result};
use crate::models::Shape;
use crate::wkb;

const GZIP_STREAM: &str = "<gzip stream>";

/// Gzip-compressed WKB bytes of a shape. The gzip header carries no timestamp.
pub fn encode_wkb_gz(shape: &Shape) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(&wkb::encode(shape))
        .map_err(GstError::io(GZIP_STREAM))?;
    encoder.finish().map_err(GstError::io(GZIP_STREAM))
}

pub fn decode_wkb_gz(bytes: &[u8]) -> Result<Shape> {
    let mut decoder = GzDecoder::new(bytes);
    let mut raw = Vec::new();
    decoder
        .read_to_end(&mut raw)
        .map_err(GstError::io(GZIP_STREAM))?;
    wkb::decode(&raw)
}

/// Write `bytes` to `path` through a temporary file in the same directory.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(GstError::io(parent))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(GstError::io(parent))?;
    tmp.write_all(bytes).map_err(GstError::io(path))?;
    tmp.as_file().sync_all().map_err(GstError::io(path))?;
    tmp.persist(path).map_err(|err| GstError::Io {
        path: path.to_path_buf(),
        source: err.error,
    })?;
    Ok(())
}

pub fn save_wkb_gz(path: &Path, shape: &Shape) -> Result<()> {
    write_atomic(path, &encode_wkb_gz(shape)?)
}

pub fn load_wkb_gz(path: &Path) -> Result<Shape> {
    let bytes = fs::read(path).map_err(GstError::io(path))?;
    decode_wkb_gz(&bytes)
}

/// Write a pretty-printed GeoJSON geometry next to a binary dataset.
pub fn save_geojson(path: &Path, shape: &Shape) -> Result<()> {
    let mut text = serde_json::to_string_pretty(&shape_to_geojson(shape))?;
    text.push('\n');
    write_atomic(path, text.as_bytes())
}

fn position(c: &Coord<f64>) -> Value {
    json!([c.x, c.y])
}

fn line_coords(ls: &LineString<f64>) -> Value {
    Value::Array(ls.0.iter().map(position).collect())
}

fn polygon_coords(p: &Polygon<f64>) -> Value {
    if p.exterior().0.is_empty() {
        return Value::Array(Vec::new());
    }
    Value::Array(
        std::iter::once(p.exterior())
            .chain(p.interiors())
            .map(line_coords)
            .collect(),
    )
}

pub fn shape_to_geojson(shape: &Shape) -> Value {
    match shape {
        Shape::Point(p) => json!({ "type": "Point", "coordinates": position(&p.0) }),
        Shape::LineString(ls) => json!({ "type": "LineString", "coordinates": line_coords(ls) }),
        Shape::MultiLineString(mls) => json!({
            "type": "MultiLineString",
            "coordinates": mls.0.iter().map(line_coords).collect::<Vec<_>>(),
        }),
        Shape::Polygon(p) => json!({ "type": "Polygon", "coordinates": polygon_coords(p) }),
        Shape::MultiPolygon(mp) => json!({
            "type": "MultiPolygon",
            "coordinates": mp.0.iter().map(polygon_coords).collect::<Vec<_>>(),
        }),
    }
}

fn malformed(detail: impl Into<String>) -> GstError {
    GstError::MalformedGeoJson(detail.into())
}

fn as_array<'a>(value: &'a Value, what: &str) -> Result<&'a Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| malformed(format!("{what} is not an array")))
}

fn parse_position(value: &Value) -> Result<Coord<f64>> {
    let items = as_array(value, "position")?;
    let x = items.first().and_then(Value::as_f64);
    let y = items.get(1).and_then(Value::as_f64);
    match (x, y) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(malformed("position needs two numbers")),
    }
}

fn parse_line(value: &Value) -> Result<LineString<f64>> {
    as_array(value, "line")?
        .iter()
        .map(parse_position)
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = as_array(value, "polygon")?
        .iter()
        .map(parse_line)
        .collect::<Result<Vec<_>>>()?
        .into_iter();
    let exterior = rings.next().unwrap_or_else(|| LineString::new(Vec::new()));
    Ok(Polygon::new(exterior, rings.collect()))
}

/// Parse a GeoJSON geometry object into a [`Shape`].
pub fn shape_from_geojson(value: &Value) -> Result<Shape> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| malformed("geometry has no type"))?;
    let coords = || {
        value
            .get("coordinates")
            .ok_or_else(|| malformed(format!("{kind} has no coordinates")))
    };
    match kind {
        "Point" => Ok(Shape::Point(Point(parse_position(coords()?)?))),
        "LineString" => Ok(Shape::LineString(parse_line(coords()?)?)),
        "MultiLineString" => Ok(Shape::MultiLineString(MultiLineString::new(
            as_array(coords()?, "MultiLineString")?
                .iter()
                .map(parse_line)
                .collect::<Result<Vec<_>>>()?,
        ))),
        "Polygon" => Ok(Shape::Polygon(parse_polygon(coords()?)?)),
        "MultiPolygon" => Ok(Shape::MultiPolygon(MultiPolygon::new(
            as_array(coords()?, "MultiPolygon")?
                .iter()
                .map(parse_polygon)
                .collect::<Result<Vec<_>>>()?,
        ))),
        other => Err(GstError::unexpected(
            "Point, LineString, MultiLineString, Polygon or MultiPolygon",
            other,
        )),
    }
}
