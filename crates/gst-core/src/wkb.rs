//! ISO well-known-binary codec for [`Shape`].
//!
//! Writes little-endian 2-D geometries; reads either byte order. Any type
//! code outside the five supported kinds is rejected.

use geo::{Coord, LineString, MultiLineString, MultiPolygon, Point, Polygon};

use crate::errors::{GstError, Result};
use crate::models::Shape;

const WKB_POINT: u32 = 1;
const WKB_LINESTRING: u32 = 2;
const WKB_POLYGON: u32 = 3;
const WKB_MULTILINESTRING: u32 = 5;
const WKB_MULTIPOLYGON: u32 = 6;

const LITTLE_ENDIAN: u8 = 1;
const BIG_ENDIAN: u8 = 0;

pub fn encode(shape: &Shape) -> Vec<u8> {
    let mut out = Vec::with_capacity(9 + 16 * shape.point_count());
    write_shape(&mut out, shape);
    out
}

pub fn decode(bytes: &[u8]) -> Result<Shape> {
    let mut reader = Reader { bytes, pos: 0 };
    let shape = reader.read_shape()?;
    if reader.pos != bytes.len() {
        return Err(GstError::MalformedWkb(format!(
            "{} trailing bytes",
            bytes.len() - reader.pos
        )));
    }
    Ok(shape)
}

fn write_shape(out: &mut Vec<u8>, shape: &Shape) {
    match shape {
        Shape::Point(p) => {
            write_header(out, WKB_POINT);
            write_coord(out, p.0);
        }
        Shape::LineString(ls) => {
            write_header(out, WKB_LINESTRING);
            write_coords(out, &ls.0);
        }
        Shape::Polygon(p) => write_polygon(out, p),
        Shape::MultiLineString(mls) => {
            write_header(out, WKB_MULTILINESTRING);
            write_u32_le(out, mls.0.len() as u32);
            for ls in &mls.0 {
                write_header(out, WKB_LINESTRING);
                write_coords(out, &ls.0);
            }
        }
        Shape::MultiPolygon(mp) => {
            write_header(out, WKB_MULTIPOLYGON);
            write_u32_le(out, mp.0.len() as u32);
            for p in &mp.0 {
                write_polygon(out, p);
            }
        }
    }
}

fn write_polygon(out: &mut Vec<u8>, polygon: &Polygon<f64>) {
    write_header(out, WKB_POLYGON);
    if polygon.exterior().0.is_empty() {
        write_u32_le(out, 0);
        return;
    }
    write_u32_le(out, 1 + polygon.interiors().len() as u32);
    write_coords(out, &polygon.exterior().0);
    for ring in polygon.interiors() {
        write_coords(out, &ring.0);
    }
}

fn write_header(out: &mut Vec<u8>, code: u32) {
    out.push(LITTLE_ENDIAN);
    write_u32_le(out, code);
}

fn write_coords(out: &mut Vec<u8>, coords: &[Coord<f64>]) {
    write_u32_le(out, coords.len() as u32);
    for c in coords {
        write_coord(out, *c);
    }
}

fn write_coord(out: &mut Vec<u8>, c: Coord<f64>) {
    out.extend_from_slice(&c.x.to_le_bytes());
    out.extend_from_slice(&c.y.to_le_bytes());
}

fn write_u32_le(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn take<const N: usize>(&mut self) -> Result<[u8; N]> {
        let end = self.pos + N;
        let slice = self.bytes.get(self.pos..end).ok_or_else(|| {
            GstError::MalformedWkb(format!("unexpected end of input at byte {}", self.pos))
        })?;
        let mut buf = [0u8; N];
        buf.copy_from_slice(slice);
        self.pos = end;
        Ok(buf)
    }

    fn read_header(&mut self) -> Result<(bool, u32)> {
        let [order] = self.take::<1>()?;
        let little = match order {
            LITTLE_ENDIAN => true,
            BIG_ENDIAN => false,
            other => {
                return Err(GstError::MalformedWkb(format!(
                    "invalid byte order marker {other}"
                )))
            }
        };
        let code = self.read_u32(little)?;
        Ok((little, code))
    }

    fn read_u32(&mut self, little: bool) -> Result<u32> {
        let buf = self.take::<4>()?;
        Ok(if little {
            u32::from_le_bytes(buf)
        } else {
            u32::from_be_bytes(buf)
        })
    }

    fn read_f64(&mut self, little: bool) -> Result<f64> {
        let buf = self.take::<8>()?;
        Ok(if little {
            f64::from_le_bytes(buf)
        } else {
            f64::from_be_bytes(buf)
        })
    }

    /// Read a count and make sure the remaining input could hold that many items.
    fn read_count(&mut self, little: bool, min_item_bytes: usize) -> Result<usize> {
        let count = self.read_u32(little)? as usize;
        let remaining = self.bytes.len() - self.pos;
        if count.saturating_mul(min_item_bytes) > remaining {
            return Err(GstError::MalformedWkb(format!(
                "count {count} exceeds remaining {remaining} bytes"
            )));
        }
        Ok(count)
    }

    fn read_coord(&mut self, little: bool) -> Result<Coord<f64>> {
        let x = self.read_f64(little)?;
        let y = self.read_f64(little)?;
        Ok(Coord { x, y })
    }

    fn read_coords(&mut self, little: bool) -> Result<Vec<Coord<f64>>> {
        let count = self.read_count(little, 16)?;
        (0..count).map(|_| self.read_coord(little)).collect()
    }

    fn read_polygon_body(&mut self, little: bool) -> Result<Polygon<f64>> {
        let rings = self.read_count(little, 4)?;
        if rings == 0 {
            return Ok(Polygon::new(LineString::new(Vec::new()), Vec::new()));
        }
        let exterior = LineString::new(self.read_coords(little)?);
        let interiors = (1..rings)
            .map(|_| self.read_coords(little).map(LineString::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polygon::new(exterior, interiors))
    }

    fn expect_member(&mut self, expected: u32) -> Result<bool> {
        let (little, code) = self.read_header()?;
        if code != expected {
            return Err(GstError::unexpected(
                known_kind(expected).unwrap_or("collection member"),
                kind_name(code),
            ));
        }
        Ok(little)
    }

    fn read_shape(&mut self) -> Result<Shape> {
        let (little, code) = self.read_header()?;
        match code {
            WKB_POINT => Ok(Shape::Point(Point(self.read_coord(little)?))),
            WKB_LINESTRING => Ok(Shape::LineString(LineString::new(self.read_coords(little)?))),
            WKB_POLYGON => Ok(Shape::Polygon(self.read_polygon_body(little)?)),
            WKB_MULTILINESTRING => {
                let count = self.read_count(little, 9)?;
                let mut lines = Vec::with_capacity(count);
                for _ in 0..count {
                    let member = self.expect_member(WKB_LINESTRING)?;
                    lines.push(LineString::new(self.read_coords(member)?));
                }
                Ok(Shape::MultiLineString(MultiLineString::new(lines)))
            }
            WKB_MULTIPOLYGON => {
                let count = self.read_count(little, 9)?;
                let mut polygons = Vec::with_capacity(count);
                for _ in 0..count {
                    let member = self.expect_member(WKB_POLYGON)?;
                    polygons.push(self.read_polygon_body(member)?);
                }
                Ok(Shape::MultiPolygon(MultiPolygon::new(polygons)))
            }
            other => Err(GstError::unexpected(
                "Point, LineString, MultiLineString, Polygon or MultiPolygon",
                kind_name(other),
            )),
        }
    }
}

fn known_kind(code: u32) -> Option<&'static str> {
    match code {
        WKB_POINT => Some("Point"),
        WKB_LINESTRING => Some("LineString"),
        WKB_POLYGON => Some("Polygon"),
        4 => Some("MultiPoint"),
        WKB_MULTILINESTRING => Some("MultiLineString"),
        WKB_MULTIPOLYGON => Some("MultiPolygon"),
        7 => Some("GeometryCollection"),
        _ => None,
    }
}

fn kind_name(code: u32) -> String {
    known_kind(code).map_or_else(|| format!("WKB type {code}"), str::to_string)
}
