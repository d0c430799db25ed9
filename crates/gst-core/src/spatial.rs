//! Spherical-Earth math used by the buffering engine and the run planner.

use geo::{Coord, LineString};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Length of one degree of arc along a great circle, in meters.
pub const METRES_PER_DEGREE: f64 = 2.0 * std::f64::consts::PI * EARTH_RADIUS_M / 360.0;

pub const METRES_PER_NAUTICAL_MILE: f64 = 1852.0;

/// Half the circumference of the Earth in meters.
pub fn half_circumference_m() -> f64 {
    std::f64::consts::PI * EARTH_RADIUS_M
}

/// Calculate distance between two points in meters using Haversine formula.
///
/// # Arguments
/// * `lat1`, `lon1` - First point coordinates in decimal degrees
/// * `lat2`, `lon2` - Second point coordinates in decimal degrees
///
/// # Returns
/// Distance in meters
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().atan2((1.0 - a).sqrt())
}

/// Haversine distance between two lon/lat coordinates.
pub fn coord_distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    haversine_distance(a.y, a.x, b.y, b.x)
}

/// Calculate bearing from point 1 to point 2 in radians.
/// Returns bearing in radians, 0 = north, π/2 = east.
pub fn bearing(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lambda = (lon2 - lon1).to_radians();

    let x = delta_lambda.sin() * phi2.cos();
    let y = phi1.cos() * phi2.sin() - phi1.sin() * phi2.cos() * delta_lambda.cos();

    x.atan2(y)
}

/// Offset a position by distance and bearing.
///
/// # Arguments
/// * `lat`, `lon` - Starting position in degrees
/// * `distance_m` - Distance in meters
/// * `bearing_rad` - Bearing in radians (0 = north, π/2 = east)
///
/// # Returns
/// (new_lat, new_lon) in degrees, longitude wrapped to [-180, 180)
pub fn offset_by_bearing(lat: f64, lon: f64, distance_m: f64, bearing_rad: f64) -> (f64, f64) {
    if distance_m.abs() <= f64::EPSILON {
        return (lat, lon);
    }

    let lat1 = lat.to_radians();
    let lon1 = lon.to_radians();
    let angular_distance = distance_m / EARTH_RADIUS_M;

    let sin_lat1 = lat1.sin();
    let cos_lat1 = lat1.cos();
    let sin_ad = angular_distance.sin();
    let cos_ad = angular_distance.cos();

    let sin_lat2 = sin_lat1 * cos_ad + cos_lat1 * sin_ad * bearing_rad.cos();
    let lat2 = sin_lat2.clamp(-1.0, 1.0).asin();

    let y = bearing_rad.sin() * sin_ad * cos_lat1;
    let x = cos_ad - sin_lat1 * sin_lat2;
    let mut lon2 = lon1 + y.atan2(x);
    lon2 =
        (lon2 + std::f64::consts::PI).rem_euclid(2.0 * std::f64::consts::PI) - std::f64::consts::PI;

    (lat2.to_degrees(), lon2.to_degrees())
}

/// Wrap a longitude into [-180, 180).
pub fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Shift `lon` by whole turns so it lies within 180 degrees of `reference`.
pub fn unwrap_longitude(lon: f64, reference: f64) -> f64 {
    reference + wrap_longitude(lon - reference)
}

/// Whether a circle of `distance_m` around `center` reaches over a pole.
///
/// Returns the latitude of the enclosed pole.
pub fn enclosed_pole(center: Coord<f64>, distance_m: f64) -> Option<f64> {
    let to_north = (90.0 - center.y) * METRES_PER_DEGREE;
    let to_south = (center.y + 90.0) * METRES_PER_DEGREE;
    if distance_m >= to_north {
        Some(90.0)
    } else if distance_m >= to_south {
        Some(-90.0)
    } else {
        None
    }
}

/// Sample `n` great-circle destinations at `distance_m` around `center`.
///
/// Bearings start due north and advance clockwise. Longitudes are kept
/// continuous from one sample to the next, starting near the centre, so the
/// ring may extend past ±180.
pub fn circle_points(center: Coord<f64>, distance_m: f64, n: usize) -> Vec<Coord<f64>> {
    let n = n.max(3);
    let mut points = Vec::with_capacity(n);
    let mut previous = center.x;
    for i in 0..n {
        let bearing_rad = 2.0 * std::f64::consts::PI * (i as f64) / (n as f64);
        let (lat, lon) = offset_by_bearing(center.y, center.x, distance_m, bearing_rad);
        let lon = unwrap_longitude(lon, previous);
        previous = lon;
        points.push(Coord { x: lon, y: lat });
    }
    points
}

/// Insert planar midpoints so no segment is longer than `max_step_deg`.
pub fn densify(line: &LineString<f64>, max_step_deg: f64) -> LineString<f64> {
    if line.0.len() < 2 || !(max_step_deg > 0.0) {
        return line.clone();
    }

    let mut out = Vec::with_capacity(line.0.len());
    for pair in line.0.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        out.push(a);
        let length = (b.x - a.x).hypot(b.y - a.y);
        let pieces = (length / max_step_deg).ceil() as usize;
        for k in 1..pieces {
            let t = k as f64 / pieces as f64;
            out.push(Coord {
                x: a.x + (b.x - a.x) * t,
                y: a.y + (b.y - a.y) * t,
            });
        }
    }
    if let Some(last) = line.0.last() {
        out.push(*last);
    }
    LineString::new(out)
}

/// Drop consecutive coordinates closer than `tolerance_deg` to their predecessor.
pub fn dedup_coords(coords: &[Coord<f64>], tolerance_deg: f64) -> Vec<Coord<f64>> {
    let mut out: Vec<Coord<f64>> = Vec::with_capacity(coords.len());
    for c in coords {
        if !(c.x.is_finite() && c.y.is_finite()) {
            continue;
        }
        match out.last() {
            Some(prev) if (c.x - prev.x).abs() <= tolerance_deg && (c.y - prev.y).abs() <= tolerance_deg => {}
            _ => out.push(*c),
        }
    }
    out
}
