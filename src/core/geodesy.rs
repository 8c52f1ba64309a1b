//! Geodesic helpers
//!
//! Distances use the haversine great-circle formula from `geo`. Offsets and
//! degree/meter conversions use the equirectangular approximation
//! (111,320 m per degree, longitude scaled by cos(latitude)), which is what the
//! grid and overlay are built on. It distorts toward the poles; that is
//! accepted at city and regional scale.

use geo::{HaversineDestination, HaversineDistance};

use crate::core::types::Coordinate;

/// Meters per degree of latitude (and of longitude at the equator)
pub const METERS_PER_DEGREE: f64 = 111_320.0;

pub const METERS_PER_MILE: f64 = 1_609.344;

/// Spherical Earth radius used for area calculations
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Surface area of the spherical Earth, square meters
pub const EARTH_SURFACE_M2: f64 = 4.0 * std::f64::consts::PI * EARTH_RADIUS_M * EARTH_RADIUS_M;

/// cos(lat) floor so longitude conversions stay finite at the poles
const MIN_COS_LAT: f64 = 1e-6;

/// Great-circle distance in meters
pub fn distance_meters(a: Coordinate, b: Coordinate) -> f64 {
    a.to_point().haversine_distance(&b.to_point())
}

/// Great-circle distance in miles
pub fn distance_miles(a: Coordinate, b: Coordinate) -> f64 {
    distance_meters(a, b) / METERS_PER_MILE
}

pub fn meters_to_lat_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE
}

/// Degrees of longitude spanning `meters` at the given latitude
pub fn meters_to_lon_degrees(meters: f64, at_lat: f64) -> f64 {
    let cos_lat = at_lat.to_radians().cos().abs().max(MIN_COS_LAT);
    meters / (METERS_PER_DEGREE * cos_lat)
}

/// Move a coordinate by a north/east offset in meters (equirectangular)
pub fn offset(from: Coordinate, north_m: f64, east_m: f64) -> Coordinate {
    Coordinate::new(
        from.lat + meters_to_lat_degrees(north_m),
        from.lon + meters_to_lon_degrees(east_m, from.lat),
    )
}

/// Destination point given a bearing (degrees clockwise from north) and
/// distance along the great circle
pub fn destination(from: Coordinate, bearing_deg: f64, distance_m: f64) -> Coordinate {
    let p = from.to_point().haversine_destination(bearing_deg, distance_m);
    Coordinate::new(p.y(), p.x())
}

/// Exact spherical area of a lat/lon rectangle, square meters
///
/// A = R² · Δλ · |sin φ₂ − sin φ₁|
pub fn rect_area_m2(min_lat: f64, max_lat: f64, lon_span_deg: f64) -> f64 {
    let min_lat = min_lat.clamp(-90.0, 90.0).to_radians();
    let max_lat = max_lat.clamp(-90.0, 90.0).to_radians();
    EARTH_RADIUS_M * EARTH_RADIUS_M * lon_span_deg.abs().to_radians() * (max_lat.sin() - min_lat.sin()).abs()
}
