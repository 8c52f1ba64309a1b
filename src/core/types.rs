//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};

use crate::core::error::{FogError, Result};

/// Milliseconds since the Unix epoch, as reported by the location provider
pub type TimestampMs = i64;

/// A geographic coordinate in decimal degrees (WGS84)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Build a coordinate, rejecting non-finite or out-of-range values
    pub fn try_new(lat: f64, lon: f64) -> Result<Self> {
        let coord = Self { lat, lon };
        if coord.is_valid() {
            Ok(coord)
        } else {
            Err(FogError::InvalidCoordinate { lat, lon })
        }
    }

    /// Latitude within [-90, 90], longitude within [-180, 180], both finite
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// geo uses x = longitude, y = latitude
    pub fn to_point(self) -> geo::Point<f64> {
        geo::Point::new(self.lon, self.lat)
    }
}

impl From<Coordinate> for geo::Coord<f64> {
    fn from(c: Coordinate) -> Self {
        geo::Coord { x: c.lon, y: c.lat }
    }
}

/// A raw fix straight from the platform, before accuracy filtering
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationFix {
    pub lat: f64,
    pub lon: f64,
    /// Negative means the platform could not estimate accuracy
    pub horizontal_accuracy_m: f64,
    pub timestamp_ms: TimestampMs,
}

impl LocationFix {
    pub fn new(lat: f64, lon: f64, horizontal_accuracy_m: f64, timestamp_ms: TimestampMs) -> Self {
        Self {
            lat,
            lon,
            horizontal_accuracy_m,
            timestamp_ms,
        }
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }
}

/// A fix that passed the accuracy filter. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub coordinate: Coordinate,
    pub horizontal_accuracy_m: f64,
    pub timestamp_ms: TimestampMs,
}

impl Position {
    pub fn new(lat: f64, lon: f64, horizontal_accuracy_m: f64, timestamp_ms: TimestampMs) -> Self {
        Self {
            coordinate: Coordinate::new(lat, lon),
            horizontal_accuracy_m,
            timestamp_ms,
        }
    }

    /// Convenience for tests and replays where accuracy/time don't matter
    pub fn at(lat: f64, lon: f64) -> Self {
        Self::new(lat, lon, 5.0, 0)
    }
}

impl From<LocationFix> for Position {
    fn from(fix: LocationFix) -> Self {
        Self::new(fix.lat, fix.lon, fix.horizontal_accuracy_m, fix.timestamp_ms)
    }
}

/// Axis-aligned lat/lon box (degrees). No antimeridian wrapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl GeoBounds {
    pub fn new(min_lat: f64, max_lat: f64, min_lon: f64, max_lon: f64) -> Self {
        Self {
            min_lat,
            max_lat,
            min_lon,
            max_lon,
        }
    }

    pub fn lat_span(&self) -> f64 {
        self.max_lat - self.min_lat
    }

    pub fn lon_span(&self) -> f64 {
        self.max_lon - self.min_lon
    }

    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lat >= self.min_lat
            && coord.lat <= self.max_lat
            && coord.lon >= self.min_lon
            && coord.lon <= self.max_lon
    }

    /// True if the boxes share any area or edge
    pub fn overlaps(&self, other: &GeoBounds) -> bool {
        self.min_lat <= other.max_lat
            && self.max_lat >= other.min_lat
            && self.min_lon <= other.max_lon
            && self.max_lon >= other.min_lon
    }

    /// Intersection of two boxes, None when they don't overlap
    pub fn intersection(&self, other: &GeoBounds) -> Option<GeoBounds> {
        if !self.overlaps(other) {
            return None;
        }
        Some(GeoBounds {
            min_lat: self.min_lat.max(other.min_lat),
            max_lat: self.max_lat.min(other.max_lat),
            min_lon: self.min_lon.max(other.min_lon),
            max_lon: self.max_lon.min(other.max_lon),
        })
    }

    /// Closed counter-clockwise ring: SW, SE, NE, NW, SW
    pub fn to_ring(&self) -> geo_types::LineString<f64> {
        geo_types::LineString::from(vec![
            (self.min_lon, self.min_lat),
            (self.max_lon, self.min_lat),
            (self.max_lon, self.max_lat),
            (self.min_lon, self.max_lat),
            (self.min_lon, self.min_lat),
        ])
    }
}
