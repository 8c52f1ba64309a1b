//! Map viewport: center plus angular span
//!
//! Mutated by the host map on every pan/zoom. Spans are clamped to the
//! zoomed-all-the-way-out ceiling one field at a time.

use serde::{Deserialize, Serialize};

use crate::core::config::RenderConfig;
use crate::core::error::{FogError, Result};
use crate::core::types::{Coordinate, GeoBounds};

/// Visible map extent in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub center: Coordinate,
    pub lat_span: f64,
    pub lon_span: f64,
}

impl Viewport {
    pub fn new(center: Coordinate, lat_span: f64, lon_span: f64) -> Self {
        Self {
            center,
            lat_span,
            lon_span,
        }
    }

    /// Validated constructor: finite center, finite non-negative spans
    pub fn try_new(center: Coordinate, lat_span: f64, lon_span: f64) -> Result<Self> {
        if !center.lat.is_finite() || !center.lon.is_finite() {
            return Err(FogError::InvalidViewport(format!(
                "center ({}, {}) is not finite",
                center.lat, center.lon
            )));
        }
        if !(lat_span.is_finite() && lon_span.is_finite()) || lat_span < 0.0 || lon_span < 0.0 {
            return Err(FogError::InvalidViewport(format!(
                "span ({}, {}) must be finite and non-negative",
                lat_span, lon_span
            )));
        }
        Ok(Self::new(center, lat_span, lon_span))
    }

    /// Square viewport around a coordinate
    pub fn around(center: Coordinate, span: f64) -> Self {
        Self::new(center, span, span)
    }

    /// Same center, each span dimension clamped independently
    pub fn clamped(self, max_span: f64) -> Self {
        Self {
            center: self.center,
            lat_span: self.lat_span.min(max_span),
            lon_span: self.lon_span.min(max_span),
        }
    }

    /// Apply a new span from the host map, clamped to `max_span`.
    ///
    /// Returns true if either dimension actually changed. Each scalar is
    /// compared on its own; comparing the span as one value misses changes.
    pub fn set_span(&mut self, lat_span: f64, lon_span: f64, max_span: f64) -> bool {
        let lat_span = lat_span.abs().min(max_span);
        let lon_span = lon_span.abs().min(max_span);
        let lat_changed = lat_span != self.lat_span;
        let lon_changed = lon_span != self.lon_span;
        if lat_changed {
            self.lat_span = lat_span;
        }
        if lon_changed {
            self.lon_span = lon_span;
        }
        lat_changed || lon_changed
    }

    /// Pan by a delta in degrees. Latitude stays on the globe, longitude wraps.
    pub fn pan(&mut self, dlat: f64, dlon: f64) {
        self.center.lat = (self.center.lat + dlat).clamp(-90.0, 90.0);
        self.center.lon = wrap_longitude(self.center.lon + dlon);
    }

    pub fn max_span(&self) -> f64 {
        self.lat_span.max(self.lon_span)
    }

    /// Visible box, no padding
    pub fn bounds(&self) -> GeoBounds {
        let half_lat = self.lat_span / 2.0;
        let half_lon = self.lon_span / 2.0;
        GeoBounds::new(
            self.center.lat - half_lat,
            self.center.lat + half_lat,
            self.center.lon - half_lon,
            self.center.lon + half_lon,
        )
    }

    /// min(max(latSpan, lonSpan) × factor, cap)
    pub fn padding(&self, render: &RenderConfig) -> f64 {
        (self.max_span() * render.padding_factor).min(render.padding_cap_deg)
    }

    /// The overlay's outer boundary: center ± half-span ± padding
    pub fn padded_bounds(&self, render: &RenderConfig) -> GeoBounds {
        let pad = self.padding(render);
        let b = self.bounds();
        GeoBounds::new(b.min_lat - pad, b.max_lat + pad, b.min_lon - pad, b.max_lon + pad)
    }
}

fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}
