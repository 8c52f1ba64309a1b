//! Two separate "how much of the world" numbers
//!
//! - viewport-visible: share of the globe inside the current viewport; a pure
//!   function of the viewport
//! - explored: cumulative visited-cell area over the Earth's surface

use crate::core::geodesy::EARTH_SURFACE_M2;
use crate::exploration::grid::ExplorationGrid;
use crate::render::viewport::Viewport;

/// Share of the globe inside the viewport, percent (lat/lon span fractions)
pub fn viewport_visible_percent(viewport: &Viewport) -> f64 {
    let lat = (viewport.lat_span / 180.0).clamp(0.0, 1.0);
    let lon = (viewport.lon_span / 360.0).clamp(0.0, 1.0);
    lat * lon * 100.0
}

/// Explored area as a percent of the Earth's surface
pub fn explored_percent(explored_area_m2: f64) -> f64 {
    (explored_area_m2 / EARTH_SURFACE_M2 * 100.0).clamp(0.0, 100.0)
}

pub fn grid_explored_percent(grid: &ExplorationGrid) -> f64 {
    explored_percent(grid.explored_area_m2())
}
