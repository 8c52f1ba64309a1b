//! Fog overlay geometry
//!
//! The overlay is one outer rectangle (viewport ± padding) with a square hole
//! for every visited cell in view. Holes are clipped to the outer boundary so
//! nothing is ever emitted outside it.
//!
//! Level of detail, by the viewport's larger span:
//! - below `revealed_span_deg`, if every cell in view is visited, the holes
//!   collapse into one revealed marker ring
//! - above `fogged_span_deg`, or past `max_holes`, no holes at all; the view
//!   renders fully fogged
//! - otherwise one hole per visited cell

use geo_types::{LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::core::config::RenderConfig;
use crate::core::types::GeoBounds;
use crate::exploration::cell::{CellRange, GridCell};
use crate::exploration::grid::ExplorationGrid;
use crate::render::viewport::Viewport;

/// Which level-of-detail path produced the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayDetail {
    /// One hole per visited cell
    PerCell,
    /// Zoomed in over fully explored ground: a single marker hole
    Revealed,
    /// Zoomed too far out (or too many holes) for per-cell detail
    Fogged,
}

/// Geometry handed to the host map widget
#[derive(Debug, Clone, PartialEq)]
pub struct FogOverlay {
    /// Closed outer ring (first point repeated last)
    pub outer: LineString<f64>,
    /// Closed 5-point hole rings, each inside `outer`
    pub holes: Vec<LineString<f64>>,
    pub detail: OverlayDetail,
    /// Outer ring as bounds, for hosts that want the box directly
    pub bounds: GeoBounds,
}

impl FogOverlay {
    pub fn hole_count(&self) -> usize {
        self.holes.len()
    }

    /// Polygon-with-holes form
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(self.outer.clone(), self.holes.clone())
    }
}

/// Builds overlays from a viewport and the grid. Stateless apart from its
/// configuration; safe to call on every pan/zoom.
#[derive(Debug, Clone, Default)]
pub struct FogRenderer {
    config: RenderConfig,
}

impl FogRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Compute the overlay. Cost is bounded by the cells in view, not by the
    /// size of the explored history.
    pub fn build_overlay(&self, viewport: &Viewport, grid: &ExplorationGrid) -> FogOverlay {
        let viewport = viewport.clamped(self.config.max_span_deg);
        let bounds = viewport.padded_bounds(&self.config);
        let outer = bounds.to_ring();
        let span = viewport.max_span();

        if span > self.config.fogged_span_deg {
            return self.fogged(outer, bounds);
        }

        if span < self.config.revealed_span_deg {
            if let Some(marker) = revealed_marker(&bounds, grid) {
                return FogOverlay {
                    outer,
                    holes: vec![marker],
                    detail: OverlayDetail::Revealed,
                    bounds,
                };
            }
        }

        let cell_size = grid.cell_size();
        let mut holes = Vec::new();
        for cell in grid.cells_intersecting(&viewport, &self.config) {
            if holes.len() >= self.config.max_holes {
                tracing::debug!(
                    "Hole budget {} exceeded at span {:.4}°, rendering fully fogged",
                    self.config.max_holes,
                    span
                );
                return self.fogged(outer, bounds);
            }
            match cell.bounds(cell_size).intersection(&bounds) {
                // Edge-touching cells clip to zero area
                Some(clipped) if clipped.lat_span() > 0.0 && clipped.lon_span() > 0.0 => {
                    holes.push(clipped.to_ring());
                }
                _ => {}
            }
        }

        FogOverlay {
            outer,
            holes,
            detail: OverlayDetail::PerCell,
            bounds,
        }
    }

    fn fogged(&self, outer: LineString<f64>, bounds: GeoBounds) -> FogOverlay {
        FogOverlay {
            outer,
            holes: Vec::new(),
            detail: OverlayDetail::Fogged,
            bounds,
        }
    }
}

/// A single ring covering the padded view, if every cell under it is visited
fn revealed_marker(bounds: &GeoBounds, grid: &ExplorationGrid) -> Option<LineString<f64>> {
    let range = CellRange::covering(bounds, grid.cell_size())?;
    // At revealed spans this is a handful of cells
    let all_visited = range
        .lat
        .clone()
        .all(|lat| range.lon.clone().all(|lon| grid.contains(&GridCell::new(lat, lon))));
    all_visited.then(|| bounds.to_ring())
}
