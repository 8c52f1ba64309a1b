//! Grid cell addressing
//!
//! A cell is the integer pair obtained by floor-dividing latitude and
//! longitude by a fixed cell size. Every coordinate maps to exactly one cell.

use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;

use crate::core::geodesy;
use crate::core::types::{Coordinate, GeoBounds};

/// A discrete ground cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridCell {
    pub lat_index: i32,
    pub lon_index: i32,
}

impl GridCell {
    pub const fn new(lat_index: i32, lon_index: i32) -> Self {
        Self { lat_index, lon_index }
    }

    /// The cell containing a coordinate
    #[inline]
    pub fn containing(coord: Coordinate, cell_size: f64) -> Self {
        Self {
            lat_index: index_of(coord.lat, cell_size),
            lon_index: index_of(coord.lon, cell_size),
        }
    }

    /// [lat, lat + size] × [lon, lon + size]
    pub fn bounds(&self, cell_size: f64) -> GeoBounds {
        let min_lat = self.lat_index as f64 * cell_size;
        let min_lon = self.lon_index as f64 * cell_size;
        GeoBounds::new(min_lat, min_lat + cell_size, min_lon, min_lon + cell_size)
    }

    pub fn center(&self, cell_size: f64) -> Coordinate {
        Coordinate::new(
            (self.lat_index as f64 + 0.5) * cell_size,
            (self.lon_index as f64 + 0.5) * cell_size,
        )
    }

    /// False for cells lying entirely beyond a pole
    pub fn is_on_globe(&self, cell_size: f64) -> bool {
        let b = self.bounds(cell_size);
        b.max_lat > -90.0 && b.min_lat < 90.0
    }

    /// Spherical area of the cell in square meters
    pub fn area_m2(&self, cell_size: f64) -> f64 {
        let b = self.bounds(cell_size);
        geodesy::rect_area_m2(b.min_lat, b.max_lat, cell_size)
    }

    /// The (2r+1)² block centered on this cell
    pub fn neighborhood(self, radius: u32) -> impl Iterator<Item = GridCell> {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        (-r..=r).flat_map(move |dlat| {
            (-r..=r).map(move |dlon| {
                GridCell::new(
                    self.lat_index.saturating_add(dlat),
                    self.lon_index.saturating_add(dlon),
                )
            })
        })
    }
}

/// floor(value / size), corrected so the cell rebuilt by [`GridCell::bounds`]
/// always contains `value`. The division alone can land one ulp across an edge.
fn index_of(value: f64, cell_size: f64) -> i32 {
    let mut index = (value / cell_size).floor();
    if index * cell_size > value {
        index -= 1.0;
    } else if index * cell_size + cell_size < value {
        index += 1.0;
    }
    index as i32
}

/// Inclusive index rectangle covering a bounding box
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellRange {
    pub lat: RangeInclusive<i32>,
    pub lon: RangeInclusive<i32>,
}

impl CellRange {
    /// Index range of every cell overlapping `bounds`; None for empty or
    /// non-finite bounds
    pub fn covering(bounds: &GeoBounds, cell_size: f64) -> Option<Self> {
        let finite = [bounds.min_lat, bounds.max_lat, bounds.min_lon, bounds.max_lon]
            .iter()
            .all(|v| v.is_finite());
        if !finite || bounds.min_lat > bounds.max_lat || bounds.min_lon > bounds.max_lon {
            return None;
        }
        let lo = GridCell::containing(Coordinate::new(bounds.min_lat, bounds.min_lon), cell_size);
        let hi = GridCell::containing(Coordinate::new(bounds.max_lat, bounds.max_lon), cell_size);
        Some(Self {
            lat: lo.lat_index..=hi.lat_index,
            lon: lo.lon_index..=hi.lon_index,
        })
    }

    #[inline]
    pub fn contains(&self, cell: &GridCell) -> bool {
        self.lat.contains(&cell.lat_index) && self.lon.contains(&cell.lon_index)
    }

    /// Number of cells in the rectangle
    pub fn cell_count(&self) -> u64 {
        let rows = (*self.lat.end() as i64 - *self.lat.start() as i64 + 1).max(0) as u64;
        let cols = (*self.lon.end() as i64 - *self.lon.start() as i64 + 1).max(0) as u64;
        rows.saturating_mul(cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZE: f64 = 0.003;

    #[test]
    fn test_containing_uses_floor() {
        let cell = GridCell::containing(Coordinate::new(34.0522, -118.2437), SIZE);
        assert_eq!(cell, GridCell::new(11350, -39415));

        // Negative coordinates floor away from zero
        let cell = GridCell::containing(Coordinate::new(-0.0001, -0.0001), SIZE);
        assert_eq!(cell, GridCell::new(-1, -1));
    }

    #[test]
    fn test_bounds_contain_source_coordinate() {
        let coord = Coordinate::new(48.8566, 2.3522);
        let cell = GridCell::containing(coord, SIZE);
        assert!(cell.bounds(SIZE).contains(coord));
    }

    #[test]
    fn test_bounds_contain_source_near_edges() {
        // Known case where plain division lands on the wrong side of the edge
        let coord = Coordinate::new(-50.751, 2.3522);
        assert!(GridCell::containing(coord, SIZE).bounds(SIZE).contains(coord));

        for k in -30_000..30_000 {
            let on_edge = k as f64 * SIZE;
            for lat in [on_edge, on_edge + 1e-12, on_edge - 1e-12, on_edge + SIZE / 3.0] {
                if !(-90.0..=90.0).contains(&lat) {
                    continue;
                }
                let coord = Coordinate::new(lat, lat / 2.0);
                let cell = GridCell::containing(coord, SIZE);
                assert!(cell.bounds(SIZE).contains(coord), "{:?} not in {:?}", coord, cell);
            }
        }
    }

    #[test]
    fn test_neighborhood_saturates_at_index_limit() {
        let edge = GridCell::new(i32::MAX, i32::MIN);
        let block: Vec<_> = edge.neighborhood(1).collect();
        assert_eq!(block.len(), 9);
        assert!(block.iter().all(|c| c.lat_index >= i32::MAX - 1));
        assert!(block.iter().all(|c| c.lon_index <= i32::MIN + 1));
    }

    #[test]
    fn test_neighborhood_sizes() {
        let c = GridCell::new(0, 0);
        assert_eq!(c.neighborhood(0).count(), 1);
        assert_eq!(c.neighborhood(1).count(), 9);
        assert_eq!(c.neighborhood(2).count(), 25);
        assert!(c.neighborhood(1).any(|n| n == GridCell::new(-1, 1)));
    }

    #[test]
    fn test_polar_cells_off_globe() {
        // 30000 * 0.003 = 90°
        assert!(!GridCell::new(30_000, 0).is_on_globe(SIZE));
        assert!(GridCell::new(29_999, 0).is_on_globe(SIZE));
        assert!(!GridCell::new(-30_001, 0).is_on_globe(SIZE));
    }

    #[test]
    fn test_cell_range_count() {
        let bounds = GeoBounds::new(0.0, 0.0299, 0.0, 0.0149);
        let range = CellRange::covering(&bounds, SIZE).unwrap();
        assert_eq!(range.lat, 0..=9);
        assert_eq!(range.lon, 0..=4);
        assert_eq!(range.cell_count(), 50);
    }

    #[test]
    fn test_cell_range_rejects_nan() {
        let bounds = GeoBounds::new(f64::NAN, 1.0, 0.0, 1.0);
        assert!(CellRange::covering(&bounds, SIZE).is_none());
    }
}
