//! Visited-cell set
//!
//! Uses an AHashSet for O(1) membership and natural dedup. Insertion order is
//! tracked only when an eviction cap is configured.

use ahash::AHashSet;
use std::collections::hash_set;
use std::collections::VecDeque;

use super::cell::{CellRange, GridCell};
use crate::core::config::{GridConfig, RenderConfig};
use crate::core::types::{Coordinate, GeoBounds};
use crate::render::viewport::Viewport;

/// Record of explored ground
#[derive(Debug, Clone)]
pub struct ExplorationGrid {
    cell_size: f64,
    neighborhood_radius: u32,
    max_cells: Option<usize>,
    visited: AHashSet<GridCell>,
    /// Oldest first; empty unless `max_cells` is set
    insertion_order: VecDeque<GridCell>,
    explored_area_m2: f64,
}

impl ExplorationGrid {
    pub fn new(config: &GridConfig) -> Self {
        Self {
            cell_size: config.cell_size_deg,
            neighborhood_radius: config.neighborhood_radius,
            max_cells: config.max_cells,
            visited: AHashSet::new(),
            insertion_order: VecDeque::new(),
            explored_area_m2: 0.0,
        }
    }

    /// Unbounded grid with the given cell size and a 3×3 mark
    pub fn with_cell_size(cell_size: f64) -> Self {
        Self::new(&GridConfig {
            cell_size_deg: cell_size,
            ..GridConfig::default()
        })
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn max_cells(&self) -> Option<usize> {
        self.max_cells
    }

    #[inline]
    pub fn cell_for(&self, coord: Coordinate) -> GridCell {
        GridCell::containing(coord, self.cell_size)
    }

    /// Mark the configured neighborhood around `coord`.
    /// Returns the number of newly visited cells.
    pub fn mark_visited(&mut self, coord: Coordinate) -> usize {
        self.mark_visited_with_radius(coord, self.neighborhood_radius)
    }

    /// Mark the (2r+1)² block around `coord`. Idempotent per cell.
    pub fn mark_visited_with_radius(&mut self, coord: Coordinate, radius: u32) -> usize {
        if !coord.is_valid() {
            tracing::warn!("Ignoring invalid coordinate ({}, {})", coord.lat, coord.lon);
            return 0;
        }
        let center = self.cell_for(coord);
        let mut added = 0;
        for cell in center.neighborhood(radius) {
            if cell.is_on_globe(self.cell_size) && self.insert(cell) {
                added += 1;
            }
        }
        added
    }

    /// Insert a single cell, evicting the oldest one if over the cap.
    /// Returns true if the cell was new.
    pub fn insert(&mut self, cell: GridCell) -> bool {
        if !self.visited.insert(cell) {
            return false;
        }
        self.explored_area_m2 += cell.area_m2(self.cell_size);

        if let Some(cap) = self.max_cells {
            self.insertion_order.push_back(cell);
            while self.visited.len() > cap {
                let Some(oldest) = self.insertion_order.pop_front() else {
                    break;
                };
                if self.visited.remove(&oldest) {
                    self.explored_area_m2 -= oldest.area_m2(self.cell_size);
                    tracing::debug!(
                        "Evicted cell ({}, {}) at cap {}",
                        oldest.lat_index,
                        oldest.lon_index,
                        cap
                    );
                }
            }
        }
        true
    }

    #[inline]
    pub fn contains(&self, cell: &GridCell) -> bool {
        self.visited.contains(cell)
    }

    pub fn is_visited(&self, coord: Coordinate) -> bool {
        self.contains(&self.cell_for(coord))
    }

    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    /// Total spherical area of visited cells, square meters
    pub fn explored_area_m2(&self) -> f64 {
        self.explored_area_m2.max(0.0)
    }

    /// Unordered view of every visited cell
    pub fn iter(&self) -> impl Iterator<Item = &GridCell> + '_ {
        self.visited.iter()
    }

    /// Visited cells in a stable order: insertion order when tracked,
    /// otherwise sorted by index
    pub fn to_ordered_vec(&self) -> Vec<GridCell> {
        if self.max_cells.is_some() {
            self.insertion_order.iter().copied().collect()
        } else {
            let mut cells: Vec<GridCell> = self.visited.iter().copied().collect();
            cells.sort_unstable();
            cells
        }
    }

    /// Visited cells overlapping the viewport plus the overlay's outer padding
    pub fn cells_intersecting(&self, viewport: &Viewport, render: &RenderConfig) -> CellsInBounds<'_> {
        self.cells_in_bounds(&viewport.padded_bounds(render))
    }

    /// Visited cells whose index falls within the range covering `bounds`.
    ///
    /// Lazy and restartable (`Clone`). Walks whichever is smaller: the index
    /// rectangle or the visited set, so a small view over a long history
    /// never touches the whole set.
    pub fn cells_in_bounds(&self, bounds: &GeoBounds) -> CellsInBounds<'_> {
        let Some(range) = CellRange::covering(bounds, self.cell_size) else {
            return CellsInBounds { inner: Inner::Empty };
        };

        let inner = if range.cell_count() <= self.visited.len() as u64 {
            Inner::Scan {
                visited: &self.visited,
                lat: *range.lat.start() as i64,
                lon: *range.lon.start(),
                range,
            }
        } else {
            Inner::Filter {
                iter: self.visited.iter(),
                range,
            }
        };
        CellsInBounds { inner }
    }

    /// Clear the visited set
    pub fn reset(&mut self) {
        self.visited.clear();
        self.insertion_order.clear();
        self.explored_area_m2 = 0.0;
    }

    /// Replace contents with `cells`, in the given order
    pub fn restore(&mut self, cells: impl IntoIterator<Item = GridCell>) {
        self.reset();
        for cell in cells {
            self.insert(cell);
        }
    }
}

/// Lazy iterator over visited cells inside an index range
#[derive(Debug, Clone)]
pub struct CellsInBounds<'a> {
    inner: Inner<'a>,
}

#[derive(Debug, Clone)]
enum Inner<'a> {
    Empty,
    /// Walk the index rectangle row by row, probing the set
    Scan {
        visited: &'a AHashSet<GridCell>,
        range: CellRange,
        /// Row cursor, widened so stepping past the last row can't overflow
        lat: i64,
        lon: i32,
    },
    /// Walk the set, keeping cells inside the rectangle
    Filter {
        iter: hash_set::Iter<'a, GridCell>,
        range: CellRange,
    },
}

impl<'a> Iterator for CellsInBounds<'a> {
    type Item = GridCell;

    fn next(&mut self) -> Option<GridCell> {
        match &mut self.inner {
            Inner::Empty => None,
            Inner::Scan { visited, range, lat, lon } => {
                while *lat <= *range.lat.end() as i64 {
                    let cell = GridCell::new(*lat as i32, *lon);
                    if *lon < *range.lon.end() {
                        *lon += 1;
                    } else {
                        *lon = *range.lon.start();
                        *lat += 1;
                    }
                    if visited.contains(&cell) {
                        return Some(cell);
                    }
                }
                None
            }
            Inner::Filter { iter, range } => iter.by_ref().copied().find(|c| range.contains(c)),
        }
    }
}
