//! Distance, level and explored-percent tracking
//!
//! Distance is the sum of great-circle hops between consecutive accepted
//! positions. Level comes from the visited-cell count. The two are
//! independent and never reconciled.

use serde::{Deserialize, Serialize};

use super::coverage;
use crate::core::config::MetricsConfig;
use crate::core::geodesy;
use crate::core::types::Position;

/// Current progress values for the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_distance_miles: f64,
    pub level: u32,
    pub cells_until_next_level: u64,
    pub visited_cell_count: usize,
    /// Visited-cell area over Earth's surface, percent
    pub explored_percent: f64,
}

/// Accumulates progress from the position stream
#[derive(Debug, Clone)]
pub struct ExplorationMetrics {
    cells_per_level: u32,
    total_distance_miles: f64,
    previous: Option<Position>,
    visited_cell_count: usize,
    level: u32,
    cells_until_next_level: u64,
    explored_percent: f64,
    positions_recorded: u64,
}

impl Default for ExplorationMetrics {
    fn default() -> Self {
        Self::new(&MetricsConfig::default())
    }
}

impl ExplorationMetrics {
    pub fn new(config: &MetricsConfig) -> Self {
        let cells_per_level = config.cells_per_level.max(1);
        Self {
            cells_per_level,
            total_distance_miles: 0.0,
            previous: None,
            visited_cell_count: 0,
            level: 1,
            cells_until_next_level: cells_per_level as u64,
            explored_percent: 0.0,
            positions_recorded: 0,
        }
    }

    /// Add the hop from the previous position (if any), then remember this one.
    ///
    /// Arrival order is what counts: out-of-order or duplicate timestamps are
    /// accepted as-is. Invalid coordinates are skipped and leave the previous
    /// position in place. Returns the miles added.
    pub fn record_position(&mut self, position: &Position) -> f64 {
        if !position.coordinate.is_valid() {
            return 0.0;
        }
        let added = match self.previous {
            Some(prev) => {
                if position.timestamp_ms < prev.timestamp_ms {
                    tracing::trace!(
                        "Out-of-order fix: {} after {}",
                        position.timestamp_ms,
                        prev.timestamp_ms
                    );
                }
                geodesy::distance_miles(prev.coordinate, position.coordinate)
            }
            None => 0.0,
        };
        if added.is_finite() {
            self.total_distance_miles += added;
        }
        self.previous = Some(*position);
        self.positions_recorded += 1;
        added
    }

    /// level = floor(count / cellsPerLevel) + 1,
    /// cellsUntilNextLevel = level × cellsPerLevel − count
    pub fn record_visited_cell_count_change(&mut self, new_count: usize) {
        let per_level = self.cells_per_level as u64;
        let count = new_count as u64;
        let level = count / per_level + 1;
        let old_level = self.level;

        self.visited_cell_count = new_count;
        self.level = u32::try_from(level).unwrap_or(u32::MAX);
        self.cells_until_next_level = level * per_level - count;

        if self.level > old_level {
            tracing::info!("Reached level {} ({} cells)", self.level, new_count);
        }
    }

    /// Update the cumulative explored area (square meters)
    pub fn record_explored_area(&mut self, explored_area_m2: f64) {
        self.explored_percent = coverage::explored_percent(explored_area_m2);
    }

    /// Zero every counter and forget the previous position
    pub fn reset(&mut self) {
        *self = Self::new(&MetricsConfig {
            cells_per_level: self.cells_per_level,
        });
    }

    /// Reinstate persisted totals. The previous position is not persisted, so
    /// the next recorded position adds no distance.
    pub fn restore(&mut self, total_distance_miles: f64, visited_cell_count: usize, explored_area_m2: f64) {
        self.reset();
        self.total_distance_miles = if total_distance_miles.is_finite() {
            total_distance_miles.max(0.0)
        } else {
            0.0
        };
        self.record_visited_cell_count_change(visited_cell_count);
        self.record_explored_area(explored_area_m2);
    }

    pub fn total_distance_miles(&self) -> f64 {
        self.total_distance_miles
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn cells_until_next_level(&self) -> u64 {
        self.cells_until_next_level
    }

    pub fn previous_position(&self) -> Option<&Position> {
        self.previous.as_ref()
    }

    pub fn positions_recorded(&self) -> u64 {
        self.positions_recorded
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_distance_miles: self.total_distance_miles,
            level: self.level,
            cells_until_next_level: self.cells_until_next_level,
            visited_cell_count: self.visited_cell_count,
            explored_percent: self.explored_percent,
        }
    }
}
