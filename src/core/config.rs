//! Exploration engine configuration with documented constants
//!
//! All tunables are collected here with explanations of their purpose and
//! how they interact. Every section is `#[serde(default)]`, so a TOML file
//! only needs to name the values it overrides.
//!
//! There is no global instance: the session owns one `ExplorationConfig` and
//! hands each component the section it needs.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::core::error::{FogError, Result};
use crate::render::style::OverlayStyle;

/// Largest block radius marked around a position
pub const MAX_NEIGHBORHOOD_RADIUS: u32 = 64;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorationConfig {
    pub grid: GridConfig,
    pub location: LocationConfig,
    pub render: RenderConfig,
    pub metrics: MetricsConfig,
    pub style: OverlayStyle,
}

/// Spatial discretization of explored ground
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    /// Edge length of a grid cell in degrees
    ///
    /// 0.003° is roughly 0.2 mi (~330 m) at the equator. Longitude cells
    /// shrink toward the poles; that distortion is accepted.
    pub cell_size_deg: f64,

    /// Block radius marked around each accepted position
    ///
    /// 1 marks a 3×3 block. A lone cell is visually negligible next to typical
    /// fix spacing, so a small neighborhood gives a visible reveal per tick.
    pub neighborhood_radius: u32,

    /// Optional ceiling on visited cells
    ///
    /// When set, the oldest-inserted cells are evicted first. None keeps
    /// history unbounded, which is the normal mode for the grid model.
    pub max_cells: Option<usize>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            cell_size_deg: 0.003,
            neighborhood_radius: 1,
            max_cells: None,
        }
    }
}

/// Accuracy filter and retry/backoff policy for the location stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Fixes worse than this are rejected while the stream is healthy (meters)
    pub accuracy_threshold_m: f64,

    /// Threshold used once the stream has degraded (meters)
    ///
    /// Tolerates poor GPS rather than stalling forever.
    pub relaxed_accuracy_threshold_m: f64,

    /// Consecutive rejected or missing fixes before Active → Degraded
    pub degrade_after_rejections: u32,

    /// First backoff delay in Degraded (milliseconds), doubled per retry
    pub initial_backoff_ms: u64,

    /// Backoff ceiling (milliseconds)
    pub max_backoff_ms: u64,

    /// Retries allowed in Degraded before the stream gives up and reports
    /// the failure to consumers
    pub max_retries: u32,

    /// While Active, a silence this long counts as one missing fix
    /// (milliseconds)
    pub fix_timeout_ms: u64,
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            accuracy_threshold_m: 500.0,
            relaxed_accuracy_threshold_m: 1000.0,
            degrade_after_rejections: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 30_000,
            max_retries: 6,
            fix_timeout_ms: 10_000,
        }
    }
}

/// Viewport limits and overlay level-of-detail breakpoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Zoomed-all-the-way-out ceiling for each span dimension (degrees)
    pub max_span_deg: f64,

    /// Padding added around the viewport, as a fraction of the larger span
    pub padding_factor: f64,

    /// Upper bound on that padding (degrees)
    ///
    /// Keeps the overlay from ballooning at extreme zoom-out.
    pub padding_cap_deg: f64,

    /// Below this span the overlay collapses to a single revealed marker,
    /// provided every cell in view has been visited
    pub revealed_span_deg: f64,

    /// Above this span per-cell holes are skipped and the view renders
    /// fully fogged
    pub fogged_span_deg: f64,

    /// Hole budget per overlay; beyond it the overlay renders fully fogged
    pub max_holes: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_span_deg: 75.0,
            padding_factor: 0.5,
            padding_cap_deg: 5.0,
            revealed_span_deg: 0.002,
            fogged_span_deg: 2.0,
            max_holes: 20_000,
        }
    }
}

/// Gamification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Visited cells needed per level
    pub cells_per_level: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { cells_per_level: 100 }
    }
}

impl ExplorationConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: ExplorationConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let grid = &self.grid;
        if !(grid.cell_size_deg.is_finite() && grid.cell_size_deg > 0.0) {
            return Err(FogError::Config(format!(
                "grid.cell_size_deg ({}) must be positive",
                grid.cell_size_deg
            )));
        }
        // Cell indices are i32: the extreme index plus the block radius must fit
        let max_index = 180.0 / grid.cell_size_deg + grid.neighborhood_radius as f64;
        if max_index >= i32::MAX as f64 {
            return Err(FogError::Config(format!(
                "grid.cell_size_deg ({}) is too small for 32-bit cell indices",
                grid.cell_size_deg
            )));
        }
        if grid.neighborhood_radius > MAX_NEIGHBORHOOD_RADIUS {
            return Err(FogError::Config(format!(
                "grid.neighborhood_radius ({}) must be at most {}",
                grid.neighborhood_radius, MAX_NEIGHBORHOOD_RADIUS
            )));
        }
        if grid.max_cells == Some(0) {
            return Err(FogError::Config("grid.max_cells must be at least 1 when set".into()));
        }

        let loc = &self.location;
        if loc.accuracy_threshold_m <= 0.0 {
            return Err(FogError::Config("location.accuracy_threshold_m must be positive".into()));
        }
        if loc.relaxed_accuracy_threshold_m < loc.accuracy_threshold_m {
            return Err(FogError::Config(format!(
                "location.relaxed_accuracy_threshold_m ({}) should be >= accuracy_threshold_m ({})",
                loc.relaxed_accuracy_threshold_m, loc.accuracy_threshold_m
            )));
        }
        if loc.degrade_after_rejections == 0 {
            return Err(FogError::Config("location.degrade_after_rejections must be at least 1".into()));
        }
        if loc.initial_backoff_ms == 0 || loc.initial_backoff_ms > loc.max_backoff_ms {
            return Err(FogError::Config(format!(
                "location.initial_backoff_ms ({}) must be in 1..=max_backoff_ms ({})",
                loc.initial_backoff_ms, loc.max_backoff_ms
            )));
        }
        if loc.fix_timeout_ms == 0 {
            return Err(FogError::Config("location.fix_timeout_ms must be positive".into()));
        }

        let render = &self.render;
        if render.max_span_deg <= 0.0 || render.padding_cap_deg < 0.0 || render.padding_factor < 0.0 {
            return Err(FogError::Config("render spans and padding must be non-negative".into()));
        }
        if !(render.revealed_span_deg < render.fogged_span_deg
            && render.fogged_span_deg <= render.max_span_deg)
        {
            return Err(FogError::Config(format!(
                "render breakpoints must satisfy revealed ({}) < fogged ({}) <= max span ({})",
                render.revealed_span_deg, render.fogged_span_deg, render.max_span_deg
            )));
        }

        if self.metrics.cells_per_level == 0 {
            return Err(FogError::Config("metrics.cells_per_level must be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(ExplorationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ExplorationConfig::from_toml_str(
            r#"
            [grid]
            cell_size_deg = 0.01

            [metrics]
            cells_per_level = 50
            "#,
        )
        .unwrap();

        assert_eq!(config.grid.cell_size_deg, 0.01);
        assert_eq!(config.grid.neighborhood_radius, 1);
        assert_eq!(config.metrics.cells_per_level, 50);
        assert_eq!(config.location, LocationConfig::default());
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let mut config = ExplorationConfig::default();
        config.location.relaxed_accuracy_threshold_m = 100.0;
        assert!(matches!(config.validate(), Err(FogError::Config(_))));
    }

    #[test]
    fn test_lod_breakpoints_ordered() {
        let mut config = ExplorationConfig::default();
        config.render.revealed_span_deg = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_tiny_cell_size_rejected() {
        let mut config = ExplorationConfig::default();
        config.grid.cell_size_deg = 1e-8;
        assert!(matches!(config.validate(), Err(FogError::Config(_))));

        // Smallest sizes that still index the whole globe are fine
        config.grid.cell_size_deg = 1e-6;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_neighborhood_radius_bounded() {
        let mut config = ExplorationConfig::default();
        config.grid.neighborhood_radius = MAX_NEIGHBORHOOD_RADIUS;
        assert!(config.validate().is_ok());

        config.grid.neighborhood_radius = u32::MAX;
        assert!(matches!(config.validate(), Err(FogError::Config(_))));
    }

    #[test]
    fn test_malformed_toml_is_error() {
        let err = ExplorationConfig::from_toml_str("[grid\ncell_size_deg = ").unwrap_err();
        assert!(matches!(err, FogError::TomlError(_)));
    }
}
