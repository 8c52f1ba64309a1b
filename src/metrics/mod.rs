//! User-facing progress numbers derived from accepted positions and the grid

pub mod coverage;
pub mod progress;

pub use coverage::{explored_percent, viewport_visible_percent};
pub use progress::{ExplorationMetrics, MetricsSnapshot};
