//! Fog overlay rendering
//!
//! Turns the current viewport and the exploration grid into geometry for the
//! host map widget. This module only reads exploration state; it never
//! mutates it.

pub mod overlay;
pub mod style;
pub mod viewport;

pub use overlay::{FogOverlay, FogRenderer, OverlayDetail};
pub use style::{Color, OverlayStyle};
pub use viewport::Viewport;
