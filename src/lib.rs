//! Fog Explorer - fog-of-war exploration engine
//!
//! Turns a stream of GPS fixes into a persistent record of explored ground
//! and renders the unexplored remainder as a fog overlay for a map view.

pub mod core;
pub mod exploration;
pub mod location;
pub mod metrics;
pub mod render;
pub mod session;

pub use session::{ExplorationSession, ExplorationState, SessionEvent};
