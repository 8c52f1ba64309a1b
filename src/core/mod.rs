pub mod config;
pub mod error;
pub mod geodesy;
pub mod types;

pub use config::ExplorationConfig;
pub use error::{FogError, Result};
pub use types::{Coordinate, GeoBounds, LocationFix, Position};
