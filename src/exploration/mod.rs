//! Explored-ground record: grid cells and the visited set

pub mod cell;
pub mod grid;

pub use cell::{CellRange, GridCell};
pub use grid::{CellsInBounds, ExplorationGrid};
