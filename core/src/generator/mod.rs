use crate::*;
use ndarray::Array2;
pub use fixed::*;
pub use random::*;

mod fixed;
mod random;

/// Decides where mines go, once, when the first tile of a game is opened.
pub trait MinePlacer {
    /// Returns a mine mask of `spec.size()` holding exactly `spec.mines()` mines, none at `exclude`.
    fn place(&mut self, spec: &GameSpec, exclude: Coord2) -> Array2<bool>;
}
