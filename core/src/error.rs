use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum GameError {
    #[error("Board must have at least one row and one column")]
    EmptyBoard,
    #[error("Board has {0} rows, only {max} can be addressed by letter", max = crate::MAX_ROWS)]
    TooManyRows(usize),
    #[error("Board has {0} columns, at most {max} are supported", max = crate::Coord::MAX)]
    TooManyCols(usize),
    #[error("Need at least one mine")]
    NoMines,
    #[error("Too many mines: {mines} do not leave a safe tile on {tiles} tiles")]
    TooManyMines { mines: usize, tiles: usize },
    #[error("Expected {expected} mines but {found} were given")]
    MineCountMismatch { expected: usize, found: usize },
    #[error("Invalid coordinates")]
    InvalidCoords,
}

pub type Result<T, E = GameError> = core::result::Result<T, E>;
