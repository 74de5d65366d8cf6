use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use engine::*;
pub use error::*;
pub use game::*;
pub use generator::*;
pub use render::*;
pub use session::*;
pub use skin::*;
pub use tile::*;
pub use types::*;

mod engine;
mod error;
mod game;
mod generator;
mod render;
mod session;
mod skin;
mod tile;
mod types;

/// Rows are addressed by a single letter, `a` through `z`.
pub const MAX_ROWS: usize = 26;

/// Board dimensions and mine count, fixed once a game is created.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "SpecRepr")]
pub struct GameSpec {
    rows: Coord,
    cols: Coord,
    mines: CellCount,
}

#[derive(Deserialize)]
struct SpecRepr {
    rows: usize,
    cols: usize,
    mines: usize,
}

impl TryFrom<SpecRepr> for GameSpec {
    type Error = GameError;

    fn try_from(repr: SpecRepr) -> Result<Self> {
        Self::new(repr.rows, repr.cols, repr.mines)
    }
}

impl GameSpec {
    pub fn new(rows: usize, cols: usize, mines: usize) -> Result<Self> {
        if rows == 0 || cols == 0 {
            return Err(GameError::EmptyBoard);
        }
        if rows > MAX_ROWS {
            return Err(GameError::TooManyRows(rows));
        }
        let cols_coord = Coord::try_from(cols).map_err(|_| GameError::TooManyCols(cols))?;
        if mines == 0 {
            return Err(GameError::NoMines);
        }
        let tiles = rows * cols;
        if mines >= tiles {
            return Err(GameError::TooManyMines { mines, tiles });
        }

        // bounded by 26 * 255 above
        Ok(Self {
            rows: rows as Coord,
            cols: cols_coord,
            mines: mines as CellCount,
        })
    }

    pub const fn rows(&self) -> Coord {
        self.rows
    }

    pub const fn cols(&self) -> Coord {
        self.cols
    }

    pub const fn mines(&self) -> CellCount {
        self.mines
    }

    pub const fn size(&self) -> Coord2 {
        (self.rows, self.cols)
    }

    pub const fn total_tiles(&self) -> CellCount {
        mult(self.rows, self.cols)
    }

    /// Maps signed coordinates onto the board, `None` when out of range.
    pub fn validate(&self, row: isize, col: isize) -> Option<Coord2> {
        let row = Coord::try_from(row).ok()?;
        let col = Coord::try_from(col).ok()?;
        (row < self.rows && col < self.cols).then_some((row, col))
    }
}

impl fmt::Display for GameSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} with {} mines", self.rows, self.cols, self.mines)
    }
}

/// Built-in difficulty presets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Beginner,
    Intermediate,
    Expert,
}

impl Level {
    pub const ALL: [Level; 3] = [Level::Beginner, Level::Intermediate, Level::Expert];

    pub const fn name(self) -> &'static str {
        use Level::*;
        match self {
            Beginner => "beginner",
            Intermediate => "intermediate",
            Expert => "expert",
        }
    }

    pub const fn spec(self) -> GameSpec {
        use Level::*;
        let (rows, cols, mines) = match self {
            Beginner => (8, 8, 10),
            Intermediate => (16, 16, 40),
            Expert => (16, 30, 99),
        };
        GameSpec { rows, cols, mines }
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Beginner
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown level {0:?}, expected beginner, intermediate or expert")]
pub struct UnknownLevel(pub String);

impl FromStr for Level {
    type Err = UnknownLevel;

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Level::ALL
            .into_iter()
            .find(|level| level.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownLevel(s.to_owned()))
    }
}

/// Valid transitions:
/// - Prepare -> Gaming
/// - Gaming -> Win
/// - Gaming -> Fail
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameState {
    /// No tile opened yet, mines not placed
    #[default]
    Prepare,
    /// Mines placed, game in progress
    Gaming,
    /// Game ended and player won
    Win,
    /// Game ended and player lost
    Fail,
}

impl GameState {
    /// Indicates the game has ended and no moves can be made anymore
    pub const fn is_final(self) -> bool {
        matches!(self, Self::Win | Self::Fail)
    }
}

/// Outcome of opening a tile
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum OpenResult {
    /// Coordinates outside the board
    Out,
    /// Tile was already open
    Dup,
    /// Game is already over, nothing changed
    Ended,
    /// Opened a mine
    Fail,
    /// Opened the last safe tile
    Win,
    /// Tile opened, game goes on
    Continue,
}

impl OpenResult {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        use OpenResult::*;
        match self {
            Out | Dup | Ended => false,
            Fail | Win | Continue => true,
        }
    }

    pub const fn is_game_over(self) -> bool {
        matches!(self, Self::Fail | Self::Win)
    }
}

/// Outcome of toggling a mark
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MarkResult {
    /// Coordinates outside the board
    Out,
    /// Open tiles cannot be marked
    Opened,
    /// Game is already over, nothing changed
    Ended,
    /// Every mine is marked and nothing else is
    Win,
    /// Mark toggled, game goes on
    Continue,
}

impl MarkResult {
    /// Whether this outcome could have caused an update to the game
    pub const fn has_update(self) -> bool {
        use MarkResult::*;
        match self {
            Out | Opened | Ended => false,
            Win | Continue => true,
        }
    }
}
