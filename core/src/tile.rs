use serde::{Deserialize, Serialize};

/// One cell of the board.
///
/// `count` is only meaningful once mines have been placed, `boom` is set on the
/// single mine whose opening lost the game.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tile {
    pub is_mine: bool,
    pub is_open: bool,
    pub marked: bool,
    pub boom: bool,
    pub count: u8,
}

impl Tile {
    /// Whether a coordinate label is drawn over this tile.
    pub const fn is_blank(self) -> bool {
        !self.is_open && !self.marked
    }

    /// Whether the tile is shown to the player as a mismarked safe tile.
    pub const fn is_wrong_flag(self) -> bool {
        self.is_open && !self.is_mine && self.marked
    }
}
