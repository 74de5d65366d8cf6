use core::fmt;
use ndarray::Array2;

use crate::*;

/// Single-threaded minesweeper state machine.
///
/// Mines are placed lazily on the first [`open`](Self::open), never under the opened tile. Once the game reaches
/// [`GameState::Win`] or [`GameState::Fail`] every further move reports [`OpenResult::Ended`] or
/// [`MarkResult::Ended`] and leaves the board untouched.
pub struct PlayEngine {
    spec: GameSpec,
    tiles: Array2<Tile>,
    state: GameState,
    open_count: CellCount,
    mark_count: CellCount,
    placer: Option<Box<dyn MinePlacer + Send>>,
}

impl PlayEngine {
    pub fn new(spec: GameSpec) -> Self {
        Self::with_placer(spec, RandomPlacer::from_clock())
    }

    pub fn with_placer(spec: GameSpec, placer: impl MinePlacer + Send + 'static) -> Self {
        Self {
            spec,
            tiles: Array2::default(spec.size().to_nd_index()),
            state: Default::default(),
            open_count: 0,
            mark_count: 0,
            placer: Some(Box::new(placer)),
        }
    }

    pub fn spec(&self) -> GameSpec {
        self.spec
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn tiles(&self) -> &Array2<Tile> {
        &self.tiles
    }

    pub fn tile_at(&self, coords: Coord2) -> Tile {
        self.tiles[coords.to_nd_index()]
    }

    /// Tiles opened by play, not counting the end-of-game reveal.
    pub fn open_count(&self) -> CellCount {
        self.open_count
    }

    pub fn mark_count(&self) -> CellCount {
        self.mark_count
    }

    /// How many mines have not been marked yet, negative when over-marked
    pub fn mines_left(&self) -> isize {
        (self.spec.mines() as isize) - (self.mark_count as isize)
    }

    pub fn open(&mut self, row: isize, col: isize) -> OpenResult {
        let Some(coords) = self.spec.validate(row, col) else {
            return OpenResult::Out;
        };
        if self.state.is_final() {
            return OpenResult::Ended;
        }
        if self.tiles[coords.to_nd_index()].is_open {
            return OpenResult::Dup;
        }

        self.open_tile(coords);

        if matches!(self.state, GameState::Prepare) {
            self.place_mines(coords);
        }

        let tile = &mut self.tiles[coords.to_nd_index()];
        log::debug!("Open tile at {:?}, mine count: {}", coords, tile.count);

        if tile.is_mine {
            tile.boom = true;
            self.end_game(false);
            return OpenResult::Fail;
        }

        if tile.count == 0 {
            self.flood_fill(coords);
        }

        if self.open_count + self.spec.mines() >= self.spec.total_tiles() {
            self.end_game(true);
            OpenResult::Win
        } else {
            OpenResult::Continue
        }
    }

    pub fn mark(&mut self, row: isize, col: isize) -> MarkResult {
        let Some(coords) = self.spec.validate(row, col) else {
            return MarkResult::Out;
        };
        if self.state.is_final() {
            return MarkResult::Ended;
        }

        let tile = &mut self.tiles[coords.to_nd_index()];
        if tile.is_open {
            return MarkResult::Opened;
        }

        tile.marked = !tile.marked;
        if tile.marked {
            self.mark_count += 1;
        } else {
            self.mark_count -= 1;
        }
        log::debug!("Mark at {:?} set to {}", coords, tile.marked);

        if self.mark_count == self.spec.mines()
            && self.tiles.iter().filter(|t| t.marked).all(|t| t.is_mine)
        {
            self.end_game(true);
            MarkResult::Win
        } else {
            MarkResult::Continue
        }
    }

    fn open_tile(&mut self, coords: Coord2) {
        let tile = &mut self.tiles[coords.to_nd_index()];
        tile.is_open = true;
        if tile.marked {
            tile.marked = false;
            self.mark_count -= 1;
        }
        self.open_count += 1;
    }

    fn place_mines(&mut self, exclude: Coord2) {
        let mut placer = self
            .placer
            .take()
            .unwrap_or_else(|| Box::new(RandomPlacer::from_clock()) as Box<dyn MinePlacer + Send>);
        let mines = placer.place(&self.spec, exclude);

        for (tile, &mine) in self.tiles.iter_mut().zip(mines.iter()) {
            tile.is_mine = mine;
        }
        for ((row, col), tile) in self.tiles.indexed_iter_mut() {
            // dimensions come from a GameSpec, so they fit in a Coord
            let coords = (row as Coord, col as Coord);
            tile.count = mines
                .iter_neighbors(coords)
                .filter(|pos| mines[pos.to_nd_index()])
                .count() as u8;
        }

        self.state = GameState::Gaming;
        log::debug!("Mines placed, game started on {}", self.spec);
    }

    /// Opens the connected region of zero-count tiles around `start` plus its numbered border.
    fn flood_fill(&mut self, start: Coord2) {
        let mut to_visit = vec![start];
        log::trace!("Starting flood-fill from {:?}", start);

        while let Some(visit_coords) = to_visit.pop() {
            for pos in self.tiles.iter_neighbors(visit_coords) {
                let tile = self.tiles[pos.to_nd_index()];
                if tile.is_open || tile.is_mine {
                    continue;
                }

                self.open_tile(pos);
                log::trace!("Flood opened tile at {:?}, mine count: {}", pos, tile.count);

                if tile.count == 0 {
                    to_visit.push(pos);
                }
            }
        }
    }

    fn end_game(&mut self, won: bool) {
        self.state = if won { GameState::Win } else { GameState::Fail };
        log::debug!("Game ended: {:?}", self.state);
        self.reveal_all();
    }

    /// Opens unmarked mines and mismarked safe tiles for the final board.
    fn reveal_all(&mut self) {
        for tile in self.tiles.iter_mut() {
            if tile.is_mine != tile.marked {
                tile.is_open = true;
            }
        }
    }
}

impl fmt::Debug for PlayEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayEngine")
            .field("spec", &self.spec)
            .field("state", &self.state)
            .field("open_count", &self.open_count)
            .field("mark_count", &self.mark_count)
            .finish_non_exhaustive()
    }
}
