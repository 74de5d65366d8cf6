use super::*;
use rand::prelude::*;

/// Uniform placement by rejection sampling: draw random tiles until enough distinct free ones are mines.
#[derive(Clone, Debug)]
pub struct RandomPlacer {
    rng: SmallRng,
}

impl RandomPlacer {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Seeded from the wall clock, for games that need not be reproducible.
    pub fn from_clock() -> Self {
        Self::new(clock_seed())
    }
}

/// Seed derived from the current time.
pub fn clock_seed() -> u64 {
    let now = chrono::Utc::now();
    let nanos = now.timestamp_nanos_opt().unwrap_or_else(|| now.timestamp());
    nanos as u64
}

impl MinePlacer for RandomPlacer {
    fn place(&mut self, spec: &GameSpec, exclude: Coord2) -> Array2<bool> {
        let mut mines: Array2<bool> = Array2::default(spec.size().to_nd_index());
        let (rows, cols) = spec.size();
        let mut placed: CellCount = 0;

        // a valid spec always leaves at least one free tile besides `exclude`
        while placed < spec.mines() {
            let coords = (
                self.rng.random_range(0..rows),
                self.rng.random_range(0..cols),
            );
            if coords == exclude || mines[coords.to_nd_index()] {
                continue;
            }
            mines[coords.to_nd_index()] = true;
            placed += 1;
        }

        log::debug!(
            "placed {} mines on {}x{}, first open at {:?}",
            placed,
            rows,
            cols,
            exclude
        );
        mines
    }
}
