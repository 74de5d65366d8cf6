use super::*;

/// Places mines at predetermined coordinates.
///
/// A listed mine that lands on the first opened tile moves to the first free tile in row-major order, so the
/// first open stays safe and the mine count still matches the spec.
#[derive(Clone, Debug, PartialEq)]
pub struct FixedPlacer {
    coords: Vec<Coord2>,
}

impl FixedPlacer {
    pub fn new(spec: &GameSpec, coords: &[Coord2]) -> Result<Self> {
        let mut unique = coords.to_vec();
        unique.sort_unstable();
        unique.dedup();

        if unique.iter().any(|&(row, col)| row >= spec.rows() || col >= spec.cols()) {
            return Err(GameError::InvalidCoords);
        }
        if unique.len() != usize::from(spec.mines()) {
            return Err(GameError::MineCountMismatch {
                expected: spec.mines().into(),
                found: unique.len(),
            });
        }

        Ok(Self { coords: unique })
    }
}

impl MinePlacer for FixedPlacer {
    fn place(&mut self, spec: &GameSpec, exclude: Coord2) -> Array2<bool> {
        let mut mines: Array2<bool> = Array2::default(spec.size().to_nd_index());
        let mut displaced = false;

        for &coords in &self.coords {
            if coords == exclude {
                displaced = true;
            } else {
                mines[coords.to_nd_index()] = true;
            }
        }

        if displaced {
            let skip = (usize::from(exclude.0), usize::from(exclude.1));
            let free = mines
                .indexed_iter()
                .find(|&(index, &mine)| !mine && index != skip)
                .map(|(index, _)| index);
            if let Some(index) = free {
                log::warn!(
                    "Mine at first opened tile {:?} moved to {:?}",
                    exclude,
                    index
                );
                mines[index] = true;
            }
        }

        mines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_listed_mines() {
        let spec = GameSpec::new(3, 3, 2).unwrap();
        let mut placer = FixedPlacer::new(&spec, &[(2, 2), (0, 2)]).unwrap();
        let mines = placer.place(&spec, (0, 0));
        assert!(mines[[2, 2]] && mines[[0, 2]]);
        assert_eq!(mines.iter().filter(|&&m| m).count(), 2);
    }

    #[test]
    fn relocates_mine_under_first_open() {
        let spec = GameSpec::new(2, 2, 1).unwrap();
        let mut placer = FixedPlacer::new(&spec, &[(0, 0)]).unwrap();
        let mines = placer.place(&spec, (0, 0));
        assert!(!mines[[0, 0]]);
        assert!(mines[[0, 1]]);
    }

    #[test]
    fn rejects_wrong_count_or_bounds() {
        let spec = GameSpec::new(3, 3, 2).unwrap();
        assert_eq!(
            FixedPlacer::new(&spec, &[(1, 1)]),
            Err(GameError::MineCountMismatch {
                expected: 2,
                found: 1
            })
        );
        assert_eq!(
            FixedPlacer::new(&spec, &[(1, 1), (3, 0)]),
            Err(GameError::InvalidCoords)
        );
    }
}
