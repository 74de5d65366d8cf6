use ndarray::Array2;

/// Single coordinate axis used for board rows, columns, and positions.
pub type Coord = u8;

/// Count type used for mine counts and total-tile counts.
pub type CellCount = u16;

/// Two-dimensional coordinates `(row, col)`.
pub type Coord2 = (Coord, Coord);

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for Coord2 {
    type Output = [usize; 2];

    fn to_nd_index(self) -> Self::Output {
        [self.0.into(), self.1.into()]
    }
}

pub const fn mult(a: Coord, b: Coord) -> CellCount {
    let a = a as CellCount;
    let b = b as CellCount;
    a.saturating_mul(b)
}

pub trait NeighborIterExt {
    fn iter_neighbors(&self, index: Coord2) -> NeighborIter;
}

impl<T> NeighborIterExt for Array2<T> {
    fn iter_neighbors(&self, index: Coord2) -> NeighborIter {
        let (rows, cols) = self.dim();
        let bounds = (
            rows.try_into().unwrap_or(Coord::MAX),
            cols.try_into().unwrap_or(Coord::MAX),
        );
        NeighborIter::new(index, bounds)
    }
}

/// Offsets of the eight surrounding tiles, column-major from the top-left.
static NEIGHBOR_OFFSETS: [(i8, i8); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Iterates the up to eight in-bounds neighbours of a tile in a fixed order.
#[derive(Debug, Clone)]
pub struct NeighborIter {
    center: Coord2,
    bounds: Coord2,
    offsets: core::slice::Iter<'static, (i8, i8)>,
}

impl NeighborIter {
    fn new(center: Coord2, bounds: Coord2) -> Self {
        Self {
            center,
            bounds,
            offsets: NEIGHBOR_OFFSETS.iter(),
        }
    }
}

/// `center` moved by `(dr, dc)`, when that stays inside `bounds`.
fn shift(center: Coord2, (dr, dc): (i8, i8), bounds: Coord2) -> Option<Coord2> {
    let row = center.0.checked_add_signed(dr)?;
    let col = center.1.checked_add_signed(dc)?;
    (row < bounds.0 && col < bounds.1).then_some((row, col))
}

impl Iterator for NeighborIter {
    type Item = Coord2;

    fn next(&mut self) -> Option<Self::Item> {
        let (center, bounds) = (self.center, self.bounds);
        self.offsets.find_map(|&offset| shift(center, offset, bounds))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neighbors(center: Coord2, size: Coord2) -> Vec<Coord2> {
        let grid: Array2<bool> = Array2::default(size.to_nd_index());
        grid.iter_neighbors(center).collect()
    }

    #[test]
    fn corner_has_three_neighbors() {
        let found = neighbors((0, 0), (3, 3));
        assert_eq!(found, vec![(1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn center_has_eight_neighbors() {
        assert_eq!(neighbors((1, 1), (3, 3)).len(), 8);
    }

    #[test]
    fn single_tile_board_has_no_neighbors() {
        assert!(neighbors((0, 0), (1, 1)).is_empty());
    }

    #[test]
    fn mult_saturates() {
        assert_eq!(mult(255, 255), 65025);
        assert_eq!(mult(3, 4), 12);
    }
}
