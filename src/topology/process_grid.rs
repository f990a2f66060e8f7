//! Process-grid topology: factor a rank count into a 3-D grid and map ranks
//! to grid coordinates.
//!
//! Ranks are laid out x-fastest: `rank = x + y*Px + z*Px*Py`. The grid is
//! computed once at startup and is identical on every rank.

use crate::domain_error::DomainError;
use crate::geometry::Int3;
use itertools::iproduct;
use serde::{Deserialize, Serialize};

/// How a rank count is turned into process-grid dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GridLayout {
    /// Near-cube factorization; near-square in x/z when the domain is one
    /// cell thick in y.
    #[default]
    Auto,
    /// `(N/2, 2, 1)` rebalanced toward equal x/y extent; odd counts use `Auto`.
    EvenSplit,
    /// Caller-supplied dimensions.
    Explicit(Int3),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessGrid {
    dims: Int3,
    rank: usize,
    coord: Int3,
}

impl ProcessGrid {
    /// Derive the grid for `process_count` ranks and bind it to `rank`.
    pub fn derive(
        process_count: usize,
        rank: usize,
        domain_size: Int3,
        layout: GridLayout,
    ) -> Result<Self, DomainError> {
        let dims = derive_process_dims(process_count, domain_size, layout)?;
        Self::from_dims(dims, rank)
    }

    pub fn from_dims(dims: Int3, rank: usize) -> Result<Self, DomainError> {
        if !dims.all(|d| d > 0) {
            return Err(DomainError::InvalidProcessGrid(format!(
                "process grid dimensions must be positive, got {dims:?}"
            )));
        }
        let count = dims.product() as usize;
        if rank >= count {
            return Err(DomainError::InvalidProcessGrid(format!(
                "rank {rank} outside process grid {dims:?} of {count} ranks"
            )));
        }
        Ok(Self {
            dims,
            rank,
            coord: coord_of(rank, dims),
        })
    }

    pub fn dims(&self) -> Int3 {
        self.dims
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Grid coordinate of this rank.
    pub fn coord(&self) -> Int3 {
        self.coord
    }

    pub fn process_count(&self) -> usize {
        self.dims.product() as usize
    }

    pub fn rank_to_coord(&self, rank: usize) -> Int3 {
        coord_of(rank, self.dims)
    }

    /// Inverse of [`ProcessGrid::rank_to_coord`]; `None` for coordinates
    /// outside the grid.
    pub fn coord_to_rank(&self, coord: Int3) -> Option<usize> {
        coord
            .is_in_bounds(self.dims)
            .then(|| coord.linear_index(self.dims))
    }

    /// Toroidal neighbor of `coord` along `mv`.
    pub fn neighbor(&self, coord: Int3, mv: Int3) -> Int3 {
        (coord + mv).rem_euclid(self.dims)
    }

    /// Rank of this rank's toroidal neighbor along `mv`.
    pub fn neighbor_rank(&self, mv: Int3) -> usize {
        self.neighbor(self.coord, mv).linear_index(self.dims)
    }
}

fn coord_of(rank: usize, dims: Int3) -> Int3 {
    Int3::from_linear_index(rank, dims)
}

/// Factor `process_count` into grid dimensions according to `layout`.
///
/// The product of the result always equals `process_count`; anything else is
/// reported as [`DomainError::InvalidProcessGrid`].
pub fn derive_process_dims(
    process_count: usize,
    domain_size: Int3,
    layout: GridLayout,
) -> Result<Int3, DomainError> {
    if process_count == 0 {
        return Err(DomainError::InvalidProcessGrid(
            "process count must be at least 1".into(),
        ));
    }
    let n = process_count as i64;
    let dims = match layout {
        GridLayout::Explicit(dims) => dims,
        GridLayout::EvenSplit if n % 2 == 0 => even_split(n),
        GridLayout::Auto | GridLayout::EvenSplit => {
            if domain_size.y == 1 {
                let (a, b) = near_square(n);
                Int3::new(a, 1, b)
            } else {
                near_cube(n)
            }
        }
    };
    if dims.product() != n || !dims.all(|d| d > 0) {
        return Err(DomainError::InvalidProcessGrid(format!(
            "grid {dims:?} does not factor {process_count} ranks"
        )));
    }
    log::debug!("process grid for {process_count} ranks: {dims:?} ({layout:?})");
    Ok(dims)
}

fn divisors(n: i64) -> impl Iterator<Item = i64> + Clone {
    (1..=n).filter(move |d| n % d == 0)
}

/// Most compact `a*b*c == n`, sorted so that `x >= y >= z`.
fn near_cube(n: i64) -> Int3 {
    let mut best = Int3::new(n, 1, 1);
    let mut best_score = (n + 2, n - 1);
    for (a, b) in iproduct!(divisors(n), divisors(n)) {
        if (n / a) % b != 0 {
            continue;
        }
        let mut f = [a, b, n / a / b];
        f.sort_unstable_by(|p, q| q.cmp(p));
        let score = (f[0] + f[1] + f[2], f[0] - f[2]);
        if score < best_score {
            best_score = score;
            best = Int3::new(f[0], f[1], f[2]);
        }
    }
    best
}

/// Most compact `a*b == n` with `a >= b`.
fn near_square(n: i64) -> (i64, i64) {
    let b = divisors(n).take_while(|d| d * d <= n).last().unwrap_or(1);
    (n / b, b)
}

fn even_split(n: i64) -> Int3 {
    let (mut x, mut y) = (n / 2, 2);
    while x > 4 && x % 2 == 0 && x / 2 >= 2 * y {
        x /= 2;
        y *= 2;
    }
    Int3::new(x, y, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUBE: Int3 = Int3::new(64, 64, 64);

    #[test]
    fn near_cube_factorizations() {
        assert_eq!(derive_process_dims(1, CUBE, GridLayout::Auto).unwrap(), Int3::new(1, 1, 1));
        assert_eq!(derive_process_dims(8, CUBE, GridLayout::Auto).unwrap(), Int3::new(2, 2, 2));
        assert_eq!(derive_process_dims(12, CUBE, GridLayout::Auto).unwrap(), Int3::new(3, 2, 2));
        assert_eq!(derive_process_dims(7, CUBE, GridLayout::Auto).unwrap(), Int3::new(7, 1, 1));
    }

    #[test]
    fn flat_domain_gets_planar_grid() {
        let flat = Int3::new(100, 1, 100);
        assert_eq!(derive_process_dims(2, flat, GridLayout::Auto).unwrap(), Int3::new(2, 1, 1));
        assert_eq!(derive_process_dims(8, flat, GridLayout::Auto).unwrap(), Int3::new(4, 1, 2));
        assert_eq!(derive_process_dims(9, flat, GridLayout::Auto).unwrap(), Int3::new(3, 1, 3));
    }

    #[test]
    fn even_split_rebalances() {
        assert_eq!(derive_process_dims(6, CUBE, GridLayout::EvenSplit).unwrap(), Int3::new(3, 2, 1));
        assert_eq!(derive_process_dims(16, CUBE, GridLayout::EvenSplit).unwrap(), Int3::new(4, 4, 1));
        assert_eq!(derive_process_dims(32, CUBE, GridLayout::EvenSplit).unwrap(), Int3::new(8, 4, 1));
        // odd counts fall back to the near-cube layout
        assert_eq!(derive_process_dims(27, CUBE, GridLayout::EvenSplit).unwrap(), Int3::splat(3));
    }

    #[test]
    fn explicit_grid_must_factor() {
        let bad = derive_process_dims(6, CUBE, GridLayout::Explicit(Int3::new(2, 2, 2)));
        assert!(matches!(bad, Err(DomainError::InvalidProcessGrid(_))));
        assert!(derive_process_dims(0, CUBE, GridLayout::Auto).is_err());
    }

    #[test]
    fn rank_round_trip() {
        for n in 1..=36 {
            let dims = derive_process_dims(n, CUBE, GridLayout::Auto).unwrap();
            let grid = ProcessGrid::from_dims(dims, 0).unwrap();
            for r in 0..n {
                assert_eq!(grid.coord_to_rank(grid.rank_to_coord(r)), Some(r));
            }
        }
    }

    #[test]
    fn neighbors_wrap() {
        let grid = ProcessGrid::from_dims(Int3::new(3, 2, 1), 0).unwrap();
        assert_eq!(grid.neighbor(Int3::zero(), Int3::new(-1, -1, -1)), Int3::new(2, 1, 0));
        assert_eq!(grid.neighbor_rank(Int3::new(1, 0, 0)), 1);
        assert_eq!(grid.neighbor_rank(Int3::zero()), 0);
    }
}
