//! Single-axis partition: the domain is cut into contiguous x-slabs, one per
//! rank. Packets only travel to `rank - 1` and `rank + 1`; there is no
//! wraparound.

use super::{BlockSpec, PartitionKind, PartitionStrategy};
use crate::domain_error::DomainError;
use crate::geometry::{DomainGeometry, Int3};
use crate::topology::ProcessGrid;

#[derive(Debug, Clone, PartialEq)]
pub struct SlabPartition {
    geometry: DomainGeometry,
    grid: ProcessGrid,
    /// Columns per slab before the remainder is handed out.
    base: i64,
    /// The first `remainder` slabs carry one extra column.
    remainder: i64,
}

impl SlabPartition {
    pub fn new(
        geometry: DomainGeometry,
        process_count: usize,
        rank: usize,
    ) -> Result<Self, DomainError> {
        geometry.validate()?;
        let grid = ProcessGrid::from_dims(Int3::new(process_count as i64, 1, 1), rank)?;
        let n = process_count as i64;
        let nx = geometry.size.x;
        if n > nx {
            return Err(DomainError::InvalidDomain(format!(
                "cannot split {nx} columns into {n} slabs"
            )));
        }
        Ok(Self {
            geometry,
            grid,
            base: nx / n,
            remainder: nx % n,
        })
    }

    /// `[start, end)` column range of slab `rank`.
    pub fn slab_range(&self, rank: usize) -> (i64, i64) {
        let r = rank as i64;
        let start = r * self.base + r.min(self.remainder);
        let width = self.base + i64::from(r < self.remainder);
        (start, start + width)
    }

    /// Rank owning global column `x` (which must be inside the domain).
    pub fn slab_of_column(&self, x: i64) -> usize {
        let wide = self.remainder * (self.base + 1);
        let slab = if x < wide {
            x / (self.base + 1)
        } else {
            self.remainder + (x - wide) / self.base
        };
        slab as usize
    }

    fn own_spec(&self) -> BlockSpec {
        let (start, end) = self.slab_range(self.grid.rank());
        let size = self.geometry.size;
        BlockSpec {
            global_addr: self.grid.coord(),
            first_cell: Int3::new(start, 0, 0),
            size: Int3::new(end - start, size.y, size.z),
        }
    }

    fn shifted_rank(&self, shift: i64) -> Option<usize> {
        let r = self.grid.rank() as i64 + shift;
        (0..self.grid.process_count() as i64)
            .contains(&r)
            .then_some(r as usize)
    }
}

impl PartitionStrategy for SlabPartition {
    fn kind(&self) -> PartitionKind {
        PartitionKind::Slab
    }

    fn geometry(&self) -> &DomainGeometry {
        &self.geometry
    }

    fn grid(&self) -> &ProcessGrid {
        &self.grid
    }

    fn local_blocks(&self) -> Vec<BlockSpec> {
        vec![self.own_spec()]
    }

    fn local_block_of_cell(&self, cell: Int3) -> Option<usize> {
        (self.geometry.contains_cell(cell) && self.slab_of_column(cell.x) == self.grid.rank())
            .then_some(0)
    }

    fn owner_of_cell(&self, cell: Int3) -> Option<Int3> {
        self.geometry
            .contains_cell(cell)
            .then(|| Int3::new(self.slab_of_column(cell.x) as i64, 0, 0))
    }

    fn exchange_offsets(&self) -> Vec<Int3> {
        vec![Int3::new(-1, 0, 0), Int3::new(1, 0, 0)]
    }

    fn destination_rank(&self, mv: Int3) -> Option<usize> {
        self.shifted_rank(mv.x)
    }

    fn source_rank(&self, mv: Int3) -> Option<usize> {
        self.shifted_rank(-mv.x)
    }
}
