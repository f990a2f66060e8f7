//! Block-cyclic partition of the cell lattice.
//!
//! The domain is cut into blocks of `block_size` cells; global block `g` is
//! owned by the rank at process-grid coordinate `g mod P`. With `k` blocks per
//! dimension each rank owns up to `k` blocks along every axis, which spreads
//! a compact particle cloud over many ranks.

use super::{BlockSpec, PartitionKind, PartitionStrategy};
use crate::domain_error::DomainError;
use crate::geometry::{Double3, DomainGeometry, Int3};
use crate::topology::ProcessGrid;
use itertools::iproduct;

#[derive(Debug, Clone, PartialEq)]
pub struct BlockCyclicPartition {
    geometry: DomainGeometry,
    grid: ProcessGrid,
    blocks_per_dim: i64,
    block_size: Int3,
    num_blocks_local: Int3,
}

impl BlockCyclicPartition {
    pub fn new(
        geometry: DomainGeometry,
        grid: ProcessGrid,
        blocks_per_dim: i64,
    ) -> Result<Self, DomainError> {
        geometry.validate()?;
        if blocks_per_dim < 1 {
            return Err(DomainError::InvalidConfig(format!(
                "blocks per dimension must be at least 1, got {blocks_per_dim}"
            )));
        }
        let size = geometry.size;
        let procs = grid.dims();
        if !size.zip_with(procs, |s, p| p <= s).all(|ok| ok) {
            return Err(DomainError::InvalidDomain(format!(
                "domain of {size:?} cells cannot be split over process grid {procs:?}"
            )));
        }
        let block_size = size.zip_with(procs, |s, p| (s / (p * blocks_per_dim)).max(1));
        let num_blocks_local = size.zip_with(procs.component_mul(block_size), |s, span| {
            (s + span - 1) / span
        });
        log::debug!(
            "rank {}: block-cyclic partition, block size {block_size:?}, {num_blocks_local:?} local blocks",
            grid.rank()
        );
        Ok(Self {
            geometry,
            grid,
            blocks_per_dim,
            block_size,
            num_blocks_local,
        })
    }

    pub fn blocks_per_dim(&self) -> i64 {
        self.blocks_per_dim
    }

    /// Cells per block along each axis.
    pub fn block_size(&self) -> Int3 {
        self.block_size
    }

    /// Blocks owned by this rank along each axis.
    pub fn num_blocks_local(&self) -> Int3 {
        self.num_blocks_local
    }

    /// Number of blocks along each axis of the whole domain.
    pub fn num_blocks_global(&self) -> Int3 {
        self.num_blocks_local.component_mul(self.grid.dims())
    }

    pub fn block_local_index_3d(&self, addr: Int3) -> usize {
        addr.linear_index(self.num_blocks_local)
    }

    pub fn block_global_index_3d(&self, addr: Int3) -> usize {
        addr.linear_index(self.num_blocks_global())
    }

    pub fn block_local_addr_to_block_global_addr(&self, addr: Int3) -> Int3 {
        addr.component_mul(self.grid.dims()) + self.grid.coord()
    }

    /// Local block coordinate of global block `addr`, or `None` when the block
    /// belongs to another rank.
    pub fn block_global_addr_to_block_local_addr(&self, addr: Int3) -> Option<Int3> {
        let procs = self.grid.dims();
        if addr.rem_euclid(procs) != self.grid.coord() {
            return None;
        }
        let local = addr.div_euclid(procs);
        local.is_in_bounds(self.num_blocks_local).then_some(local)
    }

    pub fn domain_global_addr_to_block_global_addr(&self, cell: Int3) -> Int3 {
        cell.div_euclid(self.block_size)
    }

    pub fn domain_global_addr_to_domain_local_addr(&self, cell: Int3) -> Int3 {
        cell.rem_euclid(self.block_size)
    }

    /// Global block holding an absolute position (half-open cells, no bias).
    pub fn absolute_position_to_block_global_addr(&self, position: Double3) -> Int3 {
        self.domain_global_addr_to_block_global_addr(self.geometry.locate(position))
    }

    /// Absolute origin of local block `addr`.
    pub fn block_local_addr_to_absolute_position(&self, addr: Int3) -> Double3 {
        let global = self.block_local_addr_to_block_global_addr(addr);
        self.geometry
            .cell_origin(global.component_mul(self.block_size))
    }

    fn spec_for_local(&self, addr: Int3) -> BlockSpec {
        let global_addr = self.block_local_addr_to_block_global_addr(addr);
        BlockSpec {
            global_addr,
            first_cell: global_addr.component_mul(self.block_size),
            size: self.block_size,
        }
    }
}

impl PartitionStrategy for BlockCyclicPartition {
    fn kind(&self) -> PartitionKind {
        PartitionKind::BlockCyclic
    }

    fn geometry(&self) -> &DomainGeometry {
        &self.geometry
    }

    fn grid(&self) -> &ProcessGrid {
        &self.grid
    }

    fn local_blocks(&self) -> Vec<BlockSpec> {
        let n = self.num_blocks_local;
        iproduct!(0..n.z, 0..n.y, 0..n.x)
            .map(|(z, y, x)| self.spec_for_local(Int3::new(x, y, z)))
            .collect()
    }

    fn local_block_of_cell(&self, cell: Int3) -> Option<usize> {
        if !self.geometry.contains_cell(cell) {
            return None;
        }
        let global = self.domain_global_addr_to_block_global_addr(cell);
        self.block_global_addr_to_block_local_addr(global)
            .map(|local| self.block_local_index_3d(local))
    }

    fn owner_of_cell(&self, cell: Int3) -> Option<Int3> {
        self.geometry.contains_cell(cell).then(|| {
            self.domain_global_addr_to_block_global_addr(cell)
                .rem_euclid(self.grid.dims())
        })
    }

    fn exchange_offsets(&self) -> Vec<Int3> {
        iproduct!(-1..=1, -1..=1, -1..=1)
            .map(|(z, y, x)| Int3::new(x, y, z))
            .collect()
    }

    fn destination_rank(&self, mv: Int3) -> Option<usize> {
        Some(self.grid.neighbor_rank(mv))
    }

    fn source_rank(&self, mv: Int3) -> Option<usize> {
        Some(self.grid.neighbor_rank(-mv))
    }
}
