//! Spatial partitioning of the global cell lattice across ranks.
//!
//! A single [`PartitionStrategy`] interface is implemented by
//! [`BlockCyclicPartition`] (many blocks per rank, dealt cyclically over a
//! 3-D process grid) and [`SlabPartition`] (one x-slab per rank). The strategy
//! is chosen from configuration through [`PartitionKind`]; the exchange
//! protocol and the stepper only see the trait.

pub mod block_cyclic;
pub mod slab;

pub use block_cyclic::BlockCyclicPartition;
pub use slab::SlabPartition;

use crate::domain_error::DomainError;
use crate::geometry::{DomainGeometry, Int3};
use crate::topology::{GridLayout, ProcessGrid};
use serde::{Deserialize, Serialize};

/// Default number of blocks per rank along each axis.
pub const DEFAULT_BLOCKS_PER_DIM: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PartitionKind {
    #[default]
    BlockCyclic,
    Slab,
}

/// Cell extent of one block owned by this rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSpec {
    /// Global block coordinate.
    pub global_addr: Int3,
    /// Global cell index of the block's first cell.
    pub first_cell: Int3,
    /// Cells per axis; may run past the global domain on its last block.
    pub size: Int3,
}

impl BlockSpec {
    /// One past the last global cell of the block.
    pub fn end_cell(&self) -> Int3 {
        self.first_cell + self.size
    }

    pub fn contains_cell(&self, cell: Int3) -> bool {
        (cell - self.first_cell).is_in_bounds(self.size)
    }

    /// Per-axis direction from this block to `cell`: `-1` below the lower
    /// bound (inclusive), `+1` at or beyond the upper bound (exclusive).
    pub fn direction_to(&self, cell: Int3) -> Int3 {
        let end = self.end_cell();
        let axis = |c: i64, lo: i64, hi: i64| {
            if c < lo {
                -1
            } else if c >= hi {
                1
            } else {
                0
            }
        };
        Int3::new(
            axis(cell.x, self.first_cell.x, end.x),
            axis(cell.y, self.first_cell.y, end.y),
            axis(cell.z, self.first_cell.z, end.z),
        )
    }
}

/// Domain-partitioning strategy shared by exchange and stepper code.
pub trait PartitionStrategy: std::fmt::Debug + Send + Sync {
    fn kind(&self) -> PartitionKind;

    fn geometry(&self) -> &DomainGeometry;

    fn grid(&self) -> &ProcessGrid;

    /// Blocks owned by this rank, in local linear order.
    fn local_blocks(&self) -> Vec<BlockSpec>;

    /// Index into [`PartitionStrategy::local_blocks`] of the block holding
    /// global `cell`, or `None` if the cell is not owned by this rank.
    fn local_block_of_cell(&self, cell: Int3) -> Option<usize>;

    /// Process-grid coordinate owning `cell`; `None` outside the domain.
    fn owner_of_cell(&self, cell: Int3) -> Option<Int3>;

    /// Relative process offsets exchanged every step; the position in this
    /// list selects the message tag.
    fn exchange_offsets(&self) -> Vec<Int3>;

    /// Rank receiving packets this rank sends along `mv`.
    fn destination_rank(&self, mv: Int3) -> Option<usize>;

    /// Rank whose packets along `mv` arrive at this rank.
    fn source_rank(&self, mv: Int3) -> Option<usize>;
}

/// Build the configured strategy for `rank` out of `process_count` ranks.
pub fn build_partition(
    kind: PartitionKind,
    geometry: DomainGeometry,
    process_count: usize,
    rank: usize,
    layout: GridLayout,
    blocks_per_dim: i64,
) -> Result<Box<dyn PartitionStrategy>, DomainError> {
    geometry.validate()?;
    Ok(match kind {
        PartitionKind::BlockCyclic => {
            let grid = ProcessGrid::derive(process_count, rank, geometry.size, layout)?;
            Box::new(BlockCyclicPartition::new(geometry, grid, blocks_per_dim)?)
        }
        PartitionKind::Slab => Box::new(SlabPartition::new(geometry, process_count, rank)?),
    })
}
