//! All blocks owned by one rank, together with the partition that produced
//! them.

use super::local_block::{Bin, LocalBlock};
use crate::domain_error::DomainError;
use crate::geometry::{DomainGeometry, Int3};
use crate::particle::Particle;
use crate::partition::PartitionStrategy;

#[derive(Debug)]
pub struct LocalDomain {
    partition: Box<dyn PartitionStrategy>,
    geometry: DomainGeometry,
    blocks: Vec<LocalBlock>,
}

impl LocalDomain {
    /// Allocate one [`LocalBlock`] per block the partition assigns to this rank.
    pub fn init(partition: Box<dyn PartitionStrategy>) -> Self {
        let geometry = *partition.geometry();
        let blocks = partition
            .local_blocks()
            .into_iter()
            .map(|spec| LocalBlock::new(spec, &geometry))
            .collect();
        Self {
            partition,
            geometry,
            blocks,
        }
    }

    pub fn partition(&self) -> &dyn PartitionStrategy {
        self.partition.as_ref()
    }

    pub fn geometry(&self) -> &DomainGeometry {
        &self.geometry
    }

    pub fn blocks(&self) -> &[LocalBlock] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut [LocalBlock] {
        &mut self.blocks
    }

    /// Place a particle given by absolute position: resolve the owning block
    /// and cell, and store the in-cell offset.
    pub fn place_absolute(&mut self, p: Particle, bin: Bin) -> Result<(), DomainError> {
        if !p.displacement.is_finite() {
            return Err(DomainError::OutsideDomain(p.displacement));
        }
        let cell = self.geometry.locate(p.displacement);
        let block = self
            .partition
            .local_block_of_cell(cell)
            .ok_or(DomainError::OutsideDomain(p.displacement))?;
        let offset = self.geometry.offset_in_cell(p.displacement, cell);
        self.blocks[block].push(cell, p.with_displacement(offset), bin);
        Ok(())
    }

    /// Apply `flag(global_cell)` to every in-domain cell of every block.
    pub fn mark_ground_cells(&mut self, flag: impl Fn(Int3) -> bool) -> usize {
        let mut marked = 0;
        for block in &mut self.blocks {
            for i in 0..block.cell_count() {
                let cell = block.global_cell(i);
                let hit = self.geometry.contains_cell(cell) && flag(cell);
                block.set_ground_contact(i, hit);
                marked += usize::from(hit);
            }
        }
        marked
    }

    pub fn swap_buffers(&mut self) {
        self.blocks.iter_mut().for_each(LocalBlock::swap_buffers);
    }

    pub fn clear_next(&mut self) {
        self.blocks.iter_mut().for_each(LocalBlock::clear_next);
    }

    pub fn particle_count(&self) -> usize {
        self.blocks.iter().map(LocalBlock::particle_count).sum()
    }

    pub fn contains_particles(&self) -> bool {
        self.blocks.iter().any(|b| !b.is_empty())
    }

    /// Every active particle with an absolute position.
    pub fn absolute_particles(&self) -> impl Iterator<Item = Particle> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.absolute_particles(&self.geometry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Double3;
    use crate::partition::{PartitionKind, build_partition};
    use crate::topology::GridLayout;

    fn domain(rank: usize) -> LocalDomain {
        let g = DomainGeometry::new(Double3::zero(), 1.0, Int3::new(20, 1, 20)).unwrap();
        let p = build_partition(PartitionKind::BlockCyclic, g, 2, rank, GridLayout::Auto, 2)
            .unwrap();
        LocalDomain::init(p)
    }

    #[test]
    fn place_absolute_resolves_owner() {
        let mut d0 = domain(0);
        // block size 5 in x: cells 0..5 belong to rank 0, 5..10 to rank 1
        d0.place_absolute(Particle::at(0, Double3::new(4.5, 0.5, 3.0)), Bin::Current)
            .unwrap();
        assert_eq!(d0.particle_count(), 1);
        let err = d0.place_absolute(Particle::at(0, Double3::new(5.5, 0.5, 3.0)), Bin::Current);
        assert!(matches!(err, Err(DomainError::OutsideDomain(_))));
        let abs: Vec<_> = d0.absolute_particles().collect();
        assert_eq!(abs[0].displacement, Double3::new(4.5, 0.5, 3.0));
    }

    #[test]
    fn ground_marking_only_touches_domain_cells() {
        let mut d = domain(1);
        let marked = d.mark_ground_cells(|c| c.z == 0);
        // rank 1 owns half of the 20 columns in x, one row in y
        assert_eq!(marked, 10);
    }
}
