//! Whole-domain queries. Every function here is a collective: all ranks must
//! call it, in the same order, whether or not they hold particles.

use crate::algs::communicator::Communicator;
use crate::algs::wire::{decode_packet, encode_packet};
use crate::data::{Bin, LocalBlock, LocalDomain};
use crate::domain_error::DomainError;
use crate::geometry::{DomainGeometry, Int3};
use crate::particle::Particle;
use crate::partition::BlockSpec;

/// `true` on every rank if any rank holds a particle.
pub fn contains_particles_globally<C: Communicator>(
    comm: &C,
    domain: &LocalDomain,
) -> Result<bool, DomainError> {
    comm.all_reduce_or(domain.contains_particles())
}

/// Number of particles held by all ranks together.
pub fn count_particles_globally<C: Communicator>(
    comm: &C,
    domain: &LocalDomain,
) -> Result<u64, DomainError> {
    comm.all_reduce_sum(domain.particle_count() as u64)
}

/// The whole domain merged into one block on the coordinator rank.
#[derive(Debug, Clone)]
pub struct AggregatedDomain {
    geometry: DomainGeometry,
    block: LocalBlock,
}

impl AggregatedDomain {
    fn empty(geometry: DomainGeometry) -> Self {
        let spec = BlockSpec {
            global_addr: Int3::zero(),
            first_cell: Int3::zero(),
            size: geometry.size,
        };
        Self {
            block: LocalBlock::new(spec, &geometry),
            geometry,
        }
    }

    fn insert(&mut self, p: Particle) -> Result<(), DomainError> {
        let cell = self.geometry.locate(p.displacement);
        if !self.geometry.contains_cell(cell) {
            return Err(DomainError::OutsideDomain(p.displacement));
        }
        let offset = self.geometry.offset_in_cell(p.displacement, cell);
        self.block.push(cell, p.with_displacement(offset), Bin::Current);
        Ok(())
    }

    pub fn geometry(&self) -> &DomainGeometry {
        &self.geometry
    }

    pub fn block(&self) -> &LocalBlock {
        &self.block
    }

    pub fn particle_count(&self) -> usize {
        self.block.particle_count()
    }

    pub fn absolute_particles(&self) -> impl Iterator<Item = Particle> + '_ {
        self.block.absolute_particles(&self.geometry)
    }
}

/// Gather every rank's particles on `root`. The root gets the merged domain,
/// every other rank `None`.
pub fn gather_full_domain<C: Communicator>(
    comm: &C,
    domain: &LocalDomain,
    root: usize,
) -> Result<Option<AggregatedDomain>, DomainError> {
    let local: Vec<Particle> = domain.absolute_particles().collect();
    let Some(parts) = comm.gather_bytes(root, &encode_packet(&local))? else {
        return Ok(None);
    };
    let mut merged = AggregatedDomain::empty(*domain.geometry());
    for (rank, bytes) in parts.iter().enumerate() {
        for p in decode_packet(bytes, rank)? {
            merged.insert(p)?;
        }
    }
    log::debug!(
        "gathered {} particles from {} ranks on rank {root}",
        merged.particle_count(),
        parts.len()
    );
    Ok(Some(merged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;
    use crate::geometry::Double3;
    use crate::partition::{PartitionKind, build_partition};
    use crate::topology::GridLayout;

    #[test]
    fn serial_gather_keeps_positions() {
        let comm = LocalComm::serial();
        let g = DomainGeometry::new(Double3::new(-1.0, 0.0, 0.0), 0.5, Int3::new(8, 8, 8))
            .unwrap();
        let p = build_partition(PartitionKind::BlockCyclic, g, 1, 0, GridLayout::Auto, 3).unwrap();
        let mut domain = LocalDomain::init(p);
        let pos = Double3::new(0.25, 1.75, 2.5);
        domain.place_absolute(Particle::at(4, pos), Bin::Current).unwrap();

        assert!(contains_particles_globally(&comm, &domain).unwrap());
        assert_eq!(count_particles_globally(&comm, &domain).unwrap(), 1);
        let merged = gather_full_domain(&comm, &domain, 0).unwrap().unwrap();
        assert_eq!(merged.particle_count(), 1);
        let back: Vec<_> = merged.absolute_particles().collect();
        assert_eq!(back[0].family_id, 4);
        assert!((back[0].displacement.x - pos.x).abs() < 1e-12);
        assert!((back[0].displacement.z - pos.z).abs() < 1e-12);
    }
}
