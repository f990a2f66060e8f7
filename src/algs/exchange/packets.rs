//! Outgoing particle packets, one per exchange route.

use super::ExchangePlan;
use crate::domain_error::DomainError;
use crate::geometry::Int3;
use crate::particle::Particle;

/// Particles (with absolute positions) waiting to leave this rank.
#[derive(Debug, Clone, Default)]
pub struct OutgoingPackets {
    offsets: Vec<Int3>,
    packets: Vec<Vec<Particle>>,
}

impl OutgoingPackets {
    pub fn for_plan(plan: &ExchangePlan) -> Self {
        Self {
            offsets: plan.routes().iter().map(|r| r.offset).collect(),
            packets: vec![Vec::new(); plan.routes().len()],
        }
    }

    /// Queue `p` for the neighbor along `mv`.
    pub fn push(&mut self, mv: Int3, p: Particle) -> Result<(), DomainError> {
        let idx = self
            .offsets
            .iter()
            .position(|&o| o == mv)
            .ok_or_else(|| {
                DomainError::InvalidDomain(format!("no exchange route along {mv:?}"))
            })?;
        self.packets[idx].push(p);
        Ok(())
    }

    pub fn packet(&self, index: usize) -> &[Particle] {
        &self.packets[index]
    }

    pub fn total(&self) -> usize {
        self.packets.iter().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.packets.iter_mut().for_each(Vec::clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::exchange::DEFAULT_EXCHANGE_TAG;
    use crate::geometry::{Double3, DomainGeometry};
    use crate::partition::SlabPartition;

    #[test]
    fn slab_packets_reject_diagonal_moves() {
        let g = DomainGeometry::new(Double3::zero(), 1.0, Int3::new(8, 2, 2)).unwrap();
        let slab = SlabPartition::new(g, 2, 0).unwrap();
        let plan = ExchangePlan::new(&slab, DEFAULT_EXCHANGE_TAG);
        let mut out = OutgoingPackets::for_plan(&plan);
        out.push(Int3::new(1, 0, 0), Particle::default()).unwrap();
        assert!(out.push(Int3::new(1, 1, 0), Particle::default()).is_err());
        assert_eq!(out.total(), 1);
        out.clear();
        assert_eq!(out.total(), 0);
    }
}
