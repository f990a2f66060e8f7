//! Per-step particle hand-off between neighboring ranks.
//!
//! Every step each rank sends one packet along every exchange offset of its
//! partition (27 for block-cyclic, including the rank itself; 2 for slabs) and
//! receives one from the mirrored neighbor. Each offset gets its own pair of
//! tags, so duplicate destinations and self-sends never mix messages.
//!
//! Usage: fill an [`OutgoingPackets`] during the sweep, [`post_exchange`] it,
//! then [`PendingExchange::complete`] into the domain's `next` bins.

pub mod neighbour_exchange;
pub mod packets;
pub mod size_exchange;

pub use neighbour_exchange::{ExchangeStats, PendingExchange, post_exchange};
pub use packets::OutgoingPackets;

use crate::algs::communicator::CommTag;
use crate::geometry::Int3;
use crate::partition::PartitionStrategy;

/// Gap between the size tags and the payload tags of one exchange.
pub const PAYLOAD_TAG_STRIDE: u16 = 32;

/// Default first tag used by the exchange.
pub const DEFAULT_EXCHANGE_TAG: CommTag = CommTag(0x0100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeTags {
    base: CommTag,
}

impl ExchangeTags {
    pub fn from_base(base: CommTag) -> Self {
        Self { base }
    }

    pub fn size_tag(&self, index: usize) -> u16 {
        self.base.offset(index as u16).as_u16()
    }

    pub fn payload_tag(&self, index: usize) -> u16 {
        self.base
            .offset(PAYLOAD_TAG_STRIDE + index as u16)
            .as_u16()
    }
}

/// One exchange direction. `dest` receives what this rank sends along
/// `offset`; `source` is the rank whose packet along `offset` lands here.
/// Either may be missing at the edge of a slab partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub offset: Int3,
    pub index: usize,
    pub dest: Option<usize>,
    pub source: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ExchangePlan {
    routes: Vec<Route>,
    tags: ExchangeTags,
}

impl ExchangePlan {
    pub fn new(partition: &dyn PartitionStrategy, base: CommTag) -> Self {
        let routes = partition
            .exchange_offsets()
            .into_iter()
            .enumerate()
            .map(|(index, offset)| Route {
                offset,
                index,
                dest: partition.destination_rank(offset),
                source: partition.source_rank(offset),
            })
            .collect();
        Self {
            routes,
            tags: ExchangeTags::from_base(base),
        }
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn tags(&self) -> ExchangeTags {
        self.tags
    }

    pub fn route_index(&self, offset: Int3) -> Option<usize> {
        self.routes.iter().position(|r| r.offset == offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Double3, DomainGeometry};
    use crate::partition::{PartitionKind, build_partition};
    use crate::topology::GridLayout;

    #[test]
    fn block_cyclic_plan_mirrors_routes() {
        let g = DomainGeometry::new(Double3::zero(), 1.0, Int3::new(12, 12, 12)).unwrap();
        let p = build_partition(PartitionKind::BlockCyclic, g, 8, 5, GridLayout::Auto, 2).unwrap();
        let plan = ExchangePlan::new(p.as_ref(), DEFAULT_EXCHANGE_TAG);
        assert_eq!(plan.routes().len(), 27);
        let centre = plan.route_index(Int3::zero()).unwrap();
        assert_eq!(plan.routes()[centre].dest, Some(5));
        assert_eq!(plan.routes()[centre].source, Some(5));
        // 2x2x2 grid: +1 and -1 reach the same rank on every axis
        let east = plan.route_index(Int3::new(1, 0, 0)).unwrap();
        let west = plan.route_index(Int3::new(-1, 0, 0)).unwrap();
        assert_eq!(plan.routes()[east].dest, plan.routes()[west].dest);
        assert_ne!(plan.tags().size_tag(east), plan.tags().size_tag(west));
    }

    #[test]
    fn tags_do_not_overlap() {
        let tags = ExchangeTags::from_base(DEFAULT_EXCHANGE_TAG);
        let sizes: Vec<_> = (0..27).map(|i| tags.size_tag(i)).collect();
        assert!((0..27).all(|i| !sizes.contains(&tags.payload_tag(i))));
    }
}
