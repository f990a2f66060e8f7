//! Communication, wire encoding, neighbor exchange and global aggregation.

pub mod aggregate;
pub mod communicator;
pub mod exchange;
pub mod wire;

pub use aggregate::{
    AggregatedDomain, contains_particles_globally, count_particles_globally, gather_full_domain,
};
pub use communicator::{CommTag, Communicator, LocalComm, Wait};
