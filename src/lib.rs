#![cfg_attr(docsrs, feature(doc_cfg))]
//! # tephra-domain
//!
//! tephra-domain is the distributed domain-decomposition and particle-exchange
//! engine of an Eulerian–Lagrangian particle-transport simulator. A 3-D cell
//! lattice is partitioned across ranks, particles live in per-cell bins, and
//! particles crossing a rank boundary are handed to the owning neighbor every
//! timestep without loss or duplication.
//!
//! ## Features
//! - Process-grid derivation (near-cube, near-square for flat domains, even split)
//! - Block-cyclic and single-axis slab partitions behind one trait
//! - Double-buffered cell bins so relocation order never matters
//! - 27-neighbor (2 for slabs) non-blocking particle exchange over a
//!   versioned little-endian wire format
//! - Adaptive timestep retry decided collectively across ranks
//! - Global particle queries and a full-domain gather
//! - Pluggable communication backends (in-process, MPI)
//!
//! ## Usage
//! ```toml
//! [dependencies]
//! tephra-domain = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "rayon"]
//! ```
//!
//! ```
//! use tephra_domain::prelude::*;
//!
//! let mut families = FamilyRegistry::new();
//! families.register(ParticleFamily::new(0, "ash", 2500.0, 1e-4)).unwrap();
//! let config = SimulationConfig { size: Int3::new(20, 1, 20), ..Default::default() };
//! let mut sim = Simulator::new(LocalComm::serial(), config, families)
//!     .unwrap()
//!     .with_speed_source(ConstantSpeed::new(Double3::new(1.0, 0.0, 0.0)));
//! sim.insert(Particle::at(0, Double3::new(2.5, 0.5, 2.5))).unwrap();
//! sim.step().unwrap();
//! assert_eq!(sim.count_particles_globally().unwrap(), 1);
//! ```
//!
//! ## Determinism
//!
//! Given the same configuration, families and insertions, every rank derives
//! the same grid and partition, and particle placement does not depend on the
//! order cells are visited.

pub mod algs;
pub mod config;
pub mod coupling;
pub mod data;
pub mod domain_error;
pub mod geometry;
pub mod particle;
pub mod partition;
pub mod simulator;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::communicator::{Communicator, LocalComm};
    #[cfg(feature = "mpi-support")]
    pub use crate::algs::communicator::MpiComm;
    pub use crate::algs::aggregate::AggregatedDomain;
    pub use crate::config::{AdaptiveDtConfig, SimulationConfig};
    pub use crate::coupling::{
        ConstantSpeed, DepositSink, EscapeSink, ParticleCollector, ParticleTracker, SpeedFn,
        SpeedSource, TrackLog,
    };
    pub use crate::data::{Bin, LocalBlock, LocalDomain};
    pub use crate::domain_error::DomainError;
    pub use crate::geometry::{Double3, DomainGeometry, Int3};
    pub use crate::particle::{BoundaryParticle, FamilyRegistry, Particle, ParticleFamily};
    pub use crate::partition::{
        BlockCyclicPartition, PartitionKind, PartitionStrategy, SlabPartition, build_partition,
    };
    pub use crate::simulator::{RunLimits, RunStop, RunSummary, Simulator, StepReport};
    pub use crate::topology::{GridLayout, ProcessGrid};
}
