//! Particle records and the family metadata they point to.

pub mod family;
pub mod record;

pub use family::{FamilyRegistry, ParticleFamily};
pub use record::{BoundaryParticle, Particle};
