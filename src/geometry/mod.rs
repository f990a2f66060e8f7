//! Coordinates and the global cell lattice.

pub mod domain;
pub mod vec3;

pub use domain::DomainGeometry;
pub use vec3::{Double3, Int3, Vec3};
