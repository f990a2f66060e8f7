//! Particle storage owned by a single rank.

pub mod local_block;
pub mod local_domain;

pub use local_block::{Bin, Cell, LocalBlock};
pub use local_domain::LocalDomain;
