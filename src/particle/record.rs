use crate::geometry::Double3;

/// A transported particle.
///
/// `displacement` is the offset inside the owning cell while the particle is
/// stored in a [`LocalBlock`](crate::data::LocalBlock), and an absolute position
/// while it is in transit or has been handed to a sink.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Particle {
    pub family_id: u32,
    pub displacement: Double3,
    pub lagrangian_speed: Double3,
}

impl Particle {
    pub fn new(family_id: u32, displacement: Double3, lagrangian_speed: Double3) -> Self {
        Self {
            family_id,
            displacement,
            lagrangian_speed,
        }
    }

    /// Particle at rest at an absolute position.
    pub fn at(family_id: u32, position: Double3) -> Self {
        Self::new(family_id, position, Double3::zero())
    }

    #[inline]
    pub(crate) fn with_displacement(mut self, displacement: Double3) -> Self {
        self.displacement = displacement;
        self
    }
}

/// A particle that left the global domain, stamped with its exit time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryParticle {
    pub particle: Particle,
    pub exit_time: f64,
}
