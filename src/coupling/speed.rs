use crate::geometry::Double3;
use crate::particle::ParticleFamily;

/// Velocity contribution at a point in space and time.
///
/// A static source does not depend on the particle, so it is sampled once per
/// cell at the cell centre. Dynamic sources are sampled per particle at its
/// absolute position. Speeds of all registered sources are summed.
pub trait SpeedSource: Send + Sync {
    fn velocity(&self, position: Double3, time: f64, dt: f64, family: &ParticleFamily) -> Double3;

    fn is_static(&self) -> bool {
        false
    }
}

/// Uniform velocity field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantSpeed {
    speed: Double3,
}

impl ConstantSpeed {
    pub fn new(speed: Double3) -> Self {
        Self { speed }
    }
}

impl SpeedSource for ConstantSpeed {
    fn velocity(&self, _: Double3, _: f64, _: f64, _: &ParticleFamily) -> Double3 {
        self.speed
    }

    fn is_static(&self) -> bool {
        true
    }
}

/// Dynamic source backed by a closure of `(position, time)`.
pub struct SpeedFn<F> {
    f: F,
}

impl<F> SpeedFn<F>
where
    F: Fn(Double3, f64) -> Double3 + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> SpeedSource for SpeedFn<F>
where
    F: Fn(Double3, f64) -> Double3 + Send + Sync,
{
    fn velocity(&self, position: Double3, time: f64, _: f64, _: &ParticleFamily) -> Double3 {
        (self.f)(position, time)
    }
}
