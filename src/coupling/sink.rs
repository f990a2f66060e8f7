//! Receivers for particles that leave transport.

use crate::particle::{BoundaryParticle, Particle};
use parking_lot::Mutex;
use std::sync::Arc;

/// Receives particles that touched the ground. Positions are absolute.
pub trait DepositSink: Send {
    fn deposit(&mut self, p: Particle);
}

/// Receives particles that left the global domain. Positions are absolute.
pub trait EscapeSink: Send {
    fn deposit(&mut self, p: Particle);
    fn deposit_boundary(&mut self, p: BoundaryParticle);
}

#[derive(Debug, Default)]
struct Collected {
    deposited: Vec<Particle>,
    escaped: Vec<Particle>,
    boundary: Vec<BoundaryParticle>,
}

/// Shared in-memory sink. Clones see the same storage, so a driver can keep
/// one handle while the simulator owns another.
#[derive(Debug, Clone, Default)]
pub struct ParticleCollector {
    inner: Arc<Mutex<Collected>>,
}

impl ParticleCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn deposited(&self) -> Vec<Particle> {
        self.inner.lock().deposited.clone()
    }

    /// Particles handed over without an exit time.
    pub fn escaped(&self) -> Vec<Particle> {
        self.inner.lock().escaped.clone()
    }

    pub fn boundary(&self) -> Vec<BoundaryParticle> {
        self.inner.lock().boundary.clone()
    }

    pub fn len(&self) -> usize {
        let c = self.inner.lock();
        c.deposited.len() + c.escaped.len() + c.boundary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DepositSink for ParticleCollector {
    fn deposit(&mut self, p: Particle) {
        self.inner.lock().deposited.push(p);
    }
}

impl EscapeSink for ParticleCollector {
    fn deposit(&mut self, p: Particle) {
        self.inner.lock().escaped.push(p);
    }

    fn deposit_boundary(&mut self, p: BoundaryParticle) {
        self.inner.lock().boundary.push(p);
    }
}
