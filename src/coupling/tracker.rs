//! Trajectory tracking hooks.

use crate::domain_error::DomainError;
use crate::particle::Particle;
use parking_lot::Mutex;
use std::sync::Arc;

/// Observer of committed steps. `add_time` is called once per committed step
/// with the new simulation time, then `add_particle` once per particle that
/// changed cell during that step.
pub trait ParticleTracker: Send {
    fn add_time(&mut self, t: f64) -> Result<(), DomainError>;
    fn add_particle(&mut self, p: &Particle, t: f64) -> Result<(), DomainError>;
}

impl<T: ParticleTracker> ParticleTracker for Arc<Mutex<T>> {
    fn add_time(&mut self, t: f64) -> Result<(), DomainError> {
        self.lock().add_time(t)
    }

    fn add_particle(&mut self, p: &Particle, t: f64) -> Result<(), DomainError> {
        self.lock().add_particle(p, t)
    }
}

/// In-memory tracker. Times must strictly increase; particle records may
/// not precede the latest time.
#[derive(Debug, Clone, Default)]
pub struct TrackLog {
    times: Vec<f64>,
    records: Vec<(f64, Particle)>,
}

impl TrackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn records(&self) -> &[(f64, Particle)] {
        &self.records
    }

    fn last_time(&self) -> Option<f64> {
        self.times.last().copied()
    }
}

impl ParticleTracker for TrackLog {
    fn add_time(&mut self, t: f64) -> Result<(), DomainError> {
        if let Some(last) = self.last_time() {
            if t <= last {
                return Err(DomainError::NonMonotonicTime { last, got: t });
            }
        }
        self.times.push(t);
        Ok(())
    }

    fn add_particle(&mut self, p: &Particle, t: f64) -> Result<(), DomainError> {
        if let Some(last) = self.last_time() {
            if t < last {
                return Err(DomainError::NonMonotonicTime { last, got: t });
            }
        }
        self.records.push((t, *p));
        Ok(())
    }
}
