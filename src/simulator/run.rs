//! Multi-step driver with collective stop conditions.

use super::Simulator;
use crate::algs::communicator::Communicator;
use crate::domain_error::DomainError;
use std::time::{Duration, Instant};

/// When [`Simulator::run`] stops. Unset limits never trigger.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunLimits {
    pub until_time: Option<f64>,
    pub max_steps: Option<u64>,
    /// Wall-clock budget measured from the start of the call.
    pub wall_clock: Option<Duration>,
    /// Stop once no rank holds a particle.
    pub stop_when_drained: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStop {
    ReachedTime,
    StepLimit,
    Drained,
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub stop: RunStop,
    pub steps: u64,
    pub time: f64,
    pub retries: usize,
    pub deposited: usize,
    pub escaped: usize,
}

impl<C: Communicator> Simulator<C> {
    /// Step until a limit is hit. Every check that depends on rank-local
    /// state is reduced first, so all ranks stop at the same step.
    pub fn run(&mut self, limits: RunLimits) -> Result<RunSummary, DomainError> {
        let started = Instant::now();
        let mut summary = RunSummary {
            stop: RunStop::StepLimit,
            steps: 0,
            time: self.time,
            retries: 0,
            deposited: 0,
            escaped: 0,
        };
        let stop = loop {
            let over_budget = limits
                .wall_clock
                .is_some_and(|budget| started.elapsed() >= budget);
            if self.comm.all_reduce_or(over_budget)? {
                break RunStop::TimedOut;
            }
            if let Some(until) = limits.until_time {
                // tolerate the rounding of accumulated dt
                if self.time >= until - 1e-9 * self.dt {
                    break RunStop::ReachedTime;
                }
            }
            if limits.max_steps.is_some_and(|max| summary.steps >= max) {
                break RunStop::StepLimit;
            }
            if limits.stop_when_drained && !self.contains_particles_globally()? {
                break RunStop::Drained;
            }
            let report = self.step()?;
            summary.steps += 1;
            summary.retries += report.retries;
            summary.deposited += report.deposited;
            summary.escaped += report.escaped;
        };
        summary.stop = stop;
        summary.time = self.time;
        log::info!(
            "rank {}: stopped ({stop:?}) after {} steps at t = {}",
            self.comm.rank(),
            summary.steps,
            summary.time
        );
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algs::communicator::LocalComm;
    use crate::config::SimulationConfig;
    use crate::coupling::ConstantSpeed;
    use crate::geometry::{Double3, Int3};
    use crate::particle::{FamilyRegistry, Particle, ParticleFamily};

    fn sim(speed: Double3) -> Simulator<LocalComm> {
        let mut families = FamilyRegistry::new();
        families
            .register(ParticleFamily::new(1, "ash", 2500.0, 1e-4))
            .unwrap();
        let cfg = SimulationConfig {
            size: Int3::new(8, 8, 8),
            blocks_per_dim: 2,
            dt: 0.5,
            ..Default::default()
        };
        Simulator::new(LocalComm::serial(), cfg, families)
            .unwrap()
            .with_speed_source(ConstantSpeed::new(speed))
    }

    #[test]
    fn stops_at_time() {
        let mut s = sim(Double3::zero());
        let summary = s
            .run(RunLimits {
                until_time: Some(2.0),
                max_steps: Some(100),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(summary.stop, RunStop::ReachedTime);
        assert_eq!(summary.steps, 4);
    }

    #[test]
    fn stops_when_drained() {
        let mut s = sim(Double3::new(0.0, 1.0, 0.0));
        s.insert(Particle::at(1, Double3::new(1.5, 6.5, 1.5))).unwrap();
        let summary = s
            .run(RunLimits {
                stop_when_drained: true,
                max_steps: Some(100),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(summary.stop, RunStop::Drained);
        // 6.5 -> 7.0 -> 7.5 -> 8.0 leaves the domain on the third step
        assert_eq!(summary.steps, 3);
        assert_eq!(summary.escaped, 1);
    }

    #[test]
    fn zero_budget_times_out_before_stepping() {
        let mut s = sim(Double3::zero());
        let summary = s
            .run(RunLimits {
                wall_clock: Some(Duration::ZERO),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(summary.stop, RunStop::TimedOut);
        assert_eq!(summary.steps, 0);
    }
}
