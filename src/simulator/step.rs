//! One timestep: relocation sweep, global overflow vote, optional retry with a
//! smaller `dt`, then commit.
//!
//! An attempt only writes to `next` bins, outgoing packets and its own
//! queues, so discarding it is a matter of clearing those.

use super::Simulator;
use crate::algs::communicator::Communicator;
use crate::algs::exchange::{OutgoingPackets, post_exchange};
use crate::coupling::{ParticleTracker, SpeedSource};
use crate::data::{Bin, LocalDomain};
use crate::domain_error::DomainError;
use crate::geometry::{Double3, Int3};
use crate::particle::{BoundaryParticle, FamilyRegistry, Particle};
#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Identifies an attempt in log output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepContext {
    pub step: u64,
    pub attempt: usize,
}

/// Outcome of one committed step on this rank.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepReport {
    pub step: u64,
    /// Simulation time after the step.
    pub time: f64,
    /// Timestep actually committed.
    pub dt: f64,
    pub retries: usize,
    pub sent: usize,
    pub received: usize,
    pub deposited: usize,
    pub escaped: usize,
}

/// Bits of the per-attempt vote.
const VOTE_OVERFLOW: u64 = 1;
const VOTE_FAILED: u64 = 2;

#[derive(Debug, Default)]
struct Attempt {
    /// Cell delta of the first particle that skipped a cell.
    overflow: Option<Int3>,
    deposits: Vec<Particle>,
    escapes: Vec<BoundaryParticle>,
    relocated: Vec<Particle>,
}

impl<C: Communicator> Simulator<C> {
    /// Advance every particle by one timestep and hand boundary crossers to
    /// their new owners. Collective.
    pub fn step(&mut self) -> Result<StepReport, DomainError> {
        let mut ctx = StepContext {
            step: self.step_index,
            attempt: 0,
        };
        let mut dt = self.dt;
        let attempt = loop {
            let attempt = self.attempt(ctx, dt);
            let local = match &attempt {
                Ok(a) if a.overflow.is_some() => VOTE_OVERFLOW,
                Ok(_) => 0,
                Err(_) => VOTE_FAILED,
            };
            let vote = self.comm.all_reduce_u64(local, |a, b| a | b)?;
            if vote == 0 {
                // no rank failed, so the local attempt is Ok
                break attempt?;
            }
            self.domain.clear_next();
            self.packets.clear();
            if vote & VOTE_FAILED != 0 {
                log::warn!("step {}: attempt {} failed on some rank", ctx.step, ctx.attempt);
                attempt?;
                return Err(DomainError::PeerFailed { step: ctx.step });
            }
            let attempt = attempt?;
            let Some(adaptive) = self.config.adaptive_dt else {
                log::warn!("step {}: displacement exceeds one cell at dt = {dt}", ctx.step);
                return Err(DomainError::CflViolation {
                    dt,
                    cells: attempt.overflow,
                });
            };
            ctx.attempt += 1;
            dt -= adaptive.decrement;
            if dt <= 0.0 || ctx.attempt > adaptive.max_retries {
                return Err(DomainError::TimestepExhausted {
                    dt,
                    retries: ctx.attempt,
                });
            }
            log::debug!("step {}: retrying with dt = {dt} (attempt {})", ctx.step, ctx.attempt);
        };
        self.commit(ctx, dt, attempt)
    }

    fn commit(
        &mut self,
        ctx: StepContext,
        dt: f64,
        attempt: Attempt,
    ) -> Result<StepReport, DomainError> {
        let t_new = self.time + dt;
        let deposited = attempt.deposits.len();
        let escaped = attempt.escapes.len();

        let stats = post_exchange(&self.comm, &self.plan, &mut self.packets)
            .complete(&mut self.domain)?;
        self.domain.swap_buffers();
        self.time = t_new;
        self.step_index += 1;
        self.adapt_dt(ctx, dt);

        // the step is committed; observers only see it from here on
        if let Some(sink) = self.deposit_sink.as_mut() {
            attempt.deposits.into_iter().for_each(|p| sink.deposit(p));
        }
        if let Some(sink) = self.escape_sink.as_mut() {
            attempt
                .escapes
                .into_iter()
                .for_each(|p| sink.deposit_boundary(p));
        }
        let tracked = match self.tracker.as_mut() {
            Some(tracker) if self.config.tracking => {
                track(&mut **tracker, t_new, &attempt.relocated)
            }
            _ => Ok(()),
        };

        log::trace!(
            "rank {} step {}: t = {t_new}, sent {}, received {}, deposited {deposited}, escaped {escaped}",
            self.comm.rank(),
            ctx.step,
            stats.sent,
            stats.received
        );
        tracked?;
        Ok(StepReport {
            step: ctx.step,
            time: t_new,
            dt,
            retries: ctx.attempt,
            sent: stats.sent,
            received: stats.received,
            deposited,
            escaped,
        })
    }

    /// Keep a reduced `dt`, and grow it back toward the baseline after
    /// enough consecutive steps without a retry.
    fn adapt_dt(&mut self, ctx: StepContext, dt: f64) {
        let Some(adaptive) = self.config.adaptive_dt else {
            return;
        };
        if ctx.attempt > 0 {
            self.dt = dt;
            self.stable_steps = 0;
            return;
        }
        if self.dt >= self.config.dt {
            return;
        }
        self.stable_steps += 1;
        if self.stable_steps >= adaptive.increase_after {
            self.dt = (self.dt + adaptive.decrement).min(self.config.dt);
            self.stable_steps = 0;
            log::debug!("step {}: dt grows to {}", ctx.step, self.dt);
        }
    }

    fn attempt(&mut self, ctx: StepContext, dt: f64) -> Result<Attempt, DomainError> {
        let mut out = Attempt::default();
        for b in 0..self.domain.blocks().len() {
            let stay = sweep_block(
                &self.domain,
                b,
                &self.speed_sources,
                &self.families,
                &mut self.packets,
                self.time,
                dt,
                &mut out,
            )?;
            if let Some(delta) = out.overflow {
                log::debug!(
                    "step {} attempt {}: cell delta {delta:?} at dt = {dt}",
                    ctx.step,
                    ctx.attempt
                );
                return Ok(out);
            }
            let block = &mut self.domain.blocks_mut()[b];
            for (cell, p) in stay {
                block.push(cell, p, Bin::Next);
            }
        }
        Ok(out)
    }
}

fn track(
    tracker: &mut dyn ParticleTracker,
    t: f64,
    relocated: &[Particle],
) -> Result<(), DomainError> {
    tracker.add_time(t)?;
    relocated.iter().try_for_each(|p| tracker.add_particle(p, t))
}

/// Relocate every particle of block `b`. Returns the particles that stay in
/// the block, keyed by their new global cell; everything else lands in
/// `packets` or the attempt queues.
#[allow(clippy::too_many_arguments)]
fn sweep_block(
    domain: &LocalDomain,
    b: usize,
    sources: &[Box<dyn SpeedSource>],
    families: &FamilyRegistry,
    packets: &mut OutgoingPackets,
    time: f64,
    dt: f64,
    out: &mut Attempt,
) -> Result<Vec<(Int3, Particle)>, DomainError> {
    let geometry = domain.geometry();
    let block = &domain.blocks()[b];
    let mut stay = Vec::new();
    for (local, cell) in block.cells() {
        if cell.is_empty() {
            continue;
        }
        let old = block.spec().first_cell + local;
        let origin = geometry.cell_origin(old);
        if cell.is_ground_contact() {
            out.deposits.extend(
                cell.particles()
                    .iter()
                    .map(|p| p.with_displacement(origin + p.displacement)),
            );
            continue;
        }
        let speeds = sample_velocities(
            sources,
            families,
            geometry.cell_centre(old),
            origin,
            cell.particles(),
            time,
            dt,
        )?;
        for (p, v) in cell.particles().iter().zip(speeds) {
            let abs = origin + p.displacement + v * dt;
            let new_cell = geometry.locate(abs);
            let delta = new_cell - old;
            if delta.max_abs() > 1 {
                out.overflow = Some(delta);
                return Ok(stay);
            }
            let moved = p.with_displacement(abs);
            if !geometry.contains_cell(new_cell) {
                out.escapes.push(BoundaryParticle {
                    particle: moved,
                    exit_time: time + dt,
                });
                continue;
            }
            if new_cell != old {
                out.relocated.push(moved);
            }
            if block.contains_global_cell(new_cell) {
                stay.push((new_cell, p.with_displacement(geometry.offset_in_cell(abs, new_cell))));
            } else {
                packets.push(block.spec().direction_to(new_cell), moved)?;
            }
        }
    }
    Ok(stay)
}

/// Total velocity (Eulerian plus Lagrangian) of each particle of one cell.
/// Static sources are evaluated once per family at the cell centre.
fn sample_velocities(
    sources: &[Box<dyn SpeedSource>],
    families: &FamilyRegistry,
    centre: Double3,
    origin: Double3,
    particles: &[Particle],
    time: f64,
    dt: f64,
) -> Result<Vec<Double3>, DomainError> {
    let mut statics: Vec<(u32, Double3)> = Vec::new();
    let mut base = Vec::with_capacity(particles.len());
    for p in particles {
        let v = match statics.iter().find(|(id, _)| *id == p.family_id) {
            Some(&(_, v)) => v,
            None => {
                let family = families.require(p.family_id)?;
                let v = sources
                    .iter()
                    .filter(|s| s.is_static())
                    .fold(Double3::zero(), |acc, s| {
                        acc + s.velocity(centre, time, dt, family)
                    });
                statics.push((p.family_id, v));
                v
            }
        };
        base.push(v + p.lagrangian_speed);
    }

    if sources.iter().all(|s| s.is_static()) {
        return Ok(base.into_iter().map(finite_or_zero).collect());
    }
    let dynamic = |p: &Particle| -> Result<Double3, DomainError> {
        let family = families.require(p.family_id)?;
        let position = origin + p.displacement;
        Ok(sources
            .iter()
            .filter(|s| !s.is_static())
            .fold(Double3::zero(), |acc, s| {
                acc + s.velocity(position, time, dt, family)
            }))
    };
    #[cfg(feature = "rayon")]
    let extra: Vec<Double3> = particles
        .par_iter()
        .map(dynamic)
        .collect::<Result<_, _>>()?;
    #[cfg(not(feature = "rayon"))]
    let extra: Vec<Double3> = particles.iter().map(dynamic).collect::<Result<_, _>>()?;

    Ok(base
        .into_iter()
        .zip(extra)
        .map(|(b, e)| finite_or_zero(b + e))
        .collect())
}

fn finite_or_zero(v: Double3) -> Double3 {
    if !v.is_finite() {
        log::trace!("non-finite velocity {v:?} zeroed");
    }
    v.sanitized()
}
