//! The per-rank driver: owns the local domain, the communicator and the
//! collaborators, and advances the simulation one committed step at a time.
//!
//! Every rank of a run builds its own [`Simulator`] from the same
//! [`SimulationConfig`] and the same [`FamilyRegistry`]. All stepping entry
//! points and the global queries are collectives.

pub mod run;
pub mod step;

pub use run::{RunLimits, RunStop, RunSummary};
pub use step::{StepContext, StepReport};

use crate::algs::aggregate::{self, AggregatedDomain};
use crate::algs::communicator::Communicator;
use crate::algs::exchange::{ExchangePlan, OutgoingPackets};
use crate::config::SimulationConfig;
use crate::coupling::{DepositSink, EscapeSink, ParticleTracker, SpeedSource};
use crate::data::{Bin, LocalDomain};
use crate::domain_error::DomainError;
use crate::geometry::{Double3, Int3};
use crate::particle::{FamilyRegistry, Particle};
use crate::partition::build_partition;

pub struct Simulator<C: Communicator> {
    comm: C,
    config: SimulationConfig,
    families: FamilyRegistry,
    domain: LocalDomain,
    plan: ExchangePlan,
    packets: OutgoingPackets,
    speed_sources: Vec<Box<dyn SpeedSource>>,
    deposit_sink: Option<Box<dyn DepositSink>>,
    escape_sink: Option<Box<dyn EscapeSink>>,
    tracker: Option<Box<dyn ParticleTracker>>,
    time: f64,
    dt: f64,
    stable_steps: usize,
    step_index: u64,
}

impl<C: Communicator> Simulator<C> {
    /// Partition the domain for this rank and allocate its blocks.
    pub fn new(
        comm: C,
        config: SimulationConfig,
        families: FamilyRegistry,
    ) -> Result<Self, DomainError> {
        config.validate()?;
        let geometry = config.geometry()?;
        let partition = build_partition(
            config.partition,
            geometry,
            comm.size(),
            comm.rank(),
            config.grid_layout,
            config.blocks_per_dim,
        )?;
        let plan = ExchangePlan::new(partition.as_ref(), config.exchange_tag());
        let packets = OutgoingPackets::for_plan(&plan);
        let domain = LocalDomain::init(partition);
        log::info!(
            "rank {}/{}: {:?} partition on grid {:?}, {} local blocks",
            comm.rank(),
            comm.size(),
            config.partition,
            domain.partition().grid().dims(),
            domain.blocks().len()
        );
        Ok(Self {
            time: config.start_time,
            dt: config.dt,
            comm,
            config,
            families,
            domain,
            plan,
            packets,
            speed_sources: Vec::new(),
            deposit_sink: None,
            escape_sink: None,
            tracker: None,
            stable_steps: 0,
            step_index: 0,
        })
    }

    pub fn with_speed_source(mut self, source: impl SpeedSource + 'static) -> Self {
        self.speed_sources.push(Box::new(source));
        self
    }

    /// Without a deposit sink, grounded particles are dropped.
    pub fn with_deposit_sink(mut self, sink: impl DepositSink + 'static) -> Self {
        self.deposit_sink = Some(Box::new(sink));
        self
    }

    /// Without an escape sink, particles leaving the domain are dropped.
    pub fn with_escape_sink(mut self, sink: impl EscapeSink + 'static) -> Self {
        self.escape_sink = Some(Box::new(sink));
        self
    }

    pub fn with_tracker(mut self, tracker: impl ParticleTracker + 'static) -> Self {
        self.tracker = Some(Box::new(tracker));
        self
    }

    /// Insert a particle given by absolute position into the cell that holds
    /// it. Fails with `OutsideDomain` when another rank owns the position.
    pub fn insert(&mut self, p: Particle) -> Result<(), DomainError> {
        self.families.require(p.family_id)?;
        self.domain.place_absolute(p, Bin::Current)
    }

    /// Whether `position` falls in a cell owned by this rank.
    pub fn owns_position(&self, position: Double3) -> bool {
        let cell = self.domain.geometry().locate(position);
        self.domain.partition().local_block_of_cell(cell).is_some()
    }

    /// Flag ground-contact cells; returns how many local cells were flagged.
    pub fn mark_ground_cells(&mut self, is_ground: impl Fn(Int3) -> bool) -> usize {
        self.domain.mark_ground_cells(is_ground)
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn families(&self) -> &FamilyRegistry {
        &self.families
    }

    pub fn domain(&self) -> &LocalDomain {
        &self.domain
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Timestep the next step will try first.
    pub fn dt(&self) -> f64 {
        self.dt
    }

    /// Number of committed steps.
    pub fn step_index(&self) -> u64 {
        self.step_index
    }

    pub fn local_particle_count(&self) -> usize {
        self.domain.particle_count()
    }

    pub fn contains_particles_globally(&self) -> Result<bool, DomainError> {
        aggregate::contains_particles_globally(&self.comm, &self.domain)
    }

    pub fn count_particles_globally(&self) -> Result<u64, DomainError> {
        aggregate::count_particles_globally(&self.comm, &self.domain)
    }

    pub fn gather_full_domain(&self, root: usize) -> Result<Option<AggregatedDomain>, DomainError> {
        aggregate::gather_full_domain(&self.comm, &self.domain, root)
    }
}
