//! Run configuration, deserializable from any serde format.

use crate::algs::communicator::{CommTag, REDUCE_TAG};
use crate::algs::exchange::{DEFAULT_EXCHANGE_TAG, PAYLOAD_TAG_STRIDE};
use crate::domain_error::DomainError;
use crate::geometry::{Double3, DomainGeometry, Int3};
use crate::partition::{DEFAULT_BLOCKS_PER_DIM, PartitionKind};
use crate::topology::GridLayout;
use serde::{Deserialize, Serialize};

/// Timestep shrinking after a step in which a particle would skip a cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveDtConfig {
    /// Amount subtracted from `dt` on every retry and added back on recovery.
    pub decrement: f64,
    /// Committed steps without overflow before `dt` grows again.
    pub increase_after: usize,
    /// Retries allowed within one step.
    pub max_retries: usize,
}

impl Default for AdaptiveDtConfig {
    fn default() -> Self {
        Self {
            decrement: 0.1,
            increase_after: 10,
            max_retries: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Absolute position of the low corner of cell (0,0,0).
    pub origin: Double3,
    /// Cell edge length.
    pub dx: f64,
    /// Cells per axis of the global domain.
    pub size: Int3,
    pub partition: PartitionKind,
    /// Blocks per rank per axis (block-cyclic only).
    pub blocks_per_dim: i64,
    pub grid_layout: GridLayout,
    /// Baseline timestep.
    pub dt: f64,
    pub start_time: f64,
    /// `None` turns a cell-skipping step into a hard error.
    pub adaptive_dt: Option<AdaptiveDtConfig>,
    /// First message tag used by the neighbor exchange.
    pub exchange_tag: u16,
    /// Report committed steps to the tracker, if one is attached.
    pub tracking: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            origin: Double3::zero(),
            dx: 1.0,
            size: Int3::new(10, 10, 10),
            partition: PartitionKind::default(),
            blocks_per_dim: DEFAULT_BLOCKS_PER_DIM,
            grid_layout: GridLayout::default(),
            dt: 1.0,
            start_time: 0.0,
            adaptive_dt: None,
            exchange_tag: DEFAULT_EXCHANGE_TAG.as_u16(),
            tracking: true,
        }
    }
}

impl SimulationConfig {
    pub fn geometry(&self) -> Result<DomainGeometry, DomainError> {
        DomainGeometry::new(self.origin, self.dx, self.size)
    }

    pub fn exchange_tag(&self) -> CommTag {
        CommTag::new(self.exchange_tag)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.geometry()?;
        if self.blocks_per_dim < 1 {
            return Err(DomainError::InvalidConfig(format!(
                "blocks_per_dim must be at least 1, got {}",
                self.blocks_per_dim
            )));
        }
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(DomainError::InvalidConfig(format!(
                "dt must be positive and finite, got {}",
                self.dt
            )));
        }
        if !self.start_time.is_finite() {
            return Err(DomainError::InvalidConfig("start_time must be finite".into()));
        }
        if let Some(a) = &self.adaptive_dt {
            if !(a.decrement.is_finite() && a.decrement > 0.0) {
                return Err(DomainError::InvalidConfig(format!(
                    "adaptive dt decrement must be positive, got {}",
                    a.decrement
                )));
            }
            if a.max_retries == 0 || a.increase_after == 0 {
                return Err(DomainError::InvalidConfig(
                    "adaptive dt needs max_retries and increase_after of at least 1".into(),
                ));
            }
        }
        let last_tag = u32::from(self.exchange_tag) + 2 * u32::from(PAYLOAD_TAG_STRIDE);
        if last_tag > u32::from(REDUCE_TAG.as_u16()) {
            return Err(DomainError::InvalidConfig(format!(
                "exchange tag {:#06x} overlaps the reserved collective tags",
                self.exchange_tag
            )));
        }
        Ok(())
    }
}
