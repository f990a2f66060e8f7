//! DomainError: unified error type for tephra-domain public APIs
//!
//! Configuration and protocol failures abort the run; per-particle anomalies
//! are handled at the point of computation and never surface here.

use crate::geometry::{Double3, Int3};
use thiserror::Error;

/// Boxed error carried by communication failures.
pub type CommSource = Box<dyn std::error::Error + Send + Sync>;

/// Unified error type for domain decomposition and particle exchange.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The process count cannot be laid out as the requested 3-D grid.
    #[error("invalid process grid: {0}")]
    InvalidProcessGrid(String),
    /// Domain extent, cell size or block count are unusable.
    #[error("invalid domain: {0}")]
    InvalidDomain(String),
    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// A particle would skip more than one cell in a step and the timestep
    /// cannot be reduced.
    #[error("particle displacement exceeds one cell per step at dt = {dt} (cell delta {cells:?})")]
    CflViolation { dt: f64, cells: Option<Int3> },
    /// Adaptive timestep shrinking ran out of room.
    #[error("timestep exhausted after {retries} retries (dt = {dt})")]
    TimestepExhausted { dt: f64, retries: usize },
    /// Communication with a peer failed (missing message, timeout, ...).
    #[error("communication with rank {neighbor} failed: {source}")]
    CommError {
        neighbor: usize,
        #[source]
        source: CommSource,
    },
    /// A received buffer does not have the length announced by its header.
    #[error("rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// Peer speaks a different wire version.
    #[error("rank {neighbor} sent wire version {found}, expected {expected}")]
    WireVersion {
        neighbor: usize,
        found: u16,
        expected: u16,
    },
    /// Payload is not a header followed by whole particle records.
    #[error("malformed packet from rank {neighbor}: {reason}")]
    MalformedPacket { neighbor: usize, reason: String },
    /// A received particle lands in a block this rank does not own.
    #[error("particle at {position:?} from rank {neighbor} is not owned by rank {rank}")]
    MisroutedParticle {
        neighbor: usize,
        rank: usize,
        position: Double3,
    },
    /// Another rank failed while this one was ready to go on.
    #[error("a peer rank failed during step {step}")]
    PeerFailed { step: u64 },
    /// Particle family was never registered.
    #[error("unknown particle family {0}")]
    UnknownFamily(u32),
    /// Tracker received a time earlier than one it already recorded.
    #[error("tracker time {got} does not follow {last}")]
    NonMonotonicTime { last: f64, got: f64 },
    /// Outgoing payload does not fit the 32-bit length prefix.
    #[error("payload of {len} bytes for rank {neighbor} exceeds the wire length limit")]
    PayloadTooLarge { neighbor: usize, len: usize },
    /// Position lies outside the volume owned by this rank.
    #[error("position {0:?} lies outside the domain owned by this rank")]
    OutsideDomain(Double3),
}

impl DomainError {
    pub(crate) fn comm(neighbor: usize, msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        DomainError::CommError {
            neighbor,
            source: msg.into(),
        }
    }
}
