//! Interfaces to the collaborators around the engine: speed models, sinks for
//! particles leaving transport, and trajectory trackers.

pub mod sink;
pub mod speed;
pub mod tracker;

pub use sink::{DepositSink, EscapeSink, ParticleCollector};
pub use speed::{ConstantSpeed, SpeedFn, SpeedSource};
pub use tracker::{ParticleTracker, TrackLog};
