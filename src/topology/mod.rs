//! Process-grid topology shared read-only by every rank.

pub mod process_grid;

pub use process_grid::{GridLayout, ProcessGrid, derive_process_dims};
