//! Global cell lattice: origin, cell edge length and extent in cells.
//!
//! Every position ↔ cell conversion in the crate goes through
//! [`DomainGeometry::locate`] and [`DomainGeometry::cell_origin`], so a sender
//! and a receiver classifying the same `f64` position always agree on the cell.
//! Cells are half-open: cell `i` covers `[cell_origin(i), cell_origin(i + 1))`.

use crate::domain_error::DomainError;
use crate::geometry::{Double3, Int3};
use serde::{Deserialize, Serialize};

/// Largest cell index `locate` reports; keeps cell arithmetic overflow-free.
const CELL_INDEX_LIMIT: f64 = (i64::MAX / 4) as f64;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DomainGeometry {
    /// Absolute position of the corner of cell `(0, 0, 0)`.
    pub origin: Double3,
    /// Cell edge length.
    pub dx: f64,
    /// Number of cells per axis.
    pub size: Int3,
}

impl DomainGeometry {
    pub fn new(origin: Double3, dx: f64, size: Int3) -> Result<Self, DomainError> {
        let g = Self { origin, dx, size };
        g.validate()?;
        Ok(g)
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(self.dx.is_finite() && self.dx > 0.0) {
            return Err(DomainError::InvalidDomain(format!(
                "cell size must be positive and finite, got {}",
                self.dx
            )));
        }
        if !self.origin.is_finite() {
            return Err(DomainError::InvalidDomain(format!(
                "origin must be finite, got {:?}",
                self.origin
            )));
        }
        if !self.size.all(|n| n > 0) {
            return Err(DomainError::InvalidDomain(format!(
                "domain extent must be at least one cell per axis, got {:?}",
                self.size
            )));
        }
        Ok(())
    }

    /// Total number of cells.
    pub fn cell_count(&self) -> i64 {
        self.size.product()
    }

    #[inline]
    pub fn contains_cell(&self, cell: Int3) -> bool {
        cell.is_in_bounds(self.size)
    }

    /// Absolute position of the low corner of `cell`.
    #[inline]
    pub fn cell_origin(&self, cell: Int3) -> Double3 {
        Double3::new(
            self.axis_origin(cell.x, self.origin.x),
            self.axis_origin(cell.y, self.origin.y),
            self.axis_origin(cell.z, self.origin.z),
        )
    }

    #[inline]
    pub fn cell_centre(&self, cell: Int3) -> Double3 {
        self.cell_origin(cell) + Double3::splat(0.5 * self.dx)
    }

    /// Upper corner of the global domain (exclusive).
    pub fn upper_corner(&self) -> Double3 {
        self.cell_origin(self.size)
    }

    /// Global cell holding `position`, which may lie outside the domain.
    #[inline]
    pub fn locate(&self, position: Double3) -> Int3 {
        Int3::new(
            self.locate_axis(position.x, self.origin.x),
            self.locate_axis(position.y, self.origin.y),
            self.locate_axis(position.z, self.origin.z),
        )
    }

    /// Offset of `position` from the corner of `cell`, kept inside `[0, dx)`.
    #[inline]
    pub fn offset_in_cell(&self, position: Double3, cell: Int3) -> Double3 {
        let upper = self.dx * (1.0 - f64::EPSILON);
        (position - self.cell_origin(cell)).map(|v| v.clamp(0.0, upper))
    }

    #[inline]
    fn axis_origin(&self, cell: i64, origin: f64) -> f64 {
        origin + cell as f64 * self.dx
    }

    fn locate_axis(&self, p: f64, origin: f64) -> i64 {
        // far-away positions saturate well short of overflow
        let f = ((p - origin) / self.dx).floor();
        if f.is_nan() {
            return -(CELL_INDEX_LIMIT as i64);
        }
        let mut c = f.clamp(-CELL_INDEX_LIMIT, CELL_INDEX_LIMIT) as i64;
        if self.axis_origin(c, origin) > p {
            c -= 1;
        } else if self.axis_origin(c + 1, origin) <= p {
            c += 1;
        }
        c
    }
}
