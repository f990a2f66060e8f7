//! Per-rank block of cells, stored as an arena of fixed cell records indexed
//! by a linearized 3-D index.
//!
//! Each cell owns two bins. The stepper reads `current` and writes `next`;
//! [`LocalBlock::swap_buffers`] promotes `next` once an attempt is committed,
//! so particle moves inside a step never depend on cell visiting order.

use crate::geometry::{Double3, DomainGeometry, Int3};
use crate::particle::Particle;
use crate::partition::BlockSpec;

/// Which bin of a cell a particle is written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bin {
    Current,
    Next,
}

#[derive(Debug, Clone, Default)]
pub struct Cell {
    current: Vec<Particle>,
    next: Vec<Particle>,
    ground_contact: bool,
}

impl Cell {
    /// Particles of the active bin; displacements are in-cell offsets.
    pub fn particles(&self) -> &[Particle] {
        &self.current
    }

    pub fn is_ground_contact(&self) -> bool {
        self.ground_contact
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct LocalBlock {
    spec: BlockSpec,
    position: Double3,
    dx: f64,
    cells: Vec<Cell>,
}

impl LocalBlock {
    pub fn new(spec: BlockSpec, geometry: &DomainGeometry) -> Self {
        let n = spec.size.product() as usize;
        Self {
            spec,
            position: geometry.cell_origin(spec.first_cell),
            dx: geometry.dx,
            cells: vec![Cell::default(); n],
        }
    }

    pub fn spec(&self) -> &BlockSpec {
        &self.spec
    }

    /// Absolute origin of the block.
    pub fn position(&self) -> Double3 {
        self.position
    }

    /// Cells per axis.
    pub fn size(&self) -> Int3 {
        self.spec.size
    }

    pub fn dx(&self) -> f64 {
        self.dx
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_in_bounds(&self, local: Int3) -> bool {
        local.is_in_bounds(self.spec.size)
    }

    #[inline]
    pub fn index(&self, local: Int3) -> usize {
        local.linear_index(self.spec.size)
    }

    #[inline]
    pub fn local_coord(&self, index: usize) -> Int3 {
        Int3::from_linear_index(index, self.spec.size)
    }

    #[inline]
    pub fn global_cell(&self, index: usize) -> Int3 {
        self.spec.first_cell + self.local_coord(index)
    }

    pub fn contains_global_cell(&self, cell: Int3) -> bool {
        self.spec.contains_cell(cell)
    }

    pub fn cell(&self, local: Int3) -> Option<&Cell> {
        self.is_in_bounds(local).then(|| &self.cells[self.index(local)])
    }

    pub fn cell_at(&self, index: usize) -> &Cell {
        &self.cells[index]
    }

    /// `(local coordinate, cell)` pairs in arena order.
    pub fn cells(&self) -> impl Iterator<Item = (Int3, &Cell)> + '_ {
        self.cells
            .iter()
            .enumerate()
            .map(|(i, c)| (self.local_coord(i), c))
    }

    /// Store `p` (displacement already an in-cell offset) in global `cell`.
    pub fn push(&mut self, cell: Int3, p: Particle, bin: Bin) {
        let idx = self.index(cell - self.spec.first_cell);
        let target = &mut self.cells[idx];
        match bin {
            Bin::Current => target.current.push(p),
            Bin::Next => target.next.push(p),
        }
    }

    pub fn set_ground_contact(&mut self, index: usize, flag: bool) {
        self.cells[index].ground_contact = flag;
    }

    /// Promote every `next` bin to `current` and empty the old bins.
    pub fn swap_buffers(&mut self) {
        for cell in &mut self.cells {
            std::mem::swap(&mut cell.current, &mut cell.next);
            cell.next.clear();
        }
    }

    /// Drop everything written to `next` bins by an aborted attempt.
    pub fn clear_next(&mut self) {
        for cell in &mut self.cells {
            cell.next.clear();
        }
    }

    /// Empty both bins of every cell.
    pub fn clear(&mut self) {
        for cell in &mut self.cells {
            cell.current.clear();
            cell.next.clear();
        }
    }

    pub fn particle_count(&self) -> usize {
        self.cells.iter().map(|c| c.current.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Cell::is_empty)
    }

    /// Active particles with displacements converted to absolute positions.
    pub fn absolute_particles<'a>(
        &'a self,
        geometry: &'a DomainGeometry,
    ) -> impl Iterator<Item = Particle> + 'a {
        self.cells.iter().enumerate().flat_map(move |(i, c)| {
            let origin = geometry.cell_origin(self.global_cell(i));
            c.current
                .iter()
                .map(move |p| p.with_displacement(origin + p.displacement))
        })
    }
}
