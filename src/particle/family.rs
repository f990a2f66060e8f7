//! Particle families: immutable per-run metadata shared by reference.
//!
//! Families must be registered identically on every rank before the first
//! step; particles only carry the family id across the wire.

use crate::domain_error::DomainError;
use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleFamily {
    id: u32,
    name: String,
    /// kg/m³
    density: f64,
    /// m
    diameter: f64,
}

impl ParticleFamily {
    pub fn new(id: u32, name: impl Into<String>, density: f64, diameter: f64) -> Self {
        Self {
            id,
            name: name.into(),
            density,
            diameter,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn density(&self) -> f64 {
        self.density
    }
    pub fn diameter(&self) -> f64 {
        self.diameter
    }
}

/// Lookup table from family id to shared family metadata.
#[derive(Debug, Clone, Default)]
pub struct FamilyRegistry {
    families: HashMap<u32, Arc<ParticleFamily>>,
}

impl FamilyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a family. Re-registering an identical family is a no-op;
    /// a different family under an existing id is a configuration error.
    pub fn register(&mut self, family: ParticleFamily) -> Result<Arc<ParticleFamily>, DomainError> {
        if let Some(existing) = self.families.get(&family.id) {
            if **existing == family {
                return Ok(existing.clone());
            }
            return Err(DomainError::InvalidConfig(format!(
                "particle family {} registered twice with different properties",
                family.id
            )));
        }
        let shared = Arc::new(family);
        self.families.insert(shared.id, shared.clone());
        Ok(shared)
    }

    pub fn get(&self, id: u32) -> Option<&Arc<ParticleFamily>> {
        self.families.get(&id)
    }

    pub fn require(&self, id: u32) -> Result<&Arc<ParticleFamily>, DomainError> {
        self.get(id).ok_or(DomainError::UnknownFamily(id))
    }

    pub fn len(&self) -> usize {
        self.families.len()
    }

    pub fn is_empty(&self) -> bool {
        self.families.is_empty()
    }

    /// Registered ids in ascending order.
    pub fn ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.families.keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}
