//! Particles are neither lost nor duplicated by the exchange: every step the
//! global count equals the injected count minus everything handed to sinks.

mod util;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serial_test::serial;
use tephra_domain::prelude::*;
use util::{ASH, families, insert_owned, run_ranks};

fn cloud(seed: u64, n: usize, size: Int3) -> Vec<Particle> {
    let mut rng = SmallRng::seed_from_u64(seed);
    let hi = size.cast_f64();
    (0..n)
        .map(|_| {
            let pos = Double3::new(
                rng.gen_range(0.0..hi.x),
                rng.gen_range(0.0..hi.y),
                rng.gen_range(0.0..hi.z),
            );
            let v = Double3::new(
                rng.gen_range(-0.9..0.9),
                rng.gen_range(-0.9..0.9),
                rng.gen_range(-0.9..0.9),
            );
            Particle::new(ASH, pos, v)
        })
        .collect()
}

fn conserve(ranks: usize, partition: PartitionKind, seed: u64) {
    let size = Int3::new(24, 12, 12);
    let cfg = SimulationConfig {
        size,
        partition,
        blocks_per_dim: 2,
        ..Default::default()
    };
    let particles = cloud(seed, 400, size);
    let registry = families();

    let totals = run_ranks(ranks, |comm| {
        let escapes = ParticleCollector::new();
        let mut sim = Simulator::new(comm, cfg.clone(), registry.clone())
            .unwrap()
            .with_escape_sink(escapes.clone());
        let inserted = insert_owned(&mut sim, &particles) as u64;
        let injected = sim.comm().all_reduce_sum(inserted).unwrap();
        assert_eq!(injected, particles.len() as u64);
        for _ in 0..15 {
            sim.step().unwrap();
            let alive = sim.count_particles_globally().unwrap();
            let gone = sim
                .comm()
                .all_reduce_sum(escapes.boundary().len() as u64)
                .unwrap();
            assert_eq!(alive + gone, injected, "rank {}", sim.comm().rank());
        }
        sim.count_particles_globally().unwrap()
    });
    assert!(totals.windows(2).all(|w| w[0] == w[1]));
}

#[test]
#[serial]
fn block_cyclic_conserves_particles() {
    for (ranks, seed) in [(1, 11), (2, 12), (3, 13), (4, 14), (6, 15), (8, 16)] {
        conserve(ranks, PartitionKind::BlockCyclic, seed);
    }
}

#[test]
#[serial]
fn slab_conserves_particles() {
    for (ranks, seed) in [(1, 21), (2, 22), (5, 23)] {
        conserve(ranks, PartitionKind::Slab, seed);
    }
}

/// Run one cloud for a few steps on `ranks` ranks and return the gathered
/// positions as sorted bit patterns.
fn final_positions(ranks: usize, particles: &[Particle]) -> Vec<[u64; 3]> {
    let cfg = SimulationConfig {
        size: Int3::new(24, 12, 12),
        blocks_per_dim: 2,
        ..Default::default()
    };
    let registry = families();
    let mut gathered = run_ranks(ranks, |comm| {
        let mut sim = Simulator::new(comm, cfg.clone(), registry.clone()).unwrap();
        insert_owned(&mut sim, particles);
        for _ in 0..6 {
            sim.step().unwrap();
        }
        sim.gather_full_domain(0).unwrap()
    });
    let merged = gathered.swap_remove(0).unwrap();
    let mut bits: Vec<[u64; 3]> = merged
        .absolute_particles()
        .map(|p| p.displacement.to_array().map(f64::to_bits))
        .collect();
    bits.sort_unstable();
    bits
}

#[test]
#[serial]
fn final_state_does_not_depend_on_rank_count() {
    let particles = cloud(99, 300, Int3::new(24, 12, 12));
    let reference = final_positions(1, &particles);
    assert!(!reference.is_empty());
    for ranks in [2, 3, 4, 8] {
        assert_eq!(final_positions(ranks, &particles), reference, "{ranks} ranks");
    }
}

#[test]
#[serial]
fn empty_ranks_still_take_part() {
    // all particles start on one rank; the others hold nothing but must
    // still join every collective
    let cfg = SimulationConfig {
        size: Int3::new(16, 4, 4),
        partition: PartitionKind::Slab,
        ..Default::default()
    };
    let registry = families();
    let counts = run_ranks(4, |comm| {
        let mut sim = Simulator::new(comm, cfg.clone(), registry.clone()).unwrap();
        if sim.comm().rank() == 0 {
            sim.insert(Particle::new(ASH, Double3::new(0.5, 1.5, 1.5), Double3::new(1.0, 0.0, 0.0)))
                .unwrap();
        }
        for _ in 0..10 {
            sim.step().unwrap();
        }
        sim.local_particle_count()
    });
    // 0.5 + 10 = 10.5 lies in the third slab (columns 8..12)
    assert_eq!(counts, vec![0, 0, 1, 0]);
}
