//! A particle leaving the centre block of a 3x3x3 process grid through each of
//! its 26 faces, edges and corners must arrive at exactly the neighbor in that
//! direction.

mod util;

use serial_test::serial;
use tephra_domain::prelude::*;
use util::{families, insert_owned, run_ranks};

fn direction(index: usize) -> Int3 {
    let d = Int3::from_linear_index(index, Int3::splat(3));
    d - Int3::splat(1)
}

#[test]
#[serial]
fn every_direction_reaches_its_neighbor() {
    let cfg = SimulationConfig {
        size: Int3::splat(9),
        blocks_per_dim: 1,
        ..Default::default()
    };
    // centre block spans cells 3..6; start one cell in from its face along
    // each moving axis and move one cell per step
    let particles: Vec<Particle> = (0..27)
        .map(|i| {
            let d = direction(i);
            let start = (Int3::splat(4) + d).cast_f64() + Double3::splat(0.5);
            Particle::new(i as u32, start, d.cast_f64())
        })
        .collect();
    let mut registry = families();
    for i in 1..27 {
        registry
            .register(ParticleFamily::new(i, format!("dir{i}"), 1000.0, 1e-3))
            .unwrap();
    }

    let held = run_ranks(27, |comm| {
        let mut sim = Simulator::new(comm, cfg.clone(), registry.clone()).unwrap();
        let inserted = insert_owned(&mut sim, &particles);
        let report = sim.step().unwrap();
        let coord = sim.domain().partition().grid().coord();
        let ids: Vec<u32> = sim
            .domain()
            .absolute_particles()
            .map(|p| p.family_id)
            .collect();
        (coord, inserted, report, ids)
    });

    let centre = &held[13];
    assert_eq!(centre.0, Int3::splat(1));
    assert_eq!(centre.1, 27);
    assert_eq!(centre.3, vec![13]);
    assert_eq!(centre.2.sent, 26);

    for (i, (coord, _, _, ids)) in held.iter().enumerate() {
        if i == 13 {
            continue;
        }
        // the only particle here is the one that moved along (coord - centre)
        let d = *coord - Int3::splat(1);
        let expected = (0..27).find(|&j| direction(j) == d).unwrap();
        assert_eq!(ids, &vec![expected as u32], "rank {i} at {coord:?}");
    }
    let total: usize = held.iter().map(|h| h.3.len()).sum();
    assert_eq!(total, 27);
}

/// Start coordinate and velocity along one axis for a particle leaving the
/// centre block (cells 3..6) in direction `d`. Movers toward `-` sit exactly
/// on the lower face, which the centre owns; movers toward `+` land exactly
/// on the upper face, which belongs to the neighbor.
fn face_axis(d: i64) -> (f64, f64) {
    match d {
        -1 => (3.0, -1e-9),
        1 => (5.5, 0.5),
        _ => (4.5, 0.0),
    }
}

#[test]
#[serial]
fn particles_on_block_faces_have_one_owner() {
    let cfg = SimulationConfig {
        size: Int3::splat(9),
        blocks_per_dim: 1,
        ..Default::default()
    };
    let particles: Vec<Particle> = (0..27)
        .map(|i| {
            let d = direction(i);
            let (px, vx) = face_axis(d.x);
            let (py, vy) = face_axis(d.y);
            let (pz, vz) = face_axis(d.z);
            Particle::new(i as u32, Double3::new(px, py, pz), Double3::new(vx, vy, vz))
        })
        .collect();
    // a particle resting exactly on an upper face starts on the far side
    let resting = Particle::at(0, Double3::new(6.0, 4.5, 4.5));
    let mut registry = families();
    for i in 1..27 {
        registry
            .register(ParticleFamily::new(i, format!("dir{i}"), 1000.0, 1e-3))
            .unwrap();
    }

    let held = run_ranks(27, |comm| {
        let mut sim = Simulator::new(comm, cfg.clone(), registry.clone()).unwrap();
        let inserted = insert_owned(&mut sim, &particles);
        let owns_resting = sim.owns_position(resting.displacement);
        sim.step().unwrap();
        let coord = sim.domain().partition().grid().coord();
        let found: Vec<Particle> = sim.domain().absolute_particles().collect();
        (coord, inserted, owns_resting, found)
    });

    assert_eq!(held[13].1, 27, "lower faces belong to the centre block");
    let resting_owners: Vec<Int3> = held.iter().filter(|h| h.2).map(|h| h.0).collect();
    assert_eq!(resting_owners, vec![Int3::new(2, 1, 1)]);

    for i in 0..27 {
        let holders: Vec<&(Int3, usize, bool, Vec<Particle>)> = held
            .iter()
            .filter(|h| h.3.iter().any(|p| p.family_id == i as u32))
            .collect();
        assert_eq!(holders.len(), 1, "direction {:?}", direction(i));
        assert_eq!(holders[0].0 - Int3::splat(1), direction(i));
        let p = holders[0].3.iter().find(|p| p.family_id == i as u32).unwrap();
        let d = direction(i);
        if d.x == 1 {
            assert_eq!(p.displacement.x, 6.0);
        }
        if d.x == -1 {
            assert!(p.displacement.x < 3.0);
        }
    }
    let total: usize = held.iter().map(|h| h.3.len()).sum();
    assert_eq!(total, 27);
}
