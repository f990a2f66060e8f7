//! Two ranks, a 100 x 1 x 100 domain and a single particle crossing the rank
//! boundary once.

mod util;

use serial_test::serial;
use tephra_domain::prelude::*;
use util::{ASH, families, run_ranks};

fn drift(partition: PartitionKind) {
    let cfg = SimulationConfig {
        size: Int3::new(100, 1, 100),
        partition,
        blocks_per_dim: 1,
        dt: 1.0,
        ..Default::default()
    };
    let registry = families();
    let start = Double3::new(49.5, 0.5, 50.5);

    let results = run_ranks(2, |comm| {
        let mut sim = Simulator::new(comm, cfg.clone(), registry.clone())
            .unwrap()
            .with_speed_source(ConstantSpeed::new(Double3::new(1.0, 0.0, 0.0)));
        assert_eq!(sim.domain().partition().grid().dims(), Int3::new(2, 1, 1));
        if sim.owns_position(start) {
            sim.insert(Particle::at(ASH, start)).unwrap();
        }
        let mut crossings = 0;
        for _ in 0..50 {
            let report = sim.step().unwrap();
            // nothing moves between blocks of the same rank in this layout
            crossings += report.received;
            assert_eq!(sim.count_particles_globally().unwrap(), 1);
        }
        let held: Vec<Particle> = sim.domain().absolute_particles().collect();
        (sim.comm().rank(), crossings, held, sim.time())
    });

    let (_, crossings0, held0, t0) = &results[0];
    let (_, crossings1, held1, t1) = &results[1];
    assert_eq!((*t0, *t1), (50.0, 50.0));
    assert!(held0.is_empty());
    assert_eq!(held1.len(), 1);
    let p = held1[0];
    assert!((p.displacement.x - 99.5).abs() < 1e-9);
    assert!((p.displacement.z - 50.5).abs() < 1e-9);
    assert_eq!((*crossings0, *crossings1), (0, 1));
}

#[test]
#[serial]
fn block_cyclic_particle_crosses_once() {
    drift(PartitionKind::BlockCyclic);
}

#[test]
#[serial]
fn slab_particle_crosses_once() {
    drift(PartitionKind::Slab);
}
