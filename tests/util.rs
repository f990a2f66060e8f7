#![allow(dead_code)]
use std::time::Duration;
use tephra_domain::prelude::*;

/// Run `f` once per rank of a fresh in-process universe, each on its own
/// thread, and return the results in rank order.
pub fn run_ranks<T: Send>(n: usize, f: impl Fn(LocalComm) -> T + Sync) -> Vec<T> {
    let comms = LocalComm::universe(n);
    std::thread::scope(|s| {
        let handles: Vec<_> = comms
            .into_iter()
            .map(|c| {
                let f = &f;
                s.spawn(move || f(c.with_recv_timeout(Duration::from_secs(20))))
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("rank thread panicked"))
            .collect()
    })
}

pub const ASH: u32 = 0;

pub fn families() -> FamilyRegistry {
    let mut r = FamilyRegistry::new();
    r.register(ParticleFamily::new(ASH, "ash", 2500.0, 1e-4))
        .unwrap();
    r
}

/// Insert every particle this rank owns; returns how many were taken.
pub fn insert_owned<C: Communicator>(sim: &mut Simulator<C>, particles: &[Particle]) -> usize {
    let mut taken = 0;
    for p in particles {
        if sim.owns_position(p.displacement) {
            sim.insert(*p).unwrap();
            taken += 1;
        }
    }
    taken
}
