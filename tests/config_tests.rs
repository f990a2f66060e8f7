use tephra_domain::prelude::*;

#[test]
fn json_round_trip() {
    let cfg = SimulationConfig {
        origin: Double3::new(-5.0, 0.0, 2.5),
        dx: 0.5,
        size: Int3::new(40, 1, 40),
        partition: PartitionKind::Slab,
        grid_layout: GridLayout::Explicit(Int3::new(4, 1, 1)),
        adaptive_dt: Some(AdaptiveDtConfig::default()),
        ..Default::default()
    };
    let json = serde_json::to_string(&cfg).unwrap();
    let back: SimulationConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(back, cfg);
}

#[test]
fn missing_fields_take_defaults() {
    let cfg: SimulationConfig =
        serde_json::from_str(r#"{ "size": { "x": 8, "y": 1, "z": 8 }, "adaptive_dt": { "decrement": 0.05 } }"#)
            .unwrap();
    assert_eq!(cfg.size, Int3::new(8, 1, 8));
    assert_eq!(cfg.partition, PartitionKind::BlockCyclic);
    assert_eq!(cfg.blocks_per_dim, 5);
    let adaptive = cfg.adaptive_dt.unwrap();
    assert_eq!(adaptive.decrement, 0.05);
    assert_eq!(adaptive.max_retries, AdaptiveDtConfig::default().max_retries);
    cfg.validate().unwrap();
}

#[test]
fn simulator_rejects_invalid_config() {
    let cfg = SimulationConfig {
        dx: f64::NAN,
        ..Default::default()
    };
    let err = Simulator::new(LocalComm::serial(), cfg, FamilyRegistry::new()).err();
    assert!(matches!(err, Some(DomainError::InvalidDomain(_))));
}
