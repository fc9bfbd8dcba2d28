use criterion::{criterion_group, criterion_main, Criterion};

fn bench_week(c: &mut Criterion) {
    let config: sim_core::ShopConfig = serde_yaml::from_str(
        r#"
startingCash: 5000
periodSeconds: 420
rngSeed: 42
base:
  spawnIntervalSeconds: 2
  serviceRooms: 3
customerPatienceSeconds: 20
happyExperienceGain: 5
angryExperiencePenalty: 2
levelThresholds: [100, 300, 900]
services:
  - { id: haircut, name: Haircut, price: 35, durationSeconds: 6 }
  - { id: massage, name: Massage, price: 90, durationSeconds: 12 }
upgrades:
  - id: chairs
    name: Chairs
    levels:
      - { level: 1, cost: 400, effects: [{ metric: serviceRooms, type: Add, value: 1 }] }
staffRoles:
  - id: stylist
    name: Stylist
    salary: 150
    effects: [{ metric: serviceSpeedMultiplier, type: Percent, value: 0.2 }]
"#,
    )
    .expect("bench config");
    let mut session = sim_runtime::GameSession::new(config).expect("valid config");
    session.hire_staff("stylist").expect("hire");
    session.purchase_upgrade("chairs").expect("upgrade");

    c.bench_function("sim_week", |b| {
        b.iter(|| {
            let _ = session.run_periods(1);
        })
    });
}

criterion_group!(benches, bench_week);
criterion_main!(benches);
