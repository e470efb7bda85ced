//! # Control Tick Benchmark

use criterion::{criterion_group, criterion_main, Criterion};

use comms_if::bus::{
    self,
    Bus,
    MemBus,
    records::{PoseRecord, PoseVelocityRecord}
};
use ctrl_lib::{
    ctrl_loop::{ControlLoop, LoopParams},
    loc::LocParams,
    traj_ctrl::PoseTarget
};

fn ctrl_tick_benchmark(c: &mut Criterion) {
    // ---- Build the loop against an in-memory bus ----

    let params = LoopParams {
        exec: toml::from_str(include_str!("../../params/ctrl_exec.toml")).unwrap(),
        loc: LocParams::default(),
        loco: toml::from_str(include_str!("../../params/loco_ctrl.toml")).unwrap(),
        pos: toml::from_str(include_str!("../../params/pos_ctrl.toml")).unwrap(),
        traj: toml::from_str(include_str!("../../params/traj_ctrl.toml")).unwrap()
    };

    let mut bus = MemBus::new();
    let mut ctrl_loop = ControlLoop::init(params).unwrap();
    ctrl_loop.connect(&mut bus).unwrap();
    ctrl_loop.hold_at(PoseTarget {
        x_m: 0.5,
        y_m: 0.2,
        heading_rad: 0.3
    });

    let mut now_us = 0u64;

    // Bench a full cycle with a fresh estimate each time
    c.bench_function("ControlLoop::tick", |b| {
        b.iter(|| {
            now_us += 100_000;

            bus.set(bus::KEY_POSE, &bus::encode(&PoseRecord {
                timestamp: now_us,
                pos: vec![0.1, 0.0, 0.0],
                rot: [1.0, 0.0, 0.0, 0.0]
            }).unwrap()).unwrap();
            bus.set(bus::KEY_POSE_VELOCITY, &bus::encode(&PoseVelocityRecord {
                timestamp: now_us,
                pos: vec![0.05, 0.0, 0.0],
                theta: vec![0.0, 0.0, 0.01]
            }).unwrap()).unwrap();

            let report = ctrl_loop.tick(&mut bus, now_us).unwrap();
            bus.clear_history();
            report
        })
    });
}

criterion_group!(benches, ctrl_tick_benchmark);
criterion_main!(benches);
