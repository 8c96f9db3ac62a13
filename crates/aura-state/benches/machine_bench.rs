//! Benchmarks for the state machine hot path

use std::time::{Duration, Instant};

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use aura_core::Signal;
use aura_state::{MachineConfig, StateMachine};

fn bench_continuous_updates(c: &mut Criterion) {
    let now = Instant::now();
    let mut machine = StateMachine::new(MachineConfig::default(), now);

    c.bench_function("machine_continuous_update", |b| {
        b.iter(|| machine.on_signal(black_box(Signal::AudioLevel(0.4)), now))
    });
}

fn bench_discrete_mix(c: &mut Criterion) {
    let start = Instant::now();
    let mut machine = StateMachine::new(MachineConfig::default(), start);
    let mut step = 0u64;

    c.bench_function("machine_discrete_mix", |b| {
        b.iter(|| {
            step += 1;
            let now = start + Duration::from_millis(step * 40);
            let signal = Signal::DISCRETE[(step % Signal::DISCRETE.len() as u64) as usize];
            black_box(machine.on_signal(black_box(signal), now))
        })
    });
}

criterion_group!(benches, bench_continuous_updates, bench_discrete_mix);
criterion_main!(benches);
