// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Lock cycle benchmarks.
//
// Run with:
//   cargo bench --bench lock
//
// Groups:
//   uncontended_cycle — one thread driving a full write/read/free cycle;
//                       no waiter is ever parked, so no syscalls are made
//   acquire_release   — the cheapest single hop (write reserve + release)

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use wrflock::{WaitFlags, WrfLock};

fn full_cycle(lock: &WrfLock) {
    assert!(lock.w_acquire());
    assert!(lock.w_wait(0));
    assert!(lock.w_release());
    assert!(lock.r_acquire());
    assert!(lock.r_wait(0));
    assert!(lock.r_release());
    assert!(lock.f_acquire());
    assert!(lock.f_wait(0));
    assert!(lock.f_release());
}

fn bench_uncontended_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("uncontended_cycle");

    group.bench_function("blocking_flags", |b| {
        let lock = WrfLock::default();
        b.iter(|| full_cycle(black_box(&lock)));
    });

    group.bench_function("yielding_flags", |b| {
        let lock = WrfLock::new(WaitFlags::YIELD_ALL, false);
        b.iter(|| full_cycle(black_box(&lock)));
    });

    group.finish();
}

fn bench_acquire_release(c: &mut Criterion) {
    let mut group = c.benchmark_group("acquire_release");

    group.bench_function("write_hop", |b| {
        let lock = WrfLock::default();
        b.iter(|| {
            assert!(lock.w_acquire());
            assert!(lock.w_release());
        });
    });

    group.finish();
}

criterion_group!(benches, bench_uncontended_cycle, bench_acquire_release);
criterion_main!(benches);
