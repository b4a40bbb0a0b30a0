// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Usage:
//   demo_wrf_pipeline <rounds> <readers> [yield]
//
// One writer, <readers> readers and one freer walk a small ring of slots,
// each slot guarded by its own write/read/free lock. The writer stamps a
// sequence number, readers report what they saw, the freer poisons the
// slot before it is recycled. Pass "yield" to spin instead of sleeping.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use wrflock::{WaitFlags, WrfLock};

const RING: usize = 8;
const WAIT_SLICE_MS: u32 = 200;

struct Slot {
    lock: WrfLock,
    value: AtomicI64,
}

impl Slot {
    const fn new(flags: WaitFlags) -> Self {
        Self {
            lock: WrfLock::new(flags, false),
            value: AtomicI64::new(0),
        }
    }
}

fn do_write(ring: Arc<Vec<Slot>>, rounds: i64, quit: Arc<AtomicBool>) {
    for k in 1..=rounds {
        let slot = &ring[k as usize % RING];
        if !slot.lock.w_acquire() {
            eprintln!("write: slot {k} already reserved, giving up");
            return;
        }
        loop {
            if slot.lock.w_wait(WAIT_SLICE_MS) {
                break;
            }
            if quit.load(Ordering::Acquire) {
                slot.lock.w_release();
                return;
            }
        }
        slot.value.store(k, Ordering::Relaxed);
        slot.lock.w_release();
    }
    println!("write: produced {rounds} items");
}

fn do_read(id: usize, ring: Arc<Vec<Slot>>, quit: Arc<AtomicBool>) -> i64 {
    let mut seen = 0i64;
    let mut newest = 0i64;
    let mut k = 1i64;
    'ring: while !quit.load(Ordering::Acquire) {
        let slot = &ring[k as usize % RING];
        if !slot.lock.r_acquire() {
            eprintln!("read {id}: ring full of readers, giving up");
            break;
        }
        loop {
            if slot.lock.r_wait(WAIT_SLICE_MS) {
                break;
            }
            if quit.load(Ordering::Acquire) {
                slot.lock.r_release();
                break 'ring;
            }
        }
        newest = newest.max(slot.value.load(Ordering::Relaxed));
        seen += 1;
        slot.lock.r_release();
        k += 1;
    }
    println!("read {id}: newest item seen was {newest}");
    seen
}

fn do_free(ring: Arc<Vec<Slot>>, quit: Arc<AtomicBool>) -> i64 {
    let mut freed = 0i64;
    let mut k = 1i64;
    while !quit.load(Ordering::Acquire) {
        let slot = &ring[k as usize % RING];
        if !slot.lock.f_acquire() {
            eprintln!("free: slot {k} already reserved, giving up");
            break;
        }
        loop {
            if slot.lock.f_wait(WAIT_SLICE_MS) {
                break;
            }
            if quit.load(Ordering::Acquire) {
                slot.lock.f_release();
                return freed;
            }
        }
        slot.value.store(-1, Ordering::Relaxed);
        freed += 1;
        slot.lock.f_release();
        k += 1;
    }
    freed
}

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 3 {
        eprintln!("usage: demo_wrf_pipeline <rounds> <readers> [yield]");
        std::process::exit(1);
    }

    let rounds: i64 = args[1].parse().expect("rounds");
    let readers: usize = args[2].parse().expect("readers");
    let flags = if args.get(3).map(String::as_str) == Some("yield") {
        WaitFlags::YIELD_ALL
    } else {
        WaitFlags::BLOCK_ALL
    };

    let mut slots = Vec::with_capacity(RING);
    for _ in 0..RING {
        slots.push(Slot::new(flags));
    }
    let ring = Arc::new(slots);
    let quit = Arc::new(AtomicBool::new(false));

    let start = Instant::now();

    let writer = {
        let ring = Arc::clone(&ring);
        let quit = Arc::clone(&quit);
        thread::spawn(move || do_write(ring, rounds, quit))
    };

    let reader_handles: Vec<_> = (0..readers)
        .map(|id| {
            let ring = Arc::clone(&ring);
            let quit = Arc::clone(&quit);
            thread::spawn(move || do_read(id, ring, quit))
        })
        .collect();

    let freer = {
        let ring = Arc::clone(&ring);
        let quit = Arc::clone(&quit);
        thread::spawn(move || do_free(ring, quit))
    };

    writer.join().unwrap();
    // Let the tail of the pipeline drain, then stop the open-ended loops.
    thread::sleep(Duration::from_millis(500));
    quit.store(true, Ordering::Release);

    for (id, h) in reader_handles.into_iter().enumerate() {
        let seen = h.join().unwrap();
        println!("read {id}: consumed {seen} items");
    }
    let freed = freer.join().unwrap();
    println!("free: reclaimed {freed} slots");
    println!("done in {:?}", start.elapsed());
}
