// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Single-word write/read/free lock.
//
// One 8-byte word encodes the whole machine: which phase is current, who
// has reserved upcoming slots, how many readers are active, and the wait
// strategy per phase. Acquires never block; they only reserve. A release
// hands the machine directly to whoever has already reserved, or parks it
// in a NEXT_* state so the next acquirer absorbs the transition for free.

use std::sync::atomic::{fence, AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::backoff::adaptive_yield;
use crate::bits::*;
use crate::platform;

/// The three access phases, in cycle order: a writer produces, readers
/// consume, a freer reclaims, and the cycle returns to write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Write,
    Read,
    Free,
}

/// Phase a lock currently admits, as reported by [`WrfLock::current_state`].
///
/// `Uninit` covers a freshly created lock (primed, waiting for its first
/// writer) and the parked states between hand-offs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Write,
    Read,
    Free,
    Uninit,
}

/// Per-phase wait-strategy selection.
///
/// Combine flags with `|`. Naming both the block and the yield flag of one
/// phase resolves to yield. Phases not named keep their current strategy
/// (relevant for [`WrfLock::set_flags`]; [`WrfLock::new`] treats unnamed
/// phases as blocking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WaitFlags(u32);

impl WaitFlags {
    pub const WRITE_BLOCK: WaitFlags = WaitFlags(1 << 0);
    pub const WRITE_YIELD: WaitFlags = WaitFlags(1 << 1);
    pub const READ_BLOCK: WaitFlags = WaitFlags(1 << 2);
    pub const READ_YIELD: WaitFlags = WaitFlags(1 << 3);
    pub const FREE_BLOCK: WaitFlags = WaitFlags(1 << 4);
    pub const FREE_YIELD: WaitFlags = WaitFlags(1 << 5);

    /// Every phase blocking.
    pub const BLOCK_ALL: WaitFlags = WaitFlags(0b01_01_01);
    /// Every phase yield-spinning.
    pub const YIELD_ALL: WaitFlags = WaitFlags(0b10_10_10);

    /// Whether every flag in `other` is present in `self`.
    pub const fn contains(self, other: WaitFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Fold the set into `YIELD_*` state bits. Yield wins over block.
    pub(crate) const fn yield_bits(self) -> u32 {
        let mut bits = 0;
        if self.0 & Self::WRITE_YIELD.0 != 0 {
            bits |= YIELD_W;
        }
        if self.0 & Self::READ_YIELD.0 != 0 {
            bits |= YIELD_R;
        }
        if self.0 & Self::FREE_YIELD.0 != 0 {
            bits |= YIELD_F;
        }
        bits
    }

    /// `YIELD_*` state bits this set has an opinion about (phases it names
    /// with either flag).
    pub(crate) const fn touched_bits(self) -> u32 {
        let mut bits = 0;
        if self.0 & (Self::WRITE_BLOCK.0 | Self::WRITE_YIELD.0) != 0 {
            bits |= YIELD_W;
        }
        if self.0 & (Self::READ_BLOCK.0 | Self::READ_YIELD.0) != 0 {
            bits |= YIELD_R;
        }
        if self.0 & (Self::FREE_BLOCK.0 | Self::FREE_YIELD.0) != 0 {
            bits |= YIELD_F;
        }
        bits
    }
}

impl std::ops::BitOr for WaitFlags {
    type Output = WaitFlags;

    fn bitor(self, rhs: WaitFlags) -> WaitFlags {
        WaitFlags(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for WaitFlags {
    fn bitor_assign(&mut self, rhs: WaitFlags) {
        self.0 |= rhs.0;
    }
}

/// A write/read/free lock.
///
/// Serializes three phases of access to a shared resource in strict cyclic
/// order: one writer, then any number of readers (up to 65 535), then one
/// freer, then back to write. Each participant first `*_acquire`s (a
/// non-blocking reservation), then `*_wait`s until its phase is current,
/// does its work, and `*_release`s, which advances the machine and wakes
/// peers as needed.
///
/// The whole machine lives in one 8-byte word, so the lock can be embedded
/// per slot in larger structures (the layout is `#[repr(C, align(8))]` and
/// construction is `const`). Waiting threads either sleep on the OS
/// wait-by-address primitive or spin with adaptive backoff, selectable per
/// phase at construction and at runtime.
///
/// Timed waits in blocking mode may run up to about twice the requested
/// timeout, since a spurious wakeup restarts the sleep with the original
/// budget. Yielding waits stay tight to the timeout.
#[repr(C, align(8))]
pub struct WrfLock {
    word: AtomicU64,
}

impl WrfLock {
    /// Create a lock primed for its first writer.
    ///
    /// `flags` picks the wait strategy per phase (unnamed phases block).
    /// `pshared` stores the cross-process marker bit; it has no behavioral
    /// effect.
    pub const fn new(flags: WaitFlags, pshared: bool) -> Self {
        let mut state = NEXT_W | flags.yield_bits();
        if pshared {
            state |= PSHARED;
        }
        Self {
            word: AtomicU64::new(word_of(state)),
        }
    }

    /// The 32-bit state half. Futex waits target this address, so the CAS
    /// view and the wait view must be the same four bytes.
    fn state(&self) -> &AtomicU32 {
        let halves = &self.word as *const AtomicU64 as *const AtomicU32;
        unsafe { &*halves.add(STATE_HALF) }
    }

    /// CAS retry loop over the state half. `compute` maps an observed value
    /// to the desired one, or `None` to bail out. Returns the (old, new)
    /// pair of the successful exchange.
    fn update_state<F>(&self, success: Ordering, compute: F) -> Option<(u32, u32)>
    where
        F: Fn(u32) -> Option<u32>,
    {
        let mut curr = self.state().load(Ordering::Relaxed);
        loop {
            let next = compute(curr)?;
            match self
                .state()
                .compare_exchange_weak(curr, next, success, Ordering::Relaxed)
            {
                Ok(_) => return Some((curr, next)),
                Err(observed) => curr = observed,
            }
        }
    }

    /// Same retry loop over the full word, for paths where the reader
    /// counter and the state bits must change together.
    fn update_word<F>(&self, success: Ordering, compute: F) -> Option<(u64, u64)>
    where
        F: Fn(u64) -> Option<u64>,
    {
        let mut curr = self.word.load(Ordering::Relaxed);
        loop {
            let next = compute(curr)?;
            match self
                .word
                .compare_exchange_weak(curr, next, success, Ordering::Relaxed)
            {
                Ok(_) => return Some((curr, next)),
                Err(observed) => curr = observed,
            }
        }
    }

    // -----------------------------------------------------------------------
    // Acquire — non-blocking slot reservation
    // -----------------------------------------------------------------------

    /// Reserve the upcoming write slot.
    ///
    /// Returns `false` when a writer is already reserved. Takes the current
    /// phase immediately when the machine was primed for a writer.
    pub fn w_acquire(&self) -> bool {
        self.update_state(Ordering::Relaxed, |s| {
            if s & ACQ_W != 0 {
                return None;
            }
            let mut next = s | ACQ_W;
            // A queued freer means the machine swings Free -> Write before
            // any new readers may be admitted.
            if next & ACQ_F != 0 {
                next |= RD_NEXT_LOOP;
            }
            if next & NEXT_W != 0 {
                next ^= NEXT_W | CURR_W;
            }
            Some(next)
        })
        .is_some()
    }

    /// Reserve a read slot.
    ///
    /// Parks first while a writer is queued behind an outstanding freer
    /// (readers must not overtake that hand-off), then counts itself in.
    /// Returns `false` when 65 535 readers are already reserved.
    pub fn r_acquire(&self) -> bool {
        let mut k = 0u32;
        loop {
            let s = self.state().load(Ordering::Acquire);
            if s & RD_NEXT_LOOP == 0 {
                break;
            }
            if s & YIELD_R != 0 {
                adaptive_yield(&mut k);
            } else {
                platform::wait(self.state(), s, 0);
            }
        }

        // Counter first, on the full word: the release path clears ACQ_R and
        // flips phase bits in the same CAS that takes the count to zero, so
        // the bump must be atomic against that.
        if self
            .update_word(Ordering::Relaxed, |w| {
                if w & RD_COUNT_MASK == RD_COUNT_MASK {
                    return None;
                }
                Some(w + RD_COUNT_ONE)
            })
            .is_none()
        {
            return false;
        }

        self.update_state(Ordering::Relaxed, |s| {
            let mut next = s | ACQ_R;
            if next & NEXT_RF != 0 {
                next ^= NEXT_RF | CURR_R;
            }
            Some(next)
        });
        true
    }

    /// Reserve the upcoming free slot.
    ///
    /// Returns `false` when a freer is already reserved.
    pub fn f_acquire(&self) -> bool {
        self.update_state(Ordering::Relaxed, |s| {
            if s & ACQ_F != 0 {
                return None;
            }
            let mut next = s | ACQ_F;
            if next & NEXT_RF != 0 {
                next ^= NEXT_RF | CURR_F;
            }
            Some(next)
        })
        .is_some()
    }

    // -----------------------------------------------------------------------
    // Release — advance the machine, wake whoever was admitted
    // -----------------------------------------------------------------------

    /// End the write phase. This is the publication point for everything
    /// the writer stored.
    ///
    /// Hands off to queued readers, else a queued freer, else parks the
    /// machine for the next reader/freer. Returns `false` when no writer is
    /// reserved.
    pub fn w_release(&self) -> bool {
        let Some((prev, next)) = self.update_state(Ordering::Release, |s| {
            if s & ACQ_W == 0 {
                return None;
            }
            let mut next = s & !(ACQ_W | CURR_W | RD_NEXT_LOOP);
            if next & ACQ_R != 0 {
                next |= CURR_R;
            } else if next & ACQ_F != 0 {
                next |= CURR_F;
            } else {
                next |= NEXT_RF;
            }
            Some(next)
        }) else {
            return false;
        };
        debug_assert!((next & CURR_ANY).count_ones() <= 1);
        debug_assert!((next & NEXT_ANY).count_ones() <= 1);

        // Sleepers to wake: readers blocked in wait (CURR_R now set), readers
        // parked in the admission barrier, or a blocked freer. The barrier
        // check must read the pre-release value, since the new value never
        // carries RD_NEXT_LOOP.
        let wake_readers =
            (next & CURR_R != 0 || prev & RD_NEXT_LOOP != 0) && next & YIELD_R == 0;
        let wake_freer = next & CURR_F != 0 && next & YIELD_F == 0;
        if wake_readers || wake_freer {
            platform::wake_all(self.state());
        }
        true
    }

    /// Drop one reader. The last reader out hands the machine to a queued
    /// freer, or parks it for the next reader/freer.
    ///
    /// Returns `false` when no reader is counted.
    pub fn r_release(&self) -> bool {
        let Some((_, next)) = self.update_word(Ordering::Release, |w| {
            if w & RD_COUNT_MASK == 0 {
                return None;
            }
            let mut next = w - RD_COUNT_ONE;
            if next & RD_COUNT_MASK == 0 {
                next &= !(word_of(ACQ_R) | word_of(CURR_R));
                if next & word_of(ACQ_F) != 0 {
                    next |= word_of(CURR_F);
                } else {
                    next |= word_of(NEXT_RF);
                }
            }
            Some(next)
        }) else {
            return false;
        };

        if next & word_of(CURR_F) != 0 && next & word_of(YIELD_F) == 0 {
            platform::wake_all(self.state());
        }
        true
    }

    /// End the free phase. Hands off to a queued writer, or primes the
    /// machine for the next one.
    ///
    /// Returns `false` when no freer is reserved.
    pub fn f_release(&self) -> bool {
        let Some((_, next)) = self.update_state(Ordering::Release, |s| {
            if s & ACQ_F == 0 {
                return None;
            }
            let mut next = s & !(ACQ_F | CURR_F);
            if next & ACQ_W != 0 {
                next |= CURR_W;
            } else {
                next |= NEXT_W;
            }
            Some(next)
        }) else {
            return false;
        };
        debug_assert!((next & CURR_ANY).count_ones() <= 1);
        debug_assert!((next & NEXT_ANY).count_ones() <= 1);

        if next & CURR_W != 0 && next & YIELD_W == 0 {
            platform::wake_all(self.state());
        }
        true
    }

    // -----------------------------------------------------------------------
    // Wait — block or spin until the reserved phase is current
    // -----------------------------------------------------------------------

    fn wait_for(&self, curr_bit: u32, yield_bit: u32, timeout_ms: u32) -> bool {
        let start = (timeout_ms > 0).then(Instant::now);
        let budget = Duration::from_millis(timeout_ms as u64);
        let mut k = 0u32;
        loop {
            let s = self.state().load(Ordering::Relaxed);
            if s & curr_bit != 0 {
                fence(Ordering::Acquire);
                return true;
            }
            if let Some(start) = start {
                if start.elapsed() >= budget {
                    return false;
                }
            }
            if s & yield_bit == 0 {
                // Each round restarts with the full budget after the elapsed
                // check above, so a blocking wait can overshoot up to
                // ~2x timeout_ms when wakeups are spurious.
                if !platform::wait(self.state(), s, timeout_ms) {
                    return false;
                }
            } else {
                adaptive_yield(&mut k);
            }
        }
    }

    /// Wait until the write phase is current. `timeout_ms == 0` waits
    /// forever; returns `false` on timeout.
    pub fn w_wait(&self, timeout_ms: u32) -> bool {
        self.wait_for(CURR_W, YIELD_W, timeout_ms)
    }

    /// Wait until the read phase is current. `timeout_ms == 0` waits
    /// forever; returns `false` on timeout.
    pub fn r_wait(&self, timeout_ms: u32) -> bool {
        self.wait_for(CURR_R, YIELD_R, timeout_ms)
    }

    /// Wait until the free phase is current. `timeout_ms == 0` waits
    /// forever; returns `false` on timeout.
    pub fn f_wait(&self, timeout_ms: u32) -> bool {
        self.wait_for(CURR_F, YIELD_F, timeout_ms)
    }

    /// Whether the write phase is current, without waiting.
    pub fn w_try_wait(&self) -> bool {
        self.state().load(Ordering::Acquire) & CURR_W != 0
    }

    /// Whether the read phase is current, without waiting.
    pub fn r_try_wait(&self) -> bool {
        self.state().load(Ordering::Acquire) & CURR_R != 0
    }

    /// Whether the free phase is current, without waiting.
    pub fn f_try_wait(&self) -> bool {
        self.state().load(Ordering::Acquire) & CURR_F != 0
    }

    // -----------------------------------------------------------------------
    // Unified surface
    // -----------------------------------------------------------------------

    /// [`w_acquire`](Self::w_acquire) / [`r_acquire`](Self::r_acquire) /
    /// [`f_acquire`](Self::f_acquire), keyed by phase.
    pub fn acquire(&self, phase: Phase) -> bool {
        match phase {
            Phase::Write => self.w_acquire(),
            Phase::Read => self.r_acquire(),
            Phase::Free => self.f_acquire(),
        }
    }

    /// [`w_release`](Self::w_release) / [`r_release`](Self::r_release) /
    /// [`f_release`](Self::f_release), keyed by phase.
    pub fn release(&self, phase: Phase) -> bool {
        match phase {
            Phase::Write => self.w_release(),
            Phase::Read => self.r_release(),
            Phase::Free => self.f_release(),
        }
    }

    /// [`w_wait`](Self::w_wait) / [`r_wait`](Self::r_wait) /
    /// [`f_wait`](Self::f_wait), keyed by phase.
    pub fn wait(&self, phase: Phase, timeout_ms: u32) -> bool {
        match phase {
            Phase::Write => self.w_wait(timeout_ms),
            Phase::Read => self.r_wait(timeout_ms),
            Phase::Free => self.f_wait(timeout_ms),
        }
    }

    /// [`w_try_wait`](Self::w_try_wait) / [`r_try_wait`](Self::r_try_wait) /
    /// [`f_try_wait`](Self::f_try_wait), keyed by phase.
    pub fn try_wait(&self, phase: Phase) -> bool {
        match phase {
            Phase::Write => self.w_try_wait(),
            Phase::Read => self.r_try_wait(),
            Phase::Free => self.f_try_wait(),
        }
    }

    /// Re-select wait strategies at runtime.
    ///
    /// Phases the set does not name keep their current strategy. A
    /// block-to-yield transition wakes all sleepers so they can switch over;
    /// on the rechecked state they either proceed or fall into the spin
    /// loop. Applying the same set twice is a no-op.
    pub fn set_flags(&self, flags: WaitFlags) {
        let touched = flags.touched_bits();
        let wanted = flags.yield_bits();
        let mut curr = self.state().load(Ordering::Relaxed);
        loop {
            let next = (curr & !touched) | wanted;
            match self
                .state()
                .compare_exchange_weak(curr, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(_) => {
                    if next & !curr & YIELD_ANY != 0 {
                        platform::wake_all(self.state());
                    }
                    return;
                }
                Err(observed) => curr = observed,
            }
        }
    }

    /// Which phase the machine currently admits.
    pub fn current_state(&self) -> LockState {
        let s = self.state().load(Ordering::Acquire);
        if s & CURR_W != 0 {
            LockState::Write
        } else if s & CURR_R != 0 {
            LockState::Read
        } else if s & CURR_F != 0 {
            LockState::Free
        } else {
            LockState::Uninit
        }
    }
}

impl Default for WrfLock {
    /// Every phase blocking, not `pshared`.
    fn default() -> Self {
        Self::new(WaitFlags::BLOCK_ALL, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_of(lock: &WrfLock) -> u32 {
        lock.state().load(Ordering::Relaxed)
    }

    fn readers_of(lock: &WrfLock) -> u64 {
        lock.word.load(Ordering::Relaxed) & RD_COUNT_MASK
    }

    fn assert_invariants(lock: &WrfLock) {
        let s = state_of(lock);
        assert!(
            (s & CURR_ANY).count_ones() <= 1,
            "more than one current phase: {s:#x}"
        );
        assert!(
            (s & NEXT_ANY).count_ones() <= 1,
            "more than one next phase: {s:#x}"
        );
        if s & CURR_ANY != 0 {
            assert_eq!(s & NEXT_ANY, 0, "current and next both set: {s:#x}");
        }
        let readers = readers_of(lock);
        if s & CURR_R != 0 {
            assert!(readers > 0, "read phase with zero readers: {s:#x}");
        }
        if readers > 0 {
            assert_ne!(s & ACQ_R, 0, "counted readers without ACQ_R: {s:#x}");
        }
    }

    #[test]
    fn fresh_lock_is_primed_for_write() {
        let lock = WrfLock::default();
        assert_eq!(state_of(&lock) & NEXT_ANY, NEXT_W);
        assert_eq!(lock.current_state(), LockState::Uninit);
        assert_invariants(&lock);
    }

    #[test]
    fn pshared_marker_is_stored_as_given() {
        let shared = WrfLock::new(WaitFlags::BLOCK_ALL, true);
        assert_ne!(state_of(&shared) & PSHARED, 0);
        let private = WrfLock::new(WaitFlags::BLOCK_ALL, false);
        assert_eq!(state_of(&private) & PSHARED, 0);
    }

    #[test]
    fn yield_flags_land_in_the_state_word() {
        let lock = WrfLock::new(WaitFlags::YIELD_ALL, false);
        assert_eq!(state_of(&lock) & YIELD_ANY, YIELD_ANY);

        // Yield wins when both flags of a phase are given.
        let lock = WrfLock::new(WaitFlags::READ_BLOCK | WaitFlags::READ_YIELD, false);
        assert_eq!(state_of(&lock) & YIELD_ANY, YIELD_R);
    }

    #[test]
    fn set_flags_touches_only_named_phases() {
        let lock = WrfLock::new(WaitFlags::YIELD_ALL, false);
        lock.set_flags(WaitFlags::WRITE_BLOCK);
        assert_eq!(state_of(&lock) & YIELD_ANY, YIELD_R | YIELD_F);
        lock.set_flags(WaitFlags::WRITE_BLOCK);
        assert_eq!(state_of(&lock) & YIELD_ANY, YIELD_R | YIELD_F);
    }

    #[test]
    fn full_cycle_preserves_invariants() {
        let lock = WrfLock::default();

        assert!(lock.w_acquire());
        assert_invariants(&lock);
        assert!(lock.w_try_wait());

        assert!(lock.r_acquire());
        assert_invariants(&lock);
        assert!(lock.f_acquire());
        assert_invariants(&lock);

        assert!(lock.w_release());
        assert_invariants(&lock);
        assert!(lock.r_wait(0));
        assert!(lock.r_release());
        assert_invariants(&lock);
        assert!(lock.f_wait(0));
        assert!(lock.f_release());
        assert_invariants(&lock);

        // Primed for the next writer again.
        assert_eq!(state_of(&lock) & NEXT_ANY, NEXT_W);
        assert_eq!(readers_of(&lock), 0);
    }

    #[test]
    fn reader_count_tracks_acquires() {
        let lock = WrfLock::default();
        assert!(lock.w_acquire());
        assert!(lock.w_release());

        for n in 1..=4u64 {
            assert!(lock.r_acquire());
            assert_eq!(readers_of(&lock), n);
            assert_invariants(&lock);
        }
        for n in (0..4u64).rev() {
            assert!(lock.r_release());
            assert_eq!(readers_of(&lock), n);
            assert_invariants(&lock);
        }
        assert_eq!(state_of(&lock) & ACQ_R, 0);
    }

    #[test]
    fn writer_behind_freer_arms_the_reader_barrier() {
        let lock = WrfLock::default();
        assert!(lock.w_acquire());
        assert!(lock.f_acquire());
        assert!(lock.w_release());
        // Free phase is current; a new writer queues behind the freer.
        assert!(lock.w_acquire());
        assert_ne!(state_of(&lock) & RD_NEXT_LOOP, 0);
        assert_invariants(&lock);

        assert!(lock.f_release());
        assert!(lock.w_try_wait());
        // The barrier comes down exactly when that writer releases.
        assert_ne!(state_of(&lock) & RD_NEXT_LOOP, 0);
        assert!(lock.w_release());
        assert_eq!(state_of(&lock) & RD_NEXT_LOOP, 0);
        assert_invariants(&lock);
    }

    #[test]
    fn release_hands_off_to_whoever_reserved() {
        let lock = WrfLock::default();
        assert!(lock.w_acquire());
        assert!(lock.r_acquire());
        assert!(lock.w_release());
        assert_eq!(lock.current_state(), LockState::Read);

        assert!(lock.f_acquire());
        assert!(lock.r_release());
        assert_eq!(lock.current_state(), LockState::Free);

        assert!(lock.w_acquire());
        assert!(lock.f_release());
        assert_eq!(lock.current_state(), LockState::Write);
        assert!(lock.w_release());
        assert_invariants(&lock);
    }
}
