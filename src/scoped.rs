// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bracketed access: reserve a slot, wait for the phase, run the caller's
// block, release. Turns the four-step protocol into a single call.

use std::io;

use crate::{Phase, WrfLock};

impl WrfLock {
    /// Run `body` inside `phase`: reserve a slot, block until the phase is
    /// current, run, release.
    ///
    /// # Errors
    /// `WouldBlock` when the slot is already reserved by another
    /// participant (acquire overflow).
    ///
    /// # Panics
    /// Panics when the release fails. That can only happen when some other
    /// thread released a slot it never acquired, which is a protocol
    /// violation rather than a runtime condition.
    pub fn with<R>(&self, phase: Phase, body: impl FnOnce() -> R) -> io::Result<R> {
        if !self.acquire(phase) {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "phase slot already reserved",
            ));
        }
        assert!(self.wait(phase, 0), "infinite wait failed");
        let out = body();
        assert!(
            self.release(phase),
            "release failed after scoped {phase:?} access"
        );
        Ok(out)
    }

    /// Like [`with`](Self::with), but runs `idle` between polls of
    /// [`try_wait`](Self::try_wait) instead of sleeping, for callers with
    /// useful filler work.
    pub fn with_poll<R>(
        &self,
        phase: Phase,
        mut idle: impl FnMut(),
        body: impl FnOnce() -> R,
    ) -> io::Result<R> {
        if !self.acquire(phase) {
            return Err(io::Error::new(
                io::ErrorKind::WouldBlock,
                "phase slot already reserved",
            ));
        }
        while !self.try_wait(phase) {
            idle();
        }
        let out = body();
        assert!(
            self.release(phase),
            "release failed after scoped {phase:?} access"
        );
        Ok(out)
    }
}
