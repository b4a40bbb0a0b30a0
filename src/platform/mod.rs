// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Address-based wait backend. Every OS exposes the same minimal surface:
//
//   wait(addr, expected, timeout_ms) -> bool   false on timeout or error
//   wake_one(addr)
//   wake_all(addr)
//
// `wait` parks the calling thread as long as the 32-bit value at `addr`
// equals `expected`; `timeout_ms == 0` waits forever. A `true` return means
// "woken" (the value may or may not have changed); callers always recheck.

#[cfg(any(target_os = "linux", target_os = "android"))]
mod linux;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub(crate) use linux::{wait, wake_all, wake_one};

#[cfg(target_os = "macos")]
mod macos;
#[cfg(target_os = "macos")]
pub(crate) use macos::{wait, wake_all, wake_one};

#[cfg(windows)]
mod windows;
#[cfg(windows)]
pub(crate) use windows::{wait, wake_all, wake_one};

#[cfg(not(any(
    target_os = "linux",
    target_os = "android",
    target_os = "macos",
    windows
)))]
compile_error!("no wait-by-address backend for this target");
