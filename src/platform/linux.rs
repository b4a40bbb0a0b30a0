// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Linux wait backend: FUTEX_WAIT / FUTEX_WAKE via the raw syscall.
// Always the -PRIVATE flavor; cross-process use is out of scope.

use std::io;
use std::ptr;
use std::sync::atomic::AtomicU32;

pub(crate) fn wait(addr: &AtomicU32, expected: u32, timeout_ms: u32) -> bool {
    let ts;
    let ts_ptr = if timeout_ms == 0 {
        ptr::null::<libc::timespec>()
    } else {
        ts = libc::timespec {
            tv_sec: (timeout_ms / 1000) as libc::time_t,
            tv_nsec: ((timeout_ms % 1000) * 1_000_000) as _,
        };
        &ts
    };

    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr as *const AtomicU32,
            libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
            expected,
            ts_ptr,
            ptr::null::<u32>(),
            0u32,
        )
    };
    if rc == 0 {
        return true;
    }

    // EAGAIN means the value already changed, EINTR a signal: both count as
    // a wakeup. Only a timeout (or a real failure) is reported to the caller.
    matches!(
        io::Error::last_os_error().raw_os_error(),
        Some(libc::EAGAIN) | Some(libc::EINTR)
    )
}

#[allow(dead_code)] // the core always wakes all waiters
pub(crate) fn wake_one(addr: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr as *const AtomicU32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            1i32,
        );
    }
}

pub(crate) fn wake_all(addr: &AtomicU32) {
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            addr as *const AtomicU32,
            libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
            i32::MAX,
        );
    }
}
