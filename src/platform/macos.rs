// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// macOS wait backend: __ulock_wait / __ulock_wake. The symbols are stable
// but not exported by the `libc` crate, so they are declared here directly.

use std::sync::atomic::AtomicU32;

const UL_COMPARE_AND_WAIT: u32 = 1;
const ULF_WAKE_ALL: u32 = 0x0000_0100;
const ULF_NO_ERRNO: u32 = 0x0100_0000;

extern "C" {
    fn __ulock_wait(
        operation: u32,
        addr: *mut libc::c_void,
        value: u64,
        timeout_us: u32,
    ) -> libc::c_int;
    fn __ulock_wake(operation: u32, addr: *mut libc::c_void, wake_value: u64) -> libc::c_int;
}

#[inline]
fn addr_of(addr: &AtomicU32) -> *mut libc::c_void {
    addr as *const AtomicU32 as *mut libc::c_void
}

pub(crate) fn wait(addr: &AtomicU32, expected: u32, timeout_ms: u32) -> bool {
    // The kernel takes microseconds; 0 waits forever.
    let timeout_us = timeout_ms.saturating_mul(1000);
    let rc = unsafe {
        __ulock_wait(
            UL_COMPARE_AND_WAIT | ULF_NO_ERRNO,
            addr_of(addr),
            expected as u64,
            timeout_us,
        )
    };
    if rc >= 0 {
        return true;
    }
    // With ULF_NO_ERRNO the error comes back as a negated errno.
    -rc == libc::EINTR
}

#[allow(dead_code)] // the core always wakes all waiters
pub(crate) fn wake_one(addr: &AtomicU32) {
    // ENOENT (no waiters) is expected and ignored.
    unsafe {
        __ulock_wake(UL_COMPARE_AND_WAIT | ULF_NO_ERRNO, addr_of(addr), 0);
    }
}

pub(crate) fn wake_all(addr: &AtomicU32) {
    unsafe {
        __ulock_wake(
            UL_COMPARE_AND_WAIT | ULF_WAKE_ALL | ULF_NO_ERRNO,
            addr_of(addr),
            0,
        );
    }
}
