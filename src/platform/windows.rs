// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Windows wait backend: WaitOnAddress / WakeByAddress.

use std::ffi::c_void;
use std::mem;
use std::sync::atomic::AtomicU32;

use windows_sys::Win32::System::Threading::{
    WaitOnAddress, WakeByAddressAll, WakeByAddressSingle, INFINITE,
};

pub(crate) fn wait(addr: &AtomicU32, expected: u32, timeout_ms: u32) -> bool {
    let timeout = if timeout_ms == 0 { INFINITE } else { timeout_ms };
    let ok = unsafe {
        WaitOnAddress(
            addr as *const AtomicU32 as *const c_void,
            &expected as *const u32 as *const c_void,
            mem::size_of::<u32>(),
            timeout,
        )
    };
    // FALSE covers both ERROR_TIMEOUT and real failures; the caller treats
    // them alike.
    ok != 0
}

#[allow(dead_code)] // the core always wakes all waiters
pub(crate) fn wake_one(addr: &AtomicU32) {
    unsafe { WakeByAddressSingle(addr as *const AtomicU32 as *const c_void) };
}

pub(crate) fn wake_all(addr: &AtomicU32) {
    unsafe { WakeByAddressAll(addr as *const AtomicU32 as *const c_void) };
}
