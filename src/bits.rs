// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// Bit layout of the 8-byte lock word.
//
// The word is addressed two ways: as one 64-bit value when the reader
// counter must change together with the phase bits, and as two 32-bit
// halves for everything else. The state half is the upper 32 bits of the
// 64-bit value; the counters half the lower 32. Which byte offset the
// state half lands on depends on endianness, and all futex waits target
// that half, so its index must be derivable from the word's base address.

/// Index of the state half when the word is viewed as `[u32; 2]`.
/// On little-endian the upper value bits live at the higher offset.
pub(crate) const STATE_HALF: usize = if cfg!(target_endian = "little") { 1 } else { 0 };

// State half, 32-bit view.

/// Current phase is Write.
pub(crate) const CURR_W: u32 = 1 << 0;
/// Current phase is Read.
pub(crate) const CURR_R: u32 = 1 << 1;
/// Current phase is Free.
pub(crate) const CURR_F: u32 = 1 << 2;

/// Next phase (once a writer shows up) is Write.
pub(crate) const NEXT_W: u32 = 1 << 4;
/// Next phase (once a reader or freer shows up) is Read-then-Free.
pub(crate) const NEXT_RF: u32 = 1 << 5;

/// Writer parks by spinning instead of sleeping.
pub(crate) const YIELD_W: u32 = 1 << 16;
/// Readers park by spinning instead of sleeping.
pub(crate) const YIELD_R: u32 = 1 << 17;
/// Freer parks by spinning instead of sleeping.
pub(crate) const YIELD_F: u32 = 1 << 18;

/// A writer is queued behind an outstanding freer; incoming readers must
/// hold off until that writer releases.
pub(crate) const RD_NEXT_LOOP: u32 = 1 << 25;
/// Cross-process marker. Stored and preserved, no behavioral effect.
pub(crate) const PSHARED: u32 = 1 << 26;

/// A writer has reserved the upcoming write slot.
pub(crate) const ACQ_W: u32 = 1 << 28;
/// At least one reader has reserved a read slot.
pub(crate) const ACQ_R: u32 = 1 << 29;
/// A freer has reserved the upcoming free slot.
pub(crate) const ACQ_F: u32 = 1 << 30;

pub(crate) const CURR_ANY: u32 = CURR_W | CURR_R | CURR_F;
pub(crate) const NEXT_ANY: u32 = NEXT_W | NEXT_RF;
pub(crate) const YIELD_ANY: u32 = YIELD_W | YIELD_R | YIELD_F;

// Counters half. The reader count occupies the low 16 bits of the full
// word, so plain add/subtract of RD_COUNT_ONE moves it.

pub(crate) const RD_COUNT_MASK: u64 = 0xFFFF;
pub(crate) const RD_COUNT_ONE: u64 = 1;

/// Lift a state-half mask to its position in the full 64-bit word.
#[inline]
pub(crate) const fn word_of(mask: u32) -> u64 {
    (mask as u64) << 32
}
