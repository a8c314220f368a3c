//! CCM RAM Memory Allocations Module
//!
//! This module is the **ONLY** place in the codebase where CCM RAM (Core-Coupled Memory)
//! section attributes are used. All `#[link_section = ".retained"]` attributes must live here.
//!
//! # Why This Module Exists
//!
//! The `#[link_section]` attribute places data where the compiler cannot check
//! it, and the retained block is read before anything has written it this
//! boot. Keeping both in one module means:
//! - `#![deny(unsafe_code)]` holds in all other modules
//! - Memory placement is audited in one place
//! - It is obvious what needs review when `memory.x` changes
//!
//! # CCM RAM Characteristics (STM32F405RG)
//!
//! - **Size**: 64 KB (0x1000_0000 - 0x1000_FFFF)
//! - **Access**: CPU only (no DMA access)
//! - **Reset**: contents survive system reset while powered; only the
//!   startup code would clear them, and `.retained` is `NOLOAD`
//!
//! # Current Allocations
//!
//! - **RETAINED**: `RetainedState` (32 bytes, `.retained` section)
//!   - Boot and uptime history, CRC-checked on every boot
//!
//! # Safety Requirements
//!
//! When adding new `.retained` allocations:
//! 1. **Layout**: any change to a retained type invalidates the checksum of
//!    blocks written by older firmware; that is the intended outcome
//! 2. **No DMA**: CCM RAM is not reachable by DMA
//! 3. **Validity**: every bit pattern must be a valid value of the type
//!    (plain integers only; no `bool`, enums, or references)
//! 4. **Document**: Update this module's header with new allocations

#![allow(unsafe_code)]
#![deny(warnings)]

use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicBool, Ordering};

use retained_clock_core::RetainedState;

/// Retained history block, placed in the `NOLOAD` `.retained` section
#[link_section = ".retained"]
static mut RETAINED: MaybeUninit<RetainedState> = MaybeUninit::uninit();

/// Set once the block has been handed out this boot. Lives in `.bss`,
/// so it is cleared on every reset.
static RETAINED_TAKEN: AtomicBool = AtomicBool::new(false);

/// Hand out the retained block.
///
/// Returns `Some` exactly once per boot. The contents are whatever the
/// previous boot left behind (or power-on noise); validate before use.
pub fn take_retained() -> Option<&'static mut RetainedState> {
    if RETAINED_TAKEN.swap(true, Ordering::AcqRel) {
        return None;
    }

    // SAFETY:
    // - The flag above guarantees a single `&'static mut` per boot.
    // - The section is NOLOAD RAM, so it always holds *some* bits, and
    //   `RetainedState` is `repr(C)` plain integers for which every bit
    //   pattern is a valid value.
    unsafe { Some((*core::ptr::addr_of_mut!(RETAINED)).assume_init_mut()) }
}
