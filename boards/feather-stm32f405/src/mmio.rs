//! Volatile access to STM32F405 peripheral register blocks
//!
//! Implements [`RegisterBlock`] over raw peripheral memory so that backup
//! domain control bits can be described as [`hal_abstractions::BitField`]
//! constants and written with a field-level read-modify-write.
//!
//! Blocks can only be constructed for the fixed base addresses listed here,
//! which keeps the volatile pointer accesses below sound.

#![allow(unsafe_code)] // Volatile MMIO; the only raw pointer access in the firmware
#![deny(warnings)]

use hal_abstractions::RegisterBlock;

/// RCC base address (RM0090 §2.3, Table 1)
const RCC_BASE: usize = 0x4002_3800;

/// PWR base address (RM0090 §2.3, Table 1)
const PWR_BASE: usize = 0x4000_7000;

/// Size of each peripheral's register window; offsets past it are rejected
const BLOCK_SIZE: usize = 0x400;

/// A peripheral register block at a fixed base address
#[derive(Debug, Clone, Copy)]
pub struct Mmio {
    base: usize,
}

impl Mmio {
    /// Reset and clock control
    pub const fn rcc() -> Self {
        Self { base: RCC_BASE }
    }

    /// Power controller
    pub const fn pwr() -> Self {
        Self { base: PWR_BASE }
    }

    fn register(&self, offset: usize) -> usize {
        assert!(
            offset < BLOCK_SIZE && offset % 4 == 0,
            "register offset outside peripheral block"
        );
        self.base + offset
    }
}

impl RegisterBlock for Mmio {
    fn read_word(&self, offset: usize) -> u32 {
        let addr = self.register(offset) as *const u32;
        // SAFETY: addr is a word-aligned register inside a peripheral block
        // that always exists on this part; register reads have no side
        // effects for RCC and PWR.
        unsafe { core::ptr::read_volatile(addr) }
    }

    fn write_word(&self, offset: usize, value: u32) {
        let addr = self.register(offset) as *mut u32;
        // SAFETY: as above. Callers go through `modify_field`, which keeps
        // the other bits of the register as they were read.
        unsafe { core::ptr::write_volatile(addr, value) }
    }
}
