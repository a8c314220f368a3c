//! Platform-agnostic retained state and counter calibration
//!
//! This crate contains the logic that keeps time and history across soft
//! resets. It has NO hardware dependencies: everything hardware-facing goes
//! through [`hal_abstractions::TickCounter`].
//!
//! - [`retained`]: CRC-validated boot/uptime history kept in reset-surviving RAM
//! - [`clock`]: offset calibration turning raw ticks into UTC microseconds
//! - [`format`]: the `<s>.<ms>.<us> s` rendering used in logs
//!
//! Nothing here is thread-safe on its own. Owners that share a store or a
//! clock between contexts hold it behind one lock covering the whole
//! read-modify-write (an RTIC shared resource on the firmware side).

#![no_std]
#![deny(unsafe_code)]
#![deny(warnings)]

pub mod clock;
pub mod format;
pub mod retained;

pub use clock::{diff_us, Calibration, Clock, UtcTime};
pub use format::{format_us, format_us_into, FormattedMicros, FORMATTED_MAX_LEN};
pub use retained::{
    classify_boot, BootKind, RetainedState, RetainedStore, DEFAULT_COLD_BOOT_THRESHOLD_US,
};

#[cfg(test)]
mod testing {
    use core::cell::Cell;
    use hal_abstractions::TickCounter;

    /// Counter whose value the test moves by hand
    pub struct FakeCounter {
        ticks: Cell<u64>,
        retained: Cell<bool>,
        retention_writes: Cell<usize>,
    }

    impl FakeCounter {
        pub fn new(ticks: u64) -> Self {
            Self {
                ticks: Cell::new(ticks),
                retained: Cell::new(false),
                retention_writes: Cell::new(0),
            }
        }

        pub fn set(&self, ticks: u64) {
            self.ticks.set(ticks);
        }

        pub fn advance(&self, delta: u64) {
            self.ticks.set(self.ticks.get() + delta);
        }

        /// Number of times the retention bit was actually written
        pub fn retention_writes(&self) -> usize {
            self.retention_writes.get()
        }
    }

    impl TickCounter for FakeCounter {
        fn read(&self) -> u64 {
            self.ticks.get()
        }

        fn enable_retention(&self) {
            if !self.retained.get() {
                self.retained.set(true);
                self.retention_writes.set(self.retention_writes.get() + 1);
            }
        }

        fn retention_active(&self) -> bool {
            self.retained.get()
        }
    }
}
