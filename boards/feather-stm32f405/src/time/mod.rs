//! Reset-durable time source for the Feather STM32F405
//!
//! ## Architecture
//! - The backup-domain RTC, clocked from the 32.768 kHz LSE, is the tick
//!   counter. It keeps running through system reset once RCC_BDCR.RTCEN is set.
//! - The calendar is seeded once per power session (2000-01-01 00:00:00) and
//!   read back as microseconds since that seed.
//! - UTC comes from `retained_clock_core::Clock`, which adds a per-boot
//!   offset to the counter. The offset is lost on reset and re-applied in
//!   `init`.
//!
//! ## defmt Timestamps
//!
//! Log lines are stamped with the raw counter via `{=u64:us}`, so stamps keep
//! increasing across resets instead of restarting at zero each boot. Before
//! the first cold-start seed the stamp reads from an unseeded calendar and is
//! meaningless.

// defmt::timestamp! exports a #[no_mangle] symbol, which counts as unsafe code
#![allow(unsafe_code)]
#![deny(warnings)]

mod calendar;
mod rtc;

pub use rtc::{RtcCounter, RtcError};

use hal_abstractions::TickCounter;

defmt::timestamp!("{=u64:us}", { RtcCounter::new().read() });
