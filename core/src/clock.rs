//! UTC clock derived from a reset-durable tick counter
//!
//! The clock keeps a signed offset such that `UTC = ticks + offset`. The
//! offset lives in ordinary RAM and is lost on every reset; the counter
//! itself keeps running, so the owner re-applies calibration once per boot
//! from whatever external time source it has.
//!
//! ```
//! # use core::cell::Cell;
//! # use hal_abstractions::TickCounter;
//! # struct Ticks(Cell<u64>, Cell<bool>);
//! # impl TickCounter for Ticks {
//! #     fn read(&self) -> u64 { self.0.get() }
//! #     fn enable_retention(&self) { self.1.set(true) }
//! #     fn retention_active(&self) -> bool { self.1.get() }
//! # }
//! use retained_clock_core::Clock;
//!
//! let ticks = Ticks(Cell::new(5_000_000), Cell::new(false));
//! let mut clock = Clock::new(&ticks);
//! assert_eq!(clock.now_us(), 5_000_000); // raw ticks until calibrated
//!
//! clock.calibrate_from_unix_seconds(1_765_411_200);
//! assert_eq!(clock.now_sec(), 1_765_411_200);
//! assert!(ticks.retention_active());
//! ```

use hal_abstractions::TickCounter;
use heapless::String;

use crate::format::{format_us, FORMATTED_MAX_LEN};

const MICROS_PER_MILLI: u64 = 1_000;
const MICROS_PER_SEC: u64 = 1_000_000;

/// Per-boot calibration. Not retained across resets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Calibration {
    /// Microseconds to add to a counter reading to get UTC
    pub offset: i64,
    /// Whether `offset` was established this boot
    pub calibrated: bool,
}

/// One clock reading in several units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct UtcTime {
    /// Microseconds (since the Unix epoch when calibrated)
    pub microseconds: u64,
    /// `microseconds / 1_000`, truncated
    pub milliseconds: u64,
    /// `microseconds / 1_000_000`, truncated
    pub seconds: u64,
    /// `false` means the values are raw counter ticks, not UTC
    pub calibrated: bool,
}

impl UtcTime {
    /// Split a microsecond value into all units
    pub const fn from_micros(microseconds: u64, calibrated: bool) -> Self {
        Self {
            microseconds,
            milliseconds: microseconds / MICROS_PER_MILLI,
            seconds: microseconds / MICROS_PER_SEC,
            calibrated,
        }
    }
}

/// Wall clock over a tick counter
pub struct Clock<C> {
    counter: C,
    calibration: Calibration,
}

impl<C: TickCounter> Clock<C> {
    /// Uncalibrated clock: zero offset, readings are raw ticks
    pub const fn new(counter: C) -> Self {
        Self {
            counter,
            calibration: Calibration {
                offset: 0,
                calibrated: false,
            },
        }
    }

    /// Anchor the current counter reading to `utc_timestamp_us`.
    ///
    /// The offset may be negative if the counter is already past the
    /// supplied timestamp. Also enables counter retention, since a
    /// calibrated clock is only useful if the counter survives reset.
    pub fn calibrate(&mut self, utc_timestamp_us: u64) {
        let ticks = self.counter.read();
        let offset = (utc_timestamp_us as i64).wrapping_sub(ticks as i64);
        self.calibration = Calibration {
            offset,
            calibrated: true,
        };

        #[cfg(feature = "defmt")]
        {
            defmt::info!("UTC time calibrated");
            defmt::info!("  counter: {=u64} us", ticks);
            defmt::info!("  UTC:     {=u64} us", utc_timestamp_us);
            defmt::info!("  offset:  {=i64} us", offset);
        }

        self.counter.enable_retention();
    }

    /// [`calibrate`](Self::calibrate) from whole seconds since the Unix epoch
    pub fn calibrate_from_unix_seconds(&mut self, unix_seconds: u64) {
        self.calibrate(unix_seconds.wrapping_mul(MICROS_PER_SEC));
    }

    /// Whether [`calibrate`](Self::calibrate) has run this boot
    pub fn is_calibrated(&self) -> bool {
        self.calibration.calibrated
    }

    /// Current offset; zero when uncalibrated
    pub fn offset(&self) -> i64 {
        self.calibration.offset
    }

    /// Calibration state snapshot
    pub fn calibration(&self) -> Calibration {
        self.calibration
    }

    /// Current time in microseconds.
    ///
    /// Falls back to the raw counter reading (and logs a warning) when not
    /// calibrated; use [`now`](Self::now) or
    /// [`is_calibrated`](Self::is_calibrated) to tell the two apart.
    pub fn now_us(&self) -> u64 {
        let ticks = self.counter.read();
        if !self.calibration.calibrated {
            #[cfg(feature = "defmt")]
            defmt::warn!("UTC time not calibrated, returning raw counter ticks");
            return ticks;
        }
        ticks.wrapping_add_signed(self.calibration.offset)
    }

    /// Current time in milliseconds, truncated
    pub fn now_ms(&self) -> u64 {
        self.now_us() / MICROS_PER_MILLI
    }

    /// Current time in seconds, truncated
    pub fn now_sec(&self) -> u64 {
        self.now_us() / MICROS_PER_SEC
    }

    /// Current time in all units from a single counter read
    pub fn now(&self) -> UtcTime {
        UtcTime::from_micros(self.now_us(), self.calibration.calibrated)
    }

    /// Current time rendered as `<s>.<ms>.<us> s`
    pub fn format_now(&self) -> String<FORMATTED_MAX_LEN> {
        format_us(self.now_us())
    }

    /// The counter this clock reads
    pub fn counter(&self) -> &C {
        &self.counter
    }
}

/// `b - a` as a signed value; negative when `a` is later than `b`
pub fn diff_us(a: u64, b: u64) -> i64 {
    (b as i64).wrapping_sub(a as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCounter;

    const DEC_11_2025: u64 = 1_765_411_200;

    #[test]
    fn test_uncalibrated_returns_raw_ticks() {
        let counter = FakeCounter::new(123_456_789);
        let clock = Clock::new(&counter);
        assert!(!clock.is_calibrated());
        assert_eq!(clock.offset(), 0);
        assert_eq!(clock.now_us(), 123_456_789);
        assert_eq!(clock.now_ms(), 123_456);
        assert_eq!(clock.now_sec(), 123);

        let now = clock.now();
        assert!(!now.calibrated);
        assert_eq!(now.microseconds, 123_456_789);
    }

    #[test]
    fn test_calibrate_then_advance() {
        let counter = FakeCounter::new(2_500_000);
        let mut clock = Clock::new(&counter);
        let utc = DEC_11_2025 * 1_000_000;

        clock.calibrate(utc);
        assert!(clock.is_calibrated());
        assert_eq!(clock.now_us(), utc);
        assert_eq!(clock.offset(), utc as i64 - 2_500_000);

        counter.advance(1_234_567);
        assert_eq!(clock.now_us(), utc + 1_234_567);
        assert_eq!(clock.now_ms(), (utc + 1_234_567) / 1_000);
        assert_eq!(clock.now_sec(), DEC_11_2025 + 1);
    }

    #[test]
    fn test_negative_offset() {
        let counter = FakeCounter::new(10_000_000);
        let mut clock = Clock::new(&counter);
        clock.calibrate(4_000_000);
        assert_eq!(clock.offset(), -6_000_000);
        assert_eq!(clock.now_us(), 4_000_000);

        counter.advance(500);
        assert_eq!(clock.now_us(), 4_000_500);
    }

    #[test]
    fn test_calibrate_enables_retention() {
        let counter = FakeCounter::new(0);
        let mut clock = Clock::new(&counter);
        assert!(!counter.retention_active());

        clock.calibrate_from_unix_seconds(DEC_11_2025);
        assert!(counter.retention_active());
        assert_eq!(clock.now_sec(), DEC_11_2025);

        // Recalibration keeps the bit and does not disturb the counter
        counter.advance(42);
        clock.calibrate_from_unix_seconds(DEC_11_2025);
        assert!(counter.retention_active());
        assert_eq!(counter.read(), 42);
        assert_eq!(counter.retention_writes(), 1);
    }

    #[test]
    fn test_truncating_units() {
        let counter = FakeCounter::new(0);
        let mut clock = Clock::new(&counter);
        clock.calibrate(1_999_999);
        assert_eq!(clock.now_ms(), 1_999);
        assert_eq!(clock.now_sec(), 1);

        let now = clock.now();
        assert_eq!(now, UtcTime::from_micros(1_999_999, true));
        assert_eq!(now.milliseconds, 1_999);
        assert_eq!(now.seconds, 1);
    }

    #[test]
    fn test_format_now() {
        let counter = FakeCounter::new(0);
        let mut clock = Clock::new(&counter);
        clock.calibrate(1_234_567);
        assert_eq!(clock.format_now().as_str(), "1.234.567 s");
    }

    #[test]
    fn test_calibration_is_per_clock_instance() {
        // A fresh clock after a reset starts uncalibrated even though the
        // counter kept running
        let counter = FakeCounter::new(0);
        let mut before_reset = Clock::new(&counter);
        before_reset.calibrate(DEC_11_2025 * 1_000_000);
        counter.advance(10_000_000);

        let after_reset = Clock::new(&counter);
        assert!(!after_reset.is_calibrated());
        assert_eq!(after_reset.now_us(), 10_000_000);
        assert_eq!(after_reset.calibration(), Calibration::default());
    }

    #[test]
    fn test_diff_sign() {
        assert_eq!(diff_us(100, 50), -50);
        assert_eq!(diff_us(50, 100), 50);
        assert_eq!(diff_us(7, 7), 0);
    }
}
