//! CRC-validated state block that survives soft reset
//!
//! The block lives in memory the reset path does not clear. Nothing about it
//! can be trusted after a reset until [`RetainedStore::validate`] has
//! recomputed the checksum: a mismatch is how a first power-on (or a layout
//! change between firmware builds) shows up, and is handled by resetting the
//! block to zeroes rather than reported as an error.
//!
//! The checksum is CRC-32/ISO-HDLC (IEEE polynomial, as computed by
//! `crc32fast`) over the little-endian encoding of the four data fields in
//! declaration order. The same function is used on every write and on
//! validation.

use hal_abstractions::TickCounter;

/// Counter reading above which a boot is taken to have followed a soft reset
/// with the counter still running (1 s of ticks)
pub const DEFAULT_COLD_BOOT_THRESHOLD_US: u64 = 1_000_000;

/// Reset-surviving history block
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RetainedState {
    /// Software-initiated resets observed so far
    pub boots: u32,
    /// Boots where the counter was found still running
    pub off_count: u32,
    /// Counter value at the most recent update
    pub uptime_latest: u64,
    /// Ticks accrued across the whole power session
    pub uptime_sum: u64,
    /// Checksum over all preceding fields
    pub crc: u32,
}

impl RetainedState {
    /// All-zero block with a matching checksum
    pub fn sealed_default() -> Self {
        let mut state = Self::default();
        state.seal();
        state
    }

    /// CRC-32 over the data fields (everything except `crc`)
    pub fn checksum(&self) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.boots.to_le_bytes());
        hasher.update(&self.off_count.to_le_bytes());
        hasher.update(&self.uptime_latest.to_le_bytes());
        hasher.update(&self.uptime_sum.to_le_bytes());
        hasher.finalize()
    }

    /// Whether the stored checksum matches the data fields
    pub fn is_valid(&self) -> bool {
        self.crc == self.checksum()
    }

    /// Recompute and store the checksum
    pub fn seal(&mut self) {
        self.crc = self.checksum();
    }
}

/// How the counter looked when this boot started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BootKind {
    /// Counter freshly started: power-on or a reset that cleared it
    Cold,
    /// Counter kept running through the preceding reset
    Continued,
}

/// Classify a boot from the raw counter reading taken early in startup
pub fn classify_boot(ticks: u64, threshold: u64) -> BootKind {
    if ticks > threshold {
        BootKind::Continued
    } else {
        BootKind::Cold
    }
}

/// Mutating access to the single retained block
///
/// Every mutation reseals the checksum before returning, so the block is
/// self-consistent whenever control leaves this type.
pub struct RetainedStore<'a, C> {
    state: &'a mut RetainedState,
    counter: C,
}

impl<'a, C: TickCounter> RetainedStore<'a, C> {
    /// Wrap the retained block. Call [`validate`](Self::validate) before
    /// trusting its contents.
    pub fn new(state: &'a mut RetainedState, counter: C) -> Self {
        Self { state, counter }
    }

    /// Check the block, resetting it to zeroes if the checksum does not match.
    ///
    /// Returns `true` and leaves the block untouched when it is valid.
    /// Returns `false` (first boot or corruption) after replacing it with a
    /// sealed all-zero block.
    pub fn validate(&mut self) -> bool {
        if self.state.is_valid() {
            return true;
        }

        #[cfg(feature = "defmt")]
        defmt::info!(
            "Retained state checksum mismatch (stored {:#x}), starting fresh",
            self.state.crc
        );

        *self.state = RetainedState::sealed_default();
        false
    }

    /// Accrue ticks elapsed since the previous update and reseal.
    ///
    /// Must be called periodically by the owner, and after any manual
    /// change to the boot counter. A reading below `uptime_latest` means
    /// the counter restarted; nothing is accrued and the baseline moves to
    /// the new reading.
    pub fn update(&mut self) {
        let now = self.counter.read();
        let delta = now.saturating_sub(self.state.uptime_latest);
        self.state.uptime_sum = self.state.uptime_sum.saturating_add(delta);
        self.state.uptime_latest = now;
        self.state.seal();
    }

    /// Count one forced reset. Call immediately before issuing the reset.
    ///
    /// The caller must make sure the write has reached the retained memory
    /// before the reset instruction executes.
    pub fn record_boot(&mut self) {
        self.state.boots = self.state.boots.wrapping_add(1);
        self.state.seal();
    }

    /// Count a boot where the counter was found still running
    pub fn record_continued_boot(&mut self) {
        self.state.off_count = self.state.off_count.wrapping_add(1);
        self.state.seal();
    }

    /// Read-only view of the block
    pub fn state(&self) -> &RetainedState {
        self.state
    }

    /// The counter this store samples
    pub fn counter(&self) -> &C {
        &self.counter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeCounter;

    fn fields(boots: u32, off_count: u32, latest: u64, sum: u64) -> RetainedState {
        RetainedState {
            boots,
            off_count,
            uptime_latest: latest,
            uptime_sum: sum,
            crc: 0,
        }
    }

    #[test]
    fn test_checksum_is_standard_crc32() {
        // CRC-32/ISO-HDLC of 24 zero bytes
        assert_eq!(RetainedState::default().checksum(), 0xA3C1_CA20);
    }

    #[test]
    fn test_checksum_covers_every_field() {
        let base = fields(1, 2, 3, 4);
        let crc = base.checksum();
        assert_ne!(fields(9, 2, 3, 4).checksum(), crc);
        assert_ne!(fields(1, 9, 3, 4).checksum(), crc);
        assert_ne!(fields(1, 2, 9, 4).checksum(), crc);
        assert_ne!(fields(1, 2, 3, 9).checksum(), crc);

        // Stored crc itself is not part of the input
        let mut other = base;
        other.crc = 0xFFFF_FFFF;
        assert_eq!(other.checksum(), crc);
    }

    #[test]
    fn test_validate_accepts_sealed_block_unchanged() {
        let counter = FakeCounter::new(0);
        let samples = [
            fields(0, 0, 0, 0),
            fields(3, 2, 12_000_000, 31_000_000),
            fields(u32::MAX, u32::MAX, u64::MAX, u64::MAX),
        ];
        for sample in samples {
            let mut state = sample;
            state.seal();
            let before = state;

            let mut store = RetainedStore::new(&mut state, &counter);
            assert!(store.validate());
            assert_eq!(*store.state(), before);
        }
    }

    #[test]
    fn test_validate_resets_on_bad_checksum() {
        let counter = FakeCounter::new(0);
        let mut state = fields(3, 2, 12_000_000, 31_000_000);
        state.crc = state.checksum() ^ 1;

        let mut store = RetainedStore::new(&mut state, &counter);
        assert!(!store.validate());
        assert_eq!(store.state().boots, 0);
        assert_eq!(store.state().off_count, 0);
        assert_eq!(store.state().uptime_latest, 0);
        assert_eq!(store.state().uptime_sum, 0);
        assert!(store.state().is_valid());

        // Self-consistent after the reset: a second validation passes
        assert!(store.validate());
    }

    #[test]
    fn test_update_accrues_deltas() {
        let counter = FakeCounter::new(0);
        let mut state = RetainedState::sealed_default();
        let mut store = RetainedStore::new(&mut state, &counter);

        let readings = [500u64, 500, 1_200, 10_000, 10_001];
        let mut previous_sum = 0;
        for ticks in readings {
            counter.set(ticks);
            store.update();
            assert!(store.state().uptime_sum >= previous_sum);
            assert!(store.state().is_valid());
            previous_sum = store.state().uptime_sum;
        }

        // Sum of successive deltas from a zero baseline is the last reading
        assert_eq!(store.state().uptime_sum, 10_001);
        assert_eq!(store.state().uptime_latest, 10_001);
    }

    #[test]
    fn test_update_after_counter_restart_keeps_sum() {
        let counter = FakeCounter::new(5_000);
        let mut state = RetainedState::sealed_default();
        let mut store = RetainedStore::new(&mut state, &counter);
        store.update();
        assert_eq!(store.state().uptime_sum, 5_000);

        counter.set(100);
        store.update();
        assert_eq!(store.state().uptime_sum, 5_000);
        assert_eq!(store.state().uptime_latest, 100);

        counter.set(400);
        store.update();
        assert_eq!(store.state().uptime_sum, 5_300);
    }

    #[test]
    fn test_record_boot_exact_with_interleaved_updates() {
        let counter = FakeCounter::new(0);
        let mut state = RetainedState::sealed_default();
        let mut store = RetainedStore::new(&mut state, &counter);

        for n in 0..7u64 {
            store.record_boot();
            counter.advance(1_000 * (n + 1));
            store.update();
            if n % 2 == 0 {
                store.update();
            }
        }

        assert_eq!(store.state().boots, 7);
        assert_eq!(store.state().off_count, 0);
        assert!(store.state().is_valid());
    }

    #[test]
    fn test_record_continued_boot_reseals() {
        let counter = FakeCounter::new(0);
        let mut state = RetainedState::sealed_default();
        let mut store = RetainedStore::new(&mut state, &counter);
        store.record_continued_boot();
        store.record_continued_boot();
        assert_eq!(store.state().off_count, 2);
        assert!(store.state().is_valid());
    }

    #[test]
    fn test_classify_boot() {
        let threshold = DEFAULT_COLD_BOOT_THRESHOLD_US;
        assert_eq!(classify_boot(0, threshold), BootKind::Cold);
        assert_eq!(classify_boot(threshold, threshold), BootKind::Cold);
        assert_eq!(classify_boot(threshold + 1, threshold), BootKind::Continued);
    }

    /// First power-on, three forced resets, then the fourth boot sees the
    /// history. The same block is reused in place, as it is on hardware.
    #[test]
    fn test_history_survives_forced_resets() {
        let counter = FakeCounter::new(0);
        // Power-on garbage
        let mut memory = RetainedState {
            boots: 0x5A5A_5A5A,
            off_count: 0xA5A5_A5A5,
            uptime_latest: 0x1234,
            uptime_sum: 0x5678,
            crc: 0,
        };

        let mut continued = 0;
        for boot in 0..4u32 {
            let mut store = RetainedStore::new(&mut memory, &counter);
            let valid = store.validate();
            if boot == 0 {
                assert!(!valid);
                assert_eq!(store.state().boots, 0);
            } else {
                assert!(valid);
            }
            assert_eq!(store.state().boots, boot);

            if classify_boot(counter.read(), DEFAULT_COLD_BOOT_THRESHOLD_US)
                == BootKind::Continued
            {
                store.record_continued_boot();
                continued += 1;
            }

            // Ten seconds of run time, then a forced reset
            counter.advance(10_000_000);
            store.update();
            if boot < 3 {
                store.record_boot();
                store.update();
            }
        }

        assert_eq!(memory.boots, 3);
        assert_eq!(memory.off_count, continued);
        assert_eq!(continued, 3);
        assert_eq!(memory.uptime_sum, 40_000_000);
        assert!(memory.is_valid());
    }
}
