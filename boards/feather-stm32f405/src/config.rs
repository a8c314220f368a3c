//! Self-test configuration structures
#![deny(unsafe_code)]
#![deny(warnings)]

use retained_clock_core::DEFAULT_COLD_BOOT_THRESHOLD_US;

/// How the self-test forces resets
#[derive(Debug, Clone, Copy, PartialEq, Eq, defmt::Format)]
pub enum ResetMode {
    /// Count down, record the boot, then `SCB::sys_reset`
    SoftReset,
    /// Arm the independent watchdog and stop feeding it
    Watchdog,
}

/// Reboot self-test configuration
#[derive(Debug, Clone)]
pub struct RebootTestConfig {
    /// How resets are forced
    pub mode: ResetMode,
    /// Forced resets before the test reports success
    pub max_reboots: u32,
    /// Countdown before each forced reset
    pub reboot_delay_secs: u32,
    /// Period of the status/uptime update task
    pub status_interval_secs: u32,
    /// Counter reading at boot above which the counter is taken to have
    /// survived the reset
    pub cold_boot_threshold_us: u64,
    /// Unix time the clock is calibrated to at every boot. Stands in for an
    /// external time source.
    pub calibration_unix_secs: u64,
}

impl Default for RebootTestConfig {
    fn default() -> Self {
        Self {
            mode: if cfg!(feature = "watchdog-test") {
                ResetMode::Watchdog
            } else {
                ResetMode::SoftReset
            },
            max_reboots: 3,
            reboot_delay_secs: 10,
            status_interval_secs: 10,
            cold_boot_threshold_us: DEFAULT_COLD_BOOT_THRESHOLD_US,
            // 2025-12-11 00:00:00 UTC
            calibration_unix_secs: 1_765_411_200,
        }
    }
}

/// Independent watchdog self-test configuration
#[derive(Debug, Clone)]
pub struct WatchdogConfig {
    /// Watchdog timeout in microseconds
    pub timeout_us: u32,
    /// Feeds before the test stops feeding and lets the watchdog fire
    pub feed_count: u32,
    /// Delay between feeds in milliseconds
    pub feed_interval_ms: u32,
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            timeout_us: 1_000_000,
            feed_count: 5,
            feed_interval_ms: 50,
        }
    }
}
