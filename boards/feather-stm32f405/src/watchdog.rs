//! Watchdog-driven reset for the retention self-test
//!
//! The IWDG reset is a system reset like `SCB::sys_reset`, so the RTC
//! counter and the retained block must survive it the same way. Unlike the
//! soft-reset path this does not touch the boot counter; such boots show up
//! only in `off_count`.
#![deny(unsafe_code)]
#![deny(warnings)]

use defmt::{info, warn};
use embassy_stm32::peripherals::IWDG;
use embassy_stm32::wdg::IndependentWatchdog;
use embassy_stm32::Peri;
use rtic_monotonics::stm32::prelude::*;

use crate::config::WatchdogConfig;
use crate::Mono;

/// Feed the watchdog a few times, then stop and wait for it to fire
pub async fn run(iwdg: Peri<'static, IWDG>, config: &WatchdogConfig) -> ! {
    info!("Watchdog self-test: timeout {} us", config.timeout_us);

    let mut wdg = IndependentWatchdog::new(iwdg, config.timeout_us);
    wdg.unleash();

    info!("Feeding watchdog {} times", config.feed_count);
    for _ in 0..config.feed_count {
        info!("Feeding watchdog...");
        wdg.pet();
        Mono::delay(u64::from(config.feed_interval_ms).millis()).await;
    }

    warn!("Stopped feeding, waiting for watchdog reset");
    loop {
        Mono::delay(1.secs()).await;
    }
}
