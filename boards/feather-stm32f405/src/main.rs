#![deny(unsafe_code)]
#![deny(warnings)]
#![no_main]
#![no_std]

use defmt_rtt as _; // global logger
use panic_probe as _;
use rtic::app;
use rtic_monotonics::stm32::prelude::*;

mod ccmram;
mod config;
mod mmio;
mod reboot;
mod time;
mod watchdog;

stm32_tim2_monotonic!(Mono, 1_000_000);

#[app(device = embassy_stm32, peripherals = true, dispatchers = [USART1])]
mod app {
    use super::*;
    use defmt::{info, warn};
    use embassy_stm32::peripherals;
    use embassy_stm32::rcc::{Hse, HseMode, LsConfig, LseConfig, LseMode};
    use embassy_stm32::time::Hertz;
    use hal_abstractions::TickCounter;
    use retained_clock_core::{classify_boot, BootKind, Clock, FormattedMicros, RetainedStore};
    use rtic::Mutex;

    use crate::config::{RebootTestConfig, ResetMode, WatchdogConfig};
    use crate::time::{RtcCounter, RtcError};

    type IwdgPeripheral = embassy_stm32::Peri<'static, peripherals::IWDG>;

    #[shared]
    struct Shared {
        store: RetainedStore<'static, RtcCounter>,
        clock: Clock<RtcCounter>,
    }

    #[local]
    struct Local {}

    #[init]
    fn init(_cx: init::Context) -> (Shared, Local) {
        info!("Retained clock self-test starting...");
        info!("========================================");

        let test_config = RebootTestConfig::default();

        // Adafruit Feather STM32F405: 12 MHz HSE, 32.768 kHz LSE (PC14/PC15)
        let mut config = embassy_stm32::Config::default();
        config.rcc.hse = Some(Hse {
            freq: Hertz(12_000_000),
            mode: HseMode::Oscillator,
        });

        // HSE (12 MHz) / PREDIV(6) = 2 MHz, * MUL(168) = 336 MHz (VCO),
        // / DIVP(4) = 84 MHz (SYSCLK)
        config.rcc.pll_src = embassy_stm32::rcc::PllSource::HSE;
        config.rcc.pll = Some(embassy_stm32::rcc::Pll {
            prediv: embassy_stm32::rcc::PllPreDiv::DIV6,
            mul: embassy_stm32::rcc::PllMul::MUL168,
            divp: Some(embassy_stm32::rcc::PllPDiv::DIV4),
            divq: None,
            divr: None,
        });
        config.rcc.sys = embassy_stm32::rcc::Sysclk::PLL1_P;
        config.rcc.ahb_pre = embassy_stm32::rcc::AHBPrescaler::DIV1; // 84 MHz
        config.rcc.apb1_pre = embassy_stm32::rcc::APBPrescaler::DIV2; // 42 MHz
        config.rcc.apb2_pre = embassy_stm32::rcc::APBPrescaler::DIV1; // 84 MHz

        // RTC on LSE. When the backup domain already runs with this
        // configuration it is left alone, which is what keeps the counter
        // going through reset.
        config.rcc.ls = LsConfig {
            rtc: embassy_stm32::rcc::RtcClockSource::LSE,
            lsi: false,
            lse: Some(LseConfig {
                frequency: Hertz(32_768),
                mode: LseMode::Oscillator(embassy_stm32::rcc::LseDrive::MediumHigh),
            }),
        };

        let p = embassy_stm32::init(config);

        // TIM2 on APB1: timer clock = 2*APB1 when prescaler != 1
        let timer_clock_hz = 84_000_000;
        Mono::start(timer_clock_hz);
        info!("TIM2 monotonic timer initialized at 1 MHz");

        let counter = RtcCounter::new();
        let rtc_init: Result<(), RtcError> = counter.init();
        if let Err(e) = rtc_init {
            warn!("RTC counter init failed: {}", e);
        }
        // LsConfig.rtc = LSE makes embassy_stm32::init set RTCEN already
        info!("RTCEN after clock init: {}", counter.retention_active());

        let Some(retained) = ccmram::take_retained() else {
            defmt::panic!("retained block handed out before init");
        };
        let mut store = RetainedStore::new(retained, counter);
        let valid = store.validate();
        reboot::report_retained(valid, store.state());

        // Post-reset verification
        let ticks = counter.read();
        info!("Counter raw: {} us ({})", ticks, FormattedMicros(ticks));
        warn!("Current boot count: {}", store.state().boots);

        match classify_boot(ticks, test_config.cold_boot_threshold_us) {
            BootKind::Continued => {
                warn!("========================================");
                warn!(">>> SUCCESS: COUNTER RETENTION WORKING! <<<");
                warn!("========================================");
                warn!("Counter has been running continuously through reset");
                store.record_continued_boot();
            }
            BootKind::Cold => {
                info!(">>> Counter freshly started (first boot or power cycle)");
            }
        }

        let mut clock = Clock::new(counter);
        clock.calibrate_from_unix_seconds(test_config.calibration_unix_secs);
        info!("Counter retention active after calibration: {}", counter.retention_active());

        let boots = store.state().boots;
        info!(
            "Boot count: {} (max reboots: {})",
            boots, test_config.max_reboots
        );
        info!("========================================");

        match test_config.mode {
            ResetMode::SoftReset if boots < test_config.max_reboots => {
                reboot_test::spawn().ok();
            }
            ResetMode::SoftReset => {
                info!("=== REBOOT TEST COMPLETE ===");
                info!(">>> Maximum reboot count ({}) reached", test_config.max_reboots);
                info!(">>> COUNTER RETENTION VALIDATED! <<<");
                info!(
                    "Counter persisted through {} software resets, now at {}",
                    test_config.max_reboots,
                    FormattedMicros(counter.read())
                );
            }
            ResetMode::Watchdog => {
                watchdog_test::spawn(p.IWDG).ok();
            }
        }

        status::spawn().ok();

        (Shared { store, clock }, Local {})
    }

    /// Count down, then force a soft reset with the boot recorded
    #[task(priority = 1, shared = [store])]
    async fn reboot_test(mut cx: reboot_test::Context) {
        let test_config = RebootTestConfig::default();
        let boots = cx.shared.store.lock(|store| store.state().boots);

        warn!("=== AUTO REBOOT TEST ===");
        warn!(
            "Will trigger software reset in {} seconds...",
            test_config.reboot_delay_secs
        );
        warn!("Current boot count: {} / {}", boots, test_config.max_reboots);

        for remaining in (1..=test_config.reboot_delay_secs).rev() {
            warn!(">>> Software reset in {} seconds...", remaining);
            Mono::delay(1.secs()).await;
        }

        warn!("========================================");
        warn!("=== INITIATING SOFTWARE RESET #{} ===", boots + 1);
        warn!("========================================");

        // Give the RTT host a moment to drain the log
        Mono::delay(100.millis()).await;

        cx.shared.store.lock(|store| reboot::force_reset(store))
    }

    /// Arm the watchdog and let it reset the SoC
    #[task(priority = 1)]
    async fn watchdog_test(_cx: watchdog_test::Context, iwdg: IwdgPeripheral) {
        watchdog::run(iwdg, &WatchdogConfig::default()).await
    }

    /// Periodic uptime accrual and status report
    #[task(priority = 1, shared = [store, clock])]
    async fn status(mut cx: status::Context) {
        let interval = RebootTestConfig::default().status_interval_secs;
        info!("Status task started ({} s interval)", interval);

        loop {
            Mono::delay(u64::from(interval).secs()).await;

            let state = cx.shared.store.lock(|store| {
                store.update();
                *store.state()
            });
            let (ticks, now) = cx
                .shared
                .clock
                .lock(|clock| (clock.counter().read(), clock.now()));

            info!("=== Status ===");
            info!("Counter: {} us ({})", ticks, FormattedMicros(ticks));
            if now.calibrated {
                info!(
                    "UTC: {} s ({})",
                    now.seconds,
                    FormattedMicros(now.microseconds)
                );
            }
            info!(
                "Retained: boots={}, off_count={}, uptime_sum={} ticks ({})",
                state.boots,
                state.off_count,
                state.uptime_sum,
                FormattedMicros(state.uptime_sum)
            );
        }
    }

    /// RTIC idle task - WFI sleep mode when no tasks active
    #[idle]
    fn idle(_cx: idle::Context) -> ! {
        loop {
            cortex_m::asm::wfi();
        }
    }
}
