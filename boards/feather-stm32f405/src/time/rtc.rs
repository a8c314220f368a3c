//! RTC-backed tick counter that survives system reset
//!
//! The STM32F405 RTC sits in the backup domain. A system reset (software
//! reset, watchdog, NRST) leaves the backup domain alone, so once the RTC is
//! clocked from the LSE and enabled it keeps counting through every reset
//! short of a power cycle.
//!
//! # Resolution
//! PREDIV_A = 0 and PREDIV_S = 32767 feed the sub-second counter straight
//! from the 32.768 kHz LSE: one step is ~30.5 us. Readings are scaled to
//! microseconds.
//!
//! # Retention bit
//! RCC_BDCR.RTCEN. It lives in the backup domain, so once set it stays set
//! through system reset. Writes need backup-domain write protection lifted
//! first (PWR_CR.DBP, which itself needs the PWR clock).
//!
//! `embassy_stm32::init` with `LsConfig { rtc: LSE, .. }` already sets RTCEN
//! while bringing up the LSE, so on this board `enable_retention` normally
//! finds the bit set and only reports it.

use defmt::{info, warn, Format};
use hal_abstractions::{BitField, ControlBit, RegisterBlock, TickCounter};
use stm32_metapac::rtc::regs::Tr;
use stm32_metapac::RTC;

use super::calendar::{from_bcd, subsecond_micros, RtcCalendar};
use crate::mmio::Mmio;

/// RCC_APB1ENR.PWREN
const PWREN: BitField = BitField::bit(0x40, 28);
/// RCC_BDCR.LSERDY
const LSERDY: BitField = BitField::bit(0x70, 1);
/// RCC_BDCR.RTCEN
const RTCEN: BitField = BitField::bit(0x70, 15);
/// PWR_CR.DBP
const DBP: BitField = BitField::bit(0x00, 8);

/// Asynchronous prescaler (divide by PREDIV_A + 1)
const PREDIV_A: u8 = 0;
/// Synchronous prescaler (divide by PREDIV_S + 1)
const PREDIV_S: u16 = 32_767;

/// Busy-wait bound for RTC status flags
const SPIN_LIMIT: u32 = 1_000_000;

/// RTC write-protection unlock keys
const WPR_KEY_1: u8 = 0xCA;
const WPR_KEY_2: u8 = 0x53;
const WPR_LOCK: u8 = 0xFF;

/// RTC counter initialization errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Format)]
pub enum RtcError {
    /// LSE oscillator not running
    LseNotReady,
    /// RTC did not enter initialization mode
    InitTimeout,
    /// Calendar shadow registers never synchronized
    SyncTimeout,
}

impl core::fmt::Display for RtcError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::LseNotReady => write!(f, "LSE not ready"),
            Self::InitTimeout => write!(f, "RTC init mode timeout"),
            Self::SyncTimeout => write!(f, "RTC shadow register sync timeout"),
        }
    }
}

impl core::error::Error for RtcError {}

/// Free-running microsecond counter on the backup-domain RTC
#[derive(Debug, Clone, Copy)]
pub struct RtcCounter {
    rcc: Mmio,
    pwr: Mmio,
    retention: ControlBit<Mmio>,
}

impl RtcCounter {
    /// Handle to the RTC counter. Call [`init`](Self::init) once per boot
    /// before relying on readings.
    pub fn new() -> Self {
        Self {
            rcc: Mmio::rcc(),
            pwr: Mmio::pwr(),
            retention: ControlBit::new(Mmio::rcc(), RTCEN),
        }
    }

    /// Prepare the counter after reset.
    ///
    /// A calendar that was never initialized (power-on) is seeded with the
    /// counter epoch. A running calendar is left untouched so the count
    /// carries on from before the reset.
    pub fn init(&self) -> Result<(), RtcError> {
        if self.rcc.read_field(LSERDY) == 0 {
            return Err(RtcError::LseNotReady);
        }
        self.unlock_backup_domain();

        let result = if RTC.isr().read().inits() {
            info!("RTC calendar already running, keeping count");
            Ok(())
        } else {
            info!("RTC calendar not initialized, seeding counter epoch");
            self.seed_epoch()
        };

        // Re-arm shadow register sync so the first read is current
        RTC.isr().modify(|w| w.set_rsf(false));
        lock_rtc();
        result?;

        if spin_until(|| RTC.isr().read().rsf()) {
            Ok(())
        } else {
            Err(RtcError::SyncTimeout)
        }
    }

    /// Lift backup-domain write protection. Leaves RTC_WPR unlocked.
    fn unlock_backup_domain(&self) {
        self.rcc.modify_field(PWREN, 1);
        self.pwr.modify_field(DBP, 1);
        RTC.wpr().write(|w| w.set_key(WPR_KEY_1));
        RTC.wpr().write(|w| w.set_key(WPR_KEY_2));
    }

    fn seed_epoch(&self) -> Result<(), RtcError> {
        RTC.isr().modify(|w| w.set_init(true));
        if !spin_until(|| RTC.isr().read().initf()) {
            RTC.isr().modify(|w| w.set_init(false));
            return Err(RtcError::InitTimeout);
        }

        // Prescaler must be written as two separate accesses, sync first
        RTC.prer().modify(|w| w.set_prediv_s(PREDIV_S));
        RTC.prer().modify(|w| w.set_prediv_a(PREDIV_A));

        // 2000-01-01 00:00:00, a Saturday
        RTC.tr().write_value(Tr(0));
        RTC.dr().write(|w| {
            w.set_yt(0);
            w.set_yu(0);
            w.set_mt(false);
            w.set_mu(1);
            w.set_dt(0);
            w.set_du(1);
            w.set_wdu(6);
        });

        RTC.isr().modify(|w| w.set_init(false));
        Ok(())
    }

    fn read_calendar() -> (RtcCalendar, u16) {
        // SSR then TR then DR: reading SSR or TR freezes the higher-order
        // shadow registers until DR is read
        let ss = RTC.ssr().read().ss();
        let tr = RTC.tr().read();
        let dr = RTC.dr().read();

        let calendar = RtcCalendar {
            year: from_bcd(dr.yt(), dr.yu()),
            month: from_bcd(dr.mt() as u8, dr.mu()),
            day: from_bcd(dr.dt(), dr.du()),
            hour: from_bcd(tr.ht(), tr.hu()),
            minute: from_bcd(tr.mnt(), tr.mnu()),
            second: from_bcd(tr.st(), tr.su()),
        };
        (calendar, ss)
    }
}

impl Default for RtcCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl TickCounter for RtcCounter {
    fn read(&self) -> u64 {
        let (calendar, ss) = Self::read_calendar();

        calendar.seconds_since_epoch() * 1_000_000 + subsecond_micros(ss, PREDIV_S)
    }

    fn enable_retention(&self) {
        if self.retention.is_set() {
            info!("RTC retention already enabled (RCC_BDCR.RTCEN set at clock init)");
            return;
        }
        self.rcc.modify_field(PWREN, 1);
        self.pwr.modify_field(DBP, 1);
        let wrote = self.retention.set();

        if !self.retention.is_set() {
            warn!("RTC retention bit did not latch; counter will restart on reset");
        } else if wrote {
            info!("RTC retention enabled (RCC_BDCR.RTCEN written)");
        }
    }

    fn retention_active(&self) -> bool {
        self.retention.is_set()
    }
}

fn lock_rtc() {
    RTC.wpr().write(|w| w.set_key(WPR_LOCK));
}

/// Poll `done` up to [`SPIN_LIMIT`] times
fn spin_until(mut done: impl FnMut() -> bool) -> bool {
    for _ in 0..SPIN_LIMIT {
        if done() {
            return true;
        }
    }
    false
}
