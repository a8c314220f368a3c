//! RTC calendar registers to a linear seconds count
//!
//! The RTC counts in calendar form (BCD date and time). The tick counter
//! needs a plain number, so the calendar is converted to seconds since the
//! value the RTC is seeded with on a cold start, 2000-01-01 00:00:00.
//!
//! Uses Howard Hinnant's days_from_civil algorithm.
//! Reference: http://howardhinnant.github.io/date_algorithms.html
#![deny(unsafe_code)]
#![deny(warnings)]

/// Year the RTC calendar is seeded with. RTC_DR only stores the year of
/// the century, so this is also the base of its 0-99 year field.
pub const EPOCH_YEAR: u16 = 2000;

const SECONDS_PER_DAY: u64 = 86_400;

/// Calendar fields as read from RTC_TR/RTC_DR, already decoded from BCD
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtcCalendar {
    /// Year of century (0-99)
    pub year: u8,
    /// Month (1-12)
    pub month: u8,
    /// Day of month (1-31)
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl RtcCalendar {
    /// Seconds elapsed since 2000-01-01 00:00:00.
    ///
    /// Out-of-range fields (an RTC read before the calendar was seeded)
    /// never produce a value before the epoch.
    pub fn seconds_since_epoch(&self) -> u64 {
        let days = days_from_civil(EPOCH_YEAR + self.year as u16, self.month, self.day)
            - days_from_civil(EPOCH_YEAR, 1, 1);

        (days.max(0) as u64) * SECONDS_PER_DAY
            + (self.hour as u64) * 3600
            + (self.minute as u64) * 60
            + (self.second as u64)
    }
}

/// Microseconds into the current second from the RTC sub-second register.
///
/// SS counts down from `prediv_s` once per second. A reading above
/// `prediv_s` (possible right after a shift operation) counts as the start
/// of the second.
pub fn subsecond_micros(ss: u16, prediv_s: u16) -> u64 {
    let steps = u64::from(prediv_s.saturating_sub(ss));
    steps * 1_000_000 / (u64::from(prediv_s) + 1)
}

/// Two BCD digits to binary
pub fn from_bcd(tens: u8, units: u8) -> u8 {
    tens * 10 + units
}

/// Convert civil date (year, month, day) to days since Unix epoch
///
/// This is an O(1) algorithm that correctly handles all leap years.
fn days_from_civil(year: u16, month: u8, day: u8) -> i32 {
    let y = year as i32;
    let m = month as i32;
    let d = day as i32;

    // Adjust year and month to make March = month 0, February = month 11
    let (y, m) = if m <= 2 { (y - 1, m + 9) } else { (y, m - 3) };

    let era = if y >= 0 { y } else { y - 399 } / 400;
    let yoe = y - era * 400; // year of era [0, 399]
    let doy = (153 * m + 2) / 5 + d - 1; // day of year [0, 365]
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy; // day of era [0, 146096]

    era * 146097 + doe - 719468 // 719468 = days from 0000-03-01 to 1970-01-01
}
