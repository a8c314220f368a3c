//! Triple-grouped microsecond rendering
//!
//! `1234567` renders as `1.234.567 s`: whole seconds, then milliseconds and
//! remaining microseconds, each zero-padded to three digits. Log parsers
//! downstream match this text exactly, so it is not a general duration
//! format and must not change.

use core::fmt::{self, Write};
use heapless::String;

/// Capacity that fits any `u64` rendering (`18446744073709.551.615 s` is 24 bytes)
pub const FORMATTED_MAX_LEN: usize = 32;

/// Microsecond value that displays as `<s>.<ms>.<us> s`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormattedMicros(pub u64);

impl FormattedMicros {
    /// `(seconds, milliseconds, microseconds)`; the last two are below 1000
    pub fn parts(&self) -> (u64, u64, u64) {
        let us = self.0;
        (us / 1_000_000, (us / 1_000) % 1_000, us % 1_000)
    }
}

impl fmt::Display for FormattedMicros {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (secs, millis, micros) = self.parts();
        write!(f, "{}.{:03}.{:03} s", secs, millis, micros)
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for FormattedMicros {
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "{=str}", format_us(self.0).as_str())
    }
}

/// Render `us` into an owned fixed-capacity string
pub fn format_us(us: u64) -> String<FORMATTED_MAX_LEN> {
    let mut text = String::new();
    // Cannot overflow: the longest rendering is well under capacity
    let _ = write!(text, "{}", FormattedMicros(us));
    text
}

/// Render `us` into a caller-supplied byte buffer as a NUL-terminated string.
///
/// Writes at most `buf.len() - 1` text bytes followed by a `0`, and returns
/// the length the complete text needs (excluding the terminator). The output
/// is only whole when the returned length is less than `buf.len()`. An empty
/// buffer is left untouched.
pub fn format_us_into(us: u64, buf: &mut [u8]) -> usize {
    let limit = buf.len().saturating_sub(1);
    let mut writer = SliceWriter { buf, limit, needed: 0 };
    let _ = write!(writer, "{}", FormattedMicros(us));
    let needed = writer.needed;
    // None only for an empty buffer
    if let Some(terminator) = writer.buf.get_mut(needed.min(limit)) {
        *terminator = 0;
    }
    needed
}

struct SliceWriter<'a> {
    buf: &'a mut [u8],
    /// Text bytes that may be stored
    limit: usize,
    needed: usize,
}

impl Write for SliceWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for &byte in s.as_bytes() {
            if self.needed < self.limit {
                if let Some(slot) = self.buf.get_mut(self.needed) {
                    *slot = byte;
                }
            }
            self.needed += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_exact() {
        assert_eq!(format_us(1_234_567).as_str(), "1.234.567 s");
        assert_eq!(format_us(999).as_str(), "0.000.999 s");
        assert_eq!(format_us(0).as_str(), "0.000.000 s");
        assert_eq!(format_us(1_000_000).as_str(), "1.000.000 s");
        assert_eq!(format_us(60_005_010).as_str(), "60.005.010 s");
    }

    #[test]
    fn test_format_u64_max_fits() {
        let text = format_us(u64::MAX);
        assert_eq!(text.as_str(), "18446744073709.551.615 s");
        assert!(text.len() <= FORMATTED_MAX_LEN);
    }

    #[test]
    fn test_parts() {
        assert_eq!(FormattedMicros(1_234_567).parts(), (1, 234, 567));
        assert_eq!(FormattedMicros(999).parts(), (0, 0, 999));
    }

    #[test]
    fn test_format_into_buffer() {
        let mut buf = [0u8; 16];
        let len = format_us_into(1_234_567, &mut buf);
        assert_eq!(len, 11);
        assert_eq!(&buf[..len], b"1.234.567 s");
    }

    #[test]
    fn test_format_into_short_buffer_truncates() {
        let mut buf = [b'#'; 4];
        let len = format_us_into(1_234_567, &mut buf);
        assert_eq!(len, 11);
        assert!(len >= buf.len());
        assert_eq!(&buf, b"1.2\0");
    }

    #[test]
    fn test_format_into_needs_room_for_terminator() {
        // Exactly the text length: the last character gives way to the NUL
        let mut buf = [b'#'; 11];
        assert_eq!(format_us_into(1_234_567, &mut buf), 11);
        assert_eq!(&buf, b"1.234.567 \0");

        let mut buf = [b'#'; 12];
        assert_eq!(format_us_into(1_234_567, &mut buf), 11);
        assert_eq!(&buf, b"1.234.567 s\0");
    }

    #[test]
    fn test_format_into_single_byte_is_terminator_only() {
        let mut buf = [b'#'; 1];
        assert_eq!(format_us_into(999, &mut buf), 11);
        assert_eq!(buf, [0]);
    }

    #[test]
    fn test_format_into_empty_buffer_is_noop() {
        let mut buf: [u8; 0] = [];
        assert_eq!(format_us_into(999, &mut buf), 11);
    }
}
