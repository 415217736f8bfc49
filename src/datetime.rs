//! Date and time wire values.
//!
//! The format packs calendar dates into a single 4-byte word, times into an
//! 8-byte word, and datetimes into the concatenation of the two. All words
//! are big-endian on the wire.
//!
//! Date word: bits 31..9 hold a signed 23-bit year, bits 8..5 the month
//! (0 = unspecified), bits 4..0 the day (0 = unspecified).
//!
//! Time word: bits 63..56 hold the timezone offset in 15-minute increments as
//! a signed byte (`-128` = no timezone), bits 55..52 the accuracy, bits
//! 46..30 seconds since midnight, bits 29..0 fractional nanoseconds. Bits
//! 51..47 are zero.

use std::fmt;

use crate::error::{Error, Result};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const MAX_YEAR: i32 = (1 << 22) - 1;
const MIN_YEAR: i32 = -(1 << 22);
const MAX_NANOSEC: u32 = 999_999_999;
const SECS_PER_DAY: u32 = 86_400;
const NO_TIMEZONE: i8 = -128;

/// Precision of a date, time, or datetime value. Higher encoded values mean
/// finer resolution, so `Accuracy` orders from coarse to fine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Accuracy {
    Millennium,
    Century,
    Year,
    Month,
    Day,
    Hour,
    Minute,
    Second,
    Millisecond,
    Microsecond,
    Nanosecond,
}

impl Accuracy {
    /// The 4-bit wire encoding of this accuracy.
    pub fn encoded(self) -> u8 {
        match self {
            Accuracy::Millennium => 0,
            Accuracy::Century => 1,
            Accuracy::Year => 2,
            Accuracy::Month => 3,
            Accuracy::Day => 4,
            Accuracy::Hour => 5,
            Accuracy::Minute => 6,
            Accuracy::Second => 7,
            Accuracy::Millisecond => 8,
            Accuracy::Microsecond => 9,
            Accuracy::Nanosecond => 10,
        }
    }

    /// Decode a 4-bit accuracy value.
    pub fn from_encoded(v: u8) -> Option<Accuracy> {
        match v {
            0 => Some(Accuracy::Millennium),
            1 => Some(Accuracy::Century),
            2 => Some(Accuracy::Year),
            3 => Some(Accuracy::Month),
            4 => Some(Accuracy::Day),
            5 => Some(Accuracy::Hour),
            6 => Some(Accuracy::Minute),
            7 => Some(Accuracy::Second),
            8 => Some(Accuracy::Millisecond),
            9 => Some(Accuracy::Microsecond),
            10 => Some(Accuracy::Nanosecond),
            _ => None,
        }
    }

    /// True if `self` resolves at least as finely as `other`.
    pub fn at_least(self, other: Accuracy) -> bool {
        self >= other
    }
}

/// A calendar date. Month and day may each be zero, meaning unspecified.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Date {
    year: i32,
    month: u8,
    day: u8,
}

impl Date {
    /// Construct a date. The year must fit in 23 signed bits, the month in
    /// 1–12 (or 0 for unspecified), the day in 1–31 (or 0 for unspecified).
    pub fn new(year: i32, month: u8, day: u8) -> Result<Self> {
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(Error::malformed("date year outside signed 23-bit range"));
        }
        if month > 12 {
            return Err(Error::malformed("date month outside 0-12"));
        }
        if day > 31 {
            return Err(Error::malformed("date day outside 0-31"));
        }
        if month == 0 && day != 0 {
            return Err(Error::malformed("date day given without a month"));
        }
        Ok(Date { year, month, day })
    }

    /// A date specified only to the year.
    pub fn from_year(year: i32) -> Result<Self> {
        Date::new(year, 0, 0)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// Month of year, or zero if unspecified.
    pub fn month(&self) -> u8 {
        self.month
    }

    /// Day of month, or zero if unspecified.
    pub fn day(&self) -> u8 {
        self.day
    }

    /// The accuracy implied by which components are present.
    pub fn accuracy(&self) -> Accuracy {
        if self.day != 0 {
            Accuracy::Day
        } else if self.month != 0 {
            Accuracy::Month
        } else {
            Accuracy::Year
        }
    }

    /// Pack into the 4-byte wire word.
    pub fn to_word(self) -> u32 {
        ((self.year as u32 & 0x7f_ffff) << 9) | ((self.month as u32) << 5) | self.day as u32
    }

    /// Unpack from the 4-byte wire word.
    pub fn from_word(word: u32) -> Result<Self> {
        let raw_year = (word >> 9) & 0x7f_ffff;
        let year = if raw_year & 0x40_0000 != 0 {
            raw_year as i32 - (1 << 23)
        } else {
            raw_year as i32
        };
        let month = ((word >> 5) & 0x0f) as u8;
        let day = (word & 0x1f) as u8;
        Date::new(year, month, day)
    }
}

impl fmt::Display for Date {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match (self.month, self.day) {
            (0, _) => write!(f, "{:04}", self.year),
            (m, 0) => write!(f, "{:04}-{:02}", self.year, m),
            (m, d) => write!(f, "{:04}-{:02}-{:02}", self.year, m, d),
        }
    }
}

/// A time of day with optional timezone and explicit accuracy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Time {
    seconds: u32,
    nanos: u32,
    /// Offset from UTC in 15-minute increments.
    offset: Option<i8>,
    accuracy: Accuracy,
}

impl Time {
    /// Construct a time of day. Seconds count from midnight, nanoseconds must
    /// stay below one billion, and the timezone offset counts 15-minute
    /// increments from UTC.
    pub fn new(seconds: u32, nanos: u32, offset: Option<i8>, accuracy: Accuracy) -> Result<Self> {
        if seconds >= SECS_PER_DAY {
            return Err(Error::malformed("time seconds outside a day"));
        }
        if nanos > MAX_NANOSEC {
            return Err(Error::malformed("time nanoseconds outside a second"));
        }
        if let Some(off) = offset {
            if off == NO_TIMEZONE || !(-96..=96).contains(&off) {
                return Err(Error::malformed("timezone offset outside +/-24h"));
            }
        }
        Ok(Time {
            seconds,
            nanos,
            offset,
            accuracy,
        })
    }

    /// A wall-clock time accurate to the second, without a timezone.
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Result<Self> {
        if hour > 23 || minute > 59 || second > 59 {
            return Err(Error::malformed("time component out of range"));
        }
        Time::new(hour * 3600 + minute * 60 + second, 0, None, Accuracy::Second)
    }

    pub fn seconds_since_midnight(&self) -> u32 {
        self.seconds
    }

    pub fn subsec_nanos(&self) -> u32 {
        self.nanos
    }

    /// Offset from UTC in 15-minute increments, if the time carries one.
    pub fn timezone_offset(&self) -> Option<i8> {
        self.offset
    }

    pub fn accuracy(&self) -> Accuracy {
        self.accuracy
    }

    /// Pack into the 8-byte wire word.
    pub fn to_word(self) -> u64 {
        let tz = self.offset.unwrap_or(NO_TIMEZONE);
        ((tz as u8 as u64) << 56)
            | ((self.accuracy.encoded() as u64) << 52)
            | ((self.seconds as u64) << 30)
            | self.nanos as u64
    }

    /// Unpack from the 8-byte wire word.
    pub fn from_word(word: u64) -> Result<Self> {
        let tz = (word >> 56) as u8 as i8;
        let accuracy = Accuracy::from_encoded(((word >> 52) & 0x0f) as u8)
            .ok_or_else(|| Error::malformed("unassigned accuracy value"))?;
        if (word >> 47) & 0x1f != 0 {
            return Err(Error::malformed("reserved time bits set"));
        }
        let seconds = ((word >> 30) & 0x1_ffff) as u32;
        let nanos = (word & 0x3fff_ffff) as u32;
        let offset = if tz == NO_TIMEZONE { None } else { Some(tz) };
        Time::new(seconds, nanos, offset, accuracy)
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02}:{:02}:{:02}",
            self.seconds / 3600,
            (self.seconds / 60) % 60,
            self.seconds % 60
        )?;
        if self.accuracy.at_least(Accuracy::Millisecond) {
            write!(f, ".{:09}", self.nanos)?;
        }
        if let Some(off) = self.offset {
            let minutes = off as i32 * 15;
            write!(f, "{:+03}:{:02}", minutes / 60, (minutes % 60).abs())?;
        }
        Ok(())
    }
}

/// A combined date and time. The time component's accuracy is authoritative
/// for the whole value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DateTime {
    date: Date,
    time: Time,
}

impl DateTime {
    pub fn new(date: Date, time: Time) -> Self {
        DateTime { date, time }
    }

    pub fn date(&self) -> Date {
        self.date
    }

    pub fn time(&self) -> Time {
        self.time
    }

    pub fn accuracy(&self) -> Accuracy {
        self.time.accuracy
    }

    /// Pack into the 12-byte wire representation.
    pub fn to_words(self) -> (u32, u64) {
        (self.date.to_word(), self.time.to_word())
    }

    /// Unpack from the 12-byte wire representation.
    pub fn from_words(date: u32, time: u64) -> Result<Self> {
        Ok(DateTime {
            date: Date::from_word(date)?,
            time: Time::from_word(time)?,
        })
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}T{}", self.date, self.time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn date_round_trip() {
        for (y, m, d) in [(2024, 3, 15), (0, 1, 1), (-1000, 12, 31), (MAX_YEAR, 0, 0)] {
            let date = Date::new(y, m, d).unwrap();
            assert_eq!(Date::from_word(date.to_word()).unwrap(), date);
        }
    }

    #[test]
    fn negative_year_sign_extends() {
        let date = Date::new(-4, 7, 1).unwrap();
        let back = Date::from_word(date.to_word()).unwrap();
        assert_eq!(back.year(), -4);
        assert_eq!(back.month(), 7);
    }

    #[test]
    fn year_bounds_enforced() {
        assert!(Date::from_year(MAX_YEAR).is_ok());
        assert!(Date::from_year(MIN_YEAR).is_ok());
        assert_matches!(Date::from_year(MAX_YEAR + 1), Err(Error::MalformedStream(_)));
        assert_matches!(Date::from_year(MIN_YEAR - 1), Err(Error::MalformedStream(_)));
    }

    #[test]
    fn date_accuracy_follows_components() {
        assert_eq!(Date::new(2024, 0, 0).unwrap().accuracy(), Accuracy::Year);
        assert_eq!(Date::new(2024, 6, 0).unwrap().accuracy(), Accuracy::Month);
        assert_eq!(Date::new(2024, 6, 9).unwrap().accuracy(), Accuracy::Day);
    }

    #[test]
    fn time_round_trip() {
        let time = Time::new(12 * 3600 + 34 * 60 + 56, 789_000_000, Some(-20), Accuracy::Nanosecond)
            .unwrap();
        let back = Time::from_word(time.to_word()).unwrap();
        assert_eq!(back, time);
        assert_eq!(back.timezone_offset(), Some(-20));
    }

    #[test]
    fn time_without_timezone() {
        let time = Time::from_hms(23, 59, 59).unwrap();
        let back = Time::from_word(time.to_word()).unwrap();
        assert_eq!(back.timezone_offset(), None);
        assert_eq!(back.accuracy(), Accuracy::Second);
    }

    #[test]
    fn time_bounds_enforced() {
        assert_matches!(
            Time::new(SECS_PER_DAY, 0, None, Accuracy::Second),
            Err(Error::MalformedStream(_))
        );
        assert_matches!(
            Time::new(0, 1_000_000_000, None, Accuracy::Nanosecond),
            Err(Error::MalformedStream(_))
        );
        assert_matches!(
            Time::new(0, 0, Some(97), Accuracy::Second),
            Err(Error::MalformedStream(_))
        );
    }

    #[test]
    fn accuracy_orders_coarse_to_fine() {
        assert!(Accuracy::Nanosecond.at_least(Accuracy::Second));
        assert!(!Accuracy::Year.at_least(Accuracy::Day));
        assert_eq!(Accuracy::from_encoded(10), Some(Accuracy::Nanosecond));
        assert_eq!(Accuracy::from_encoded(11), None);
    }

    #[test]
    fn datetime_round_trip() {
        let dt = DateTime::new(
            Date::new(1999, 12, 31).unwrap(),
            Time::new(86_399, 999_999_999, Some(4), Accuracy::Nanosecond).unwrap(),
        );
        let (d, t) = dt.to_words();
        assert_eq!(DateTime::from_words(d, t).unwrap(), dt);
    }
}
