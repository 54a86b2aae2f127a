//! Wall-clock helpers.
//!
//! Time is a plain `u32` count of seconds since 1970-01-01 00:00:00, which
//! is what the RTC keeps.  Nothing here knows about time zones; the clock
//! is assumed to run on local time.

/// Seconds since the Unix epoch.
pub type Timestamp = u32;

pub const SECONDS_PER_MINUTE: u32 = 60;
pub const SECONDS_PER_HOUR: u32 = 60 * SECONDS_PER_MINUTE;
pub const SECONDS_PER_DAY: u32 = 24 * SECONDS_PER_HOUR;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// Hour/minute/second of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

/// Calendar date of a timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Date {
    pub year: u16,
    pub month: u8,
    pub day: u8,
}

/// Round `value` down to a multiple of `factor`.  A zero factor yields 0.
pub const fn snap_to_factor(value: u32, factor: u32) -> u32 {
    if factor == 0 {
        0
    } else {
        value - (value % factor)
    }
}

/// Midnight at the start of the day containing `t`.
pub const fn day_start(t: Timestamp) -> Timestamp {
    snap_to_factor(t, SECONDS_PER_DAY)
}

/// Minutes elapsed since midnight.
pub const fn minute_of_day(t: Timestamp) -> u32 {
    (t % SECONDS_PER_DAY) / SECONDS_PER_MINUTE
}

pub fn seconds_to_time(t: Timestamp) -> TimeOfDay {
    let s = t % SECONDS_PER_DAY;
    TimeOfDay {
        hour: (s / SECONDS_PER_HOUR) as u8,
        minute: ((s % SECONDS_PER_HOUR) / SECONDS_PER_MINUTE) as u8,
        second: (s % SECONDS_PER_MINUTE) as u8,
    }
}

/// Civil date from a day count (Howard Hinnant's algorithm).
pub fn seconds_to_date(t: Timestamp) -> Date {
    let z = i64::from(t / SECONDS_PER_DAY) + 719_468;
    let era = z / 146_097;
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let year = yoe + era * 400 + i64::from(month <= 2);
    Date {
        year: year as u16,
        month: month as u8,
        day: day as u8,
    }
}

/// Inverse of [`seconds_to_date`] + [`seconds_to_time`].
///
/// Returns `None` for dates before the epoch or past the `u32` range.
pub fn date_to_seconds(date: Date, time: TimeOfDay) -> Option<Timestamp> {
    if !(1..=12).contains(&date.month) || date.day == 0 || date.day > 31 {
        return None;
    }
    let m = i64::from(date.month);
    let y = i64::from(date.year) - i64::from(m <= 2);
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let mp = if m > 2 { m - 3 } else { m + 9 };
    let doy = (153 * mp + 2) / 5 + i64::from(date.day) - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;
    let days = era * 146_097 + doe - 719_468;
    let secs = days * i64::from(SECONDS_PER_DAY)
        + i64::from(time.hour) * i64::from(SECONDS_PER_HOUR)
        + i64::from(time.minute) * i64::from(SECONDS_PER_MINUTE)
        + i64::from(time.second);
    u32::try_from(secs).ok()
}
