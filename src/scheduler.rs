//! Next-run-time math for controller schedules.
//!
//! Pure functions over timestamps.  The controller scheduler owns the state
//! (last attempt, retry bookkeeping); this module only answers "when is the
//! next natural occurrence?".
//!
//! ```text
//!  Every { minutes: P }
//!  ──┬───────────── P*60 ──────────────┬──────────────▶ t
//!    last_attempt                      next run
//!
//!  AtTimeOfDay { minute: M }, skew W
//!  ──────────┬──────────┬──────────┬───────────────────▶ t
//!         target-W    target    target+W
//!            │◀── run immediately ─▶│
//!  before target-W: wait for target; after target+W: missed, try tomorrow
//! ```

use crate::calendar::{
    MINUTES_PER_DAY, SECONDS_PER_DAY, SECONDS_PER_MINUTE, Timestamp, day_start,
};

/// When a controller runs on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Only on a forced run.
    Manual,
    /// Every `minutes` minutes after the previous attempt.
    Every { minutes: u16 },
    /// Once a day at `minute` past midnight.
    AtTimeOfDay { minute: u16 },
}

impl Schedule {
    /// `Every` with a zero period is `Manual`.
    pub const fn every(minutes: u16) -> Self {
        if minutes == 0 {
            Self::Manual
        } else {
            Self::Every { minutes }
        }
    }

    /// Daily at `hour:minute`.
    pub const fn at(hour: u8, minute: u8) -> Self {
        Self::AtTimeOfDay {
            minute: (hour as u16 * 60 + minute as u16) % MINUTES_PER_DAY as u16,
        }
    }

    pub const fn is_manual(&self) -> bool {
        matches!(self, Self::Manual)
    }

    /// Period in seconds, for periodic schedules.
    pub const fn period_secs(&self) -> Option<u32> {
        match *self {
            Self::Every { minutes } => Some(minutes as u32 * SECONDS_PER_MINUTE),
            _ => None,
        }
    }

    /// Next natural run time, or `None` for manual schedules.
    ///
    /// `last_attempt` is the start of the most recent run attempt
    /// (successful or not).  `skew_minutes` only affects time-of-day
    /// schedules.
    pub fn next_run(
        &self,
        last_attempt: Option<Timestamp>,
        now: Timestamp,
        skew_minutes: u16,
    ) -> Option<Timestamp> {
        match *self {
            Self::Manual => None,
            Self::Every { minutes } => Some(next_periodic(
                last_attempt,
                now,
                u32::from(minutes) * SECONDS_PER_MINUTE,
            )),
            Self::AtTimeOfDay { minute } => Some(next_time_of_day(
                last_attempt,
                now,
                u32::from(minute) % MINUTES_PER_DAY,
                u32::from(skew_minutes) * SECONDS_PER_MINUTE,
            )),
        }
    }
}

/// A controller with no `next_run` never becomes ripe on its own.
pub fn is_ripe(next_run: Option<Timestamp>, now: Timestamp) -> bool {
    next_run.is_some_and(|t| now >= t)
}

fn next_periodic(last_attempt: Option<Timestamp>, now: Timestamp, period: u32) -> Timestamp {
    match last_attempt {
        None => now,
        // Clock moved backwards past the last attempt.
        Some(last) if last > now => now,
        Some(last) => last.saturating_add(period),
    }
}

fn next_time_of_day(
    last_attempt: Option<Timestamp>,
    now: Timestamp,
    minute: u32,
    skew: u32,
) -> Timestamp {
    let today = day_start(now) + minute * SECONDS_PER_MINUTE;
    let candidates = [
        today.checked_sub(SECONDS_PER_DAY),
        Some(today),
        today.checked_add(SECONDS_PER_DAY),
    ];

    for target in candidates.into_iter().flatten() {
        // Already run inside this slot's window (possibly early).
        let consumed = last_attempt.is_some_and(|last| last.abs_diff(target) < skew.max(1));
        if consumed {
            continue;
        }
        if now.saturating_add(skew) <= target {
            return target;
        }
        if now < target.saturating_add(skew) {
            return now;
        }
    }

    // Every candidate was consumed or missed; the day after tomorrow is
    // always in the future.
    today.saturating_add(2 * SECONDS_PER_DAY)
}
