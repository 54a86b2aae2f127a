//! Power-cycle contract: intent flags in, wake alarm out.
//!
//! The device sleeps between short duty cycles.  Each wake-up is turned
//! into an [`Intent`] (from expired alarms and button presses) which the
//! monitor executes; [`Alarms::next_wakeup`] then tells the sleep port how
//! long it may hibernate.

use core::ops::BitOr;

use log::{info, warn};

use crate::calendar::{SECONDS_PER_HOUR, SECONDS_PER_MINUTE, Timestamp, snap_to_factor};
use crate::config::SystemConfig;

/// Longest single hibernation, seconds.
pub const MAX_SLEEP_SECS: u32 = 0xFFFF;

/// Waking this long after the programmed alarm counts as a clock jump.
const CLOCK_JUMP_SECS: u32 = SECONDS_PER_HOUR;

/// What a wake-up should do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Intent {
    /// Run ripe controllers.
    pub do_controllers: bool,
    /// Append a status record.
    pub do_log: bool,
    /// Re-read sensors and re-evaluate warnings.
    pub do_status: bool,
    /// Append and write out the log buffer now.
    pub force_sync: bool,
    /// Run every controller that accepts forced runs.
    pub force_controllers: bool,
}

impl Intent {
    pub const NONE: Self = Self {
        do_controllers: false,
        do_log: false,
        do_status: false,
        force_sync: false,
        force_controllers: false,
    };

    pub const fn is_empty(&self) -> bool {
        !(self.do_controllers || self.do_log || self.do_status || self.force_sync || self.force_controllers)
    }
}

impl BitOr for Intent {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self {
            do_controllers: self.do_controllers || rhs.do_controllers,
            do_log: self.do_log || rhs.do_log,
            do_status: self.do_status || rhs.do_status,
            force_sync: self.force_sync || rhs.force_sync,
            force_controllers: self.force_controllers || rhs.force_controllers,
        }
    }
}

/// Periodic alarms owned by the power-cycle loop.  Controller alarms come
/// from the controller registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alarms {
    pub status: Option<Timestamp>,
    pub log: Option<Timestamp>,
    status_period: u32,
    log_period: u32,
    last_seen: Option<Timestamp>,
    expected_wake: Option<Timestamp>,
}

/// Next multiple of `period` strictly after `now`.  `None` if the period
/// is 0 (on demand only).
pub fn next_snapped(now: Timestamp, period: u32) -> Option<Timestamp> {
    (period > 0).then(|| snap_to_factor(now, period).saturating_add(period))
}

impl Alarms {
    pub fn new(config: &SystemConfig, now: Timestamp) -> Self {
        let status_period = u32::from(config.status_check_minutes) * SECONDS_PER_MINUTE;
        let log_period = u32::from(config.log_append_minutes) * SECONDS_PER_MINUTE;
        Self {
            status: next_snapped(now, status_period),
            log: next_snapped(now, log_period),
            status_period,
            log_period,
            last_seen: Some(now),
            expected_wake: None,
        }
    }

    /// Note the current time.  Returns true (and re-arms every alarm) if the
    /// clock went backwards, or is well past the last programmed wake-up.
    pub fn observe_clock(&mut self, now: Timestamp) -> bool {
        let backwards = self.last_seen.is_some_and(|last| now < last);
        let overslept = self
            .expected_wake
            .is_some_and(|wake| now > wake.saturating_add(CLOCK_JUMP_SECS));
        self.last_seen = Some(now);
        let jumped = backwards || overslept;
        if jumped {
            warn!("Clock jump detected, recomputing alarms");
            self.rearm(now);
            self.expected_wake = None;
        }
        jumped
    }

    /// Recompute every alarm from `now`.
    pub fn rearm(&mut self, now: Timestamp) {
        self.status = next_snapped(now, self.status_period);
        self.log = next_snapped(now, self.log_period);
    }

    /// Intent from alarms that have expired at `now`.  Expired alarms are
    /// re-armed for their next slot.
    pub fn take_due(&mut self, now: Timestamp) -> Intent {
        let mut intent = Intent::NONE;
        if self.status.is_some_and(|t| now >= t) {
            intent.do_status = true;
            self.status = next_snapped(now, self.status_period);
        }
        if self.log.is_some_and(|t| now >= t) {
            intent.do_log = true;
            self.log = next_snapped(now, self.log_period);
        }
        intent
    }

    /// When to wake next: the earliest alarm, never later than
    /// [`MAX_SLEEP_SECS`] from now and never earlier than one second.
    pub fn next_wakeup(&mut self, now: Timestamp, controllers: Option<Timestamp>) -> Timestamp {
        let cap = now.saturating_add(MAX_SLEEP_SECS);
        let earliest = [self.status, self.log, controllers]
            .into_iter()
            .flatten()
            .min()
            .unwrap_or(cap);
        let wake = earliest.clamp(now.saturating_add(1), cap);
        self.expected_wake = Some(wake);
        wake
    }
}

/// Button gestures, by press count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonCommand {
    None,
    /// 1 press.
    StatusCheck,
    /// 2 presses.
    SyncLog,
    /// 3 presses.
    RunControllers,
    /// 4 presses.
    SetNoon,
    /// Anything more.
    Cancel,
}

impl ButtonCommand {
    pub fn from_presses(presses: u8) -> Self {
        match presses {
            0 => Self::None,
            1 => Self::StatusCheck,
            2 => Self::SyncLog,
            3 => Self::RunControllers,
            4 => Self::SetNoon,
            _ => Self::Cancel,
        }
    }

    /// Intent for this gesture.  A status check also runs the controllers
    /// and appends a log record when those have no alarm of their own.
    pub fn intent(self, config: &SystemConfig, controllers_scheduled: bool) -> Intent {
        let intent = match self {
            Self::None | Self::Cancel | Self::SetNoon => Intent::NONE,
            Self::StatusCheck => Intent {
                do_status: true,
                do_controllers: !controllers_scheduled,
                do_log: config.log_append_minutes == 0,
                ..Intent::NONE
            },
            Self::SyncLog => Intent {
                do_log: true,
                force_sync: true,
                ..Intent::NONE
            },
            Self::RunControllers => Intent {
                force_controllers: true,
                ..Intent::NONE
            },
        };
        if self != Self::None {
            info!("Button: {:?}", self);
        }
        intent
    }
}
