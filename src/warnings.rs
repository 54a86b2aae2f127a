//! Process-wide warning bitfield.
//!
//! Warnings are re-evaluated from device state on every status update and
//! latched between updates.  Scheduling consults them (irrigation is
//! suppressed on low power) and the logger records them with every line.
//!
//! ## Lifecycle
//!
//! 1. A condition is observed (battery below its warn bound, a failed log
//!    write, an actuator fault).
//! 2. The owning component calls [`Warnings::eval`] or [`Warnings::set`].
//! 3. Transitions are logged once, on SET and on CLEARED.
//! 4. The power-cycle driver shows [`Warnings::led_pattern`] on the status
//!    indicator before going back to sleep.

use core::fmt;

use log::{info, warn};

/// Warning conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Warning {
    BatteryLow = 0b0000_0001,
    VccLow = 0b0000_0010,
    LogError = 0b0000_0100,
    LogSkipped = 0b0000_1000,
    Sensor = 0b0001_0000,
    Controller = 0b0010_0000,
    Actuator = 0b0100_0000,
}

impl Warning {
    pub const ALL: [Warning; 7] = [
        Warning::BatteryLow,
        Warning::VccLow,
        Warning::LogError,
        Warning::LogSkipped,
        Warning::Sensor,
        Warning::Controller,
        Warning::Actuator,
    ];

    pub const fn mask(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::BatteryLow => "battery low",
            Self::VccLow => "Vcc low",
            Self::LogError => "log error",
            Self::LogSkipped => "log skipped",
            Self::Sensor => "sensor",
            Self::Controller => "controller",
            Self::Actuator => "actuator",
        };
        f.write_str(s)
    }
}

/// Latched warning set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Warnings(u8);

impl Warnings {
    pub const fn new() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn has(self, w: Warning) -> bool {
        self.0 & w.mask() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Battery or supply is low.
    pub const fn low_power(self) -> bool {
        self.has(Warning::BatteryLow) || self.has(Warning::VccLow)
    }

    /// Set or clear `w` according to `condition`.
    pub fn eval(&mut self, w: Warning, condition: bool) {
        if condition {
            self.set(w);
        } else {
            self.clear(w);
        }
    }

    pub fn set(&mut self, w: Warning) {
        if !self.has(w) {
            warn!("WARNING SET: {w}");
        }
        self.0 |= w.mask();
    }

    pub fn clear(&mut self, w: Warning) {
        if self.has(w) {
            info!("WARNING CLEARED: {w}");
        }
        self.0 &= !w.mask();
    }

    /// Flash count for the status indicator, or 0 when nothing is wrong.
    ///
    /// Power problems take precedence, then sensor, controller and log
    /// problems in that order.
    pub fn led_pattern(self) -> u8 {
        if self.low_power() {
            1
        } else if self.has(Warning::Sensor) {
            2
        } else if self.has(Warning::Controller) || self.has(Warning::Actuator) {
            3
        } else if self.has(Warning::LogError) || self.has(Warning::LogSkipped) {
            4
        } else {
            0
        }
    }

    /// Iterate over the active warnings.
    pub fn iter(self) -> impl Iterator<Item = Warning> {
        Warning::ALL.into_iter().filter(move |w| self.has(*w))
    }
}
