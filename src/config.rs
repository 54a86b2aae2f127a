//! System configuration parameters
//!
//! All tunable parameters of the monitor.  Device tables are compiled in;
//! these are the knobs around them.

use core::fmt;

use serde::{Deserialize, Serialize};

/// Upper bound on [`SystemConfig::log_buffer_lines`].
pub const MAX_LOG_BUFFER_LINES: u8 = 32;

/// Unit for thermistor readings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TemperatureUnit {
    Celsius,
    Fahrenheit,
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Main loop ---
    /// Minutes between sensor status checks (0 = on demand only)
    pub status_check_minutes: u16,
    /// Minutes between log appends (0 = on demand only)
    pub log_append_minutes: u16,
    /// Minimum seconds between two bulk sensor checks
    pub sensor_check_cooldown_secs: u16,

    // --- Controllers ---
    /// How late (or early) a time-of-day controller may still run, in minutes
    pub schedule_skew_minutes: u16,
    /// Retries allowed after a controller asks to be re-run
    pub controller_retry_max: u8,
    /// Delay before a retry, seconds
    pub controller_retry_delay_secs: u16,

    // --- Power ---
    /// Nominal regulated supply, mV
    pub regulated_vcc_mv: u16,
    /// Supply below this raises the Vcc-low warning, mV
    pub vcc_low_mv: u16,

    // --- Logging ---
    /// Status records held in RAM before a flush
    pub log_buffer_lines: u8,
    /// Skip non-forced log flushes while the battery is low
    pub skip_log_on_low_battery: bool,
    /// Devices without an explicit log flag are logged
    pub log_devices_by_default: bool,

    // --- Sensors ---
    pub temperature_unit: TemperatureUnit,
    /// Temperatures are reported multiplied by this factor
    pub temperature_scale: u16,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            // Main loop
            status_check_minutes: 15,
            log_append_minutes: 15,
            sensor_check_cooldown_secs: 30,

            // Controllers
            schedule_skew_minutes: 15,
            controller_retry_max: 3,
            controller_retry_delay_secs: 60,

            // Power
            regulated_vcc_mv: 3300,
            vcc_low_mv: 3000,

            // Logging
            log_buffer_lines: 15,
            skip_log_on_low_battery: true,
            log_devices_by_default: true,

            // Sensors
            temperature_unit: TemperatureUnit::Celsius,
            temperature_scale: 1,
        }
    }
}

impl SystemConfig {
    /// Reject values the scheduler or logger cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_buffer_lines == 0 || self.log_buffer_lines > MAX_LOG_BUFFER_LINES {
            return Err(ConfigError::ValidationFailed("log_buffer_lines out of range"));
        }
        if self.controller_retry_delay_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "controller_retry_delay_secs must be non-zero",
            ));
        }
        if self.temperature_scale == 0 {
            return Err(ConfigError::ValidationFailed("temperature_scale must be non-zero"));
        }
        if self.vcc_low_mv >= self.regulated_vcc_mv {
            return Err(ConfigError::ValidationFailed(
                "vcc_low_mv must be below regulated_vcc_mv",
            ));
        }
        // A window of half a day or more makes every slot "now".
        if u32::from(self.schedule_skew_minutes) >= 12 * 60 {
            return Err(ConfigError::ValidationFailed("schedule_skew_minutes too large"));
        }
        Ok(())
    }
}

/// Errors from configuration checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}
