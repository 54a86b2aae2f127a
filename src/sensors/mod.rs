//! Sensor registry: descriptor table, status table and the cached reader.
//!
//! ```text
//!   &'t [SensorDescriptor]      Vec<SensorStatus>
//!   ┌──────────────────────┐    ┌────────────────────────────┐
//!   │ 0  Vcc   read=vcc    │ ◀─▶│ values · last_read · cache │
//!   │ 1  BAT   read=mv     │ ◀─▶│ ...                        │
//!   │ 2  TEMP  read=therm  │ ◀─▶│ ...                        │
//!   └──────────────────────┘    └────────────────────────────┘
//! ```
//!
//! Descriptors are immutable and compiled in.  Status slots are index-aligned
//! with them, created once, and never resized.  A physical read happens only
//! when the sensor's cooldown has elapsed or the caller forces it; every
//! other read is answered from the status slot.
//!
//! Read failures never propagate.  The slot gets [`BAD_VALUE`] and the error
//! code is kept for the log, so consumers only ever deal with readings.

pub mod divider;
pub mod level_switch;
pub mod thermistor;
pub mod vcc;

use log::{debug, error, warn};

use crate::app::ports::{Hal, HalError, PinId};
use crate::calendar::Timestamp;
use crate::config::{SystemConfig, TemperatureUnit};
use crate::error::{Error, Result};
use crate::flags::device_flags;
use crate::logger::{DeviceKind, LogEntry};
use crate::threshold::Window;

pub use divider::{DividerConfig, ResistanceConfig};
pub use level_switch::LevelConfig;
pub use thermistor::{ThermistorCache, ThermistorConfig};

/// One sensor value.
pub type Reading = i32;

/// Sentinel for "read failed / unavailable".  Never a valid measurement.
pub const BAD_VALUE: Reading = i32::MIN;

/// Values per sensor slot.
pub const MAX_SENSOR_VALUES: usize = 2;

/// Capacity of the status table.
pub const MAX_SENSORS: usize = 16;

device_flags! {
    /// Sensor descriptor flags.
    SensorFlags {
        LOG = 0x01,
        NOLOG = 0x02,
        /// Warnings from this sensor mean the battery is low.
        BATTERY = 0x04,
        /// This sensor measures the supply; compared against `vcc_low_mv`.
        VCC = 0x08,
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Type-specific configuration payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorConfig {
    None,
    Vcc,
    Thermistor(ThermistorConfig),
    /// Unknown resistance in a divider with a known series resistor.
    Ohms(ResistanceConfig),
    /// Voltage at the top of a resistive divider (battery sense).
    Millivolts(DividerConfig),
    LevelSwitch(LevelConfig),
}

pub type SensorInitFn = fn(&SensorDescriptor, &mut SensorStatus, &mut SensorEnv<'_>) -> Result<()>;

/// Performs the measurement and stores `value_count` values in
/// `status.values`.  The registry handles timestamps and failures.
pub type SensorReadFn = fn(&SensorDescriptor, &mut SensorStatus, &mut SensorEnv<'_>) -> Result<()>;

/// Static description of one sensor.
#[derive(Clone, Copy)]
pub struct SensorDescriptor {
    pub name: &'static str,
    pub pin: PinId,
    /// 1 for scalar sensors, up to [`MAX_SENSOR_VALUES`].
    pub value_count: u8,
    /// Minimum seconds between physical reads.
    pub cooldown_secs: u16,
    pub config: SensorConfig,
    /// Readings matching this window raise a warning.
    pub warn: Window,
    pub flags: SensorFlags,
    pub init: Option<SensorInitFn>,
    pub read: SensorReadFn,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Per-instance working data owned by the sensor's own routines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SensorCache {
    #[default]
    Empty,
    Thermistor(ThermistorCache),
}

/// Initialisation state of a sensor slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorState {
    /// Has an `init` routine that has not run yet.
    Uninitialized,
    Ready,
    /// `init` failed; the sensor reads as [`BAD_VALUE`] from now on.
    Failed,
}

/// Mutable state of one sensor, index-aligned with its descriptor.
#[derive(Debug, Clone, Copy)]
pub struct SensorStatus {
    pub values: [Reading; MAX_SENSOR_VALUES],
    /// Time of the last physical read attempt.
    pub last_read: Option<Timestamp>,
    pub cache: SensorCache,
    pub state: SensorState,
    pub last_error: Option<Error>,
    /// Set by the last warning evaluation.
    pub warning: bool,
}

impl SensorStatus {
    fn new(desc: &SensorDescriptor) -> Self {
        Self {
            values: [BAD_VALUE; MAX_SENSOR_VALUES],
            last_read: None,
            cache: SensorCache::Empty,
            state: if desc.init.is_some() {
                SensorState::Uninitialized
            } else {
                SensorState::Ready
            },
            last_error: None,
            warning: false,
        }
    }
}

/// What a sensor routine is allowed to touch.
///
/// `vref_mv` is the process-wide supply calibration.  The Vcc sensor
/// refreshes it; everything else only reads it.
pub struct SensorEnv<'e> {
    pub hal: &'e mut dyn Hal,
    pub vref_mv: &'e mut u16,
    pub temperature_unit: TemperatureUnit,
    pub temperature_scale: u16,
}

/// Power the ADC for the duration of `f`, leaving it in the state it was
/// found.
pub fn with_adc<T>(
    hal: &mut dyn Hal,
    f: impl FnOnce(&mut dyn Hal) -> core::result::Result<T, HalError>,
) -> Result<T> {
    let was_on = hal.adc_is_on();
    if !was_on {
        hal.adc_on()?;
    }
    let res = f(&mut *hal);
    if !was_on {
        hal.adc_off();
    }
    Ok(res?)
}

/// Summary of the warning pass over all sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SensorAlerts {
    pub battery_low: bool,
    pub vcc_low: bool,
    /// A monitored sensor is out of range or failing.
    pub sensor: bool,
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Owns the status table for a compiled-in descriptor table.
pub struct SensorRegistry<'t> {
    table: &'t [SensorDescriptor],
    status: heapless::Vec<SensorStatus, MAX_SENSORS>,
    vref_mv: u16,
    temperature_unit: TemperatureUnit,
    temperature_scale: u16,
    bulk_cooldown_secs: u16,
    last_bulk_check: Option<Timestamp>,
}

impl<'t> SensorRegistry<'t> {
    /// Build the status table.  Fails if the table does not fit or a
    /// descriptor is malformed.
    pub fn new(table: &'t [SensorDescriptor], config: &SystemConfig) -> Result<Self> {
        let mut status = heapless::Vec::new();
        for desc in table {
            if desc.value_count == 0 || usize::from(desc.value_count) > MAX_SENSOR_VALUES {
                error!("Sensor {}: bad value count {}", desc.name, desc.value_count);
                return Err(Error::BadArgument);
            }
            status
                .push(SensorStatus::new(desc))
                .map_err(|_| Error::NoMemory)?;
        }
        Ok(Self {
            table,
            status,
            vref_mv: config.regulated_vcc_mv,
            temperature_unit: config.temperature_unit,
            temperature_scale: config.temperature_scale,
            bulk_cooldown_secs: config.sensor_check_cooldown_secs,
            last_bulk_check: None,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn descriptor(&self, i: usize) -> Option<&'t SensorDescriptor> {
        self.table.get(i)
    }

    pub fn status(&self, i: usize) -> Option<&SensorStatus> {
        self.status.get(i)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.table.iter().position(|d| d.name == name)
    }

    /// Last measured supply voltage (or the nominal one before any read).
    pub fn vref_mv(&self) -> u16 {
        self.vref_mv
    }

    /// Run every `init` routine once, in descriptor order.  A failure is
    /// logged and isolated to that sensor.  Returns the number of failures.
    pub fn init_all(&mut self, hal: &mut dyn Hal) -> usize {
        let mut failed = 0;
        for i in 0..self.table.len() {
            if self.status[i].state == SensorState::Uninitialized && !self.init_one(hal, i) {
                failed += 1;
            }
        }
        failed
    }

    fn init_one(&mut self, hal: &mut dyn Hal, i: usize) -> bool {
        let table = self.table;
        let desc = &table[i];
        let Some(init) = desc.init else {
            self.status[i].state = SensorState::Ready;
            return true;
        };
        let mut env = SensorEnv {
            hal,
            vref_mv: &mut self.vref_mv,
            temperature_unit: self.temperature_unit,
            temperature_scale: self.temperature_scale,
        };
        let slot = &mut self.status[i];
        match init(desc, slot, &mut env) {
            Ok(()) => {
                slot.state = SensorState::Ready;
                true
            }
            Err(e) => {
                error!("Failed to initialize sensor {}: {}", desc.name, e);
                slot.state = SensorState::Failed;
                slot.last_error = Some(Error::Init);
                slot.values = [BAD_VALUE; MAX_SENSOR_VALUES];
                false
            }
        }
    }

    /// Read value `value_index` of sensor `i`.
    ///
    /// Unless `force_update` is set, a read within the cooldown window is
    /// answered from the cache.  A clock that moved backwards past the last
    /// read counts as an expired cooldown.
    pub fn read_sensor_by_index(
        &mut self,
        hal: &mut dyn Hal,
        i: usize,
        force_update: bool,
        value_index: usize,
    ) -> Reading {
        let table = self.table;
        let Some(desc) = table.get(i) else {
            warn!("Sensor index {} out of range", i);
            return BAD_VALUE;
        };
        if value_index >= usize::from(desc.value_count) {
            error!("Sensor {}: value index {} out of range", desc.name, value_index);
            return BAD_VALUE;
        }

        let now = hal.now();
        if self.status[i].state == SensorState::Uninitialized {
            self.init_one(hal, i);
        }
        if self.status[i].state == SensorState::Failed {
            return BAD_VALUE;
        }

        let fresh = self.status[i]
            .last_read
            .is_some_and(|t| now >= t && now - t < u32::from(desc.cooldown_secs));
        if fresh && !force_update {
            return self.status[i].values[value_index];
        }

        let mut env = SensorEnv {
            hal,
            vref_mv: &mut self.vref_mv,
            temperature_unit: self.temperature_unit,
            temperature_scale: self.temperature_scale,
        };
        let slot = &mut self.status[i];
        slot.last_read = Some(now);
        match (desc.read)(desc, slot, &mut env) {
            Ok(()) => {
                slot.last_error = None;
                debug!("Sensor {} = {}", desc.name, slot.values[0]);
            }
            Err(e) => {
                warn!("Failed to read sensor {}: {}", desc.name, e);
                slot.last_error = Some(e);
                slot.values = [BAD_VALUE; MAX_SENSOR_VALUES];
            }
        }
        slot.values[value_index]
    }

    /// Name-based variant.  An unknown name reads as [`BAD_VALUE`].
    pub fn read_sensor_by_name(
        &mut self,
        hal: &mut dyn Hal,
        name: &str,
        force_update: bool,
        value_index: usize,
    ) -> Reading {
        match self.find(name) {
            Some(i) => self.read_sensor_by_index(hal, i, force_update, value_index),
            None => {
                warn!("Unknown sensor '{}'", name);
                BAD_VALUE
            }
        }
    }

    /// Cached value, no hardware access.
    pub fn value(&self, i: usize, value_index: usize) -> Reading {
        self.status
            .get(i)
            .and_then(|s| s.values.get(value_index))
            .copied()
            .unwrap_or(BAD_VALUE)
    }

    /// Read every sensor in descriptor order, honouring per-sensor cooldowns.
    ///
    /// The whole pass is skipped if the previous one was less than the bulk
    /// cooldown ago, unless `force` is set or the cache was invalidated.
    /// Returns whether a pass was made.
    pub fn check_sensors(&mut self, hal: &mut dyn Hal, force: bool) -> bool {
        let now = hal.now();
        let recent = self
            .last_bulk_check
            .is_some_and(|t| now >= t && now - t < u32::from(self.bulk_cooldown_secs));
        if recent && !force {
            return false;
        }
        self.last_bulk_check = Some(now);
        for i in 0..self.table.len() {
            // A physical read refreshes every value of the slot.
            self.read_sensor_by_index(hal, i, false, 0);
        }
        true
    }

    /// Forget every cached reading so the next read goes to hardware.
    pub fn invalidate(&mut self) {
        self.last_bulk_check = None;
        for s in &mut self.status {
            s.last_read = None;
        }
    }

    /// Re-evaluate each sensor's warning flag from its cached values.
    pub fn evaluate_warnings(&mut self, vcc_low_mv: u16) -> SensorAlerts {
        let mut alerts = SensorAlerts::default();
        for (desc, slot) in self.table.iter().zip(self.status.iter_mut()) {
            let values = &slot.values[..usize::from(desc.value_count)];
            let failed = slot.state == SensorState::Failed || slot.last_error.is_some();
            let tripped = if desc.flags.contains(SensorFlags::VCC) {
                values
                    .iter()
                    .any(|&v| v != BAD_VALUE && v < Reading::from(vcc_low_mv))
            } else {
                values.iter().any(|&v| desc.warn.matches(v))
            };
            slot.warning = tripped || (failed && slot.last_read.is_some());
            if tripped && desc.flags.contains(SensorFlags::BATTERY) {
                alerts.battery_low = true;
            } else if tripped && desc.flags.contains(SensorFlags::VCC) {
                alerts.vcc_low = true;
            } else if slot.warning {
                alerts.sensor = true;
            }
        }
        alerts
    }

    /// Values of every logged sensor, in descriptor order.
    pub fn log_entries(&self, by_default: bool) -> impl Iterator<Item = LogEntry> + '_ {
        self.table
            .iter()
            .zip(self.status.iter())
            .filter(move |(d, _)| d.flags.is_logged(by_default))
            .flat_map(|(d, s)| {
                s.values[..usize::from(d.value_count)]
                    .iter()
                    .enumerate()
                    .map(move |(vi, &value)| LogEntry {
                        kind: DeviceKind::Sensor,
                        name: d.name,
                        value_index: vi as u8,
                        value,
                    })
            })
    }
}
