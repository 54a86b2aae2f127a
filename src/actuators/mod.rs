//! Actuator registry: uniform `set` / `is_on` over heterogeneous outputs.
//!
//! The status slot always records what the hardware *achieved*: the `set`
//! routine returns the value it actually drove, and a failed call records
//! [`ACTUATOR_FAULT`] instead of leaving the previous state in place.
//!
//! ## Accounting
//!
//! | Flag            | Effect                                          |
//! |-----------------|-------------------------------------------------|
//! | `TRACK_CHANGES` | count transitions, stamp the last one           |
//! | `TRACK_ON_TIME` | integrate seconds spent with a value above zero |
//!
//! ## Asynchronous shutoff
//!
//! ISRs never write the status table.  They flag an index in
//! [`ShutoffRequests`] and the registry drives that actuator to 0 at the
//! start of its next `set` or `is_on` call.

pub mod output_pin;

use log::{error, info, warn};

use crate::app::ports::{Hal, PinId};
use crate::calendar::{SECONDS_PER_HOUR, Timestamp};
use crate::error::{Error, Result};
use crate::events::{ACTUATOR_SHUTOFF, ShutoffRequests};
use crate::flags::device_flags;
use crate::logger::{DeviceKind, LogEntry};

/// Commanded/achieved output value.  0 is off, 1 is on for binary devices,
/// larger values are levels.
pub type ActuatorValue = i16;

/// Recorded when a `set` failed.  Distinct from every valid value.
pub const ACTUATOR_FAULT: ActuatorValue = i16::MIN;

/// Capacity of the status table.
pub const MAX_ACTUATORS: usize = 16;

/// On-intervals longer than this are assumed to be clock jumps and dropped.
const MAX_PLAUSIBLE_ON_SECS: u32 = 4 * SECONDS_PER_HOUR;

device_flags! {
    /// Actuator descriptor flags.
    ActuatorFlags {
        LOG = 0x01,
        NOLOG = 0x02,
        TRACK_CHANGES = 0x04,
        TRACK_ON_TIME = 0x08,
    }
}

pub type ActuatorInitFn = fn(&ActuatorDescriptor, &mut dyn Hal) -> Result<()>;

/// Drive the output.  Returns the value actually achieved.
pub type ActuatorSetFn = fn(&ActuatorDescriptor, &mut dyn Hal, ActuatorValue) -> Result<ActuatorValue>;

/// Query the hardware for the real output state.
pub type ActuatorIsOnFn = fn(&ActuatorDescriptor, &mut dyn Hal) -> Result<bool>;

#[derive(Clone, Copy)]
pub struct ActuatorDescriptor {
    pub name: &'static str,
    pub pin: PinId,
    pub flags: ActuatorFlags,
    pub init: Option<ActuatorInitFn>,
    pub set: ActuatorSetFn,
    /// Hardware truth.  Without it `is_on` trusts the status slot.
    pub is_on: Option<ActuatorIsOnFn>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorStatus {
    pub value: ActuatorValue,
    pub initialized: bool,
    /// Last `set` or `init` failed.
    pub error: Option<Error>,
    pub change_count: u16,
    pub last_change: Option<Timestamp>,
    /// Accumulated seconds on, excluding the interval in progress.
    pub on_time_secs: u32,
    on_since: Option<Timestamp>,
}

impl ActuatorStatus {
    const fn new() -> Self {
        Self {
            value: 0,
            initialized: false,
            error: None,
            change_count: 0,
            last_change: None,
            on_time_secs: 0,
            on_since: None,
        }
    }

    fn close_on_interval(&mut self, name: &str, now: Timestamp) {
        let Some(since) = self.on_since.take() else {
            return;
        };
        if now >= since && now - since <= MAX_PLAUSIBLE_ON_SECS {
            self.on_time_secs = self.on_time_secs.saturating_add(now - since);
        } else {
            warn!("Actuator {}: dropping on-time across a clock jump", name);
        }
    }

    /// Record a new achieved value and update the optional accounting.
    fn record(&mut self, desc: &ActuatorDescriptor, now: Timestamp, value: ActuatorValue) {
        if desc.flags.contains(ActuatorFlags::TRACK_ON_TIME) {
            self.close_on_interval(desc.name, now);
            if value > 0 {
                self.on_since = Some(now);
            }
        }
        if value != self.value && desc.flags.contains(ActuatorFlags::TRACK_CHANGES) {
            self.change_count = self.change_count.wrapping_add(1);
            self.last_change = Some(now);
        }
        self.value = value;
    }
}

/// Owns the status table for a compiled-in descriptor table.
pub struct ActuatorRegistry<'t> {
    table: &'t [ActuatorDescriptor],
    status: heapless::Vec<ActuatorStatus, MAX_ACTUATORS>,
    shutoff: &'t ShutoffRequests,
}

impl<'t> ActuatorRegistry<'t> {
    /// Registry wired to the board's global shutoff mask.
    pub fn new(table: &'t [ActuatorDescriptor]) -> Result<Self> {
        Self::with_shutoff(table, &ACTUATOR_SHUTOFF)
    }

    pub fn with_shutoff(table: &'t [ActuatorDescriptor], shutoff: &'t ShutoffRequests) -> Result<Self> {
        let mut status = heapless::Vec::new();
        for _ in table {
            status.push(ActuatorStatus::new()).map_err(|_| Error::NoMemory)?;
        }
        Ok(Self { table, status, shutoff })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn descriptor(&self, i: usize) -> Option<&'t ActuatorDescriptor> {
        self.table.get(i)
    }

    pub fn status(&self, i: usize) -> Option<&ActuatorStatus> {
        self.status.get(i)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.table.iter().position(|d| d.name == name)
    }

    /// Cached value of actuator `i` (fault if out of range).
    pub fn value(&self, i: usize) -> ActuatorValue {
        self.status.get(i).map_or(ACTUATOR_FAULT, |s| s.value)
    }

    /// Initialise every actuator once.  Failures are isolated; a failed
    /// actuator is retried lazily on its next `set`.
    pub fn init_all(&mut self, hal: &mut dyn Hal) -> usize {
        let mut failed = 0;
        for i in 0..self.table.len() {
            if self.ensure_initialized(hal, i).is_err() {
                failed += 1;
            }
        }
        failed
    }

    fn ensure_initialized(&mut self, hal: &mut dyn Hal, i: usize) -> Result<()> {
        let table = self.table;
        let desc = &table[i];
        let slot = &mut self.status[i];
        if slot.initialized {
            return Ok(());
        }
        if let Some(init) = desc.init {
            if let Err(e) = init(desc, &mut *hal) {
                error!("Failed to initialize actuator {}: {} (E{})", desc.name, e, e.code());
                let now = hal.now();
                slot.record(desc, now, ACTUATOR_FAULT);
                slot.error = Some(e);
                return Err(e);
            }
        }
        slot.initialized = true;
        Ok(())
    }

    /// Drive actuator `i` to `value`.
    pub fn set_actuator_by_index(&mut self, hal: &mut dyn Hal, i: usize, value: ActuatorValue) -> Result<()> {
        self.service_shutoff_requests(hal);
        self.apply(hal, i, value)
    }

    /// Name-based variant.  An unknown name is a [`Error::BadArgument`].
    pub fn set_actuator_by_name(&mut self, hal: &mut dyn Hal, name: &str, value: ActuatorValue) -> Result<()> {
        match self.find(name) {
            Some(i) => self.set_actuator_by_index(hal, i, value),
            None => {
                error!("Unknown actuator '{}'", name);
                Err(Error::BadArgument)
            }
        }
    }

    fn apply(&mut self, hal: &mut dyn Hal, i: usize, value: ActuatorValue) -> Result<()> {
        let table = self.table;
        let Some(desc) = table.get(i) else {
            error!("Actuator index {} out of range", i);
            return Err(Error::BadArgument);
        };
        self.ensure_initialized(hal, i)?;

        let now = hal.now();
        let outcome = (desc.set)(desc, &mut *hal, value);
        let slot = &mut self.status[i];
        match outcome {
            Ok(achieved) => {
                if achieved != slot.value && desc.flags.is_logged(true) {
                    info!("Actuator {}: {} -> {}", desc.name, slot.value, achieved);
                }
                slot.record(desc, now, achieved);
                slot.error = None;
                Ok(())
            }
            Err(e) => {
                error!("Failed to set actuator {} to {}: {} (E{})", desc.name, value, e, e.code());
                slot.record(desc, now, ACTUATOR_FAULT);
                slot.error = Some(e);
                Err(e)
            }
        }
    }

    /// Whether actuator `i` is on.  Uses the hardware query when the
    /// descriptor has one, otherwise the last achieved value.
    pub fn is_actuator_on(&mut self, hal: &mut dyn Hal, i: usize) -> bool {
        self.service_shutoff_requests(hal);
        let table = self.table;
        let Some(desc) = table.get(i) else {
            return false;
        };
        match desc.is_on {
            Some(query) => query(desc, hal).unwrap_or_else(|e| {
                warn!("Failed to query actuator {}: {}", desc.name, e);
                false
            }),
            None => self.status[i].value > 0,
        }
    }

    /// Drain the ISR shutoff mask, driving each flagged actuator to 0.
    /// Returns the mask that was handled; bits past the table are dropped.
    pub fn service_shutoff_requests(&mut self, hal: &mut dyn Hal) -> u32 {
        let requested = self.shutoff.take();
        if requested == 0 {
            return 0;
        }
        let valid = match self.table.len() {
            n if n >= 32 => u32::MAX,
            n => (1u32 << n) - 1,
        };
        let mask = requested & valid;
        if requested != mask {
            warn!("Ignoring shutoff request for unknown actuators: {:#x}", requested & !valid);
        }
        for i in 0..self.table.len().min(32) {
            if mask & (1 << i) != 0 {
                warn!("Actuator {} forced off by interrupt", self.table[i].name);
                // Failures are recorded in the slot.
                let _ = self.apply(hal, i, 0);
            }
        }
        mask
    }

    /// Accumulated on-time including the interval in progress.
    pub fn on_time_secs(&self, i: usize, now: Timestamp) -> u32 {
        let Some(slot) = self.status.get(i) else {
            return 0;
        };
        let running = slot
            .on_since
            .filter(|&since| now >= since && now - since <= MAX_PLAUSIBLE_ON_SECS)
            .map_or(0, |since| now - since);
        slot.on_time_secs.saturating_add(running)
    }

    /// True if any actuator is in the error state.
    pub fn any_error(&self) -> bool {
        self.status.iter().any(|s| s.error.is_some())
    }

    /// Current value of every logged actuator.
    pub fn log_entries(&self, by_default: bool) -> impl Iterator<Item = LogEntry> + '_ {
        self.table
            .iter()
            .zip(self.status.iter())
            .filter(move |(d, _)| d.flags.is_logged(by_default))
            .map(|(d, s)| LogEntry {
                kind: DeviceKind::Actuator,
                name: d.name,
                value_index: 0,
                value: i32::from(s.value),
            })
    }
}
