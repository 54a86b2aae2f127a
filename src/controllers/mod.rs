//! Controller scheduler.
//!
//! Every controller moves through the same per-pass state machine:
//!
//! ```text
//!            ┌────────────── next natural occurrence ──────────────┐
//!            ▼                                                     │
//!   Idle ──▶ Ripe ──▶ Running ──┬──▶ Succeeded ────────────────────┤
//!                      ▲        ├──▶ Retrying ── now + delay ──┐   │
//!                      │        │                              │   │
//!                      └────────┼──────────────────────────────┘   │
//!                               └──▶ Failed (warning) ─────────────┘
//! ```
//!
//! Ripeness comes from [`Schedule`] unless the controller has a
//! `next_run_time` override that returned a time, in which case that time
//! is used as-is.  A retrying controller waits for its retry time
//! regardless of either.
//!
//! Controllers run in descriptor order and see each other's effects: a
//! later controller reads actuator state changed by an earlier one in the
//! same pass.

pub mod greenhouse;

use log::{debug, error, info, warn};

use crate::actuators::ActuatorRegistry;
use crate::app::ports::Hal;
use crate::calendar::{Timestamp, minute_of_day};
use crate::config::SystemConfig;
use crate::error::{Error, Result};
use crate::flags::device_flags;
use crate::logger::{DeviceKind, LogEntry};
use crate::scheduler::{Schedule, is_ripe};
use crate::sensors::{Reading, SensorRegistry};
use crate::threshold::Window;
use crate::warnings::{Warning, Warnings};

/// Capacity of the status table.
pub const MAX_CONTROLLERS: usize = 8;

device_flags! {
    /// Controller descriptor flags.
    ControllerFlags {
        LOG = 0x01,
        NOLOG = 0x02,
        /// Retry on any error, not only on an explicit `Retry`.
        RETRY = 0x04,
        /// Forced runs skip this controller.
        IGNORE_FORCED_RUN = 0x08,
        /// One met input is enough (default: all must be met).
        TRIGGER_ANY = 0x10,
        /// Run even while the battery or supply is low.
        IGNORE_POWER = 0x20,
        /// Raise a controller warning whenever the inputs are met.
        WARN_WHEN_ON = 0x40,
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// Where an input value comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputSource {
    /// Value `value_index` of the sensor at this table index.
    Sensor { index: usize, value_index: u8 },
    /// Minutes since midnight.
    TimeOfDay,
}

/// One gating condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerInput {
    pub source: InputSource,
    pub window: Window,
}

impl ControllerInput {
    pub const fn sensor(index: usize, window: Window) -> Self {
        Self {
            source: InputSource::Sensor { index, value_index: 0 },
            window,
        }
    }

    pub const fn time_of_day(window: Window) -> Self {
        Self {
            source: InputSource::TimeOfDay,
            window,
        }
    }
}

pub type ControllerInitFn =
    fn(&ControllerDescriptor, &mut ControllerStatus, &mut ControllerCtx<'_, '_>) -> Result<()>;

/// Called on every check.  `ctx.conditions_met` says whether the inputs
/// allow the action; the routine decides what that means (turn on, keep
/// running, turn off).
pub type ControllerRunFn =
    fn(&ControllerDescriptor, &mut ControllerStatus, &mut ControllerCtx<'_, '_>) -> Result<()>;

/// Override of the natural schedule.  `None` falls back to it.
pub type NextRunFn = fn(&ControllerDescriptor, &ControllerStatus, Timestamp) -> Option<Timestamp>;

#[derive(Clone, Copy)]
pub struct ControllerDescriptor {
    pub name: &'static str,
    pub inputs: &'static [ControllerInput],
    /// Actuator table indices this controller drives.
    pub outputs: &'static [usize],
    pub schedule: Schedule,
    /// Maximum seconds a controller may keep retrying (0 = unbounded).
    pub run_timeout_secs: u32,
    pub flags: ControllerFlags,
    pub init: Option<ControllerInitFn>,
    pub run: ControllerRunFn,
    pub next_run_time: Option<NextRunFn>,
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerPhase {
    Idle,
    Ripe,
    Running,
    Succeeded,
    Retrying,
    Failed,
}

/// Where `next_run` came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextRunSource {
    Schedule,
    Override,
    Retry,
}

/// Per-controller working data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ControllerData {
    #[default]
    Empty,
    Counter(u32),
    /// Last good input reading.
    Level(Reading),
    /// On-periods completed in the current cycle.
    Cycles(u8),
}

impl ControllerData {
    /// Value recorded in the status log.
    pub fn log_value(&self) -> i32 {
        match *self {
            Self::Empty => 0,
            Self::Counter(n) => i32::try_from(n).unwrap_or(i32::MAX),
            Self::Level(v) => v,
            Self::Cycles(n) => i32::from(n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControllerStatus {
    pub phase: ControllerPhase,
    pub result: Result<()>,
    /// Last successful run.
    pub last_run: Option<Timestamp>,
    /// Start of the last run attempt, successful or not.
    pub last_attempt: Option<Timestamp>,
    pub retry_count: u8,
    /// First attempt of the current retry sequence.
    pub retry_started: Option<Timestamp>,
    pub next_run: Option<Timestamp>,
    next_source: NextRunSource,
    pub warning: bool,
    /// `init` failed; never run.
    pub disabled: bool,
    pub run_count: u32,
    pub last_error: Option<Error>,
    /// Stamped by the run routine when it changes its outputs.
    pub last_change: Option<Timestamp>,
    /// Outputs were last driven on by this controller.
    pub engaged: bool,
    pub data: ControllerData,
}

impl ControllerStatus {
    const fn new() -> Self {
        Self {
            phase: ControllerPhase::Idle,
            result: Ok(()),
            last_run: None,
            last_attempt: None,
            retry_count: 0,
            retry_started: None,
            next_run: None,
            next_source: NextRunSource::Schedule,
            warning: false,
            disabled: false,
            run_count: 0,
            last_error: None,
            last_change: None,
            engaged: false,
            data: ControllerData::Empty,
        }
    }
}

/// Everything a controller routine may touch.
pub struct ControllerCtx<'c, 't> {
    pub hal: &'c mut dyn Hal,
    pub sensors: &'c mut SensorRegistry<'t>,
    pub actuators: &'c mut ActuatorRegistry<'t>,
    pub warnings: &'c mut Warnings,
    /// Start of the current check.
    pub now: Timestamp,
    /// Result of the input evaluation for this check.
    pub conditions_met: bool,
    /// Actuators an engaged controller other than the current one drives.
    held_outputs: u32,
    /// Set by `set_outputs`; folded into the status after the routine.
    engaged: Option<bool>,
}

impl<'c, 't> ControllerCtx<'c, 't> {
    pub fn new(
        hal: &'c mut dyn Hal,
        sensors: &'c mut SensorRegistry<'t>,
        actuators: &'c mut ActuatorRegistry<'t>,
        warnings: &'c mut Warnings,
    ) -> Self {
        Self {
            hal,
            sensors,
            actuators,
            warnings,
            now: 0,
            conditions_met: false,
            held_outputs: 0,
            engaged: None,
        }
    }

    /// Drive every output of `desc` to `value`.  Stops at the first failure.
    ///
    /// An output another engaged controller still drives is left on.
    pub fn set_outputs(&mut self, desc: &ControllerDescriptor, value: i16) -> Result<()> {
        for &out in desc.outputs {
            if value <= 0 && self.is_held(out) {
                self.leave_engaged(out);
                continue;
            }
            self.actuators.set_actuator_by_index(self.hal, out, value)?;
        }
        self.engaged = Some(value > 0);
        Ok(())
    }

    fn is_held(&self, out: usize) -> bool {
        out < 32 && self.held_outputs & (1 << out) != 0
    }

    fn leave_engaged(&self, out: usize) {
        let name = self.actuators.descriptor(out).map_or("?", |d| d.name);
        info!("Leaving {} engaged; another controller requires it", name);
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

pub struct ControllerRegistry<'t> {
    table: &'t [ControllerDescriptor],
    status: heapless::Vec<ControllerStatus, MAX_CONTROLLERS>,
    retry_max: u8,
    retry_delay_secs: u32,
    skew_minutes: u16,
}

impl<'t> ControllerRegistry<'t> {
    /// Build the status table, checking every input and output reference
    /// against the device tables it points into.
    pub fn new(
        table: &'t [ControllerDescriptor],
        sensor_count: usize,
        actuator_count: usize,
        config: &SystemConfig,
    ) -> Result<Self> {
        let mut status = heapless::Vec::new();
        for desc in table {
            for input in desc.inputs {
                if let InputSource::Sensor { index, .. } = input.source {
                    if index >= sensor_count {
                        error!("Controller {}: input sensor {} out of range", desc.name, index);
                        return Err(Error::BadArgument);
                    }
                }
            }
            if let Some(&out) = desc.outputs.iter().find(|&&o| o >= actuator_count) {
                error!("Controller {}: output actuator {} out of range", desc.name, out);
                return Err(Error::BadArgument);
            }
            status.push(ControllerStatus::new()).map_err(|_| Error::NoMemory)?;
        }
        Ok(Self {
            table,
            status,
            retry_max: config.controller_retry_max,
            retry_delay_secs: u32::from(config.controller_retry_delay_secs),
            skew_minutes: config.schedule_skew_minutes,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn descriptor(&self, i: usize) -> Option<&'t ControllerDescriptor> {
        self.table.get(i)
    }

    pub fn status(&self, i: usize) -> Option<&ControllerStatus> {
        self.status.get(i)
    }

    pub fn find(&self, name: &str) -> Option<usize> {
        self.table.iter().position(|d| d.name == name)
    }

    /// Run every `init` in descriptor order and compute the first run times.
    /// A controller whose `init` fails is disabled.  Returns the failure
    /// count.
    pub fn init_all(&mut self, ctx: &mut ControllerCtx<'_, 't>) -> usize {
        let table = self.table;
        let mut failed = 0;
        for (desc, slot) in table.iter().zip(self.status.iter_mut()) {
            ctx.now = ctx.hal.now();
            ctx.held_outputs = 0;
            ctx.engaged = None;
            if let Some(init) = desc.init {
                let outcome = init(desc, slot, ctx);
                if let Some(engaged) = ctx.engaged.take() {
                    slot.engaged = engaged;
                }
                if let Err(e) = outcome {
                    error!("Failed to initialize controller {}: {} (E{})", desc.name, e, e.code());
                    slot.disabled = true;
                    slot.last_error = Some(Error::Init);
                    slot.result = Err(Error::Init);
                    slot.warning = true;
                    failed += 1;
                }
            }
        }
        let now = ctx.hal.now();
        self.reschedule_all(now);
        failed
    }

    /// Whether controller `i` would run now on its own.
    pub fn is_ripe(&mut self, i: usize, now: Timestamp) -> bool {
        let Some(slot) = self.status.get(i) else {
            return false;
        };
        if slot.disabled {
            return false;
        }
        self.refresh(i, now);
        is_ripe(self.status[i].next_run, now)
    }

    /// Check every ripe controller, plus every controller when `force` is
    /// set (except those that ignore forced runs).  Returns how many ran.
    pub fn run_controllers(&mut self, ctx: &mut ControllerCtx<'_, 't>, force: bool) -> usize {
        let mut ran = 0;
        let table = self.table;
        for (i, desc) in table.iter().enumerate() {
            let now = ctx.hal.now();
            let forced = force && !desc.flags.contains(ControllerFlags::IGNORE_FORCED_RUN);
            if self.status[i].disabled || !(self.is_ripe(i, now) || forced) {
                continue;
            }
            self.status[i].phase = ControllerPhase::Ripe;
            self.check_controller(i, ctx, now);
            ran += 1;
        }
        ran
    }

    fn check_controller(&mut self, i: usize, ctx: &mut ControllerCtx<'_, 't>, now: Timestamp) {
        let table = self.table;
        let desc = &table[i];
        ctx.now = now;
        ctx.held_outputs = self.held_by_others(i);
        ctx.engaged = None;

        if ctx.warnings.low_power() && !desc.flags.contains(ControllerFlags::IGNORE_POWER) {
            self.skip_for_power(i, ctx, now);
            return;
        }

        if desc.flags.is_logged(true) {
            info!("Checking {}", desc.name);
        } else {
            debug!("Checking {}", desc.name);
        }

        let met = inputs_met(desc, ctx);
        ctx.conditions_met = met;

        let slot = &mut self.status[i];
        slot.warning = met && desc.flags.contains(ControllerFlags::WARN_WHEN_ON);
        if slot.retry_count == 0 {
            slot.retry_started = Some(now);
        }
        slot.last_attempt = Some(now);
        slot.phase = ControllerPhase::Running;
        slot.run_count = slot.run_count.wrapping_add(1);

        let result = (desc.run)(desc, slot, ctx);
        if let Some(engaged) = ctx.engaged.take() {
            slot.engaged = engaged;
        }
        slot.result = result;
        match result {
            Ok(()) => {
                slot.phase = ControllerPhase::Succeeded;
                slot.last_run = Some(now);
                slot.retry_count = 0;
                slot.retry_started = None;
            }
            Err(e) if e == Error::Retry || desc.flags.contains(ControllerFlags::RETRY) => {
                slot.last_error = Some(e);
                if self.schedule_retry(i, now) {
                    return;
                }
                ctx.warnings.set(Warning::Controller);
            }
            Err(e) => {
                error!("Controller {} failed: {} (E{})", desc.name, e, e.code());
                slot.phase = ControllerPhase::Failed;
                slot.last_error = Some(e);
                slot.retry_count = 0;
                slot.retry_started = None;
            }
        }
        self.reschedule(i, now);
    }

    /// Retry bookkeeping after a retryable failure.  Returns true if a
    /// retry was scheduled, false if the controller gave up.
    fn schedule_retry(&mut self, i: usize, now: Timestamp) -> bool {
        let desc = &self.table[i];
        let slot = &mut self.status[i];
        slot.retry_count = slot.retry_count.saturating_add(1);

        let timeout = desc.run_timeout_secs;
        let elapsed = slot.retry_started.map_or(0, |t| now.saturating_sub(t));
        let timed_out = timeout > 0 && elapsed >= timeout;

        if slot.retry_count <= self.retry_max && !timed_out {
            let delay = if timeout > 0 {
                self.retry_delay_secs.min(timeout)
            } else {
                self.retry_delay_secs
            };
            info!("Re-checking {} in {}s", desc.name, delay);
            slot.phase = ControllerPhase::Retrying;
            slot.next_run = Some(now.saturating_add(delay));
            slot.next_source = NextRunSource::Retry;
            return true;
        }

        if timed_out {
            warn!("Aborting {}: run timeout", desc.name);
            slot.result = Err(Error::Timeout);
        } else {
            warn!("Aborting {}: exceeded max retries", desc.name);
        }
        slot.phase = ControllerPhase::Failed;
        slot.warning = true;
        slot.retry_count = 0;
        slot.retry_started = None;
        false
    }

    fn skip_for_power(&mut self, i: usize, ctx: &mut ControllerCtx<'_, 't>, now: Timestamp) {
        let desc = &self.table[i];
        let mut halted = false;
        for &out in desc.outputs {
            if ctx.is_held(out) {
                ctx.leave_engaged(out);
                continue;
            }
            if ctx.actuators.is_actuator_on(ctx.hal, out) {
                // Failures land in the actuator's status.
                let _ = ctx.actuators.set_actuator_by_index(ctx.hal, out, 0);
                halted = true;
            }
        }
        if halted {
            info!("Halting {}: battery or Vcc low", desc.name);
        } else {
            info!("Skipping {} check, battery or Vcc low", desc.name);
        }
        ctx.warnings.set(Warning::Controller);

        let slot = &mut self.status[i];
        slot.engaged = false;
        slot.warning = true;
        slot.phase = ControllerPhase::Idle;
        slot.last_attempt = Some(now);
        slot.retry_count = 0;
        slot.retry_started = None;
        self.reschedule(i, now);
    }

    /// Outputs of every engaged, enabled controller other than `i`.
    fn held_by_others(&self, i: usize) -> u32 {
        let mut mask = 0u32;
        for (j, (desc, slot)) in self.table.iter().zip(self.status.iter()).enumerate() {
            if j == i || !slot.engaged || slot.disabled {
                continue;
            }
            for &out in desc.outputs.iter().filter(|&&o| o < 32) {
                mask |= 1 << out;
            }
        }
        mask
    }

    /// Natural next run after an attempt at `now`.
    fn reschedule(&mut self, i: usize, now: Timestamp) {
        let desc = &self.table[i];
        let slot = &mut self.status[i];
        if let Some(t) = desc.next_run_time.and_then(|f| f(desc, slot, now)) {
            slot.next_run = Some(t);
            slot.next_source = NextRunSource::Override;
        } else {
            slot.next_run = desc.schedule.next_run(slot.last_attempt, now, self.skew_minutes);
            slot.next_source = NextRunSource::Schedule;
        }
    }

    /// Schedule-derived run times follow the clock; overrides and retries
    /// are fixed until the controller runs again.
    fn refresh(&mut self, i: usize, now: Timestamp) {
        let desc = &self.table[i];
        let slot = &mut self.status[i];
        if slot.next_source == NextRunSource::Schedule {
            slot.next_run = desc.schedule.next_run(slot.last_attempt, now, self.skew_minutes);
        }
    }

    /// Recompute every run time from scratch, e.g. after the clock was set.
    /// Pending retries are restarted from `now`.
    pub fn reschedule_all(&mut self, now: Timestamp) {
        for i in 0..self.table.len() {
            if self.status[i].next_source == NextRunSource::Retry {
                self.status[i].next_run = Some(now.saturating_add(self.retry_delay_secs));
            } else {
                self.reschedule(i, now);
            }
        }
    }

    /// Earliest pending run time over all enabled controllers.
    pub fn next_wakeup(&mut self, now: Timestamp) -> Option<Timestamp> {
        let mut earliest: Option<Timestamp> = None;
        for i in 0..self.table.len() {
            if self.status[i].disabled {
                continue;
            }
            self.refresh(i, now);
            if let Some(t) = self.status[i].next_run {
                earliest = Some(earliest.map_or(t, |e| e.min(t)));
            }
        }
        earliest
    }

    /// True if any controller carries a warning.
    pub fn any_warning(&self) -> bool {
        self.status.iter().any(|s| s.warning)
    }

    /// Working data of every logged controller.
    pub fn log_entries(&self, by_default: bool) -> impl Iterator<Item = LogEntry> + '_ {
        self.table
            .iter()
            .zip(self.status.iter())
            .filter(move |(d, _)| d.flags.is_logged(by_default))
            .map(|(d, s)| LogEntry {
                kind: DeviceKind::Controller,
                name: d.name,
                value_index: 0,
                value: s.data.log_value(),
            })
    }
}

/// Evaluate the inputs of `desc`.  No inputs means always met; a bad
/// reading is unmet.
fn inputs_met(desc: &ControllerDescriptor, ctx: &mut ControllerCtx<'_, '_>) -> bool {
    if desc.inputs.is_empty() {
        return true;
    }
    let mut any_met = false;
    let mut any_unmet = false;
    for input in desc.inputs {
        let value = match input.source {
            InputSource::Sensor { index, value_index } => {
                ctx.sensors
                    .read_sensor_by_index(ctx.hal, index, false, usize::from(value_index))
            }
            InputSource::TimeOfDay => minute_of_day(ctx.now) as Reading,
        };
        if input.window.matches(value) {
            any_met = true;
        } else {
            any_unmet = true;
        }
    }
    if desc.flags.contains(ControllerFlags::TRIGGER_ANY) {
        any_met
    } else {
        !any_unmet
    }
}
