//! Monitor service: the scheduler/dispatch core.
//!
//! [`Monitor`] owns the three registries, the warning bitfield, the log
//! buffer and the power-cycle alarms.  It exposes the main-loop entry
//! points; all I/O flows through port traits injected at call sites, so
//! the whole service runs against mock hardware in tests.
//!
//! ```text
//!           Intent ──▶ ┌──────────────────────────────┐ ──▶ wake-up time
//!                      │           Monitor             │
//!  Hal (ADC/GPIO/RTC) ◀▶│ sensors · controllers ·       │ ──▶ LogWriter
//!                      │ actuators · warnings · alarms │ ──▶ Indicator
//!                      └──────────────────────────────┘
//! ```

use log::{info, warn};

use crate::actuators::{ActuatorDescriptor, ActuatorRegistry};
use crate::calendar::{SECONDS_PER_HOUR, Timestamp, day_start};
use crate::config::SystemConfig;
use crate::controllers::{ControllerCtx, ControllerDescriptor, ControllerRegistry};
use crate::error::{Error, Result};
use crate::events::{ACTUATOR_SHUTOFF, ShutoffRequests};
use crate::logger::{FlushOutcome, StatusLogger};
use crate::power::{Alarms, ButtonCommand, Intent};
use crate::sensors::{SensorDescriptor, SensorRegistry};
use crate::warnings::{Warning, Warnings};

use super::ports::{Hal, Indicator, LogWriter};

/// The compiled-in device tables of one board.
#[derive(Clone, Copy)]
pub struct DeviceTables<'t> {
    pub sensors: &'t [SensorDescriptor],
    pub actuators: &'t [ActuatorDescriptor],
    pub controllers: &'t [ControllerDescriptor],
}

/// What one duty cycle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub intent: Intent,
    pub controllers_run: usize,
    pub log: Option<FlushOutcome>,
    pub wake_at: Timestamp,
}

pub struct Monitor<'t> {
    config: SystemConfig,
    sensors: SensorRegistry<'t>,
    actuators: ActuatorRegistry<'t>,
    controllers: ControllerRegistry<'t>,
    logger: StatusLogger,
    warnings: Warnings,
    alarms: Alarms,
}

macro_rules! controller_ctx {
    ($self:ident, $hal:expr) => {
        ControllerCtx::new($hal, &mut $self.sensors, &mut $self.actuators, &mut $self.warnings)
    };
}

impl<'t> Monitor<'t> {
    /// Build the registries.  Fails on an invalid configuration or a table
    /// that does not fit.
    pub fn new(tables: DeviceTables<'t>, config: SystemConfig) -> Result<Self> {
        Self::with_shutoff(tables, config, &ACTUATOR_SHUTOFF)
    }

    /// As [`Monitor::new`], draining actuator shutoffs from `shutoff`
    /// instead of the board-wide ISR mask.
    pub fn with_shutoff(
        tables: DeviceTables<'t>,
        config: SystemConfig,
        shutoff: &'t ShutoffRequests,
    ) -> Result<Self> {
        config.validate().map_err(|e| {
            warn!("Rejecting configuration: {}", e);
            Error::BadArgument
        })?;
        let sensors = SensorRegistry::new(tables.sensors, &config)?;
        let actuators = ActuatorRegistry::with_shutoff(tables.actuators, shutoff)?;
        let controllers =
            ControllerRegistry::new(tables.controllers, sensors.len(), actuators.len(), &config)?;
        Ok(Self {
            logger: StatusLogger::new(&config),
            alarms: Alarms::new(&config, 0),
            warnings: Warnings::new(),
            config,
            sensors,
            actuators,
            controllers,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Initialise every device in descriptor order, take a first reading
    /// and arm the alarms.  Failures are isolated per device.
    pub fn init(&mut self, hal: &mut dyn Hal) {
        let now = hal.now();
        let s = self.sensors.init_all(hal);
        let a = self.actuators.init_all(hal);
        let c = self.controllers.init_all(&mut controller_ctx!(self, &mut *hal));
        if s + a + c > 0 {
            warn!("Init failures: {} sensor(s), {} actuator(s), {} controller(s)", s, a, c);
        }
        self.alarms = Alarms::new(&self.config, now);
        self.update_status(hal);
        info!(
            "Monitor started: {} sensors, {} actuators, {} controllers",
            self.sensors.len(),
            self.actuators.len(),
            self.controllers.len()
        );
    }

    // ── Main-loop entry points ────────────────────────────────

    /// Bulk sensor read.  See [`SensorRegistry::check_sensors`].
    pub fn check_sensors(&mut self, hal: &mut dyn Hal, force: bool) -> bool {
        self.sensors.check_sensors(hal, force)
    }

    /// Drop every cached reading.
    pub fn invalidate_sensors(&mut self) {
        self.sensors.invalidate();
    }

    /// Run ripe controllers (all of them when `force`).
    pub fn run_controllers(&mut self, hal: &mut dyn Hal, force: bool) -> usize {
        self.actuators.service_shutoff_requests(hal);
        self.controllers
            .run_controllers(&mut controller_ctx!(self, hal), force)
    }

    /// Refresh sensors and re-derive the warning bitfield.
    pub fn update_status(&mut self, hal: &mut dyn Hal) {
        self.sensors.check_sensors(hal, false);
        let alerts = self.sensors.evaluate_warnings(self.config.vcc_low_mv);
        self.warnings.eval(Warning::BatteryLow, alerts.battery_low);
        self.warnings.eval(Warning::VccLow, alerts.vcc_low);
        self.warnings.eval(Warning::Sensor, alerts.sensor);
        self.warnings.eval(Warning::Controller, self.controllers.any_warning());
        self.warnings.eval(Warning::Actuator, self.actuators.any_error());
    }

    /// Append a status record, and write the buffer out when it is full or
    /// `force_sync` is set.
    pub fn log_status(
        &mut self,
        hal: &mut dyn Hal,
        writer: &mut dyn LogWriter,
        force_sync: bool,
    ) -> Option<FlushOutcome> {
        let by_default = self.config.log_devices_by_default;
        let entries = self
            .sensors
            .log_entries(by_default)
            .chain(self.controllers.log_entries(by_default))
            .chain(self.actuators.log_entries(by_default));
        let full = self
            .logger
            .append(hal.now(), self.warnings, self.sensors.vref_mv(), entries);
        if !(full || force_sync) {
            return None;
        }
        match self.logger.flush(writer, &mut self.warnings, force_sync) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                warn!("Log flush failed: {}", e);
                None
            }
        }
    }

    /// Translate a button gesture into an intent, handling the gestures
    /// that act immediately.
    pub fn handle_button(&mut self, hal: &mut dyn Hal, presses: u8) -> Intent {
        let cmd = ButtonCommand::from_presses(presses);
        let now = hal.now();
        if cmd == ButtonCommand::SetNoon {
            let noon = day_start(now) + 12 * SECONDS_PER_HOUR;
            match hal.set_time(noon) {
                Ok(()) => {
                    info!("Clock set to 12:00:00");
                    self.clock_changed(noon);
                }
                Err(e) => warn!("Failed to set clock: {}", e),
            }
        }
        let scheduled = self.controllers.next_wakeup(now).is_some();
        cmd.intent(&self.config, scheduled)
    }

    /// Recompute everything time-derived after the clock moved.
    pub fn clock_changed(&mut self, now: Timestamp) {
        self.alarms.rearm(now);
        self.controllers.reschedule_all(now);
        self.sensors.invalidate();
    }

    /// One duty cycle: merge due alarms into `requested`, execute, and
    /// return when to wake next.
    pub fn cycle(
        &mut self,
        hal: &mut dyn Hal,
        writer: &mut dyn LogWriter,
        indicator: &mut dyn Indicator,
        requested: Intent,
    ) -> CycleReport {
        let now = hal.now();
        if self.alarms.observe_clock(now) {
            self.controllers.reschedule_all(now);
            self.sensors.invalidate();
        }

        let mut intent = requested | self.alarms.take_due(now);
        if self.controllers.next_wakeup(now).is_some_and(|t| now >= t) {
            intent.do_controllers = true;
        }

        let mut controllers_run = 0;
        if intent.do_controllers || intent.force_controllers {
            controllers_run = self.run_controllers(hal, intent.force_controllers);
        }
        if intent.do_status || controllers_run > 0 {
            self.update_status(hal);
        }
        let log = if intent.do_log || intent.force_sync {
            self.log_status(hal, writer, intent.force_sync)
        } else {
            None
        };
        if intent.do_status {
            let flashes = self.warnings.led_pattern();
            if flashes > 0 {
                indicator.flash(flashes);
            }
        }

        let now = hal.now();
        let wake_at = self
            .alarms
            .next_wakeup(now, self.controllers.next_wakeup(now));
        CycleReport {
            intent,
            controllers_run,
            log,
            wake_at,
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn warnings(&self) -> Warnings {
        self.warnings
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn sensors(&self) -> &SensorRegistry<'t> {
        &self.sensors
    }

    pub fn sensors_mut(&mut self) -> &mut SensorRegistry<'t> {
        &mut self.sensors
    }

    pub fn actuators(&self) -> &ActuatorRegistry<'t> {
        &self.actuators
    }

    pub fn actuators_mut(&mut self) -> &mut ActuatorRegistry<'t> {
        &mut self.actuators
    }

    pub fn controllers(&self) -> &ControllerRegistry<'t> {
        &self.controllers
    }

    pub fn logger(&self) -> &StatusLogger {
        &self.logger
    }
}
