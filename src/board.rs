//! Default board instance: the greenhouse example configuration.
//!
//! ```text
//!   Sensors                 Controllers               Actuators
//!   0 Vcc                   FLASHY  every 1 min
//!   1 BAT                   FAN1    every 10 min ───▶ 1 FAN1
//!   2 IN_TEMP1 ──────────▶  │
//!   3 GND_MOIST1 ────────▶  IRR1    17:00 daily ───▶ 0 IRR1
//!   4 WATER_LVL ─────────▶  PUMP    every 15 min ───▶ 2 PUMP
//! ```
//!
//! Table order matters: controllers run in the order listed and the index
//! constants below must match the array positions.

use crate::actuators::{ActuatorDescriptor, ActuatorFlags, output_pin};
use crate::app::ports::{Bias, PinState};
use crate::app::service::DeviceTables;
use crate::controllers::{ControllerDescriptor, ControllerFlags, ControllerInput, greenhouse};
use crate::pins;
use crate::scheduler::Schedule;
use crate::sensors::{
    DividerConfig, LevelConfig, ResistanceConfig, SensorConfig, SensorDescriptor, SensorFlags,
    ThermistorConfig, divider, level_switch, thermistor, vcc,
};
use crate::threshold::Window;

// ---------------------------------------------------------------------------
// Sensors
// ---------------------------------------------------------------------------

pub const SENSOR_VCC: usize = 0;
pub const SENSOR_BAT: usize = 1;
pub const SENSOR_IN_TEMP1: usize = 2;
pub const SENSOR_GND_MOIST1: usize = 3;
pub const SENSOR_WATER_LVL: usize = 4;

/// Battery below this is "low", mV.
pub const BATTERY_LOW_MV: i32 = 3_500;

/// 20 kΩ NTC, beta 3950, on a 22 kΩ series resistor.
pub const IN_TEMP1_PROBE: ThermistorConfig = ThermistorConfig {
    beta: 3950,
    ref_ohms: 20_000,
    ref_centi_celsius: 2500,
    series_ohms: 22_000,
    series_low_side: false,
};

pub static SENSORS: [SensorDescriptor; 5] = [
    SensorDescriptor {
        name: "Vcc",
        pin: pins::NONE,
        value_count: 1,
        cooldown_secs: 0,
        config: SensorConfig::Vcc,
        warn: Window::NONE,
        flags: SensorFlags::VCC,
        init: None,
        read: vcc::read,
    },
    SensorDescriptor {
        name: "BAT",
        pin: pins::BAT,
        value_count: 1,
        cooldown_secs: 0,
        config: SensorConfig::Millivolts(DividerConfig {
            high_side_ohms: 100_000,
            low_side_ohms: 100_000,
        }),
        warn: Window::below(BATTERY_LOW_MV),
        flags: SensorFlags::BATTERY,
        init: None,
        read: divider::read_millivolts,
    },
    SensorDescriptor {
        name: "IN_TEMP1",
        pin: pins::IN_TEMP1,
        value_count: 1,
        cooldown_secs: 0,
        config: SensorConfig::Thermistor(IN_TEMP1_PROBE),
        warn: Window::NONE,
        flags: SensorFlags::EMPTY,
        init: Some(thermistor::init),
        read: thermistor::read,
    },
    SensorDescriptor {
        name: "GND_MOIST1",
        pin: pins::GND_MOIST1,
        value_count: 1,
        // The probe corrodes when powered; keep reads sparse.
        cooldown_secs: 120,
        config: SensorConfig::Ohms(ResistanceConfig {
            series_ohms: 10_000,
            series_low_side: false,
        }),
        warn: Window::NONE,
        flags: SensorFlags::EMPTY,
        init: None,
        read: divider::read_ohms,
    },
    SensorDescriptor {
        name: "WATER_LVL",
        pin: pins::WATER_LVL,
        value_count: 1,
        cooldown_secs: 0,
        config: SensorConfig::LevelSwitch(LevelConfig {
            bias: Bias::High,
            active: PinState::Low,
        }),
        warn: Window::NONE,
        flags: SensorFlags::EMPTY,
        init: None,
        read: level_switch::read,
    },
];

// ---------------------------------------------------------------------------
// Actuators
// ---------------------------------------------------------------------------

pub const ACTUATOR_IRR1: usize = 0;
pub const ACTUATOR_FAN1: usize = 1;
pub const ACTUATOR_PUMP: usize = 2;

const TRACKED: ActuatorFlags = ActuatorFlags::TRACK_CHANGES.union(ActuatorFlags::TRACK_ON_TIME);

pub static ACTUATORS: [ActuatorDescriptor; 3] = [
    ActuatorDescriptor {
        name: "IRR1",
        pin: pins::IRR1,
        flags: TRACKED,
        init: Some(output_pin::init),
        set: output_pin::set,
        is_on: Some(output_pin::is_on),
    },
    ActuatorDescriptor {
        name: "FAN1",
        pin: pins::FAN1,
        flags: TRACKED,
        init: Some(output_pin::init),
        set: output_pin::set,
        is_on: Some(output_pin::is_on),
    },
    ActuatorDescriptor {
        name: "PUMP",
        pin: pins::PUMP,
        flags: TRACKED,
        init: Some(output_pin::init),
        set: output_pin::set,
        is_on: Some(output_pin::is_on),
    },
];

// ---------------------------------------------------------------------------
// Controllers
// ---------------------------------------------------------------------------

pub const CONTROLLER_FLASHY: usize = 0;
pub const CONTROLLER_FAN1: usize = 1;
pub const CONTROLLER_IRR1: usize = 2;
pub const CONTROLLER_PUMP: usize = 3;

pub static CONTROLLERS: [ControllerDescriptor; 4] = [
    ControllerDescriptor {
        name: "FLASHY",
        inputs: &[],
        outputs: &[],
        schedule: Schedule::every(1),
        run_timeout_secs: 0,
        flags: ControllerFlags::IGNORE_FORCED_RUN
            .union(ControllerFlags::NOLOG)
            .union(ControllerFlags::IGNORE_POWER),
        init: None,
        run: greenhouse::heartbeat_run,
        next_run_time: None,
    },
    ControllerDescriptor {
        name: "FAN1",
        inputs: &[ControllerInput::sensor(
            SENSOR_IN_TEMP1,
            Window::above(greenhouse::COOL_ON_THRESHOLD),
        )],
        outputs: &[ACTUATOR_FAN1],
        schedule: Schedule::every(10),
        run_timeout_secs: 0,
        flags: ControllerFlags::EMPTY,
        init: Some(greenhouse::cooling_init),
        run: greenhouse::cooling_run,
        next_run_time: None,
    },
    ControllerDescriptor {
        name: "IRR1",
        inputs: &[ControllerInput::sensor(
            SENSOR_GND_MOIST1,
            Window::at_least(greenhouse::MOIST_READING_DRY),
        )],
        outputs: &[ACTUATOR_IRR1],
        schedule: Schedule::at(17, 0),
        run_timeout_secs: 0,
        flags: ControllerFlags::EMPTY,
        init: Some(greenhouse::irrigation_init),
        run: greenhouse::irrigation_run,
        next_run_time: Some(greenhouse::irrigation_next_run),
    },
    ControllerDescriptor {
        name: "PUMP",
        inputs: &[ControllerInput::sensor(SENSOR_WATER_LVL, Window::above(0))],
        outputs: &[ACTUATOR_PUMP],
        schedule: Schedule::every(15),
        run_timeout_secs: 0,
        flags: ControllerFlags::EMPTY,
        init: Some(greenhouse::aerator_init),
        run: greenhouse::aerator_run,
        next_run_time: None,
    },
];

/// The default board's device tables.
pub fn tables() -> DeviceTables<'static> {
    DeviceTables {
        sensors: &SENSORS,
        actuators: &ACTUATORS,
        controllers: &CONTROLLERS,
    }
}
