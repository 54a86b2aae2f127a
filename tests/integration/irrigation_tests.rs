//! Time-of-day irrigation: the 17:00 moisture-gated start, re-checks, and
//! suppression on low power.

use crate::mock_hw::{DAY0, MemLog, MockBoard, at, board_monitor, healthy_board};

use ghmon::actuators::{ActuatorDescriptor, ActuatorFlags, output_pin};
use ghmon::app::service::DeviceTables;
use ghmon::config::SystemConfig;
use ghmon::controllers::{ControllerData, ControllerDescriptor, ControllerFlags, ControllerInput, greenhouse};
use ghmon::error::Result;
use ghmon::events::ShutoffRequests;
use ghmon::scheduler::Schedule;
use ghmon::sensors::{Reading, SensorConfig, SensorDescriptor, SensorEnv, SensorFlags, SensorStatus, with_adc};
use ghmon::threshold::Window;
use ghmon::warnings::Warning;
use ghmon::{Monitor, board, pins};

const PROBE_PIN: u8 = 3;
const VALVE_PIN: u8 = 8;
/// The scripted probe reports `raw + PROBE_OFFSET`.
const PROBE_OFFSET: Reading = 8_000;

fn offset_probe(desc: &SensorDescriptor, status: &mut SensorStatus, env: &mut SensorEnv<'_>) -> Result<()> {
    let pin = desc.pin;
    let raw = with_adc(env.hal, |hal| hal.adc_read_pin(pin))?;
    status.values[0] = Reading::from(raw) + PROBE_OFFSET;
    Ok(())
}

static SENSORS: [SensorDescriptor; 1] = [SensorDescriptor {
    name: "MOIST",
    pin: PROBE_PIN,
    value_count: 1,
    cooldown_secs: 120,
    config: SensorConfig::None,
    warn: Window::NONE,
    flags: SensorFlags::EMPTY,
    init: None,
    read: offset_probe,
}];

static ACTUATORS: [ActuatorDescriptor; 1] = [ActuatorDescriptor {
    name: "VALVE",
    pin: VALVE_PIN,
    flags: ActuatorFlags::TRACK_CHANGES,
    init: Some(output_pin::init),
    set: output_pin::set,
    is_on: Some(output_pin::is_on),
}];

static CONTROLLERS: [ControllerDescriptor; 1] = [ControllerDescriptor {
    name: "irrigation-start",
    inputs: &[ControllerInput::sensor(0, Window::at_least(10_000))],
    outputs: &[0],
    schedule: Schedule::at(17, 0),
    run_timeout_secs: 0,
    flags: ControllerFlags::EMPTY,
    init: Some(greenhouse::irrigation_init),
    run: greenhouse::irrigation_run,
    next_run_time: Some(greenhouse::irrigation_next_run),
}];

fn tables() -> DeviceTables<'static> {
    DeviceTables {
        sensors: &SENSORS,
        actuators: &ACTUATORS,
        controllers: &CONTROLLERS,
    }
}

fn monitor_at_five_pm<'t>(moisture: Reading, shutoff: &'t ShutoffRequests) -> (Monitor<'t>, MockBoard) {
    let mut hal = MockBoard::new(at(17, 0));
    hal.adc_raw[usize::from(PROBE_PIN)] = (moisture - PROBE_OFFSET) as u16;
    let mut monitor = Monitor::with_shutoff(tables(), SystemConfig::default(), shutoff).unwrap();
    monitor.init(&mut hal);
    (monitor, hal)
}

#[test]
fn dry_soil_at_five_pm_opens_the_valve() {
    let shutoff = ShutoffRequests::new();
    let (mut monitor, mut hal) = monitor_at_five_pm(10_000, &shutoff);

    assert_eq!(monitor.run_controllers(&mut hal, false), 1);

    assert!(hal.is_on(VALVE_PIN));
    assert_eq!(monitor.actuators().value(0), 1);
    let status = monitor.controllers().status(0).unwrap();
    assert_eq!(status.last_change, Some(at(17, 0)));
    assert_eq!(status.data, ControllerData::Cycles(1));
}

#[test]
fn one_below_threshold_leaves_the_valve_closed() {
    let shutoff = ShutoffRequests::new();
    let (mut monitor, mut hal) = monitor_at_five_pm(9_999, &shutoff);

    assert_eq!(monitor.run_controllers(&mut hal, false), 1);

    assert!(!hal.is_on(VALVE_PIN));
    assert_eq!(monitor.actuators().value(0), 0);
    assert_eq!(monitor.controllers().status(0).unwrap().last_change, None);
}

#[test]
fn watering_rechecks_then_stops_after_two_periods() {
    let shutoff = ShutoffRequests::new();
    let (mut monitor, mut hal) = monitor_at_five_pm(10_000, &shutoff);
    monitor.run_controllers(&mut hal, false);
    assert!(hal.is_on(VALVE_PIN));
    assert_eq!(
        monitor.controllers().status(0).unwrap().next_run,
        Some(at(17, 5))
    );

    // Still dry at the first re-check: keep watering.
    hal.advance(300);
    assert_eq!(monitor.run_controllers(&mut hal, false), 1);
    assert!(hal.is_on(VALVE_PIN));

    // Second re-check hits the cycle limit.
    hal.advance(300);
    assert_eq!(monitor.run_controllers(&mut hal, false), 1);
    assert!(!hal.is_on(VALVE_PIN));
    let status = monitor.controllers().status(0).unwrap();
    assert_eq!(status.last_change, Some(at(17, 10)));
    assert_eq!(status.data, ControllerData::Cycles(0));

    // Back on the daily schedule: nothing until tomorrow.
    hal.advance(300);
    assert_eq!(monitor.run_controllers(&mut hal, false), 0);
    assert_eq!(
        monitor.controllers().status(0).unwrap().next_run,
        Some(DAY0 + 86_400 + 17 * 3600)
    );
}

#[test]
fn wet_soil_at_recheck_closes_the_valve() {
    let shutoff = ShutoffRequests::new();
    let (mut monitor, mut hal) = monitor_at_five_pm(10_000, &shutoff);
    monitor.run_controllers(&mut hal, false);

    hal.adc_raw[usize::from(PROBE_PIN)] = 500;
    hal.advance(300);
    monitor.run_controllers(&mut hal, false);
    assert!(!hal.is_on(VALVE_PIN));
    assert_eq!(monitor.controllers().status(0).unwrap().last_change, Some(at(17, 5)));
}

#[test]
fn board_irrigation_is_suppressed_on_low_battery() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(17, 0));
    hal.set_ohms(pins::GND_MOIST1, 30_000, 10_000);
    hal.set_battery_mv(pins::BAT, 3_200);
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    assert!(monitor.warnings().has(Warning::BatteryLow));

    monitor.run_controllers(&mut hal, false);

    assert!(!hal.is_on(pins::IRR1));
    let status = monitor.controllers().status(board::CONTROLLER_IRR1).unwrap();
    assert!(status.warning);
    assert_eq!(status.last_attempt, Some(at(17, 0)));
    assert!(monitor.warnings().has(Warning::Controller));
}

#[test]
fn board_irrigation_runs_on_a_full_battery() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(17, 0));
    hal.set_ohms(pins::GND_MOIST1, 30_000, 10_000);
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    assert!(monitor.warnings().is_empty());

    monitor.run_controllers(&mut hal, false);

    assert!(hal.is_on(pins::IRR1));
    assert_eq!(monitor.actuators().value(board::ACTUATOR_IRR1), 1);

    // The record shows the valve open.
    let mut log = MemLog::default();
    monitor.log_status(&mut hal, &mut log, true);
    assert!(log.lines[1].ends_with(", 1, 0, 1"), "{}", log.lines[1]);
}
