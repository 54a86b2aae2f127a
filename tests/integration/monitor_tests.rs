//! Default-board monitor: sensor caching, thermistor conversion, the cooling
//! fallback, asynchronous shutoff and the status log.

use crate::mock_hw::{MemLog, RAW_25C, at, board_monitor, healthy_board};

use ghmon::actuators::ACTUATOR_FAULT;
use ghmon::config::{SystemConfig, TemperatureUnit};
use ghmon::events::ShutoffRequests;
use ghmon::logger::FlushOutcome;
use ghmon::sensors::BAD_VALUE;
use ghmon::warnings::Warning;
use ghmon::{board, pins};

// ── Sensors ───────────────────────────────────────────────────

#[test]
fn thermistor_reads_reference_temperature() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);

    let c = monitor
        .sensors_mut()
        .read_sensor_by_index(&mut hal, board::SENSOR_IN_TEMP1, true, 0);
    assert!((24..=26).contains(&c), "got {}", c);
}

#[test]
fn thermistor_reads_fahrenheit_when_configured() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let config = SystemConfig {
        temperature_unit: TemperatureUnit::Fahrenheit,
        temperature_scale: 10,
        ..SystemConfig::default()
    };
    let mut monitor = board_monitor(&mut hal, config, &shutoff);

    let f10 = monitor
        .sensors_mut()
        .read_sensor_by_name(&mut hal, "IN_TEMP1", true, 0);
    assert!((765..=775).contains(&f10), "got {}", f10);
}

#[test]
fn moisture_probe_honours_its_cooldown() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let sensors = monitor.sensors_mut();

    let first = sensors.read_sensor_by_index(&mut hal, board::SENSOR_GND_MOIST1, true, 0);
    let reads = hal.reads(pins::GND_MOIST1);

    hal.set_ohms(pins::GND_MOIST1, 20_000, 10_000);
    hal.advance(119);
    let cached = sensors.read_sensor_by_index(&mut hal, board::SENSOR_GND_MOIST1, false, 0);
    assert_eq!(cached, first);
    assert_eq!(hal.reads(pins::GND_MOIST1), reads);

    hal.advance(1);
    let fresh = sensors.read_sensor_by_index(&mut hal, board::SENSOR_GND_MOIST1, false, 0);
    assert_ne!(fresh, first);
    assert_eq!(hal.reads(pins::GND_MOIST1), reads + 1);
}

#[test]
fn bulk_check_is_rate_limited_until_invalidated() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);

    hal.advance(5);
    assert!(!monitor.check_sensors(&mut hal, false));
    monitor.invalidate_sensors();
    let reads = hal.reads(pins::IN_TEMP1);
    assert!(monitor.check_sensors(&mut hal, false));
    assert_eq!(hal.reads(pins::IN_TEMP1), reads + 1);
}

#[test]
fn failed_adc_degrades_to_bad_value_and_warns() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    assert!(!monitor.warnings().has(Warning::Sensor));

    hal.adc_fails = true;
    monitor.invalidate_sensors();
    monitor.update_status(&mut hal);

    assert_eq!(monitor.sensors().value(board::SENSOR_IN_TEMP1, 0), BAD_VALUE);
    assert!(monitor.warnings().has(Warning::Sensor));
}

// ── Controllers and actuators ─────────────────────────────────

#[test]
fn unknown_temperature_runs_the_fan() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    assert!(!hal.is_on(pins::FAN1));

    // Open probe: full-scale reading.
    hal.adc_raw[usize::from(pins::IN_TEMP1)] = 4095;
    monitor.invalidate_sensors();
    monitor.run_controllers(&mut hal, false);

    assert!(hal.is_on(pins::FAN1));
    let status = monitor.controllers().status(board::CONTROLLER_FAN1).unwrap();
    assert!(status.result.is_err());
}

#[test]
fn hot_greenhouse_runs_the_fan_until_it_cools() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    // ~36 °C: NTC around 12 kΩ.
    hal.set_ohms(pins::IN_TEMP1, 12_000, 22_000);
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    monitor.run_controllers(&mut hal, false);
    assert!(hal.is_on(pins::FAN1));

    hal.adc_raw[usize::from(pins::IN_TEMP1)] = RAW_25C + 200;
    hal.advance(600);
    monitor.run_controllers(&mut hal, false);
    assert!(!hal.is_on(pins::FAN1));
}

#[test]
fn shutoff_request_forces_the_pump_off_on_next_call() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    monitor.run_controllers(&mut hal, false);
    assert!(hal.is_on(pins::PUMP));

    // Raised from "interrupt context"; nothing changes until the registry runs.
    shutoff.request(board::ACTUATOR_PUMP);
    assert!(hal.is_on(pins::PUMP));

    let on = monitor
        .actuators_mut()
        .is_actuator_on(&mut hal, board::ACTUATOR_PUMP);
    assert!(!on);
    assert!(!hal.is_on(pins::PUMP));
    assert!(!shutoff.pending());
    assert_eq!(monitor.actuators().value(board::ACTUATOR_PUMP), 0);
}

#[test]
fn failed_output_records_fault_and_actuator_warning() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    hal.broken_outputs.push(pins::PUMP);

    monitor.run_controllers(&mut hal, false);
    monitor.update_status(&mut hal);

    assert_eq!(monitor.actuators().value(board::ACTUATOR_PUMP), ACTUATOR_FAULT);
    assert!(monitor.warnings().has(Warning::Actuator));

    let mut log = MemLog::default();
    monitor.log_status(&mut hal, &mut log, true);
    assert!(log.lines[1].ends_with(", FAULT"), "{}", log.lines[1]);
}

// ── Status log ────────────────────────────────────────────────

#[test]
fn log_header_lists_logged_devices_only() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let mut log = MemLog::default();

    assert_eq!(
        monitor.log_status(&mut hal, &mut log, true),
        Some(FlushOutcome::Written(1))
    );
    assert_eq!(
        log.lines[0],
        "TIME, WARN, VCC, S:Vcc, S:BAT, S:IN_TEMP1, S:GND_MOIST1, S:WATER_LVL, \
         C:FAN1, C:IRR1, C:PUMP, A:IRR1, A:FAN1, A:PUMP"
    );
    assert!(log.lines[1].starts_with("2024-05-01 08:00:00, 0x00, 3300, 3300, 4000, 25, "));
    assert_eq!(log.syncs, 1);
}

#[test]
fn log_flushes_when_the_buffer_fills() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let config = SystemConfig {
        log_buffer_lines: 3,
        ..SystemConfig::default()
    };
    let mut monitor = board_monitor(&mut hal, config, &shutoff);
    let mut log = MemLog::default();

    assert_eq!(monitor.log_status(&mut hal, &mut log, false), None);
    assert_eq!(monitor.log_status(&mut hal, &mut log, false), None);
    assert!(log.lines.is_empty());
    assert_eq!(
        monitor.log_status(&mut hal, &mut log, false),
        Some(FlushOutcome::Written(3))
    );
    assert_eq!(log.lines.len(), 4);
    assert!(monitor.logger().is_empty());
}

#[test]
fn failed_write_keeps_records_and_raises_log_error() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let mut log = MemLog {
        fail: true,
        ..MemLog::default()
    };

    assert_eq!(monitor.log_status(&mut hal, &mut log, true), None);
    assert!(monitor.warnings().has(Warning::LogError));
    assert_eq!(monitor.logger().len(), 1);

    log.fail = false;
    assert_eq!(
        monitor.log_status(&mut hal, &mut log, true),
        Some(FlushOutcome::Written(2))
    );
    assert!(!monitor.warnings().has(Warning::LogError));
}

#[test]
fn low_battery_skips_unforced_flushes() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(8, 0));
    hal.set_battery_mv(pins::BAT, 3_200);
    let config = SystemConfig {
        log_buffer_lines: 1,
        ..SystemConfig::default()
    };
    let mut monitor = board_monitor(&mut hal, config, &shutoff);
    let mut log = MemLog::default();

    assert_eq!(
        monitor.log_status(&mut hal, &mut log, false),
        Some(FlushOutcome::Skipped)
    );
    assert!(monitor.warnings().has(Warning::LogSkipped));
    assert!(log.lines.is_empty());

    assert_eq!(
        monitor.log_status(&mut hal, &mut log, true),
        Some(FlushOutcome::Written(1))
    );
    assert!(!monitor.warnings().has(Warning::LogSkipped));
}
