//! Duty-cycle contract: wake-up planning, button gestures and clock jumps.

use crate::mock_hw::{DAY0, FlashRecorder, MemLog, MockBoard, at, board_monitor, healthy_board};

use ghmon::app::ports::ClockPort;
use ghmon::app::service::DeviceTables;
use ghmon::config::SystemConfig;
use ghmon::controllers::{ControllerCtx, ControllerDescriptor, ControllerFlags, ControllerStatus};
use ghmon::error::Result;
use ghmon::events::ShutoffRequests;
use ghmon::logger::FlushOutcome;
use ghmon::power::{Intent, MAX_SLEEP_SECS};
use ghmon::scheduler::Schedule;
use ghmon::{Monitor, board, pins};

fn noop(_: &ControllerDescriptor, _: &mut ControllerStatus, _: &mut ControllerCtx<'_, '_>) -> Result<()> {
    Ok(())
}

static EVENING_ONLY: [ControllerDescriptor; 1] = [ControllerDescriptor {
    name: "EVENING",
    inputs: &[],
    outputs: &[],
    schedule: Schedule::at(17, 0),
    run_timeout_secs: 0,
    flags: ControllerFlags::EMPTY,
    init: None,
    run: noop,
    next_run_time: None,
}];

#[test]
fn first_cycle_runs_periodic_controllers_and_wakes_for_the_heartbeat() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(6, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();

    let report = monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);

    // FLASHY, FAN1 and PUMP; IRR1 waits for 17:00.
    assert_eq!(report.controllers_run, 3);
    assert!(report.intent.do_controllers);
    assert_eq!(report.wake_at, at(6, 1));
    assert!(hal.is_on(pins::PUMP));
}

#[test]
fn status_and_log_alarms_fire_on_their_period() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(6, 0));
    let config = SystemConfig {
        log_buffer_lines: 1,
        ..SystemConfig::default()
    };
    let mut monitor = board_monitor(&mut hal, config, &shutoff);
    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();

    let mut report = monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);
    while hal.now() < at(6, 15) {
        assert!(!report.intent.do_log);
        hal.now = report.wake_at;
        report = monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);
    }
    assert!(report.intent.do_status);
    assert!(report.intent.do_log);
    assert_eq!(report.log, Some(FlushOutcome::Written(1)));
    // Healthy board: no warning pattern.
    assert!(led.patterns.is_empty());
}

#[test]
fn sleep_is_capped_when_nothing_is_due_for_a_day() {
    let shutoff = ShutoffRequests::new();
    let mut hal = MockBoard::new(at(17, 30));
    let config = SystemConfig {
        status_check_minutes: 0,
        log_append_minutes: 0,
        ..SystemConfig::default()
    };
    let tables = DeviceTables {
        sensors: &[],
        actuators: &[],
        controllers: &EVENING_ONLY,
    };
    let mut monitor = Monitor::with_shutoff(tables, config, &shutoff).unwrap();
    monitor.init(&mut hal);
    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();

    // 17:30 is past the skew window: next run is tomorrow, beyond one sleep.
    let report = monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);
    assert_eq!(report.controllers_run, 0);
    assert_eq!(report.wake_at, at(17, 30) + MAX_SLEEP_SECS);

    // After that sleep, the remaining wait fits.
    hal.now = report.wake_at;
    let report = monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);
    assert_eq!(report.wake_at, DAY0 + 86_400 + 17 * 3600);
}

#[test]
fn two_presses_force_a_log_sync() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(6, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();

    let intent = monitor.handle_button(&mut hal, 2);
    assert!(intent.force_sync);
    let report = monitor.cycle(&mut hal, &mut log, &mut led, intent);
    assert_eq!(report.log, Some(FlushOutcome::Written(1)));
    assert_eq!(log.lines.len(), 2);
}

#[test]
fn three_presses_force_controllers_except_the_heartbeat() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(6, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();
    monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);

    hal.now += 20;
    let intent = monitor.handle_button(&mut hal, 3);
    let report = monitor.cycle(&mut hal, &mut log, &mut led, intent);

    // FAN1, IRR1, PUMP; FLASHY ignores forced runs and is not due.
    assert_eq!(report.controllers_run, 3);
    let flashy = monitor.controllers().status(board::CONTROLLER_FLASHY).unwrap();
    assert_eq!(flashy.run_count, 1);
}

#[test]
fn four_presses_set_the_clock_to_noon() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(6, 7));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);

    let intent = monitor.handle_button(&mut hal, 4);
    assert!(intent.is_empty());
    assert_eq!(hal.now, at(12, 0));

    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();
    let report = monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);
    assert!(report.wake_at > at(12, 0));
    assert!(report.wake_at <= at(12, 1));
}

#[test]
fn backwards_clock_jump_replans_every_alarm() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(6, 0));
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();
    monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);

    // RTC reset to the previous evening.
    hal.now = DAY0 - 3 * 3600;
    let report = monitor.cycle(&mut hal, &mut log, &mut led, Intent::NONE);
    assert!(report.wake_at > hal.now);
    assert!(report.wake_at <= hal.now + 60);
}

#[test]
fn low_battery_flashes_the_power_pattern() {
    let shutoff = ShutoffRequests::new();
    let mut hal = healthy_board(at(6, 0));
    hal.set_battery_mv(pins::BAT, 3_100);
    let mut monitor = board_monitor(&mut hal, SystemConfig::default(), &shutoff);
    let mut log = MemLog::default();
    let mut led = FlashRecorder::default();

    let intent = monitor.handle_button(&mut hal, 1);
    assert!(intent.do_status);
    monitor.cycle(&mut hal, &mut log, &mut led, intent);
    assert_eq!(led.patterns, vec![1]);
}
