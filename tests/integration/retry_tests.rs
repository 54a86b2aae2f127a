//! Controller retry bookkeeping and failure isolation through the monitor.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::mock_hw::{MockBoard, at};

use ghmon::app::service::DeviceTables;
use ghmon::config::SystemConfig;
use ghmon::controllers::{ControllerCtx, ControllerDescriptor, ControllerFlags, ControllerPhase, ControllerStatus};
use ghmon::error::{Error, Result};
use ghmon::events::ShutoffRequests;
use ghmon::scheduler::Schedule;
use ghmon::warnings::Warning;
use ghmon::Monitor;

fn always_retry(_: &ControllerDescriptor, _: &mut ControllerStatus, _: &mut ControllerCtx<'_, '_>) -> Result<()> {
    Err(Error::Retry)
}

fn always_fail(_: &ControllerDescriptor, _: &mut ControllerStatus, _: &mut ControllerCtx<'_, '_>) -> Result<()> {
    Err(Error::Unknown)
}

static NEIGHBOUR_RUNS: AtomicU32 = AtomicU32::new(0);

fn counted(_: &ControllerDescriptor, _: &mut ControllerStatus, _: &mut ControllerCtx<'_, '_>) -> Result<()> {
    NEIGHBOUR_RUNS.fetch_add(1, Ordering::Relaxed);
    Ok(())
}

const fn hourly(name: &'static str, run: ghmon::controllers::ControllerRunFn) -> ControllerDescriptor {
    ControllerDescriptor {
        name,
        inputs: &[],
        outputs: &[],
        schedule: Schedule::every(60),
        run_timeout_secs: 0,
        flags: ControllerFlags::EMPTY,
        init: None,
        run,
        next_run_time: None,
    }
}

static RETRYING: [ControllerDescriptor; 1] = [hourly("RETRY", always_retry)];
static ISOLATED: [ControllerDescriptor; 2] = [hourly("BROKEN", always_fail), hourly("NEIGHBOUR", counted)];

fn monitor<'t>(controllers: &'t [ControllerDescriptor], shutoff: &'t ShutoffRequests, hal: &mut MockBoard) -> Monitor<'t> {
    let tables = DeviceTables {
        sensors: &[],
        actuators: &[],
        controllers,
    };
    let mut m = Monitor::with_shutoff(tables, SystemConfig::default(), shutoff).unwrap();
    m.init(hal);
    m
}

#[test]
fn retries_are_bounded_then_wait_for_the_next_occurrence() {
    let shutoff = ShutoffRequests::new();
    let mut hal = MockBoard::new(at(9, 0));
    let mut m = monitor(&RETRYING, &shutoff, &mut hal);
    let config = SystemConfig::default();
    let delay = u32::from(config.controller_retry_delay_secs);

    // First attempt plus `controller_retry_max` retries.
    for attempt in 0..=u32::from(config.controller_retry_max) {
        assert_eq!(m.run_controllers(&mut hal, false), 1, "attempt {}", attempt);
        hal.advance(delay);
    }
    let last_attempt = at(9, 0) + u32::from(config.controller_retry_max) * delay;

    let status = m.controllers().status(0).unwrap();
    assert_eq!(status.phase, ControllerPhase::Failed);
    assert!(status.warning);
    assert_eq!(status.run_count, u32::from(config.controller_retry_max) + 1);
    assert_eq!(status.last_error, Some(Error::Retry));
    m.update_status(&mut hal);
    assert!(m.warnings().has(Warning::Controller));

    // No more retries before the natural period elapses.
    while hal.now < last_attempt + 3600 {
        assert_eq!(m.run_controllers(&mut hal, false), 0);
        hal.advance(delay);
    }
    assert_eq!(m.run_controllers(&mut hal, false), 1);
    assert_eq!(m.controllers().status(0).unwrap().phase, ControllerPhase::Retrying);
}

#[test]
fn one_failing_controller_does_not_stop_the_pass() {
    let shutoff = ShutoffRequests::new();
    let mut hal = MockBoard::new(at(9, 0));
    let mut m = monitor(&ISOLATED, &shutoff, &mut hal);

    let before = NEIGHBOUR_RUNS.load(Ordering::Relaxed);
    assert_eq!(m.run_controllers(&mut hal, false), 2);
    assert_eq!(NEIGHBOUR_RUNS.load(Ordering::Relaxed), before + 1);

    assert_eq!(m.controllers().status(0).unwrap().phase, ControllerPhase::Failed);
    assert_eq!(m.controllers().status(1).unwrap().phase, ControllerPhase::Succeeded);
}
