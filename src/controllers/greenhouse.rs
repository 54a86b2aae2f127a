//! Run routines for the greenhouse controllers.
//!
//! Each routine reads its sensors through `desc.inputs` and drives
//! `desc.outputs`, so the same routine works for any board table that
//! wires it up.

use log::{info, warn};

use crate::calendar::{SECONDS_PER_MINUTE, Timestamp};
use crate::error::{Error, Result};
use crate::sensors::{BAD_VALUE, Reading};

use super::{ControllerCtx, ControllerData, ControllerDescriptor, ControllerStatus, InputSource};

/// Turn the fan on above this temperature.
pub const COOL_ON_THRESHOLD: Reading = 30;
/// Turn the fan off below this temperature.
pub const COOL_OFF_THRESHOLD: Reading = 25;
/// Moisture probe reading at or above which the soil counts as dry.
pub const MOIST_READING_DRY: Reading = 10_000;
/// Re-check interval while irrigating.
pub const IRRIGATION_RECHECK_SECS: u32 = 5 * SECONDS_PER_MINUTE;
/// Irrigation stops after this many re-checks.
pub const IRRIGATION_MAX_CYCLES: u8 = 2;

fn first_sensor(desc: &ControllerDescriptor) -> Option<(usize, usize)> {
    desc.inputs.iter().find_map(|input| match input.source {
        InputSource::Sensor { index, value_index } => Some((index, usize::from(value_index))),
        InputSource::TimeOfDay => None,
    })
}

// ── Heartbeat ────────────────────────────────────────────────

/// Counts its own runs.  Shows the device is alive in the log.
pub fn heartbeat_run(
    _desc: &ControllerDescriptor,
    status: &mut ControllerStatus,
    _ctx: &mut ControllerCtx<'_, '_>,
) -> Result<()> {
    let beats = match status.data {
        ControllerData::Counter(n) => n.wrapping_add(1),
        _ => 1,
    };
    status.data = ControllerData::Counter(beats);
    Ok(())
}

// ── Cooling fan ──────────────────────────────────────────────

pub fn cooling_init(
    desc: &ControllerDescriptor,
    _status: &mut ControllerStatus,
    ctx: &mut ControllerCtx<'_, '_>,
) -> Result<()> {
    ctx.set_outputs(desc, 0)
}

/// Hysteresis fan control.  An unknown temperature turns the fan on.
pub fn cooling_run(
    desc: &ControllerDescriptor,
    status: &mut ControllerStatus,
    ctx: &mut ControllerCtx<'_, '_>,
) -> Result<()> {
    let Some((sensor, value_index)) = first_sensor(desc) else {
        return Err(Error::BadArgument);
    };
    let temp = ctx.sensors.read_sensor_by_index(ctx.hal, sensor, false, value_index);
    if temp == BAD_VALUE {
        warn!("{}: temperature unknown, running fan", desc.name);
        ctx.set_outputs(desc, 1)?;
        return Err(Error::Unknown);
    }

    if temp > COOL_ON_THRESHOLD {
        ctx.set_outputs(desc, 1)?;
    } else if temp < COOL_OFF_THRESHOLD {
        ctx.set_outputs(desc, 0)?;
    }
    status.data = ControllerData::Level(temp);
    Ok(())
}

// ── Irrigation ───────────────────────────────────────────────

pub fn irrigation_init(
    desc: &ControllerDescriptor,
    status: &mut ControllerStatus,
    ctx: &mut ControllerCtx<'_, '_>,
) -> Result<()> {
    status.data = ControllerData::Cycles(0);
    ctx.set_outputs(desc, 0)
}

/// Starts watering when the soil is dry, re-checks every
/// [`IRRIGATION_RECHECK_SECS`], and stops once the soil is wet or after
/// [`IRRIGATION_MAX_CYCLES`] re-checks.
pub fn irrigation_run(
    desc: &ControllerDescriptor,
    status: &mut ControllerStatus,
    ctx: &mut ControllerCtx<'_, '_>,
) -> Result<()> {
    let Some(&valve) = desc.outputs.first() else {
        return Err(Error::BadArgument);
    };
    let watering = ctx.actuators.is_actuator_on(ctx.hal, valve);
    let cycles = match status.data {
        ControllerData::Cycles(n) => n,
        _ => 0,
    };

    if !watering {
        if ctx.conditions_met {
            info!("{}: soil dry, starting", desc.name);
            ctx.set_outputs(desc, 1)?;
            status.last_change = Some(ctx.now);
            status.data = ControllerData::Cycles(1);
        } else {
            status.data = ControllerData::Cycles(0);
        }
        return Ok(());
    }

    if cycles >= IRRIGATION_MAX_CYCLES || !ctx.conditions_met {
        info!("{}: stopping after {} cycle(s)", desc.name, cycles);
        ctx.set_outputs(desc, 0)?;
        status.last_change = Some(ctx.now);
        status.data = ControllerData::Cycles(0);
    } else {
        status.data = ControllerData::Cycles(cycles + 1);
    }
    Ok(())
}

/// Re-check shortly while watering; otherwise follow the daily schedule.
pub fn irrigation_next_run(
    _desc: &ControllerDescriptor,
    status: &ControllerStatus,
    now: Timestamp,
) -> Option<Timestamp> {
    match status.data {
        ControllerData::Cycles(n) if n > 0 => Some(now.saturating_add(IRRIGATION_RECHECK_SECS)),
        _ => None,
    }
}

// ── Aerator pump ─────────────────────────────────────────────

pub fn aerator_init(
    desc: &ControllerDescriptor,
    _status: &mut ControllerStatus,
    ctx: &mut ControllerCtx<'_, '_>,
) -> Result<()> {
    ctx.set_outputs(desc, 0)
}

/// Runs the pump while the water level is good.
pub fn aerator_run(
    desc: &ControllerDescriptor,
    status: &mut ControllerStatus,
    ctx: &mut ControllerCtx<'_, '_>,
) -> Result<()> {
    let on = i16::from(ctx.conditions_met);
    if !ctx.conditions_met {
        info!("{}: water level low, pump off", desc.name);
    }
    ctx.set_outputs(desc, on)?;
    status.data = ControllerData::Level(Reading::from(on));
    Ok(())
}
