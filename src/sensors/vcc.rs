//! Supply voltage via the ADC's internal reference.
//!
//! Also refreshes the shared Vref calibration that the divider sensors
//! scale by.  Between refreshes they use the stale value.

use crate::error::{Error, Result};

use super::{Reading, SensorDescriptor, SensorEnv, SensorStatus, with_adc};

pub fn read(_desc: &SensorDescriptor, status: &mut SensorStatus, env: &mut SensorEnv<'_>) -> Result<()> {
    let mv = with_adc(env.hal, |hal| hal.adc_read_vref_mv())?;
    if mv == 0 {
        return Err(Error::Unknown);
    }
    *env.vref_mv = mv;
    status.values[0] = Reading::from(mv);
    Ok(())
}
