//! Trait abstraction for the calendar time source to enable testing

use chrono::{Local, NaiveDate, NaiveDateTime};

use crate::error::{GreenhouseError, Result};

/// Earliest time accepted as a set clock
const MIN_VALID_YEAR: i32 = 2000;

/// Calendar time source
#[cfg_attr(test, mockall::automock)]
pub trait Clock: Send + Sync {
    /// Current local calendar time
    fn now(&self) -> Result<NaiveDateTime>;
}

/// Host wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Result<NaiveDateTime> {
        let now = Local::now().naive_local();
        let floor = NaiveDate::from_ymd_opt(MIN_VALID_YEAR, 1, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(|| GreenhouseError::ClockUnavailable("invalid floor date".to_string()))?;

        // An unset RTC reports the epoch
        if now < floor {
            return Err(GreenhouseError::ClockUnavailable(format!("clock not set ({})", now)));
        }
        Ok(now)
    }
}

/// Read the clock once at startup
///
/// # Errors
///
/// Returns `GreenhouseError::ClockUnavailable`; there is no way to schedule
/// anything without a clock, so callers should stop.
pub fn probe(clock: &dyn Clock) -> Result<NaiveDateTime> {
    clock.now()
}
