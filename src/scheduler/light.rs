//! Grow light schedule: on for a fixed daily window of hours.

use crate::config::ScheduleConfig;

/// True if `hour` lies in `[start, end)`, wrapping past midnight when `start > end`
pub fn hour_in_window(hour: u32, start: u32, end: u32) -> bool {
    if start <= end {
        (start..end).contains(&hour)
    } else {
        hour >= start || hour < end
    }
}

/// Stateless grow light rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightScheduler {
    on_hour: u32,
    off_hour: u32,
}

impl Default for LightScheduler {
    fn default() -> Self {
        Self {
            on_hour: 18,
            off_hour: 22,
        }
    }
}

impl LightScheduler {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            on_hour: config.light_on_hour,
            off_hour: config.light_off_hour,
        }
    }

    /// Whether the light should be on during `hour`
    #[must_use]
    pub fn is_on(&self, hour: u32) -> bool {
        hour_in_window(hour, self.on_hour, self.off_hour)
    }
}
