//! # Irrigation Motor Scheduler
//!
//! Multi-burst duty-cycle controller for the irrigation motor.
//!
//! ## Cycle
//!
//! A cycle starts whenever the minute of the day is an exact multiple of the
//! activation interval (60 minutes, or 120 while the duty-mode signal is
//! asserted). It consists of `bursts_per_cycle` bursts started
//! `burst_spacing_min` minutes apart, each running for `burst_duration_ms`:
//!
//! ```text
//! base      base+5    base+10   base+15     (minutes, defaults)
//! |-30s-|   |-30s-|   |-30s-|   |-30s-|
//! ```
//!
//! ## Blackout
//!
//! During the nightly blackout window the motor is forced off and the cycle
//! is abandoned. This check runs before anything else.
//!
//! ## Day Rollover
//!
//! When the minute of the day drops below the base minute of the last cycle,
//! the base is cleared so the new day's first cycle can start.

use chrono::{NaiveTime, Timelike};
use tracing::{debug, info};

use super::light::hour_in_window;
use crate::config::ScheduleConfig;

/// Inputs of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorInput {
    /// Wall-clock time of day
    pub time: NaiveTime,
    /// Duty-mode signal level (selects the extended interval)
    pub extended_interval: bool,
    /// Monotonic milliseconds, used to time bursts
    pub now_ms: u64,
}

impl MotorInput {
    pub fn new(time: NaiveTime, extended_interval: bool, now_ms: u64) -> Self {
        Self {
            time,
            extended_interval,
            now_ms,
        }
    }

    /// Minutes since midnight
    pub fn minute_of_day(&self) -> u32 {
        self.time.hour() * 60 + self.time.minute()
    }
}

/// What an evaluation changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotorEvent {
    /// Nothing changed
    None,
    /// Motor energized for the given burst (1-based)
    BurstStarted(u8),
    /// Burst finished, more bursts remain in the cycle
    BurstStopped(u8),
    /// Last burst finished, back to idle
    CycleComplete,
    /// Motor de-energized by the blackout window
    ForcedOff,
}

/// Scheduler state, owned by [`MotorScheduler`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MotorCycleState {
    /// 0 = idle, otherwise the number of the current or last burst
    pub phase: u8,
    /// Minute of day of the current cycle's first burst
    pub base_minute: Option<u32>,
    pub motor_on: bool,
    /// Monotonic start of the current or last burst
    pub burst_started_ms: u64,
    /// Waiting for the next burst of this cycle
    pub pending: bool,
}

/// Duty-cycle controller for the irrigation motor
#[derive(Debug, Clone)]
pub struct MotorScheduler {
    blackout_start_hour: u32,
    blackout_end_hour: u32,
    burst_duration_ms: u64,
    burst_spacing_min: u32,
    bursts_per_cycle: u8,
    base_interval_min: u32,
    extended_interval_min: u32,
    state: MotorCycleState,
}

impl Default for MotorScheduler {
    fn default() -> Self {
        Self::new(&ScheduleConfig::default())
    }
}

impl MotorScheduler {
    pub fn new(config: &ScheduleConfig) -> Self {
        Self {
            blackout_start_hour: config.blackout_start_hour,
            blackout_end_hour: config.blackout_end_hour,
            burst_duration_ms: config.burst_duration_ms,
            burst_spacing_min: config.burst_spacing_min,
            bursts_per_cycle: config.bursts_per_cycle,
            base_interval_min: config.base_interval_min,
            extended_interval_min: config.extended_interval_min,
            state: MotorCycleState::default(),
        }
    }

    pub fn state(&self) -> &MotorCycleState {
        &self.state
    }

    pub fn motor_on(&self) -> bool {
        self.state.motor_on
    }

    /// Activation interval for a duty-mode signal level
    pub fn interval_min(&self, extended: bool) -> u32 {
        if extended {
            self.extended_interval_min
        } else {
            self.base_interval_min
        }
    }

    /// Advance the state machine
    ///
    /// Call this periodically (every sampling cycle). The caller drives the
    /// motor output from [`MotorScheduler::motor_on`] afterwards.
    pub fn evaluate(&mut self, input: MotorInput) -> MotorEvent {
        let hour = input.time.hour();
        let minute_of_day = input.minute_of_day();
        let interval = self.interval_min(input.extended_interval);
        let state = &mut self.state;

        if hour_in_window(hour, self.blackout_start_hour, self.blackout_end_hour) {
            let was_on = state.motor_on;
            state.motor_on = false;
            state.phase = 0;
            state.pending = false;
            if was_on {
                info!("Motor forced OFF (blackout)");
                return MotorEvent::ForcedOff;
            }
            return MotorEvent::None;
        }

        if state.base_minute.is_some_and(|base| minute_of_day < base) {
            debug!(minute_of_day, "Day rollover, clearing cycle base");
            state.base_minute = None;
        }

        let mut event = MotorEvent::None;

        if minute_of_day % interval == 0 && state.base_minute != Some(minute_of_day) {
            state.base_minute = Some(minute_of_day);
            state.phase = 1;
            state.pending = false;
            state.motor_on = true;
            state.burst_started_ms = input.now_ms;
            info!(minute_of_day, interval, "Motor ON (run 1)");
            event = MotorEvent::BurstStarted(1);
        }

        if state.motor_on && input.now_ms.saturating_sub(state.burst_started_ms) >= self.burst_duration_ms {
            state.motor_on = false;
            if state.phase > 0 && state.phase < self.bursts_per_cycle {
                state.pending = true;
                info!(phase = state.phase, "Motor OFF");
                event = MotorEvent::BurstStopped(state.phase);
            } else {
                state.phase = 0;
                info!("Motor OFF, cycle complete");
                event = MotorEvent::CycleComplete;
            }
        }

        if state.pending {
            let due = state
                .base_minute
                .map(|base| base + u32::from(state.phase) * self.burst_spacing_min);
            if due == Some(minute_of_day) {
                state.motor_on = true;
                state.burst_started_ms = input.now_ms;
                state.phase += 1;
                state.pending = false;
                info!(phase = state.phase, "Motor ON (run {})", state.phase);
                event = MotorEvent::BurstStarted(state.phase);
            }
        }

        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).unwrap()
    }

    /// Evaluate every 2 s from `start` for `secs` seconds; monotonic time is
    /// `offset_ms` plus the elapsed seconds. Returns (elapsed s, event) pairs.
    fn run(
        motor: &mut MotorScheduler,
        start: NaiveTime,
        secs: u32,
        extended: bool,
        offset_ms: u64,
    ) -> Vec<(u32, MotorEvent)> {
        let mut events = Vec::new();
        for elapsed in (0..secs).step_by(2) {
            let time = start + chrono::Duration::seconds(i64::from(elapsed));
            let now_ms = offset_ms + u64::from(elapsed) * 1000;
            let event = motor.evaluate(MotorInput::new(time, extended, now_ms));
            if event != MotorEvent::None {
                events.push((elapsed, event));
            }
        }
        events
    }

    #[test]
    fn test_four_bursts_per_hourly_cycle() {
        let mut motor = MotorScheduler::default();
        // 07:59:00 through 08:20:00
        let events = run(&mut motor, t(7, 59, 0), 21 * 60, false, 0);

        assert_eq!(
            events,
            vec![
                (60, MotorEvent::BurstStarted(1)),
                (90, MotorEvent::BurstStopped(1)),
                (360, MotorEvent::BurstStarted(2)),
                (390, MotorEvent::BurstStopped(2)),
                (660, MotorEvent::BurstStarted(3)),
                (690, MotorEvent::BurstStopped(3)),
                (960, MotorEvent::BurstStarted(4)),
                (990, MotorEvent::CycleComplete),
            ]
        );
        assert_eq!(motor.state().phase, 0);
        assert_eq!(motor.state().base_minute, Some(480));
        assert!(!motor.motor_on());
    }

    #[test]
    fn test_extended_interval_cycle_at_eight() {
        let mut motor = MotorScheduler::default();

        assert_eq!(motor.evaluate(MotorInput::new(t(8, 0, 0), true, 0)), MotorEvent::BurstStarted(1));
        assert!(motor.motor_on());

        assert_eq!(motor.evaluate(MotorInput::new(t(8, 0, 30), true, 30_000)), MotorEvent::BurstStopped(1));
        assert!(motor.state().pending);

        assert_eq!(motor.evaluate(MotorInput::new(t(8, 4, 58), true, 298_000)), MotorEvent::None);
        assert_eq!(motor.evaluate(MotorInput::new(t(8, 5, 0), true, 300_000)), MotorEvent::BurstStarted(2));
        assert_eq!(motor.state().phase, 2);
    }

    #[test]
    fn test_extended_interval_skips_odd_hours() {
        let mut motor = MotorScheduler::default();
        assert_eq!(motor.evaluate(MotorInput::new(t(9, 0, 0), true, 0)), MotorEvent::None);
        assert_eq!(motor.evaluate(MotorInput::new(t(9, 0, 0), false, 0)), MotorEvent::BurstStarted(1));
    }

    #[test]
    fn test_cycle_starts_once_per_base_minute() {
        let mut motor = MotorScheduler::default();
        let events = run(&mut motor, t(10, 0, 0), 60, false, 0);
        let starts = events.iter().filter(|(_, e)| *e == MotorEvent::BurstStarted(1)).count();
        assert_eq!(starts, 1);
    }

    #[test]
    fn test_no_cycle_between_multiples() {
        let mut motor = MotorScheduler::default();
        let events = run(&mut motor, t(10, 1, 0), 50 * 60, false, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_duty_signal_change_does_not_cut_running_burst() {
        let mut motor = MotorScheduler::default();
        motor.evaluate(MotorInput::new(t(8, 0, 0), false, 0));
        assert_eq!(motor.evaluate(MotorInput::new(t(8, 0, 10), true, 10_000)), MotorEvent::None);
        assert!(motor.motor_on());
        assert_eq!(motor.evaluate(MotorInput::new(t(8, 0, 30), true, 30_000)), MotorEvent::BurstStopped(1));
    }

    #[test]
    fn test_blackout_forces_off_from_any_state() {
        for minute_of_day in (21 * 60..24 * 60).chain(0..7 * 60) {
            let time = t(minute_of_day / 60, minute_of_day % 60, 0);

            // Running
            let mut running = MotorScheduler::default();
            running.evaluate(MotorInput::new(t(20, 0, 0), false, 0));
            assert!(running.motor_on());
            running.evaluate(MotorInput::new(time, false, 1_000));
            assert!(!running.motor_on(), "{} should be dark", time);
            assert_eq!(running.state().phase, 0);
            assert!(!running.state().pending);

            // Pending between bursts
            let mut pending = MotorScheduler::default();
            pending.evaluate(MotorInput::new(t(20, 0, 0), false, 0));
            pending.evaluate(MotorInput::new(t(20, 0, 30), false, 30_000));
            assert!(pending.state().pending);
            assert_eq!(pending.evaluate(MotorInput::new(time, true, 60_000)), MotorEvent::None);
            assert_eq!(pending.state().phase, 0);
            assert!(!pending.state().pending);
            assert!(!pending.motor_on());
        }
    }

    #[test]
    fn test_blackout_reports_forced_off_once() {
        let mut motor = MotorScheduler::default();
        motor.evaluate(MotorInput::new(t(20, 0, 0), false, 0));
        assert!(motor.motor_on());
        assert_eq!(motor.evaluate(MotorInput::new(t(21, 0, 0), false, 2_000)), MotorEvent::ForcedOff);
        assert_eq!(motor.evaluate(MotorInput::new(t(21, 0, 2), false, 4_000)), MotorEvent::None);
    }

    #[test]
    fn test_no_cycle_starts_in_blackout() {
        let mut motor = MotorScheduler::default();
        let events = run(&mut motor, t(21, 0, 0), 10 * 3600, false, 0);
        assert!(events.is_empty());
    }

    #[test]
    fn test_day_rollover_allows_morning_cycle() {
        let mut motor = MotorScheduler::default();
        run(&mut motor, t(20, 0, 0), 20 * 60, false, 0);
        assert_eq!(motor.state().base_minute, Some(1200));

        // Next morning
        let event = motor.evaluate(MotorInput::new(t(7, 0, 0), false, 40_000_000));
        assert_eq!(event, MotorEvent::BurstStarted(1));
        assert_eq!(motor.state().base_minute, Some(420));
    }

    #[test]
    fn test_rollover_without_blackout() {
        let config = ScheduleConfig {
            blackout_start_hour: 0,
            blackout_end_hour: 0,
            ..ScheduleConfig::default()
        };
        let mut motor = MotorScheduler::new(&config);
        motor.evaluate(MotorInput::new(t(23, 0, 0), false, 0));
        assert_eq!(motor.state().base_minute, Some(1380));

        assert_eq!(motor.evaluate(MotorInput::new(t(0, 0, 0), false, 3_600_000)), MotorEvent::BurstStarted(1));
        assert_eq!(motor.state().base_minute, Some(0));
    }

    #[test]
    fn test_burst_lasts_configured_duration() {
        let config = ScheduleConfig {
            burst_duration_ms: 10_000,
            bursts_per_cycle: 2,
            ..ScheduleConfig::default()
        };
        let mut motor = MotorScheduler::new(&config);
        let events = run(&mut motor, t(12, 0, 0), 6 * 60, false, 5_000);
        assert_eq!(
            events,
            vec![
                (0, MotorEvent::BurstStarted(1)),
                (10, MotorEvent::BurstStopped(1)),
                (300, MotorEvent::BurstStarted(2)),
                (310, MotorEvent::CycleComplete),
            ]
        );
    }
}
