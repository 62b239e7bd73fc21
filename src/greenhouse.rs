//! # Sensor / Actuator Cycle
//!
//! The periodic loop that samples the sensors, drives the grow light and the
//! irrigation motor, and writes the hourly telemetry record. It only runs
//! while the operating mode is normal; during a drain pass it idles.

use chrono::{NaiveDateTime, Timelike};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};

use crate::clock::Clock;
use crate::config::ScheduleConfig;
use crate::hw::{Actuator, DutySignal, SensorSampler, Sensors};
use crate::network::ModeFlag;
use crate::scheduler::light::LightScheduler;
use crate::scheduler::motor::{MotorEvent, MotorInput, MotorScheduler};
use crate::telemetry::logger::TelemetryLogger;
use crate::telemetry::record::TelemetryRecord;

/// Actuator outputs driven by the cycle
pub struct Outputs {
    pub motor: Box<dyn Actuator>,
    pub light: Box<dyn Actuator>,
}

/// Result of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Mode is not normal
    Paused,
    /// Clock could not be read
    NoClock,
    Ran {
        motor: MotorEvent,
        light_on: bool,
        logged: bool,
    },
}

/// Sensor / actuator cycle
pub struct GreenhouseCycle<S: Sensors> {
    clock: Arc<dyn Clock>,
    sampler: SensorSampler<S>,
    duty: Box<dyn DutySignal>,
    light: LightScheduler,
    motor: MotorScheduler,
    logger: TelemetryLogger,
    outputs: Outputs,
    mode: ModeFlag,
    started: Instant,
}

impl<S: Sensors> GreenhouseCycle<S> {
    pub fn new(
        schedule: &ScheduleConfig,
        clock: Arc<dyn Clock>,
        sensors: S,
        duty: Box<dyn DutySignal>,
        logger: TelemetryLogger,
        outputs: Outputs,
        mode: ModeFlag,
    ) -> Self {
        Self {
            clock,
            sampler: SensorSampler::new(sensors),
            duty,
            light: LightScheduler::new(schedule),
            motor: MotorScheduler::new(schedule),
            logger,
            outputs,
            mode,
            started: Instant::now(),
        }
    }

    pub fn motor(&self) -> &MotorScheduler {
        &self.motor
    }

    /// Run one iteration using the process monotonic clock
    pub fn tick(&mut self) -> TickOutcome {
        let now_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.tick_at(now_ms)
    }

    /// Run one iteration at monotonic time `now_ms`
    pub fn tick_at(&mut self, now_ms: u64) -> TickOutcome {
        if !self.mode.is_normal() {
            return TickOutcome::Paused;
        }

        let now = match self.clock.now() {
            Ok(now) => now,
            Err(e) => {
                error!("Skipping cycle: {}", e);
                return TickOutcome::NoClock;
            }
        };

        let (reading, _errors) = self.sampler.sample();

        let motor = self.motor.evaluate(MotorInput::new(now.time(), self.duty.is_asserted(), now_ms));
        self.outputs.motor.set(self.motor.motor_on());

        let light_on = self.light.is_on(now.hour());
        self.outputs.light.set(light_on);

        let record = TelemetryRecord::new(now, reading.temperature, reading.humidity, reading.light);
        let logged = self.log(now, &record);

        TickOutcome::Ran {
            motor,
            light_on,
            logged,
        }
    }

    fn log(&mut self, now: NaiveDateTime, record: &TelemetryRecord) -> bool {
        // Storage errors are already reported by the logger
        self.logger.log_if_due(now, record).unwrap_or(false)
    }

    /// Switch every output off
    pub fn shutdown(&mut self) {
        self.outputs.motor.set(false);
        self.outputs.light.set(false);
        debug!("Outputs switched off");
    }

    /// Tick forever on `period`
    pub async fn run(mut self, period: Duration) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.tick();
        }
    }
}

impl<S: Sensors> Drop for GreenhouseCycle<S> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
