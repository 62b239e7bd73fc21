//! # Sensors
//!
//! Temperature, humidity and light acquisition.
//!
//! [`SensorSampler`] validates each raw value. A reading that is not a finite
//! number is a sensor read error: it is logged and the previous value is kept,
//! so the schedulers and the logger keep running on stale (or zero) data.

use tracing::warn;

use crate::error::GreenhouseError;

/// Light ADC count that maps to 100 %
pub const LIGHT_RAW_FULL_SCALE: u16 = 1750;

/// Raw sensor access, one value per call
pub trait Sensors: Send {
    /// Air temperature in °C
    fn temperature(&mut self) -> f64;
    /// Relative humidity in %
    fn humidity(&mut self) -> f64;
    /// Light sensor ADC count
    fn light_raw(&mut self) -> u16;
}

/// Validated values of one sampling round
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
    /// Light level in %
    pub light: u8,
}

/// Map a light ADC count to a percentage
pub fn light_percent(raw: u16) -> u8 {
    let clamped = u32::from(raw.min(LIGHT_RAW_FULL_SCALE));
    // Bounded by 100 after clamping
    (clamped * 100 / u32::from(LIGHT_RAW_FULL_SCALE)) as u8
}

/// Validating front end keeping the last good reading
pub struct SensorSampler<S: Sensors> {
    sensors: S,
    last: Reading,
}

impl<S: Sensors> SensorSampler<S> {
    pub fn new(sensors: S) -> Self {
        Self {
            sensors,
            last: Reading::default(),
        }
    }

    /// Last good reading
    pub fn last(&self) -> Reading {
        self.last
    }

    /// Sample every sensor
    ///
    /// Returns the current reading (with stale values where a sensor failed)
    /// and the errors encountered, which have already been logged.
    pub fn sample(&mut self) -> (Reading, Vec<GreenhouseError>) {
        let mut errors = Vec::new();

        match validate("temperature", self.sensors.temperature()) {
            Ok(value) => self.last.temperature = value,
            Err(e) => errors.push(e),
        }
        match validate("humidity", self.sensors.humidity()) {
            Ok(value) => self.last.humidity = value,
            Err(e) => errors.push(e),
        }
        self.last.light = light_percent(self.sensors.light_raw());

        for e in &errors {
            warn!("{}", e);
        }
        (self.last, errors)
    }
}

fn validate(name: &str, value: f64) -> Result<f64, GreenhouseError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GreenhouseError::SensorRead(format!("{} returned {}", name, value)))
    }
}

/// Fixed nominal readings for running without sensor hardware
#[derive(Debug, Clone, Copy)]
pub struct SimulatedSensors {
    pub temperature: f64,
    pub humidity: f64,
    pub light_raw: u16,
}

impl Default for SimulatedSensors {
    fn default() -> Self {
        Self {
            temperature: 24.0,
            humidity: 60.0,
            light_raw: 875,
        }
    }
}

impl Sensors for SimulatedSensors {
    fn temperature(&mut self) -> f64 {
        self.temperature
    }

    fn humidity(&mut self) -> f64 {
        self.humidity
    }

    fn light_raw(&mut self) -> u16 {
        self.light_raw
    }
}
