//! # Telemetry Record
//!
//! One sampled reading and its two serialized forms: the durable log line and
//! the remote-store key/payload pair.
//!
//! ## Log Line Format
//!
//! ```text
//! YYYY/MM/DD HH:MM:SS, T:<temperature>C, H:<humidity>%, L:<light>%
//! ```
//!
//! Temperature and humidity carry two decimal places, light is an integer
//! percentage. Lines are CRLF-terminated on disk; the terminator is not part
//! of the value returned by [`TelemetryRecord::to_log_line`].

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::error::{GreenhouseError, Result};

/// A single sampled reading
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetryRecord {
    /// Calendar time of the sample
    pub timestamp: NaiveDateTime,
    /// Air temperature in °C
    pub temperature: f64,
    /// Relative humidity in %
    pub humidity: f64,
    /// Light level in %
    pub light: u8,
}

/// Body of a remote-store write
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RecordPayload {
    pub temperature: f64,
    pub humidity: f64,
    pub light: u8,
}

impl TelemetryRecord {
    pub fn new(timestamp: NaiveDateTime, temperature: f64, humidity: f64, light: u8) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
            light,
        }
    }

    /// Serialize as a durable log line (without terminator)
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::NaiveDate;
    /// use greenhouse_controller::telemetry::record::TelemetryRecord;
    ///
    /// let ts = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap().and_hms_opt(13, 0, 5).unwrap();
    /// let record = TelemetryRecord::new(ts, 24.5, 60.2, 45);
    /// assert_eq!(record.to_log_line(), "2024/05/01 13:00:05, T:24.50C, H:60.20%, L:45%");
    /// ```
    pub fn to_log_line(&self) -> String {
        format!(
            "{}, T:{:.2}C, H:{:.2}%, L:{}%",
            self.timestamp.format("%Y/%m/%d %H:%M:%S"),
            self.temperature,
            self.humidity,
            self.light
        )
    }

    /// Parse a durable log line
    ///
    /// A trailing CR/LF is tolerated. Anything else that deviates from the
    /// field layout, or names an impossible date or time, is rejected.
    ///
    /// # Errors
    ///
    /// Returns `GreenhouseError::Parse` describing the first mismatch
    pub fn parse_line(line: &str) -> Result<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let mut fields = line.split(", ");

        let stamp = next_field(&mut fields, "timestamp")?;
        let temperature = next_field(&mut fields, "temperature")?;
        let humidity = next_field(&mut fields, "humidity")?;
        let light = next_field(&mut fields, "light")?;
        if fields.next().is_some() {
            return Err(parse_error(line, "unexpected trailing fields"));
        }

        let timestamp = parse_timestamp(stamp).ok_or_else(|| parse_error(line, "bad timestamp"))?;

        let temperature = tagged_value(temperature, "T:", "C")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| parse_error(line, "bad temperature"))?;

        let humidity = tagged_value(humidity, "H:", "%")
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite())
            .ok_or_else(|| parse_error(line, "bad humidity"))?;

        let light = tagged_value(light, "L:", "%")
            .and_then(|v| v.parse::<u8>().ok())
            .ok_or_else(|| parse_error(line, "bad light"))?;

        Ok(Self::new(timestamp, temperature, humidity, light))
    }

    /// Remote-store key derived from the timestamp (`YYYYMMDD_HHMMSS`)
    pub fn remote_key(&self) -> String {
        format!(
            "{}{:02}{:02}_{:02}{:02}{:02}",
            self.timestamp.year(),
            self.timestamp.month(),
            self.timestamp.day(),
            self.timestamp.hour(),
            self.timestamp.minute(),
            self.timestamp.second()
        )
    }

    /// Remote-store payload
    pub fn payload(&self) -> RecordPayload {
        RecordPayload {
            temperature: self.temperature,
            humidity: self.humidity,
            light: self.light,
        }
    }
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_log_line())
    }
}

impl FromStr for TelemetryRecord {
    type Err = GreenhouseError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_line(s)
    }
}

fn next_field<'a>(fields: &mut impl Iterator<Item = &'a str>, name: &str) -> Result<&'a str> {
    fields
        .next()
        .ok_or_else(|| GreenhouseError::Parse(format!("missing {} field", name)))
}

fn parse_error(line: &str, reason: &str) -> GreenhouseError {
    GreenhouseError::Parse(format!("{} in {:?}", reason, line))
}

fn tagged_value<'a>(field: &'a str, prefix: &str, suffix: &str) -> Option<&'a str> {
    field.strip_prefix(prefix)?.strip_suffix(suffix)
}

/// `YYYY/MM/DD HH:MM:SS`
fn parse_timestamp(stamp: &str) -> Option<NaiveDateTime> {
    let (date, time) = stamp.split_once(' ')?;

    let mut date = date.split('/').map(str::parse::<u32>);
    let year = i32::try_from(date.next()?.ok()?).ok()?;
    let month = date.next()?.ok()?;
    let day = date.next()?.ok()?;
    if date.next().is_some() {
        return None;
    }

    let mut time = time.split(':').map(str::parse::<u32>);
    let hour = time.next()?.ok()?;
    let minute = time.next()?.ok()?;
    let second = time.next()?.ok()?;
    if time.next().is_some() {
        return None;
    }

    NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(hour, minute, second)
}
