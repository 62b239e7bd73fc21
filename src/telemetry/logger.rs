//! # Hourly Telemetry Logger
//!
//! Appends at most one record per distinct hour value to the durable journal.

use chrono::{NaiveDateTime, Timelike};
use tracing::{error, info};

use super::journal::Journal;
use super::record::TelemetryRecord;
use crate::error::Result;

/// Hour-gated writer in front of a [`Journal`]
#[derive(Debug)]
pub struct TelemetryLogger {
    journal: Journal,
    last_logged_hour: Option<u32>,
}

impl TelemetryLogger {
    pub fn new(journal: Journal) -> Self {
        Self {
            journal,
            last_logged_hour: None,
        }
    }

    /// Hour value of the last logging attempt
    pub fn last_logged_hour(&self) -> Option<u32> {
        self.last_logged_hour
    }

    /// Append `record` if `now` falls in a different hour than the last attempt
    ///
    /// The hour is consumed before the append is tried, so a storage failure
    /// loses that hour's reading rather than retrying every cycle.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - A line was appended
    /// * `Ok(false)` - Already logged this hour
    ///
    /// # Errors
    ///
    /// Returns `GreenhouseError::Storage` if the journal cannot be opened
    pub fn log_if_due(&mut self, now: NaiveDateTime, record: &TelemetryRecord) -> Result<bool> {
        let hour = now.hour();
        if self.last_logged_hour == Some(hour) {
            return Ok(false);
        }
        self.last_logged_hour = Some(hour);

        match self.journal.append(&record.to_log_line()) {
            Ok(()) => {
                info!(hour, "Reading logged to {}", self.journal.path().display());
                Ok(true)
            }
            Err(e) => {
                error!(hour, "Failed to log reading: {}", e);
                Err(e)
            }
        }
    }
}
