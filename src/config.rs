//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Main configuration structure
#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub network: NetworkConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub cycle: CycleConfig,
}

/// Durable log locations
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default = "default_scratch_file")]
    pub scratch_file: String,
}

/// Light and irrigation schedule thresholds
#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_light_on_hour")]
    pub light_on_hour: u32,

    #[serde(default = "default_light_off_hour")]
    pub light_off_hour: u32,

    #[serde(default = "default_blackout_start_hour")]
    pub blackout_start_hour: u32,

    #[serde(default = "default_blackout_end_hour")]
    pub blackout_end_hour: u32,

    #[serde(default = "default_burst_duration_ms")]
    pub burst_duration_ms: u64,

    #[serde(default = "default_burst_spacing_min")]
    pub burst_spacing_min: u32,

    #[serde(default = "default_bursts_per_cycle")]
    pub bursts_per_cycle: u8,

    #[serde(default = "default_base_interval_min")]
    pub base_interval_min: u32,

    #[serde(default = "default_extended_interval_min")]
    pub extended_interval_min: u32,

    /// Level of the duty-mode input on hosts without a physical pin
    #[serde(default)]
    pub extended_interval: bool,
}

/// Link monitoring configuration
#[derive(Debug, Deserialize, Clone)]
pub struct NetworkConfig {
    #[serde(default = "default_probe_address")]
    pub probe_address: String,

    #[serde(default = "default_probe_timeout_ms")]
    pub probe_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// Remote store configuration
#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_remote_host")]
    pub host: String,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default)]
    pub auth_secret: String,
}

/// Loop periods
#[derive(Debug, Deserialize, Clone)]
pub struct CycleConfig {
    #[serde(default = "default_sample_interval_ms")]
    pub sample_interval_ms: u64,

    #[serde(default = "default_drain_poll_interval_ms")]
    pub drain_poll_interval_ms: u64,
}

// Default value functions
fn default_data_dir() -> String { "./data".to_string() }
fn default_log_file() -> String { "datalog.txt".to_string() }
fn default_scratch_file() -> String { "temp.txt".to_string() }

fn default_light_on_hour() -> u32 { 18 }
fn default_light_off_hour() -> u32 { 22 }
fn default_blackout_start_hour() -> u32 { 21 }
fn default_blackout_end_hour() -> u32 { 7 }
fn default_burst_duration_ms() -> u64 { 30_000 }
fn default_burst_spacing_min() -> u32 { 5 }
fn default_bursts_per_cycle() -> u8 { 4 }
fn default_base_interval_min() -> u32 { 60 }
fn default_extended_interval_min() -> u32 { 120 }

fn default_probe_address() -> String { "example.firebaseio.com:443".to_string() }
fn default_probe_timeout_ms() -> u64 { 2000 }
fn default_poll_interval_ms() -> u64 { 5000 }
fn default_reconnect_attempts() -> u32 { 10 }
fn default_reconnect_delay_ms() -> u64 { 1000 }

fn default_remote_host() -> String { "https://example.firebaseio.com".to_string() }
fn default_collection() -> String { "sensorData".to_string() }

fn default_sample_interval_ms() -> u64 { 2000 }
fn default_drain_poll_interval_ms() -> u64 { 100 }

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_file: default_log_file(),
            scratch_file: default_scratch_file(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            light_on_hour: default_light_on_hour(),
            light_off_hour: default_light_off_hour(),
            blackout_start_hour: default_blackout_start_hour(),
            blackout_end_hour: default_blackout_end_hour(),
            burst_duration_ms: default_burst_duration_ms(),
            burst_spacing_min: default_burst_spacing_min(),
            bursts_per_cycle: default_bursts_per_cycle(),
            base_interval_min: default_base_interval_min(),
            extended_interval_min: default_extended_interval_min(),
            extended_interval: false,
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            probe_address: default_probe_address(),
            probe_timeout_ms: default_probe_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: default_remote_host(),
            collection: default_collection(),
            auth_secret: String::new(),
        }
    }
}

impl Default for CycleConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: default_sample_interval_ms(),
            drain_poll_interval_ms: default_drain_poll_interval_ms(),
        }
    }
}

impl StorageConfig {
    /// Full path of the durable log
    pub fn log_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.log_file)
    }

    /// Full path of the scratch log used while draining
    pub fn scratch_path(&self) -> PathBuf {
        Path::new(&self.data_dir).join(&self.scratch_file)
    }
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use greenhouse_controller::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.storage.data_dir.is_empty() {
            return Err(custom("storage data_dir cannot be empty"));
        }

        if self.storage.log_file.is_empty() || self.storage.scratch_file.is_empty() {
            return Err(custom("storage log_file and scratch_file cannot be empty"));
        }

        if self.storage.log_file == self.storage.scratch_file {
            return Err(custom("storage log_file and scratch_file must differ"));
        }

        // Validate hours of day
        for (name, value) in [
            ("light_on_hour", self.schedule.light_on_hour),
            ("light_off_hour", self.schedule.light_off_hour),
            ("blackout_start_hour", self.schedule.blackout_start_hour),
            ("blackout_end_hour", self.schedule.blackout_end_hour),
        ] {
            if value > 23 {
                return Err(custom(format!("{} must be between 0 and 23", name)));
            }
        }

        if self.schedule.burst_duration_ms == 0 || self.schedule.burst_duration_ms > 300_000 {
            return Err(custom("burst_duration_ms must be between 1 and 300000"));
        }

        if self.schedule.bursts_per_cycle == 0 {
            return Err(custom("bursts_per_cycle must be greater than 0"));
        }

        if self.schedule.burst_spacing_min == 0 {
            return Err(custom("burst_spacing_min must be greater than 0"));
        }

        // A burst must finish before the next one is due
        if self.schedule.burst_duration_ms >= u64::from(self.schedule.burst_spacing_min) * 60_000 {
            return Err(custom("burst_duration_ms must be shorter than burst_spacing_min"));
        }

        for (name, value) in [
            ("base_interval_min", self.schedule.base_interval_min),
            ("extended_interval_min", self.schedule.extended_interval_min),
        ] {
            if value == 0 || value > 1440 {
                return Err(custom(format!("{} must be between 1 and 1440", name)));
            }
            // The whole cycle has to fit before the next cycle start
            let cycle_span = u32::from(self.schedule.bursts_per_cycle - 1).checked_mul(self.schedule.burst_spacing_min);
            if cycle_span.map_or(true, |span| span >= value) {
                return Err(custom(format!("{} is too short for bursts_per_cycle and burst_spacing_min", name)));
            }
        }

        if self.network.probe_address.is_empty() {
            return Err(custom("network probe_address cannot be empty"));
        }

        if self.network.probe_timeout_ms == 0 || self.network.probe_timeout_ms > 60000 {
            return Err(custom("probe_timeout_ms must be between 1 and 60000"));
        }

        if self.network.poll_interval_ms == 0 || self.network.poll_interval_ms > 60000 {
            return Err(custom("poll_interval_ms must be between 1 and 60000"));
        }

        if self.network.reconnect_attempts == 0 {
            return Err(custom("reconnect_attempts must be greater than 0"));
        }

        if self.network.reconnect_delay_ms > 60000 {
            return Err(custom("reconnect_delay_ms must be at most 60000"));
        }

        if !(self.remote.host.starts_with("http://") || self.remote.host.starts_with("https://")) {
            return Err(custom("remote host must start with http:// or https://"));
        }

        if self.remote.collection.is_empty() || self.remote.collection.contains('/') {
            return Err(custom("remote collection must be a single non-empty path segment"));
        }

        if self.cycle.sample_interval_ms == 0 || self.cycle.sample_interval_ms > 60000 {
            return Err(custom("sample_interval_ms must be between 1 and 60000"));
        }

        if self.cycle.drain_poll_interval_ms == 0 || self.cycle.drain_poll_interval_ms > 10000 {
            return Err(custom("drain_poll_interval_ms must be between 1 and 10000"));
        }

        Ok(())
    }
}

fn custom(msg: impl std::fmt::Display) -> crate::error::GreenhouseError {
    crate::error::GreenhouseError::Config(toml::de::Error::custom(msg))
}
