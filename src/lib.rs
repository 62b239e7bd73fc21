//! # Greenhouse Controller Library
//!
//! Irrigation, grow-light and telemetry control for a small greenhouse.
//!
//! Two loops run side by side: the sensor/actuator cycle drives the grow light
//! and the irrigation motor and logs one reading per hour to a durable
//! journal, while the connectivity monitor watches the uplink. When the link
//! comes up the controller switches to drain-only mode and replays the journal
//! to the remote store, keeping every line it could not send.

pub mod clock;
pub mod config;
pub mod error;
pub mod greenhouse;
pub mod hw;
pub mod network;
pub mod scheduler;
pub mod telemetry;
