//! # Telemetry Module
//!
//! Offline-buffered telemetry pipeline.
//!
//! This module handles:
//! - Serializing readings as durable log lines
//! - Appending at most one line per hour to the journal
//! - Replaying the journal to the remote store once the link is up
//! - Compacting the journal so only unsent lines remain

pub mod drainer;
pub mod journal;
pub mod logger;
pub mod record;
pub mod remote;
