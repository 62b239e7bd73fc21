//! # Scheduler Module
//!
//! Time-of-day driven actuator schedules.
//!
//! This module handles:
//! - Grow light on/off window
//! - Irrigation motor burst cycles with a nightly blackout

pub mod light;
pub mod motor;
