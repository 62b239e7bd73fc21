//! # Hardware Module
//!
//! Seams to the sensors, relays and the duty-mode input.
//!
//! Raw sensor acquisition and pin handling belong to the board; this module
//! only defines what the controller needs from them, validates what comes
//! back, and provides host stand-ins.

pub mod actuator;
pub mod sensors;

pub use actuator::{Actuator, RelayActuator};
pub use sensors::{Reading, SensorSampler, Sensors, SimulatedSensors};

/// Duty-mode input selecting the extended irrigation interval
pub trait DutySignal: Send {
    fn is_asserted(&mut self) -> bool;
}

/// Duty-mode input fixed at startup
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticDutySignal(pub bool);

impl DutySignal for StaticDutySignal {
    fn is_asserted(&mut self) -> bool {
        self.0
    }
}
