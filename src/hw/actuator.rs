//! On/off outputs (irrigation motor, grow light).

use tracing::info;

/// Binary output
pub trait Actuator: Send {
    fn set(&mut self, on: bool);
    fn is_on(&self) -> bool;
}

/// Relay that reports its state changes through the log
#[derive(Debug, Clone)]
pub struct RelayActuator {
    name: &'static str,
    on: bool,
}

impl RelayActuator {
    /// New relay, initially off
    pub fn new(name: &'static str) -> Self {
        Self { name, on: false }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl Actuator for RelayActuator {
    fn set(&mut self, on: bool) {
        if self.on != on {
            self.on = on;
            info!("{} turned {}", self.name, if on { "ON" } else { "OFF" });
        }
    }

    fn is_on(&self) -> bool {
        self.on
    }
}
