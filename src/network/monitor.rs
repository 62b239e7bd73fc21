//! # Connectivity Monitor
//!
//! Polls the uplink on a fixed period and flips the operating mode:
//!
//! - link up: switch to drain-only so the top-level loop runs a drain pass
//! - link down: fall back to normal operation and try to reconnect
//!
//! Reconnection is bounded (fixed number of probes with a fixed delay) and
//! blocks this loop only. Each mode change is logged once.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::link::Link;
use super::{ModeFlag, OperatingMode};
use crate::config::NetworkConfig;

/// Link state tracked between polls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityState {
    pub connected: bool,
    /// Set once the current outage has been reported
    pub last_transition_logged: bool,
}

/// Periodic link supervisor owning the writer side of the mode flag
pub struct ConnectivityMonitor {
    link: Arc<dyn Link>,
    mode: ModeFlag,
    state: ConnectivityState,
    poll_interval: Duration,
    reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl ConnectivityMonitor {
    pub fn new(link: Arc<dyn Link>, mode: ModeFlag, config: &NetworkConfig) -> Self {
        Self {
            link,
            mode,
            state: ConnectivityState::default(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: Duration::from_millis(config.reconnect_delay_ms),
        }
    }

    pub fn state(&self) -> ConnectivityState {
        self.state
    }

    /// One monitor step
    ///
    /// # Returns
    ///
    /// * `bool` - Link state at the end of the step
    pub async fn poll(&mut self) -> bool {
        if self.link.check().await {
            if !self.state.connected {
                info!("Link connected");
            }
            self.state = ConnectivityState {
                connected: true,
                last_transition_logged: false,
            };

            if self.mode.set(OperatingMode::DrainOnly) != OperatingMode::DrainOnly {
                info!("Switching to {} mode", OperatingMode::DrainOnly);
            }
            return true;
        }

        if self.mode.set(OperatingMode::Normal) != OperatingMode::Normal {
            info!("Link lost, resuming {} mode", OperatingMode::Normal);
        }

        if self.state.last_transition_logged {
            debug!("Link still down, reconnecting");
        } else {
            warn!("Link disconnected, reconnecting");
            self.state.last_transition_logged = true;
        }

        self.state.connected = self.reconnect().await;
        self.state.connected
    }

    /// Probe up to the configured number of times, pausing between probes
    pub async fn reconnect(&self) -> bool {
        for attempt in 1..=self.reconnect_attempts {
            if self.link.check().await {
                info!(attempt, "Reconnected");
                return true;
            }
            debug!(attempt, "Reconnect attempt failed");
            if attempt < self.reconnect_attempts {
                sleep(self.reconnect_delay).await;
            }
        }

        warn!("Reconnect failed after {} attempts", self.reconnect_attempts);
        false
    }

    /// Poll forever on the configured period
    pub async fn run(mut self) {
        let mut ticker = interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.poll().await;
        }
    }
}
