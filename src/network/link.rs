//! Trait abstraction for the uplink to enable testing

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Uplink state as seen by the controller
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Link: Send + Sync {
    /// Last known link state, without blocking
    fn is_connected(&self) -> bool;

    /// Probe the link now and update the known state
    async fn check(&self) -> bool;
}

/// Link probed by opening a TCP connection to a fixed `host:port`
#[derive(Debug)]
pub struct TcpProbeLink {
    address: String,
    timeout: Duration,
    connected: AtomicBool,
}

impl TcpProbeLink {
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
            connected: AtomicBool::new(false),
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl Link for TcpProbeLink {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn check(&self) -> bool {
        let reachable = match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!("Probe of {} failed: {}", self.address, e);
                false
            }
            Err(_) => {
                debug!("Probe of {} timed out after {:?}", self.address, self.timeout);
                false
            }
        };
        self.connected.store(reachable, Ordering::Release);
        reachable
    }
}
