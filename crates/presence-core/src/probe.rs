use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(5000);

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn reachable(&self, address: &str) -> bool;
}

#[derive(Debug, Clone)]
pub struct TcpProbe {
    pub port: u16,
    pub timeout: Duration,
}

impl Default for TcpProbe {
    fn default() -> Self {
        Self {
            port: 80,
            timeout: DEFAULT_PROBE_TIMEOUT,
        }
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn reachable(&self, address: &str) -> bool {
        if address.is_empty() {
            return false;
        }

        let target = probe_target(address, self.port);
        match timeout(self.timeout, TcpStream::connect(&target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(err)) => {
                debug!(%target, error = %err, "probe failed");
                false
            }
            Err(_) => {
                debug!(%target, timeout_ms = %self.timeout.as_millis(), "probe timed out");
                false
            }
        }
    }
}

pub(crate) fn probe_target(address: &str, port: u16) -> String {
    match address.parse::<IpAddr>() {
        Ok(ip) => SocketAddr::new(ip, port).to_string(),
        Err(_) => format!("{address}:{port}"),
    }
}
