use std::net::IpAddr;
use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::net::lookup_host;

use super::types::EndpointStatus;
use crate::catalog::Endpoint;

/// Issues one reachability probe against one endpoint.
///
/// Unreachable is a normal verdict, not an error: implementations never
/// fail, they report what they observed. Implementations perform no stateful
/// writes.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, endpoint: &Endpoint) -> EndpointStatus;
}

const ECHO_PAYLOAD: [u8; 56] = [0; 56];

/// ICMP echo prober.
///
/// Sends up to `retries` echo requests with a per-attempt timeout, so total
/// wall time is bounded by `retries * timeout_ms`. The endpoint is reachable
/// if at least one reply arrives; the reported latency is the mean RTT of
/// the successful attempts.
pub struct PingProber {
    client_v4: Client,
    client_v6: Client,
}

impl PingProber {
    /// Needs permission to open ICMP sockets (raw, or unprivileged ICMP
    /// where the platform allows it).
    pub fn new() -> Result<Self> {
        Ok(Self {
            client_v4: Client::new(&Config::default())?,
            client_v6: Client::new(&Config::builder().kind(ICMP::V6).build())?,
        })
    }

    async fn resolve(hostname: &str) -> Result<IpAddr> {
        if let Ok(addr) = hostname.parse::<IpAddr>() {
            return Ok(addr);
        }

        // lookup_host wants a port; it is discarded.
        let mut addrs = lookup_host((hostname, 0)).await?;
        addrs.next().map(|addr| addr.ip()).ok_or_else(|| anyhow!("no addresses for {hostname}"))
    }
}

#[async_trait]
impl Prober for PingProber {
    async fn probe(&self, endpoint: &Endpoint) -> EndpointStatus {
        let status = EndpointStatus::new(endpoint.id);

        let addr = match Self::resolve(&endpoint.hostname).await {
            Ok(addr) => addr,
            Err(e) => {
                return status
                    .unreachable(format!("failed to resolve {}: {e}", endpoint.hostname));
            }
        };

        let client = match addr {
            IpAddr::V4(_) => &self.client_v4,
            IpAddr::V6(_) => &self.client_v6,
        };

        let mut pinger = client.pinger(addr, PingIdentifier(rand::random())).await;
        pinger.timeout(Duration::from_millis(endpoint.timeout_ms));

        let attempts = endpoint.retries.max(1);
        let mut rtts = Vec::with_capacity(attempts as usize);

        for seq in 0..attempts {
            if let Ok((_packet, rtt)) = pinger.ping(PingSequence(seq as u16), &ECHO_PAYLOAD).await
            {
                rtts.push(rtt.as_secs_f64() * 1000.0);
            }
        }

        if rtts.is_empty() {
            status.unreachable(format!("no reply from {addr} ({attempts} attempts sent)"))
        } else {
            let mean = rtts.iter().sum::<f64>() / rtts.len() as f64;
            status.reachable(mean)
        }
    }
}
