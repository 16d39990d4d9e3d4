//! ICMP echo reachability with an optional TCP handshake fallback.

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::stream::{FuturesUnordered, StreamExt};
use hickory_resolver::config::ResolverConfig;
use hickory_resolver::name_server::TokioConnectionProvider;
use hickory_resolver::TokioResolver;
use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};
use surge_ping::{Client as PingClient, Config as PingConfig, PingIdentifier, PingSequence, SurgeError, ICMP};
use tokio::net::TcpStream;
use tracing::{debug, info};

use super::ReachabilityProbe;
use crate::error::ProbeErrorKind;
use crate::models::Reachability;

const PAYLOAD: [u8; 56] = [0u8; 56];

pub struct IcmpProbe {
    v4: PingClient,
    v6: Option<PingClient>,
    resolver: TokioResolver,
    ping_count: u32,
    fallback_tcp_ports: Vec<u16>,
}

impl IcmpProbe {
    pub fn new(ping_count: u32, fallback_tcp_ports: Vec<u16>) -> Result<Self> {
        let v4 = PingClient::new(&PingConfig::default())
            .context("Failed to create ICMP client (raw socket privileges?)")?;
        let v6 = PingClient::new(&PingConfig::builder().kind(ICMP::V6).build()).ok();

        let resolver = TokioResolver::builder_with_config(
            ResolverConfig::cloudflare(),
            TokioConnectionProvider::default(),
        )
        .build();

        info!("ICMP prober ready (count: {}, TCP fallback ports: {:?})", ping_count, fallback_tcp_ports);

        Ok(Self {
            v4,
            v6,
            resolver,
            ping_count: ping_count.max(1),
            fallback_tcp_ports,
        })
    }

    async fn resolve(&self, address: &str) -> Result<IpAddr, ProbeErrorKind> {
        if let Ok(ip) = address.parse::<IpAddr>() {
            return Ok(ip);
        }
        match self.resolver.lookup_ip(address).await {
            Ok(lookup) => lookup.iter().next().ok_or(ProbeErrorKind::Unreachable),
            Err(e) => {
                debug!("DNS resolution failed for {}: {}", address, e);
                Err(ProbeErrorKind::Unreachable)
            }
        }
    }

    async fn ping(&self, ip: IpAddr, timeout: Duration) -> Reachability {
        let client = match (ip, &self.v6) {
            (IpAddr::V6(_), Some(v6)) => v6,
            (IpAddr::V6(_), None) => {
                return Reachability::Unreachable { reason: ProbeErrorKind::ProtocolError }
            }
            (IpAddr::V4(_), _) => &self.v4,
        };

        let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
        pinger.timeout(timeout);

        let mut last_error = ProbeErrorKind::Timeout;
        for seq in 0..self.ping_count {
            match pinger.ping(PingSequence(seq as u16), &PAYLOAD).await {
                Ok((_, rtt)) => {
                    let lost = f64::from(seq) / f64::from(seq + 1) * 100.0;
                    return Reachability::Reachable {
                        latency_ms: rtt.as_secs_f64() * 1000.0,
                        loss_pct: lost,
                    };
                }
                Err(e) => last_error = classify(&e),
            }
        }
        Reachability::Unreachable { reason: last_error }
    }

    /// First TCP handshake to succeed on any fallback port.
    async fn tcp_fallback(&self, ip: IpAddr, timeout: Duration) -> Option<f64> {
        let mut attempts: FuturesUnordered<_> = self
            .fallback_tcp_ports
            .iter()
            .map(|&port| tcp_handshake(SocketAddr::new(ip, port), timeout))
            .collect();

        while let Some(result) = attempts.next().await {
            if let Some(latency) = result {
                return Some(latency);
            }
        }
        None
    }
}

fn classify(err: &SurgeError) -> ProbeErrorKind {
    match err {
        SurgeError::Timeout { .. } => ProbeErrorKind::Timeout,
        SurgeError::IOError(_) => ProbeErrorKind::Unreachable,
        _ => ProbeErrorKind::ProtocolError,
    }
}

pub async fn tcp_handshake(addr: SocketAddr, timeout: Duration) -> Option<f64> {
    let start = Instant::now();
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_)) => Some(start.elapsed().as_secs_f64() * 1000.0),
        _ => None,
    }
}

#[async_trait]
impl ReachabilityProbe for IcmpProbe {
    async fn probe(&self, address: &str, timeout: Duration) -> Reachability {
        let address = address.trim();
        if address.is_empty() {
            return Reachability::Unreachable { reason: ProbeErrorKind::Unreachable };
        }
        let ip = match self.resolve(address).await {
            Ok(ip) => ip,
            Err(reason) => return Reachability::Unreachable { reason },
        };

        let outcome = self.ping(ip, timeout).await;
        if outcome.is_reachable() || self.fallback_tcp_ports.is_empty() {
            return outcome;
        }

        match self.tcp_fallback(ip, timeout).await {
            Some(latency_ms) => {
                debug!("{} filters ICMP, answered TCP in {:.1}ms", address, latency_ms);
                Reachability::Reachable { latency_ms, loss_pct: 100.0 }
            }
            None => outcome,
        }
    }
}
