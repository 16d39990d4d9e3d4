//! Probe executors
//!
//! Two independent probes run against a link's address: ICMP reachability and
//! an SNMP device-health query. Both are stateless and bounded by a hard
//! timeout, enforced here again around whatever implementation is plugged in.

pub mod icmp;
pub mod snmp;
pub mod vendor;

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::config::ProbeSettings;
use crate::error::ProbeErrorKind;
use crate::models::{HealthOutcome, Link, ProbeResult, Reachability};

pub use icmp::IcmpProbe;
pub use snmp::SnmpHealthProbe;
pub use vendor::{Vendor, VendorProfile};

#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self, address: &str, timeout: Duration) -> Reachability;
}

/// Credentials and device family for one health query.
#[derive(Debug, Clone, Copy)]
pub struct HealthTarget<'a> {
    pub address: &'a str,
    pub community: &'a str,
    pub vendor: Vendor,
}

#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn query(&self, target: HealthTarget<'_>, timeout: Duration) -> HealthOutcome;
}

/// Runs reachability with a hard upper bound.
pub async fn bounded_reachability(
    probe: &dyn ReachabilityProbe,
    address: &str,
    timeout: Duration,
    budget: Duration,
) -> Reachability {
    match tokio::time::timeout(budget, probe.probe(address, timeout)).await {
        Ok(outcome) => outcome,
        Err(_) => Reachability::Unreachable { reason: ProbeErrorKind::Timeout },
    }
}

/// Runs a health query with a hard upper bound.
pub async fn bounded_health(
    probe: &dyn HealthProbe,
    target: HealthTarget<'_>,
    timeout: Duration,
    budget: Duration,
) -> HealthOutcome {
    match tokio::time::timeout(budget, probe.query(target, timeout)).await {
        Ok(outcome) => outcome,
        Err(_) => HealthOutcome::Failed { reason: ProbeErrorKind::Timeout },
    }
}

/// Probes one link: reachability first, health only when reachable.
pub struct LinkProber {
    reachability: Arc<dyn ReachabilityProbe>,
    health: Arc<dyn HealthProbe>,
    settings: ProbeSettings,
}

impl LinkProber {
    pub fn new(
        reachability: Arc<dyn ReachabilityProbe>,
        health: Arc<dyn HealthProbe>,
        settings: ProbeSettings,
    ) -> Self {
        Self { reachability, health, settings }
    }

    pub fn settings(&self) -> &ProbeSettings {
        &self.settings
    }

    pub fn reachability(&self) -> Arc<dyn ReachabilityProbe> {
        Arc::clone(&self.reachability)
    }

    pub fn health(&self) -> Arc<dyn HealthProbe> {
        Arc::clone(&self.health)
    }

    pub fn health_target<'a>(&'a self, link: &'a Link) -> HealthTarget<'a> {
        HealthTarget {
            address: &link.client_ip,
            community: link
                .snmp_community
                .as_deref()
                .unwrap_or(&self.settings.snmp_community),
            vendor: Vendor::detect(link.vendor.as_deref(), link.model.as_deref()),
        }
    }

    pub async fn probe_link(&self, link: &Link) -> ProbeResult {
        let attempted_at = Utc::now();
        let reachability = bounded_reachability(
            self.reachability.as_ref(),
            &link.client_ip,
            self.settings.ping_timeout(),
            self.settings.reachability_budget(),
        )
        .await;

        let health = if reachability.is_reachable() {
            let target = self.health_target(link);
            if target.vendor == Vendor::Unsupported {
                HealthOutcome::Skipped
            } else {
                bounded_health(
                    self.health.as_ref(),
                    target,
                    self.settings.snmp_timeout(),
                    self.settings.snmp_timeout() * 2,
                )
                .await
            }
        } else {
            HealthOutcome::Skipped
        };

        debug!(link_id = %link.link_id, ?reachability, ?health, "probe complete");

        ProbeResult {
            link_id: link.link_id.clone(),
            attempted_at,
            reachability,
            health,
        }
    }
}
