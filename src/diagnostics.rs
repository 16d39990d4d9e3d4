//! On-demand three-hop trace
//!
//! Probes the gateway, the base station and the client radio of one link and
//! reports every hop, even when an earlier one is down: the point is to find
//! where the path breaks. Never touches the poller's status records.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::engine::MonitorState;
use crate::error::{MonitorError, Result};
use crate::models::{HealthOutcome, HopKind, HopResult, HopStatus, Link, Reachability, TraceReport, TraceVerdict};
use crate::probe::{bounded_health, bounded_reachability, LinkProber, Vendor};
use crate::store::InventorySource;

pub struct TraceEngine {
    prober: Arc<LinkProber>,
    state: Arc<MonitorState>,
    inventory: Arc<dyn InventorySource>,
}

impl TraceEngine {
    pub fn new(
        prober: Arc<LinkProber>,
        state: Arc<MonitorState>,
        inventory: Arc<dyn InventorySource>,
    ) -> Self {
        Self { prober, state, inventory }
    }

    /// Addressing comes from the poller's current snapshot; a link added
    /// since the last cycle is looked up in the inventory directly.
    async fn lookup(&self, link_id: &str) -> Result<Link> {
        if let Some(link) = self.state.find_link(link_id) {
            return Ok(link);
        }
        self.inventory
            .snapshot()
            .await?
            .into_iter()
            .find(|l| l.link_id == link_id)
            .ok_or_else(|| MonitorError::LinkNotFound(link_id.to_string()))
    }

    pub async fn trace(&self, link_id: &str) -> Result<TraceReport> {
        let link = self.lookup(link_id).await?;
        Ok(self.trace_link(&link).await)
    }

    pub async fn trace_link(&self, link: &Link) -> TraceReport {
        let started_at = Utc::now();

        let (gateway, base, client) = tokio::join!(
            self.probe_hop(HopKind::Gateway, link.gateway_ip.as_deref()),
            self.probe_hop(HopKind::Base, link.base_ip.as_deref()),
            self.probe_hop(HopKind::Client, Some(link.client_ip.as_str())),
        );

        let client_health = match client.status {
            HopStatus::Up { .. } => Some(self.client_health(link).await),
            _ => None,
        };

        let hops = vec![gateway, base, client];
        let verdict = verdict(&hops);
        info!(
            link_id = %link.link_id,
            "Trace {}: {:?}",
            link.display_name(),
            verdict
        );

        TraceReport {
            link_id: link.link_id.clone(),
            started_at,
            finished_at: Utc::now(),
            hops,
            client_health,
            verdict,
        }
    }

    async fn probe_hop(&self, hop: HopKind, address: Option<&str>) -> HopResult {
        let address = address.map(str::trim).filter(|a| !a.is_empty() && !a.eq_ignore_ascii_case("none"));
        let Some(address) = address else {
            return HopResult { hop, address: None, status: HopStatus::Skipped };
        };

        let settings = self.prober.settings();
        let reachability = self.prober.reachability();
        let outcome = bounded_reachability(
            reachability.as_ref(),
            address,
            settings.ping_timeout(),
            settings.reachability_budget(),
        )
        .await;

        let status = match outcome {
            Reachability::Reachable { latency_ms, .. } => HopStatus::Up { latency_ms },
            Reachability::Unreachable { reason } => HopStatus::Down { reason },
        };
        HopResult { hop, address: Some(address.to_string()), status }
    }

    async fn client_health(&self, link: &Link) -> HealthOutcome {
        let target = self.prober.health_target(link);
        if target.vendor == Vendor::Unsupported {
            return HealthOutcome::Skipped;
        }
        let settings = self.prober.settings();
        let health = self.prober.health();
        bounded_health(health.as_ref(), target, settings.snmp_timeout(), settings.snmp_timeout() * 2).await
    }
}

/// Names the first hop, in path order, that failed to answer.
pub fn verdict(hops: &[HopResult]) -> TraceVerdict {
    if hops.iter().all(|h| h.status == HopStatus::Skipped) {
        return TraceVerdict::Inconclusive;
    }
    let first_down = hops
        .iter()
        .find(|h| matches!(h.status, HopStatus::Down { .. }))
        .map(|h| h.hop);
    match first_down {
        None => TraceVerdict::PathHealthy,
        Some(HopKind::Gateway) => TraceVerdict::GatewayUnreachable,
        Some(HopKind::Base) => TraceVerdict::BaseUnreachable,
        Some(HopKind::Client) => TraceVerdict::ClientUnreachable,
    }
}
