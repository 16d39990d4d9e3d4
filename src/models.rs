use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use crate::error::ProbeErrorKind;

/// One monitored link as provided by the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub link_id: String,
    #[serde(default)]
    pub name: String,
    pub client_ip: String,
    #[serde(default)]
    pub base_ip: Option<String>,
    #[serde(default)]
    pub gateway_ip: Option<String>,
    #[serde(default)]
    pub pop_name: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    /// Expected negotiated Ethernet speed; slower links are reported degraded.
    #[serde(default)]
    pub expected_speed_mbps: Option<u64>,
    #[serde(default)]
    pub snmp_community: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl Link {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.link_id
        } else {
            &self.name
        }
    }
}

/// Operational state of a link, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LinkState {
    Online,
    Degraded,
    CriticalOutage,
    Unknown,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Online => "ONLINE",
            Self::Degraded => "DEGRADED",
            Self::CriticalOutage => "CRITICAL_OUTAGE",
            Self::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// Why a link currently reads DEGRADED.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradeReason {
    /// A lone reachability failure in an otherwise clean window.
    Flap,
    /// Two or more failures in the window; holds until they age out.
    Loss,
    /// Reachable, but the device-health query failed or reported values below floor.
    Health,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Duplex {
    Full,
    Half,
    #[default]
    Unknown,
}

/// Decoded device-health counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HealthCounters {
    pub speed_mbps: Option<u64>,
    pub duplex: Duplex,
    pub signal_dbm: Option<i32>,
    /// Vendor-specific extras, kept for operators.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Reachability {
    Reachable { latency_ms: f64, loss_pct: f64 },
    Unreachable { reason: ProbeErrorKind },
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Self::Reachable { .. })
    }

    pub fn latency_ms(&self) -> Option<f64> {
        match self {
            Self::Reachable { latency_ms, .. } => Some(*latency_ms),
            Self::Unreachable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum HealthOutcome {
    Ok { counters: HealthCounters },
    Failed { reason: ProbeErrorKind },
    /// Not attempted: target unreachable or vendor has no health decoder.
    Skipped,
}

/// Outcome of probing one link once. Consumed by the state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeResult {
    pub link_id: String,
    pub attempted_at: DateTime<Utc>,
    pub reachability: Reachability,
    pub health: HealthOutcome,
}

/// Per-link status record. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkStatus {
    pub link_id: String,
    pub state: LinkState,
    pub degraded_reason: Option<DegradeReason>,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    /// Recent reachability outcomes, newest last.
    pub window: VecDeque<bool>,
    pub last_latency_ms: Option<f64>,
    pub last_error: Option<ProbeErrorKind>,
    pub last_health: Option<HealthOutcome>,
    pub speed_mbps: Option<u64>,
    pub duplex: Duplex,
    pub signal_dbm: Option<i32>,
    pub last_probe_at: Option<DateTime<Utc>>,
    pub last_state_change_at: Option<DateTime<Utc>>,
}

impl LinkStatus {
    pub fn new(link_id: impl Into<String>) -> Self {
        Self {
            link_id: link_id.into(),
            state: LinkState::Unknown,
            degraded_reason: None,
            consecutive_failures: 0,
            consecutive_successes: 0,
            window: VecDeque::new(),
            last_latency_ms: None,
            last_error: None,
            last_health: None,
            speed_mbps: None,
            duplex: Duplex::Unknown,
            signal_dbm: None,
            last_probe_at: None,
            last_state_change_at: None,
        }
    }
}

/// Dashboard aggregate. Derived from the inventory and the status table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: usize,
    pub online: usize,
    pub degraded: usize,
    pub critical: usize,
    pub unknown: usize,
}

impl StatusSummary {
    pub fn record(&mut self, state: LinkState) {
        self.total += 1;
        match state {
            LinkState::Online => self.online += 1,
            LinkState::Degraded => self.degraded += 1,
            LinkState::CriticalOutage => self.critical += 1,
            LinkState::Unknown => self.unknown += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HopKind {
    Gateway,
    Base,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum HopStatus {
    Up { latency_ms: f64 },
    Down { reason: ProbeErrorKind },
    /// No address for this hop in the inventory.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HopResult {
    pub hop: HopKind,
    pub address: Option<String>,
    pub status: HopStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceVerdict {
    PathHealthy,
    GatewayUnreachable,
    BaseUnreachable,
    ClientUnreachable,
    Inconclusive,
}

/// Result of an on-demand trace. Hops are ordered gateway, base, client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceReport {
    pub link_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub hops: Vec<HopResult>,
    pub client_health: Option<HealthOutcome>,
    pub verdict: TraceVerdict,
}
