use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MonitorError, Result};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct MonitorConfig {
    #[serde(default = "default_inventory_path")]
    pub inventory_path: PathBuf,
    #[serde(default = "default_scan_interval")]
    pub scan_interval_secs: u64,
    /// Worker pool size. Fixed, never derived from the inventory size.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub probe: ProbeSettings,
    #[serde(default)]
    pub thresholds: Thresholds,
}

fn default_inventory_path() -> PathBuf { PathBuf::from("inventory.json") }
fn default_scan_interval() -> u64 { 30 }
fn default_max_concurrency() -> usize { 64 }
fn default_api_port() -> u16 { 3000 }

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            inventory_path: default_inventory_path(),
            scan_interval_secs: default_scan_interval(),
            max_concurrency: default_max_concurrency(),
            api_port: default_api_port(),
            webhook_url: None,
            probe: ProbeSettings::default(),
            thresholds: Thresholds::default(),
        }
    }
}

impl MonitorConfig {
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| MonitorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.scan_interval_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_interval_secs == 0 {
            return Err(MonitorError::Config("scan_interval_secs must be positive".into()));
        }
        if self.max_concurrency == 0 {
            return Err(MonitorError::Config("max_concurrency must be positive".into()));
        }
        self.probe.validate()?;
        self.thresholds.validate()
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProbeSettings {
    #[serde(default = "default_timeout")]
    pub ping_timeout_ms: u64,
    #[serde(default = "default_ping_count")]
    pub ping_count: u32,
    #[serde(default = "default_timeout")]
    pub snmp_timeout_ms: u64,
    #[serde(default = "default_snmp_port")]
    pub snmp_port: u16,
    #[serde(default = "default_community")]
    pub snmp_community: String,
    /// TCP ports tried when ICMP gets no answer (ICMP-filtered devices).
    #[serde(default)]
    pub fallback_tcp_ports: Vec<u16>,
}

pub fn default_timeout() -> u64 { 1000 }
pub fn default_ping_count() -> u32 { 1 }
fn default_snmp_port() -> u16 { 161 }
fn default_community() -> String { "public".into() }

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            ping_timeout_ms: default_timeout(),
            ping_count: default_ping_count(),
            snmp_timeout_ms: default_timeout(),
            snmp_port: default_snmp_port(),
            snmp_community: default_community(),
            fallback_tcp_ports: Vec::new(),
        }
    }
}

impl ProbeSettings {
    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }

    pub fn snmp_timeout(&self) -> Duration {
        Duration::from_millis(self.snmp_timeout_ms)
    }

    /// Hard bound for a whole reachability probe, all echo attempts and fallbacks included.
    pub fn reachability_budget(&self) -> Duration {
        let attempts = u64::from(self.ping_count.max(1));
        let fallback = if self.fallback_tcp_ports.is_empty() { 0 } else { 1 };
        Duration::from_millis(self.ping_timeout_ms.saturating_mul(attempts + fallback))
    }

    fn validate(&self) -> Result<()> {
        if self.ping_timeout_ms == 0 || self.snmp_timeout_ms == 0 {
            return Err(MonitorError::Config("probe timeouts must be positive".into()));
        }
        if self.ping_count == 0 {
            return Err(MonitorError::Config("ping_count must be at least 1".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Thresholds {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_recovery_threshold")]
    pub recovery_threshold: u32,
    #[serde(default = "default_signal_floor")]
    pub signal_floor_dbm: i32,
    #[serde(default = "default_true")]
    pub degrade_on_flap: bool,
    #[serde(default = "default_true")]
    pub degrade_on_health_failure: bool,
}

fn default_window_size() -> usize { 5 }
fn default_failure_threshold() -> u32 { 3 }
fn default_recovery_threshold() -> u32 { 1 }
fn default_signal_floor() -> i32 { -75 }
fn default_true() -> bool { true }

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            failure_threshold: default_failure_threshold(),
            recovery_threshold: default_recovery_threshold(),
            signal_floor_dbm: default_signal_floor(),
            degrade_on_flap: true,
            degrade_on_health_failure: true,
        }
    }
}

impl Thresholds {
    fn validate(&self) -> Result<()> {
        if self.failure_threshold == 0 || self.recovery_threshold == 0 {
            return Err(MonitorError::Config("thresholds must be at least 1".into()));
        }
        if self.recovery_threshold > self.failure_threshold {
            return Err(MonitorError::Config(format!(
                "recovery_threshold ({}) must not exceed failure_threshold ({})",
                self.recovery_threshold, self.failure_threshold
            )));
        }
        if self.window_size < self.failure_threshold as usize {
            return Err(MonitorError::Config(format!(
                "window_size ({}) must hold at least failure_threshold ({}) outcomes",
                self.window_size, self.failure_threshold
            )));
        }
        Ok(())
    }
}
