#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use linkpulse::probe::HealthTarget;
use linkpulse::{
    HealthOutcome, HealthProbe, InventorySource, Link, LinkProber, LinkStatus, MemoryStatusStore,
    MonitorConfig, MonitorError, ProbeErrorKind, Reachability, ReachabilityProbe, StatusStore,
};

#[derive(Debug, Clone, Copy)]
pub enum Behaviour {
    Up,
    Down,
    /// Never answers; only the hard timeout ends the probe.
    Hang,
    Slow(Duration),
}

/// Scripted network: every address answers according to its behaviour (Up by default).
#[derive(Default)]
pub struct FakeNetwork {
    behaviours: Mutex<HashMap<String, Behaviour>>,
    pub probes: AtomicUsize,
    in_flight: Arc<AtomicUsize>,
    pub max_in_flight: AtomicUsize,
}

struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FakeNetwork {
    pub fn set(&self, address: &str, behaviour: Behaviour) {
        self.behaviours.lock().insert(address.to_string(), behaviour);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn peak_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for FakeNetwork {
    async fn probe(&self, address: &str, timeout: Duration) -> Reachability {
        self.probes.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlight(Arc::clone(&self.in_flight));

        let behaviour = self
            .behaviours
            .lock()
            .get(address)
            .copied()
            .unwrap_or(Behaviour::Up);

        match behaviour {
            Behaviour::Up => Reachability::Reachable { latency_ms: 1.5, loss_pct: 0.0 },
            Behaviour::Down => Reachability::Unreachable { reason: ProbeErrorKind::Unreachable },
            Behaviour::Hang => {
                tokio::time::sleep(timeout * 10).await;
                Reachability::Unreachable { reason: ProbeErrorKind::Timeout }
            }
            Behaviour::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Reachability::Reachable { latency_ms: delay.as_secs_f64() * 1000.0, loss_pct: 0.0 }
            }
        }
    }
}

/// Health probe returning one configurable outcome for every target.
pub struct FakeHealth {
    outcome: Mutex<HealthOutcome>,
    pub queries: AtomicUsize,
}

impl FakeHealth {
    pub fn new(outcome: HealthOutcome) -> Self {
        Self { outcome: Mutex::new(outcome), queries: AtomicUsize::new(0) }
    }

    pub fn set(&self, outcome: HealthOutcome) {
        *self.outcome.lock() = outcome;
    }
}

impl Default for FakeHealth {
    fn default() -> Self {
        Self::new(HealthOutcome::Skipped)
    }
}

#[async_trait]
impl HealthProbe for FakeHealth {
    async fn query(&self, _target: HealthTarget<'_>, _timeout: Duration) -> HealthOutcome {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.outcome.lock().clone()
    }
}

/// Inventory that can be swapped out or made unavailable.
pub struct StaticInventory {
    links: Mutex<Option<Vec<Link>>>,
}

impl StaticInventory {
    pub fn new(links: Vec<Link>) -> Self {
        Self { links: Mutex::new(Some(links)) }
    }

    pub fn set_unavailable(&self) {
        *self.links.lock() = None;
    }
}

#[async_trait]
impl InventorySource for StaticInventory {
    async fn snapshot(&self) -> linkpulse::error::Result<Vec<Link>> {
        self.links
            .lock()
            .clone()
            .ok_or_else(|| MonitorError::InventoryUnavailable("inventory database offline".into()))
    }
}

/// Status store whose writes can be made to fail for chosen links.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStatusStore,
    failing_puts: Mutex<HashMap<String, usize>>,
    pub put_attempts: AtomicUsize,
}

impl FlakyStore {
    /// The next `count` writes for `link_id` fail.
    pub fn fail_puts(&self, link_id: &str, count: usize) {
        self.failing_puts.lock().insert(link_id.to_string(), count);
    }

    pub fn attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusStore for FlakyStore {
    async fn get(&self, link_id: &str) -> linkpulse::error::Result<Option<Arc<LinkStatus>>> {
        self.inner.get(link_id).await
    }

    async fn put(&self, status: LinkStatus) -> linkpulse::error::Result<()> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        {
            let mut failing = self.failing_puts.lock();
            if let Some(left) = failing.get_mut(&status.link_id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(MonitorError::StoreUnavailable("write rejected".into()));
                }
            }
        }
        self.inner.put(status).await
    }
}

pub fn link(id: &str, client_ip: &str) -> Link {
    Link {
        link_id: id.to_string(),
        name: format!("Client {}", id),
        client_ip: client_ip.to_string(),
        base_ip: None,
        gateway_ip: None,
        pop_name: Some("Banani".into()),
        vendor: None,
        model: None,
        expected_speed_mbps: None,
        snmp_community: None,
        is_active: true,
    }
}

pub fn fast_config() -> MonitorConfig {
    let mut config = MonitorConfig::default();
    config.scan_interval_secs = 1;
    config.max_concurrency = 16;
    config.probe.ping_timeout_ms = 200;
    config.probe.snmp_timeout_ms = 200;
    config
}

pub fn prober(network: Arc<FakeNetwork>, health: Arc<FakeHealth>, config: &MonitorConfig) -> Arc<LinkProber> {
    Arc::new(LinkProber::new(network, health, config.probe.clone()))
}
