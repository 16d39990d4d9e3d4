use chrono::{DateTime, Utc};
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::config::MonitorConfig;
use crate::error::Result;
use crate::health::HealthPolicy;
use crate::models::{Link, LinkState, LinkStatus, StatusSummary};
use crate::notify::WebhookNotifier;
use crate::probe::LinkProber;
use crate::store::{active_links, summarize, InventorySource, StatusStore};

const STORE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Outcome of one scan cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub cycle: u64,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub dispatched: usize,
    pub updated: usize,
    pub transitions: usize,
    pub store_failures: usize,
    pub cancelled: bool,
    pub summary: Option<StatusSummary>,
}

/// Read side shared with the dashboard and the diagnostic engine.
#[derive(Default)]
pub struct MonitorState {
    inventory: RwLock<Arc<Vec<Link>>>,
    last_cycle: RwLock<Option<CycleReport>>,
    cycles: AtomicU64,
}

impl MonitorState {
    /// Inventory as of the latest cycle start.
    pub fn inventory(&self) -> Arc<Vec<Link>> {
        self.inventory.read().clone()
    }

    pub fn find_link(&self, link_id: &str) -> Option<Link> {
        self.inventory.read().iter().find(|l| l.link_id == link_id).cloned()
    }

    pub fn last_cycle(&self) -> Option<CycleReport> {
        self.last_cycle.read().clone()
    }

    pub fn cycles_started(&self) -> u64 {
        self.cycles.load(Ordering::SeqCst)
    }

    fn replace_inventory(&self, links: Vec<Link>) -> Arc<Vec<Link>> {
        let links = Arc::new(links);
        *self.inventory.write() = Arc::clone(&links);
        links
    }
}

enum LinkOutcome {
    Written { from: LinkState, to: LinkState },
    StoreFailed,
}

pub struct Monitor {
    config: MonitorConfig,
    inventory: Arc<dyn InventorySource>,
    store: Arc<dyn StatusStore>,
    prober: Arc<LinkProber>,
    policy: HealthPolicy,
    notifier: Option<WebhookNotifier>,
    workers: Arc<Semaphore>,
    pub state: Arc<MonitorState>,
}

impl Monitor {
    pub fn new(
        config: MonitorConfig,
        inventory: Arc<dyn InventorySource>,
        store: Arc<dyn StatusStore>,
        prober: Arc<LinkProber>,
    ) -> Result<Self> {
        config.validate()?;
        let policy = HealthPolicy::new(config.thresholds.clone());
        let notifier = config.webhook_url.as_deref().map(WebhookNotifier::new);
        let workers = Arc::new(Semaphore::new(config.max_concurrency));

        Ok(Self {
            config,
            inventory,
            store,
            prober,
            policy,
            notifier,
            workers,
            state: Arc::new(MonitorState::default()),
        })
    }

    pub fn store(&self) -> Arc<dyn StatusStore> {
        Arc::clone(&self.store)
    }

    pub fn prober(&self) -> Arc<LinkProber> {
        Arc::clone(&self.prober)
    }

    /// Runs scan cycles back to back on the configured cadence until `shutdown` flips.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Link poller active: every {}s, {} workers",
            self.config.scan_interval_secs, self.config.max_concurrency
        );

        let mut interval = tokio::time::interval(self.config.scan_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() || shutdown.has_changed().is_err() {
                break;
            }

            match self.run_cycle(&shutdown).await {
                Ok(report) => {
                    let summary = report.summary.unwrap_or_default();
                    info!(
                        "Cycle #{} probed {} links in {:.2}s ({} online, {} degraded, {} critical, {} unknown; {} transitions, {} store failures)",
                        report.cycle,
                        report.updated,
                        report.elapsed_ms as f64 / 1000.0,
                        summary.online,
                        summary.degraded,
                        summary.critical,
                        summary.unknown,
                        report.transitions,
                        report.store_failures,
                    );
                }
                Err(e) => warn!("Scan cycle aborted, retrying next tick: {}", e),
            }
        }

        info!("Link poller stopped");
    }

    /// One full pass over the inventory. Fails only when the inventory can't be read.
    pub async fn run_cycle(self: &Arc<Self>, shutdown: &watch::Receiver<bool>) -> Result<CycleReport> {
        let cycle = self.state.cycles.fetch_add(1, Ordering::SeqCst) + 1;
        let start = Instant::now();
        let started_at = Utc::now();

        let links = self
            .state
            .replace_inventory(active_links(self.inventory.snapshot().await?));

        let mut tasks = FuturesUnordered::new();
        let mut cancelled = false;

        for link in links.iter() {
            if *shutdown.borrow() {
                cancelled = true;
                break;
            }
            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    cancelled = true;
                    break;
                }
            };
            let monitor = Arc::clone(self);
            let link = link.clone();
            tasks.push(tokio::spawn(async move {
                let _permit = permit;
                monitor.process_link(&link).await
            }));
        }

        let dispatched = tasks.len();
        let mut updated = 0;
        let mut transitions = 0;
        let mut store_failures = 0;

        while let Some(joined) = tasks.next().await {
            match joined {
                Ok(LinkOutcome::Written { from, to }) => {
                    updated += 1;
                    if from != to {
                        transitions += 1;
                    }
                }
                Ok(LinkOutcome::StoreFailed) => store_failures += 1,
                Err(e) => error!("link task failed: {}", e),
            }
        }

        if cancelled {
            warn!("Cycle #{} cancelled after dispatching {} of {} links", cycle, dispatched, links.len());
        }

        let summary = match summarize(self.store.as_ref(), &links).await {
            Ok(summary) => Some(summary),
            Err(e) => {
                warn!("Cycle #{} summary unavailable: {}", cycle, e);
                None
            }
        };

        let report = CycleReport {
            cycle,
            started_at,
            elapsed_ms: start.elapsed().as_millis() as u64,
            dispatched,
            updated,
            transitions,
            store_failures,
            cancelled,
            summary,
        };
        *self.state.last_cycle.write() = Some(report.clone());
        Ok(report)
    }

    async fn process_link(&self, link: &Link) -> LinkOutcome {
        let previous = match self.store.get(&link.link_id).await {
            Ok(Some(status)) => status,
            Ok(None) => Arc::new(LinkStatus::new(link.link_id.clone())),
            Err(e) => {
                error!(link_id = %link.link_id, "status read failed, link skipped this cycle: {}", e);
                return LinkOutcome::StoreFailed;
            }
        };

        let result = self.prober.probe_link(link).await;
        let next = self.policy.apply(link, &previous, &result);
        let (from, to) = (previous.state, next.state);
        let changed = (from != to).then(|| next.clone());

        if let Err(e) = self.put_with_retry(next).await {
            error!(link_id = %link.link_id, "status write dropped, keeping {}: {}", from, e);
            return LinkOutcome::StoreFailed;
        }

        if let Some(status) = changed {
            self.report_transition(link, from, &status);
        }
        LinkOutcome::Written { from, to }
    }

    async fn put_with_retry(&self, status: LinkStatus) -> Result<()> {
        match self.store.put(status.clone()).await {
            Ok(()) => Ok(()),
            Err(first) => {
                warn!(link_id = %status.link_id, "status write failed, retrying once: {}", first);
                tokio::time::sleep(STORE_RETRY_DELAY).await;
                self.store.put(status).await
            }
        }
    }

    fn report_transition(&self, link: &Link, old: LinkState, status: &LinkStatus) {
        let msg = format!(
            "[CHANGE] {} ({}) {} -> {}",
            link.display_name(),
            link.client_ip,
            old,
            status.state
        );

        // First sighting of a healthy link is not news.
        if old == LinkState::Unknown && status.state == LinkState::Online {
            debug!(link_id = %link.link_id, "{}", msg);
            return;
        }

        match status.state {
            LinkState::CriticalOutage => error!(link_id = %link.link_id, "{}", msg),
            LinkState::Online => info!(link_id = %link.link_id, "{}", msg),
            _ => warn!(link_id = %link.link_id, "{}", msg),
        }

        if let Some(notifier) = &self.notifier {
            notifier.spawn_transition(link, old, status);
        }
    }
}
