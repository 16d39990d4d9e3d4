//! Inventory and status store access
//!
//! The persistence engine and the inventory import live outside this crate.
//! The scheduler and the dashboard only see the two traits below; the file
//! inventory and in-memory status table are the adapters the binary ships with.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::error::{MonitorError, Result};
use crate::models::{Link, LinkState, LinkStatus, StatusSummary};

#[async_trait]
pub trait InventorySource: Send + Sync {
    /// Complete set of links at this moment. Never partial.
    async fn snapshot(&self) -> Result<Vec<Link>>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn get(&self, link_id: &str) -> Result<Option<Arc<LinkStatus>>>;

    /// Replaces the whole record for `status.link_id`.
    async fn put(&self, status: LinkStatus) -> Result<()>;
}

/// Reads a JSON array of links from disk on every snapshot.
pub struct JsonFileInventory {
    path: PathBuf,
}

impl JsonFileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl InventorySource for JsonFileInventory {
    async fn snapshot(&self) -> Result<Vec<Link>> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            MonitorError::InventoryUnavailable(format!("{}: {}", self.path.display(), e))
        })?;
        serde_json::from_str(&content).map_err(|e| {
            MonitorError::InventoryUnavailable(format!("{}: {}", self.path.display(), e))
        })
    }
}

/// Status table keyed by link id. A write swaps the record's `Arc`, so
/// readers hold either the old or the new record, never a mix.
#[derive(Default)]
pub struct MemoryStatusStore {
    records: DashMap<String, Arc<LinkStatus>>,
}

impl MemoryStatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl StatusStore for MemoryStatusStore {
    async fn get(&self, link_id: &str) -> Result<Option<Arc<LinkStatus>>> {
        Ok(self.records.get(link_id).map(|r| Arc::clone(r.value())))
    }

    async fn put(&self, status: LinkStatus) -> Result<()> {
        self.records.insert(status.link_id.clone(), Arc::new(status));
        Ok(())
    }
}

/// Active links with duplicate ids collapsed to their first occurrence.
pub fn active_links(links: Vec<Link>) -> Vec<Link> {
    let mut seen = HashSet::new();
    links
        .into_iter()
        .filter(|l| l.is_active)
        .filter(|l| {
            let first = seen.insert(l.link_id.clone());
            if !first {
                warn!(link_id = %l.link_id, "duplicate link id in inventory, keeping the first record");
            }
            first
        })
        .collect()
}

/// Current state of every link in `links`; links never probed read UNKNOWN.
pub async fn link_states(
    store: &dyn StatusStore,
    links: &[Link],
) -> Result<Vec<(Link, Option<Arc<LinkStatus>>)>> {
    let mut rows = Vec::with_capacity(links.len());
    for link in links {
        rows.push((link.clone(), store.get(&link.link_id).await?));
    }
    Ok(rows)
}

/// Aggregate counts derived from the status table, so they always add up to
/// the inventory size.
pub async fn summarize(store: &dyn StatusStore, links: &[Link]) -> Result<StatusSummary> {
    let mut summary = StatusSummary::default();
    for link in links {
        let state = store
            .get(&link.link_id)
            .await?
            .map_or(LinkState::Unknown, |s| s.state);
        summary.record(state);
    }
    Ok(summary)
}
