//! LinkPulse - link fleet monitoring and diagnostics
//!
//! - ICMP reachability and SNMP health probes with hard timeouts
//! - Flap-resistant per-link health state machine
//! - Bounded worker pool scan scheduler
//! - On-demand gateway / base / client trace

pub mod api;
pub mod config;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod notify;
pub mod probe;
pub mod store;

pub use config::MonitorConfig;
pub use diagnostics::TraceEngine;
pub use engine::{CycleReport, Monitor, MonitorState};
pub use error::{MonitorError, ProbeErrorKind};
pub use health::HealthPolicy;
pub use models::*;
pub use probe::{HealthProbe, LinkProber, ReachabilityProbe};
pub use store::{InventorySource, JsonFileInventory, MemoryStatusStore, StatusStore};
