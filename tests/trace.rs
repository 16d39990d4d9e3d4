mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;

use common::{fast_config, link, prober, Behaviour, FakeHealth, FakeNetwork, StaticInventory};
use linkpulse::{
    HealthCounters, HealthOutcome, HopKind, HopStatus, Link, MemoryStatusStore, Monitor, MonitorError,
    ProbeErrorKind, StatusStore, TraceEngine, TraceVerdict,
};

fn three_hop_link() -> Link {
    let mut link = link("T-1", "10.5.0.20");
    link.gateway_ip = Some("10.5.0.1".into());
    link.base_ip = Some("10.5.0.10".into());
    link
}

struct Setup {
    tracer: TraceEngine,
    monitor: Arc<Monitor>,
    network: Arc<FakeNetwork>,
    health: Arc<FakeHealth>,
    store: Arc<MemoryStatusStore>,
}

fn setup(links: Vec<Link>) -> Setup {
    let config = fast_config();
    let network = Arc::new(FakeNetwork::default());
    let health = Arc::new(FakeHealth::default());
    let prober = prober(Arc::clone(&network), Arc::clone(&health), &config);
    let inventory = Arc::new(StaticInventory::new(links));
    let store = Arc::new(MemoryStatusStore::new());
    let monitor = Arc::new(Monitor::new(config, inventory.clone(), store.clone(), Arc::clone(&prober)).unwrap());
    let tracer = TraceEngine::new(prober, monitor.state.clone(), inventory);
    Setup { tracer, monitor, network, health, store }
}

#[tokio::test]
async fn dead_gateway_still_reports_base_and_client() {
    let s = setup(vec![three_hop_link()]);
    s.network.set("10.5.0.1", Behaviour::Down);

    let report = s.tracer.trace("T-1").await.unwrap();

    let order: Vec<_> = report.hops.iter().map(|h| h.hop).collect();
    assert_eq!(order, vec![HopKind::Gateway, HopKind::Base, HopKind::Client]);
    assert_eq!(report.hops[0].status, HopStatus::Down { reason: ProbeErrorKind::Unreachable });
    assert!(matches!(report.hops[1].status, HopStatus::Up { .. }));
    assert!(matches!(report.hops[2].status, HopStatus::Up { .. }));
    assert_eq!(report.hops[2].address.as_deref(), Some("10.5.0.20"));
    assert_eq!(report.verdict, TraceVerdict::GatewayUnreachable);
    assert!(report.finished_at >= report.started_at);
}

#[tokio::test]
async fn hop_without_address_is_skipped() {
    let mut link = three_hop_link();
    link.base_ip = Some("None".into());
    link.gateway_ip = None;
    let s = setup(vec![link]);
    s.network.set("10.5.0.20", Behaviour::Down);

    let report = s.tracer.trace("T-1").await.unwrap();

    assert_eq!(report.hops[0].status, HopStatus::Skipped);
    assert_eq!(report.hops[1].status, HopStatus::Skipped);
    assert_eq!(report.hops[1].address, None);
    assert!(matches!(report.hops[2].status, HopStatus::Down { .. }));
    assert_eq!(report.verdict, TraceVerdict::ClientUnreachable);
    assert_eq!(report.client_health, None);
}

#[tokio::test]
async fn hops_are_probed_concurrently_within_their_timeouts() {
    let s = setup(vec![three_hop_link()]);
    for addr in ["10.5.0.1", "10.5.0.10", "10.5.0.20"] {
        s.network.set(addr, Behaviour::Hang);
    }

    let start = Instant::now();
    let report = s.tracer.trace("T-1").await.unwrap();

    assert!(start.elapsed() < Duration::from_millis(550), "trace took {:?}", start.elapsed());
    assert!(report
        .hops
        .iter()
        .all(|h| h.status == HopStatus::Down { reason: ProbeErrorKind::Timeout }));
    assert_eq!(report.verdict, TraceVerdict::GatewayUnreachable);
}

#[tokio::test]
async fn reachable_client_carries_health_snapshot() {
    let mut link = three_hop_link();
    link.vendor = Some("Ubiquiti".into());
    let s = setup(vec![link]);
    s.health.set(HealthOutcome::Ok {
        counters: HealthCounters { signal_dbm: Some(-58), speed_mbps: Some(1000), ..HealthCounters::default() },
    });

    let report = s.tracer.trace("T-1").await.unwrap();

    assert_eq!(report.verdict, TraceVerdict::PathHealthy);
    match report.client_health {
        Some(HealthOutcome::Ok { counters }) => assert_eq!(counters.signal_dbm, Some(-58)),
        other => panic!("unexpected client health {:?}", other),
    }
}

#[tokio::test]
async fn unknown_link_is_an_error() {
    let s = setup(vec![three_hop_link()]);
    let err = s.tracer.trace("nope").await.unwrap_err();
    assert!(matches!(err, MonitorError::LinkNotFound(id) if id == "nope"));
}

#[tokio::test]
async fn trace_leaves_poller_state_untouched() {
    let s = setup(vec![three_hop_link()]);
    let (_tx, rx) = watch::channel(false);
    s.monitor.run_cycle(&rx).await.unwrap();
    let before = s.store.get("T-1").await.unwrap().unwrap();

    s.network.set("10.5.0.20", Behaviour::Down);
    s.tracer.trace("T-1").await.unwrap();

    let after = s.store.get("T-1").await.unwrap().unwrap();
    assert_eq!(*before, *after);
}
