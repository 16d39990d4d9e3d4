mod common;

use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tower::ServiceExt;

use common::{fast_config, link, prober, Behaviour, FakeHealth, FakeNetwork, StaticInventory};
use linkpulse::api::{create_router, ApiState};
use linkpulse::{Link, MemoryStatusStore, Monitor, MonitorConfig, TraceEngine};

struct App {
    state: ApiState,
    monitor: Arc<Monitor>,
    network: Arc<FakeNetwork>,
}

fn trunk_links() -> Vec<Link> {
    let mut trunk = link("L-1", "10.9.0.20");
    trunk.gateway_ip = Some("10.9.0.1".into());
    trunk.base_ip = Some("10.9.0.10".into());
    vec![trunk, link("L-2", "10.9.0.21")]
}

fn app() -> App {
    app_with(fast_config(), trunk_links())
}

fn app_with(config: MonitorConfig, links: Vec<Link>) -> App {
    let network = Arc::new(FakeNetwork::default());
    let prober = prober(Arc::clone(&network), Arc::new(FakeHealth::default()), &config);
    let inventory = Arc::new(StaticInventory::new(links));
    let store = Arc::new(MemoryStatusStore::new());
    let monitor = Arc::new(Monitor::new(config, inventory.clone(), store.clone(), Arc::clone(&prober)).unwrap());
    let tracer = Arc::new(TraceEngine::new(prober, monitor.state.clone(), inventory));
    let state = ApiState { monitor: monitor.state.clone(), store, tracer };
    App { state, monitor, network }
}

async fn call(state: &ApiState, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let response = create_router(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn summary_reflects_last_cycle() {
    let app = app();
    app.network.set("10.9.0.21", Behaviour::Down);
    let (_tx, rx) = watch::channel(false);
    app.monitor.run_cycle(&rx).await.unwrap();

    let (status, body) = call(&app.state, Method::GET, "/api/summary").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 2);
    assert_eq!(body["online"], 1);
    assert_eq!(body["unknown"], 1);

    let (status, body) = call(&app.state, Method::GET, "/api/cycle").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dispatched"], 2);
}

#[tokio::test]
async fn link_listing_includes_inventory_and_status() {
    let app = app();
    let (_tx, rx) = watch::channel(false);
    app.monitor.run_cycle(&rx).await.unwrap();

    let (status, body) = call(&app.state, Method::GET, "/api/links").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["link_id"], "L-1");
    assert_eq!(rows[0]["status"]["state"], "ONLINE");

    let (status, body) = call(&app.state, Method::GET, "/api/links/L-2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["client_ip"], "10.9.0.21");
}

#[tokio::test]
async fn unknown_link_is_not_found() {
    let app = app();

    let (status, body) = call(&app.state, Method::GET, "/api/links/missing").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("missing"));

    let (status, _) = call(&app.state, Method::POST, "/api/links/missing/trace").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trace_endpoint_reports_every_hop() {
    let app = app();
    app.network.set("10.9.0.10", Behaviour::Down);

    let (status, body) = call(&app.state, Method::POST, "/api/links/L-1/trace").await;

    assert_eq!(status, StatusCode::OK);
    let hops = body["hops"].as_array().unwrap();
    assert_eq!(hops.len(), 3);
    assert_eq!(body["verdict"], "base_unreachable");
}

#[tokio::test]
async fn cycle_is_null_before_first_run() {
    let app = app();
    let (status, body) = call(&app.state, Method::GET, "/api/cycle").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_null());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_and_traces_are_served_while_a_cycle_runs() {
    let mut config = fast_config();
    config.max_concurrency = 2;
    config.probe.ping_timeout_ms = 1000;
    let mut links = trunk_links();
    links.extend((1..=12).map(|i| link(&format!("S-{i}"), &format!("10.8.0.{i}"))));
    let app = app_with(config, links);
    for i in 1..=12 {
        app.network.set(&format!("10.8.0.{i}"), Behaviour::Slow(Duration::from_millis(300)));
    }

    let (_tx, rx) = watch::channel(false);
    let monitor = Arc::clone(&app.monitor);
    let cycle = tokio::spawn(async move { monitor.run_cycle(&rx).await });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let start = Instant::now();
    let (status, body) = call(&app.state, Method::GET, "/api/summary").await;
    let summary_took = start.elapsed();
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 14);

    let start = Instant::now();
    let report = app.state.tracer.trace("L-1").await.unwrap();
    let trace_took = start.elapsed();
    assert_eq!(report.hops.len(), 3);

    assert!(!cycle.is_finished(), "cycle ended before the reads");
    let cycle_report = cycle.await.unwrap().unwrap();
    assert!(cycle_report.elapsed_ms >= 1500, "cycle took {}ms", cycle_report.elapsed_ms);
    assert!(summary_took < Duration::from_millis(250), "summary took {:?}", summary_took);
    assert!(trace_took < Duration::from_millis(250), "trace took {:?}", trace_took);
}
