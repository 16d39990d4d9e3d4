use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::info;

use linkpulse::api::{self, ApiState};
use linkpulse::probe::{IcmpProbe, SnmpHealthProbe};
use linkpulse::{JsonFileInventory, LinkProber, MemoryStatusStore, Monitor, MonitorConfig, TraceEngine};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::INFO.into()))
        .with_ansi(true)
        .init();

    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.json".to_string());
    let config_content = std::fs::read_to_string(&config_path)
        .with_context(|| format!("Failed to read {}", config_path))?;
    let config = MonitorConfig::from_json(&config_content)
        .with_context(|| format!("Failed to parse {}", config_path))?;

    let icmp = IcmpProbe::new(config.probe.ping_count, config.probe.fallback_tcp_ports.clone())?;
    let snmp = SnmpHealthProbe::new(config.probe.snmp_port);
    let prober = Arc::new(LinkProber::new(Arc::new(icmp), Arc::new(snmp), config.probe.clone()));

    let inventory = Arc::new(JsonFileInventory::new(config.inventory_path.clone()));
    let store = Arc::new(MemoryStatusStore::new());
    let api_port = config.api_port;

    let monitor = Arc::new(Monitor::new(config, inventory.clone(), store.clone(), Arc::clone(&prober))?);
    let tracer = Arc::new(TraceEngine::new(prober, monitor.state.clone(), inventory));

    let api_state = ApiState {
        monitor: monitor.state.clone(),
        store,
        tracer,
    };
    tokio::spawn(async move {
        if let Err(e) = api::start_server(api_port, api_state).await {
            tracing::error!("Dashboard API failed: {:#}", e);
        }
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = tokio::spawn(Arc::clone(&monitor).run(shutdown_rx));

    signal::ctrl_c().await?;
    info!("Shutdown signal received. Stopping LinkPulse...");
    let _ = shutdown_tx.send(true);
    poller.await.context("Poller task failed")?;

    Ok(())
}
