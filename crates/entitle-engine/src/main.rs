//! Entitle Binary
//!
//! Computes the licenses of a graph snapshot and prints the report as JSON

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use entitle_engine::{
    ComputeRequest, Dispatcher, EngineConfig, GraphSnapshot, InMemoryEquipmentGraph,
    InMemoryMetricStore, ENGINE_VERSION,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    info!("Starting Entitle v{}", ENGINE_VERSION);

    // Load configuration
    let config = EngineConfig::load()?;
    info!("Loaded configuration: {:?}", config);

    let Some(path) = config.snapshot_path.clone() else {
        bail!("ENTITLE_SNAPSHOT is not set");
    };
    let Some(metric) = config.metric.clone() else {
        bail!("ENTITLE_METRIC is not set");
    };

    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("reading snapshot {}", path.display()))?;
    let mut snapshot: GraphSnapshot = serde_json::from_str(&raw)?;
    if snapshot.scope.is_empty() {
        snapshot.scope = config.scope.clone();
    }
    let scope = snapshot.scope.clone();

    let graph = Arc::new(InMemoryEquipmentGraph::from_snapshot(&snapshot));
    let metrics = Arc::new(InMemoryMetricStore::from_snapshot(&snapshot));
    info!(
        "Snapshot loaded: scope={}, equipment={}",
        scope,
        graph.equipment_count(&scope)
    );

    let dispatcher = Dispatcher::new(graph, metrics).with_config(config.clone());

    let report = match &config.aggregation {
        Some(aggregation) => {
            dispatcher
                .report_for_aggregation(&scope, &metric, aggregation)
                .await?
        }
        None => {
            dispatcher
                .report(ComputeRequest::new(scope, metric, config.products.clone()))
                .await?
        }
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
