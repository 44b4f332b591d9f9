//! Metric configuration storage
//!
//! Resolves metric names to their definitions and provides the equipment
//! type catalog of a scope.

use async_trait::async_trait;
use entitle_common::{EquipmentType, MetricDefinition, Result, TypeCatalog};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::graph::GraphSnapshot;

/// Metric configuration backend
#[async_trait]
pub trait MetricStore: Send + Sync {
    /// Get a metric by name (case-insensitive)
    async fn metric(&self, scope: &str, name: &str) -> Result<Option<MetricDefinition>>;

    /// All metrics of a scope
    async fn metrics(&self, scope: &str) -> Result<Vec<MetricDefinition>>;

    /// Equipment type catalog of a scope
    async fn equipment_types(&self, scope: &str) -> Result<TypeCatalog>;
}

#[derive(Debug, Default)]
struct ScopeMetrics {
    metrics: Vec<MetricDefinition>,
    types: Vec<EquipmentType>,
}

/// In-memory metric store
#[derive(Debug, Default)]
pub struct InMemoryMetricStore {
    scopes: RwLock<HashMap<String, ScopeMetrics>>,
}

impl InMemoryMetricStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the metric and type definitions of a snapshot
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let store = Self::new();
        for eq_type in &snapshot.equipment_types {
            store.insert_equipment_type(&snapshot.scope, eq_type.clone());
        }
        for metric in &snapshot.metrics {
            store.insert_metric(&snapshot.scope, metric.clone());
        }
        store
    }

    /// Insert or replace a metric
    pub fn insert_metric(&self, scope: &str, metric: MetricDefinition) {
        let mut scopes = self.scopes.write();
        let entry = scopes.entry(scope.to_string()).or_default();
        entry
            .metrics
            .retain(|m| !m.name.eq_ignore_ascii_case(&metric.name));
        entry.metrics.push(metric);
    }

    /// Insert or replace an equipment type
    pub fn insert_equipment_type(&self, scope: &str, eq_type: EquipmentType) {
        let mut scopes = self.scopes.write();
        let entry = scopes.entry(scope.to_string()).or_default();
        entry
            .types
            .retain(|t| !t.name.eq_ignore_ascii_case(&eq_type.name));
        entry.types.push(eq_type);
    }
}

#[async_trait]
impl MetricStore for InMemoryMetricStore {
    async fn metric(&self, scope: &str, name: &str) -> Result<Option<MetricDefinition>> {
        Ok(self.scopes.read().get(scope).and_then(|s| {
            s.metrics
                .iter()
                .find(|m| m.name.eq_ignore_ascii_case(name))
                .cloned()
        }))
    }

    async fn metrics(&self, scope: &str) -> Result<Vec<MetricDefinition>> {
        Ok(self
            .scopes
            .read()
            .get(scope)
            .map(|s| s.metrics.clone())
            .unwrap_or_default())
    }

    async fn equipment_types(&self, scope: &str) -> Result<TypeCatalog> {
        Ok(TypeCatalog::new(
            self.scopes
                .read()
                .get(scope)
                .map(|s| s.types.clone())
                .unwrap_or_default(),
        ))
    }
}
