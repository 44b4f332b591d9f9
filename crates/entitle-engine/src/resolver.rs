//! Allocation resolution
//!
//! Splits a product's equipment and user allocations into what the metric
//! under computation keeps and what other metrics have claimed, and finds
//! the named-user metric whose entitlement is transformed into a processor
//! metric.

use entitle_common::{
    AcquiredRight, Allocation, EquipmentId, MetricConfig, MetricDefinition, ProductId, Result,
};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, instrument};

use crate::graph::EquipmentGraph;

/// Outcome of allocation resolution for one metric
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AllocationPartition {
    /// Allocations made to the metric itself
    pub kept: Vec<Allocation>,
    /// Servers claimed by other metrics
    pub excluded_servers: BTreeSet<EquipmentId>,
    /// Virtual machines claimed by other metrics
    pub excluded_virtual_machines: BTreeSet<EquipmentId>,
    /// Users claimed by other metrics
    pub excluded_users: BTreeSet<String>,
    /// Named-user metric transformed into this one
    pub transform_source: Option<String>,
}

impl AllocationPartition {
    pub fn is_excluded(&self, id: &str) -> bool {
        self.excluded_servers.contains(id) || self.excluded_virtual_machines.contains(id)
    }
}

/// Resolve the allocations of the products against `metric`
///
/// `vm_type` names the equipment type counted as virtual machines; claimed
/// equipment of any other type is reported as a server.
#[instrument(skip(graph, metrics), fields(metric = %metric.name))]
pub async fn resolve_allocations(
    graph: &dyn EquipmentGraph,
    scope: &str,
    products: &[ProductId],
    metric: &MetricDefinition,
    metrics: &[MetricDefinition],
    vm_type: Option<&str>,
) -> Result<AllocationPartition> {
    let mut partition = AllocationPartition::default();
    if products.is_empty() {
        return Ok(partition);
    }

    let allocations = graph.allocations(scope, products).await?;
    let virtual_machines: HashSet<EquipmentId> = match vm_type {
        Some(vm_type) => graph
            .product_equipment(scope, products, vm_type)
            .await?
            .into_iter()
            .collect(),
        None => HashSet::new(),
    };

    for allocation in allocations {
        if allocation.metric.eq_ignore_ascii_case(&metric.name) {
            partition.kept.push(allocation);
        } else if virtual_machines.contains(&allocation.equipment_id) {
            partition
                .excluded_virtual_machines
                .insert(allocation.equipment_id);
        } else {
            partition.excluded_servers.insert(allocation.equipment_id);
        }
    }

    partition.excluded_users = graph
        .user_allocations(scope, products)
        .await?
        .into_iter()
        .filter(|a| !a.metric.eq_ignore_ascii_case(&metric.name))
        .map(|a| a.user_id)
        .collect();

    if matches!(metric.config, MetricConfig::OracleProcessor(_)) {
        let rights = graph.acquired_rights(scope, products).await?;
        partition.transform_source = transform_source(&metric.name, metrics, &rights);
    }

    debug!(
        kept = partition.kept.len(),
        excluded_servers = partition.excluded_servers.len(),
        excluded_vms = partition.excluded_virtual_machines.len(),
        excluded_users = partition.excluded_users.len(),
        "Allocations resolved"
    );
    Ok(partition)
}

/// Named-user metric held by the products that transforms into `target`
pub fn transform_source(
    target: &str,
    metrics: &[MetricDefinition],
    rights: &[AcquiredRight],
) -> Option<String> {
    metrics
        .iter()
        .filter(|m| match &m.config {
            MetricConfig::OracleNamedUser(config) => {
                config.transform
                    && config
                        .transform_metric_name
                        .as_deref()
                        .map(|name| name.eq_ignore_ascii_case(target))
                        .unwrap_or(false)
            }
            _ => false,
        })
        .find(|m| rights.iter().any(|r| r.metric.eq_ignore_ascii_case(&m.name)))
        .map(|m| m.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryEquipmentGraph;
    use entitle_common::{
        Equipment, NamedUserMetric, ProcessorMetric, StaticMetric, UserAllocation, UserRecord,
    };

    fn processor() -> ProcessorMetric {
        ProcessorMetric {
            start_type: "partition".into(),
            base_type: "server".into(),
            aggregate_type: "cluster".into(),
            end_type: "datacenter".into(),
            num_cpu_attr: "cpu".into(),
            num_cores_attr: "cores".into(),
            core_factor_attr: "core_factor".into(),
        }
    }

    fn ops() -> MetricDefinition {
        MetricDefinition::new("ops", MetricConfig::OracleProcessor(processor()))
    }

    fn nup(transform: bool) -> MetricDefinition {
        MetricDefinition::new(
            "nup",
            MetricConfig::OracleNamedUser(NamedUserMetric {
                processor: processor(),
                users_per_processor: 25,
                transform,
                transform_metric_name: Some("OPS".into()),
            }),
        )
    }

    fn graph() -> InMemoryEquipmentGraph {
        let graph = InMemoryEquipmentGraph::new();
        graph.insert_equipment("sc", Equipment::new("srv-1", "server"));
        graph.insert_equipment("sc", Equipment::new("srv-2", "server"));
        graph.insert_equipment("sc", Equipment::new("vm-1", "virtualmachine"));
        graph.link_product(
            "sc",
            "db",
            vec!["srv-1".to_string(), "srv-2".to_string(), "vm-1".to_string()],
        );
        graph.allocate("sc", Allocation::new("db", "srv-1", "ops"));
        graph.allocate("sc", Allocation::new("db", "srv-2", "flat"));
        graph.allocate("sc", Allocation::new("db", "vm-1", "flat"));
        graph.insert_user("sc", UserRecord::new("u1", "db", 4));
        graph.allocate_user(
            "sc",
            UserAllocation {
                product: "db".into(),
                user_id: "u1".into(),
                metric: "flat".into(),
            },
        );
        graph
    }

    #[tokio::test]
    async fn test_other_metric_allocations_are_excluded() {
        let graph = graph();
        let partition = resolve_allocations(
            &graph,
            "sc",
            &["db".to_string()],
            &ops(),
            &[ops()],
            Some("virtualmachine"),
        )
        .await
        .unwrap();

        assert_eq!(partition.kept, vec![Allocation::new("db", "srv-1", "ops")]);
        assert!(partition.excluded_servers.contains("srv-2"));
        assert!(partition.excluded_virtual_machines.contains("vm-1"));
        assert!(partition.excluded_users.contains("u1"));
        assert!(!partition.is_excluded("srv-1"));
    }

    #[tokio::test]
    async fn test_transform_source_requires_right() {
        let graph = graph();
        let metrics = vec![ops(), nup(true)];
        let partition =
            resolve_allocations(&graph, "sc", &["db".to_string()], &ops(), &metrics, None)
                .await
                .unwrap();
        assert_eq!(partition.transform_source, None);

        graph.insert_acquired_right("sc", AcquiredRight::new("db", "NUP"));
        let partition =
            resolve_allocations(&graph, "sc", &["db".to_string()], &ops(), &metrics, None)
                .await
                .unwrap();
        assert_eq!(partition.transform_source.as_deref(), Some("nup"));
    }

    #[test]
    fn test_transform_source_ignores_untransformed_metrics() {
        let rights = vec![AcquiredRight::new("db", "nup")];
        let flat = MetricDefinition::new(
            "flat",
            MetricConfig::Static(StaticMetric { reference_value: 1 }),
        );
        assert_eq!(transform_source("ops", &[nup(false), flat], &rights), None);
        assert_eq!(
            transform_source("ops", &[nup(true)], &rights).as_deref(),
            Some("nup")
        );
    }
}
