//! Shared equipment fixture
//!
//! ```text
//! DC1 ── V1 ── C1 ── S1 (2x4x0.5)   ── PA1 [P1]
//!    │      │     ├─ S2 (1x2x0.75)  ── PA2 [P1]
//!    │      │     └─ S4 (2x2x0.75)
//!    │      └─ C2 ── S5 (3x6x0.75), S6 (4x10x1)
//!    ├─ V2 ── C3 ── S3 (2x5x0.25) [P1], S7 (4x8x0.5)
//!    └─ V3 ── C5 ── S8 (4x6x1)
//! S9 (2x4x0.75) [P1] ── PA3 [P2]
//! ```

#![allow(dead_code)]

use std::sync::Arc;

use entitle::common::{
    AcquiredRight, Attribute, AttributeCounterMetric, AttributeSumMetric, DataKind, Equipment,
    EquipmentAttributeMetric, EquipmentType, InstanceNumberMetric, MetricConfig,
    MetricDefinition, NamedUserMetric, Product, ProductAggregation, ProcessorMetric, PvuMetric,
    SagProcessorMetric, StaticMetric, UserNominativeMetric, UserRecord,
};
use entitle::{Dispatcher, GraphSnapshot, InMemoryEquipmentGraph, InMemoryMetricStore};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const SCOPE: &str = "fixture";
pub const P1: &str = "oracle-db";
pub const P2: &str = "oracle-rac";

pub fn equipment_types() -> Vec<EquipmentType> {
    vec![
        EquipmentType::new("partition")
            .with_parent("server")
            .with_attribute(Attribute::new("partition_code", DataKind::String).identifier())
            .with_attribute(Attribute::new("memory", DataKind::Int)),
        EquipmentType::new("server")
            .with_parent("cluster")
            .with_attribute(Attribute::new("server_code", DataKind::String).identifier())
            .with_attribute(Attribute::new("cpu", DataKind::Int).simulated())
            .with_attribute(Attribute::new("cores_per_processor", DataKind::Int))
            .with_attribute(Attribute::new("oracle_core_factor", DataKind::Float))
            .with_attribute(Attribute::new("environment", DataKind::String).searchable()),
        EquipmentType::new("cluster").with_parent("vcenter"),
        EquipmentType::new("vcenter").with_parent("datacenter"),
        EquipmentType::new("datacenter"),
    ]
}

pub fn processor(aggregate: &str, end: &str) -> ProcessorMetric {
    ProcessorMetric {
        start_type: "partition".into(),
        base_type: "server".into(),
        aggregate_type: aggregate.into(),
        end_type: end.into(),
        num_cpu_attr: "cpu".into(),
        num_cores_attr: "cores_per_processor".into(),
        core_factor_attr: "oracle_core_factor".into(),
    }
}

pub fn named_user(name: &str, aggregate: &str, end: &str, users_per_processor: u64) -> MetricDefinition {
    MetricDefinition::new(
        name,
        MetricConfig::OracleNamedUser(NamedUserMetric {
            processor: processor(aggregate, end),
            users_per_processor,
            transform: false,
            transform_metric_name: None,
        }),
    )
}

pub fn metrics() -> Vec<MetricDefinition> {
    vec![
        MetricDefinition::new("ops_dc", MetricConfig::OracleProcessor(processor("cluster", "datacenter"))),
        MetricDefinition::new(
            "ops_dc_vcenter",
            MetricConfig::OracleProcessor(processor("vcenter", "datacenter")),
        ),
        MetricDefinition::new("ops_vc", MetricConfig::OracleProcessor(processor("cluster", "vcenter"))),
        MetricDefinition::new("ops_cluster", MetricConfig::OracleProcessor(processor("server", "cluster"))),
        named_user("nup_dc", "cluster", "datacenter", 14),
        named_user("nup_vc", "cluster", "vcenter", 1),
        MetricDefinition::new(
            "ips",
            MetricConfig::IbmPvu(PvuMetric {
                base_type: "server".into(),
                num_cpu_attr: "cpu".into(),
                num_cores_attr: "cores_per_processor".into(),
                core_factor_attr: "oracle_core_factor".into(),
            }),
        ),
        MetricDefinition::new(
            "sps",
            MetricConfig::SagProcessor(SagProcessorMetric {
                base_type: "server".into(),
                num_cpu_attr: "cpu".into(),
                num_cores_attr: "cores_per_processor".into(),
                core_factor_attr: "oracle_core_factor".into(),
                environment_attr: "environment".into(),
            }),
        ),
        MetricDefinition::new(
            "acs_production",
            MetricConfig::AttributeCounter(AttributeCounterMetric {
                equipment_type: "server".into(),
                attribute: "environment".into(),
                value: "Production".into(),
            }),
        ),
        MetricDefinition::new(
            "inm",
            MetricConfig::InstanceNumber(InstanceNumberMetric {
                coefficient: dec!(0.5),
            }),
        ),
        MetricDefinition::new(
            "cores_sum",
            MetricConfig::AttributeSum(AttributeSumMetric {
                equipment_type: "server".into(),
                attribute: "cores_per_processor".into(),
                reference_value: dec!(4),
            }),
        ),
        MetricDefinition::new(
            "memory_production",
            MetricConfig::EquipmentAttribute(EquipmentAttributeMetric {
                equipment_type: "partition".into(),
                attribute: "memory".into(),
                environments: vec!["Production".into()],
                reference_value: dec!(16),
            }),
        ),
        MetricDefinition::new("uss", MetricConfig::UserSum),
        MetricDefinition::new(
            "uns_dba",
            MetricConfig::UserNominative(UserNominativeMetric {
                profile: Some("dba".into()),
            }),
        ),
        MetricDefinition::new("ucs", MetricConfig::UserConcurrent),
        MetricDefinition::new("flat", MetricConfig::Static(StaticMetric { reference_value: 5 })),
    ]
}

fn server(id: &str, cpu: i64, cores: i64, factor: Decimal) -> Equipment {
    Equipment::new(id, "server")
        .with_text("server_code", id)
        .with_int("cpu", cpu)
        .with_int("cores_per_processor", cores)
        .with_float("oracle_core_factor", factor)
}

pub fn equipment() -> Vec<Equipment> {
    vec![
        Equipment::new("DC1", "datacenter"),
        Equipment::new("V1", "vcenter").with_parent("DC1"),
        Equipment::new("V2", "vcenter").with_parent("DC1"),
        Equipment::new("V3", "vcenter").with_parent("DC1"),
        Equipment::new("C1", "cluster").with_parent("V1"),
        Equipment::new("C2", "cluster").with_parent("V1"),
        Equipment::new("C3", "cluster").with_parent("V2"),
        Equipment::new("C5", "cluster").with_parent("V3"),
        server("S1", 2, 4, dec!(0.5))
            .with_parent("C1")
            .with_text("environment", "Production"),
        server("S2", 1, 2, dec!(0.75))
            .with_parent("C1")
            .with_text("environment", "Development"),
        server("S4", 2, 2, dec!(0.75)).with_parent("C1"),
        server("S5", 3, 6, dec!(0.75)).with_parent("C2"),
        server("S6", 4, 10, dec!(1)).with_parent("C2"),
        server("S3", 2, 5, dec!(0.25))
            .with_parent("C3")
            .with_text("environment", "Production"),
        server("S7", 4, 8, dec!(0.5)).with_parent("C3"),
        server("S8", 4, 6, dec!(1)).with_parent("C5"),
        server("S9", 2, 4, dec!(0.75)).with_text("environment", "Development"),
        Equipment::new("PA1", "partition")
            .with_parent("S1")
            .with_int("memory", 32),
        Equipment::new("PA2", "partition")
            .with_parent("S2")
            .with_int("memory", 16),
        Equipment::new("PA3", "partition").with_parent("S9"),
    ]
}

pub fn snapshot() -> GraphSnapshot {
    let p1_rights = [
        "ops_dc",
        "ops_dc_vcenter",
        "ops_vc",
        "ops_cluster",
        "nup_dc",
        "nup_vc",
        "ips",
        "sps",
        "flat",
    ];
    let mut acquired_rights: Vec<AcquiredRight> =
        p1_rights.iter().map(|m| AcquiredRight::new(P1, *m)).collect();
    acquired_rights.push(AcquiredRight::new(P2, "ops_dc"));
    acquired_rights.push(AcquiredRight::new(P2, "ops_cluster"));

    GraphSnapshot {
        scope: SCOPE.to_string(),
        equipment_types: equipment_types(),
        metrics: metrics(),
        equipment: equipment(),
        products: vec![
            Product::new(P1).with_equipment(["PA1", "PA2", "S3", "S9"]),
            Product::new(P2).with_equipment(["PA3"]),
        ],
        acquired_rights,
        users: vec![
            UserRecord::new("U1", P1, 5)
                .on_equipment("PA1")
                .with_profile("dba"),
            UserRecord::new("U2", P1, 3)
                .on_equipment("S3")
                .with_profile("developer"),
            UserRecord::new("U3", P1, 2).on_equipment("S9"),
        ],
        allocations: Vec::new(),
        user_allocations: Vec::new(),
        aggregations: vec![ProductAggregation {
            name: "oracle-suite".into(),
            products: vec![P1.into(), P2.into()],
        }],
    }
}

pub struct Fixture {
    pub graph: Arc<InMemoryEquipmentGraph>,
    pub store: Arc<InMemoryMetricStore>,
    pub dispatcher: Dispatcher,
}

pub fn fixture() -> Fixture {
    from_snapshot(&snapshot())
}

pub fn from_snapshot(snapshot: &GraphSnapshot) -> Fixture {
    let graph = Arc::new(InMemoryEquipmentGraph::from_snapshot(snapshot));
    let store = Arc::new(InMemoryMetricStore::from_snapshot(snapshot));
    let dispatcher = Dispatcher::new(graph.clone(), store.clone());
    Fixture {
        graph,
        store,
        dispatcher,
    }
}
