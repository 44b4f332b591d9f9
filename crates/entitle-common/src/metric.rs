//! Metric definitions and computed results
//!
//! A [`MetricDefinition`] names a metric and carries one [`MetricConfig`]
//! variant per metric kind. Configs only reference types and attributes by
//! name; resolving them against a type catalog happens in the engine.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ConfigurationError, EntitleError};

/// Licensing metric kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MetricKind {
    #[serde(rename = "oracle.processor.standard")]
    OracleProcessor,
    #[serde(rename = "sag.processor.standard")]
    SagProcessor,
    #[serde(rename = "ibm.pvu.standard")]
    IbmPvu,
    #[serde(rename = "oracle.nup.standard")]
    OracleNamedUser,
    #[serde(rename = "attribute.counter.standard")]
    AttributeCounter,
    #[serde(rename = "instance.number.standard")]
    InstanceNumber,
    #[serde(rename = "attribute.sum.standard")]
    AttributeSum,
    #[serde(rename = "equipment.attribute.standard")]
    EquipmentAttribute,
    #[serde(rename = "user.sum.standard")]
    UserSum,
    #[serde(rename = "user.nominative.standard")]
    UserNominative,
    #[serde(rename = "user.concurrent.standard")]
    UserConcurrent,
    #[serde(rename = "static.standard")]
    Static,
    #[serde(rename = "windows.server.standard")]
    WindowsServerStandard,
    #[serde(rename = "windows.server.datacenter")]
    WindowsServerDatacenter,
    #[serde(rename = "microsoft.sql.enterprise")]
    SqlEnterprise,
    #[serde(rename = "microsoft.sql.standard")]
    SqlStandard,
}

impl MetricKind {
    pub const ALL: [MetricKind; 16] = [
        MetricKind::OracleProcessor,
        MetricKind::SagProcessor,
        MetricKind::IbmPvu,
        MetricKind::OracleNamedUser,
        MetricKind::AttributeCounter,
        MetricKind::InstanceNumber,
        MetricKind::AttributeSum,
        MetricKind::EquipmentAttribute,
        MetricKind::UserSum,
        MetricKind::UserNominative,
        MetricKind::UserConcurrent,
        MetricKind::Static,
        MetricKind::WindowsServerStandard,
        MetricKind::WindowsServerDatacenter,
        MetricKind::SqlEnterprise,
        MetricKind::SqlStandard,
    ];

    /// Wire name of the kind
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricKind::OracleProcessor => "oracle.processor.standard",
            MetricKind::SagProcessor => "sag.processor.standard",
            MetricKind::IbmPvu => "ibm.pvu.standard",
            MetricKind::OracleNamedUser => "oracle.nup.standard",
            MetricKind::AttributeCounter => "attribute.counter.standard",
            MetricKind::InstanceNumber => "instance.number.standard",
            MetricKind::AttributeSum => "attribute.sum.standard",
            MetricKind::EquipmentAttribute => "equipment.attribute.standard",
            MetricKind::UserSum => "user.sum.standard",
            MetricKind::UserNominative => "user.nominative.standard",
            MetricKind::UserConcurrent => "user.concurrent.standard",
            MetricKind::Static => "static.standard",
            MetricKind::WindowsServerStandard => "windows.server.standard",
            MetricKind::WindowsServerDatacenter => "windows.server.datacenter",
            MetricKind::SqlEnterprise => "microsoft.sql.enterprise",
            MetricKind::SqlStandard => "microsoft.sql.standard",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricKind {
    type Err = EntitleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigurationError::UnknownMetricKind(s.to_string()).into())
    }
}

/// Processor metric: cpu x cores x core factor over a type chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessorMetric {
    /// Lowest type of the chain
    pub start_type: String,
    /// Type the per-instance formula is evaluated on
    pub base_type: String,
    /// Type where fractional values are rounded up
    pub aggregate_type: String,
    /// Highest type of the chain
    pub end_type: String,
    pub num_cpu_attr: String,
    pub num_cores_attr: String,
    pub core_factor_attr: String,
}

/// SAG processor metric, split by production environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagProcessorMetric {
    pub base_type: String,
    pub num_cpu_attr: String,
    pub num_cores_attr: String,
    pub core_factor_attr: String,
    /// Attribute on the base type holding the environment label
    #[serde(default = "default_environment_attr")]
    pub environment_attr: String,
}

fn default_environment_attr() -> String {
    "environment".to_string()
}

/// IBM PVU metric evaluated on the base type only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PvuMetric {
    pub base_type: String,
    pub num_cpu_attr: String,
    pub num_cores_attr: String,
    pub core_factor_attr: String,
}

/// Oracle named user plus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedUserMetric {
    #[serde(flatten)]
    pub processor: ProcessorMetric,
    /// Minimum named users per processor
    pub users_per_processor: u64,
    /// Report this metric through its transform target
    #[serde(default)]
    pub transform: bool,
    /// Processor metric this metric transforms into
    #[serde(default)]
    pub transform_metric_name: Option<String>,
}

/// Count of equipment whose attribute equals a value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCounterMetric {
    pub equipment_type: String,
    pub attribute: String,
    pub value: String,
}

/// Product instances times a coefficient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceNumberMetric {
    pub coefficient: Decimal,
}

/// Attribute sum divided by a reference value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeSumMetric {
    pub equipment_type: String,
    pub attribute: String,
    pub reference_value: Decimal,
}

/// Attribute sum over equipment of selected environments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquipmentAttributeMetric {
    pub equipment_type: String,
    pub attribute: String,
    /// Accepted environment labels; empty accepts all
    #[serde(default)]
    pub environments: Vec<String>,
    pub reference_value: Decimal,
}

/// Named users restricted to a profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserNominativeMetric {
    #[serde(default)]
    pub profile: Option<String>,
}

/// Fixed number of licenses per entitled product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticMetric {
    pub reference_value: u64,
}

/// Server and virtual machine hybrid metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridMetric {
    pub server_type: String,
    pub vm_type: String,
    pub num_cpu_attr: String,
    pub num_cores_attr: String,
    pub vcpu_attr: String,
}

/// Per-kind metric configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MetricConfig {
    #[serde(rename = "oracle.processor.standard")]
    OracleProcessor(ProcessorMetric),
    #[serde(rename = "sag.processor.standard")]
    SagProcessor(SagProcessorMetric),
    #[serde(rename = "ibm.pvu.standard")]
    IbmPvu(PvuMetric),
    #[serde(rename = "oracle.nup.standard")]
    OracleNamedUser(NamedUserMetric),
    #[serde(rename = "attribute.counter.standard")]
    AttributeCounter(AttributeCounterMetric),
    #[serde(rename = "instance.number.standard")]
    InstanceNumber(InstanceNumberMetric),
    #[serde(rename = "attribute.sum.standard")]
    AttributeSum(AttributeSumMetric),
    #[serde(rename = "equipment.attribute.standard")]
    EquipmentAttribute(EquipmentAttributeMetric),
    #[serde(rename = "user.sum.standard")]
    UserSum,
    #[serde(rename = "user.nominative.standard")]
    UserNominative(UserNominativeMetric),
    #[serde(rename = "user.concurrent.standard")]
    UserConcurrent,
    #[serde(rename = "static.standard")]
    Static(StaticMetric),
    #[serde(rename = "windows.server.standard")]
    WindowsServerStandard(HybridMetric),
    #[serde(rename = "windows.server.datacenter")]
    WindowsServerDatacenter(HybridMetric),
    #[serde(rename = "microsoft.sql.enterprise")]
    SqlEnterprise(HybridMetric),
    #[serde(rename = "microsoft.sql.standard")]
    SqlStandard(HybridMetric),
}

impl MetricConfig {
    pub fn kind(&self) -> MetricKind {
        match self {
            MetricConfig::OracleProcessor(_) => MetricKind::OracleProcessor,
            MetricConfig::SagProcessor(_) => MetricKind::SagProcessor,
            MetricConfig::IbmPvu(_) => MetricKind::IbmPvu,
            MetricConfig::OracleNamedUser(_) => MetricKind::OracleNamedUser,
            MetricConfig::AttributeCounter(_) => MetricKind::AttributeCounter,
            MetricConfig::InstanceNumber(_) => MetricKind::InstanceNumber,
            MetricConfig::AttributeSum(_) => MetricKind::AttributeSum,
            MetricConfig::EquipmentAttribute(_) => MetricKind::EquipmentAttribute,
            MetricConfig::UserSum => MetricKind::UserSum,
            MetricConfig::UserNominative(_) => MetricKind::UserNominative,
            MetricConfig::UserConcurrent => MetricKind::UserConcurrent,
            MetricConfig::Static(_) => MetricKind::Static,
            MetricConfig::WindowsServerStandard(_) => MetricKind::WindowsServerStandard,
            MetricConfig::WindowsServerDatacenter(_) => MetricKind::WindowsServerDatacenter,
            MetricConfig::SqlEnterprise(_) => MetricKind::SqlEnterprise,
            MetricConfig::SqlStandard(_) => MetricKind::SqlStandard,
        }
    }
}

/// A named metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDefinition {
    /// Metric name, unique within a scope
    pub name: String,
    #[serde(flatten)]
    pub config: MetricConfig,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, config: MetricConfig) -> Self {
        Self {
            name: name.into(),
            config,
        }
    }

    pub fn kind(&self) -> MetricKind {
        self.config.kind()
    }
}

/// Result of one license computation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputedLicenses {
    /// Licenses required, ceiling applied
    pub licenses: u64,
    /// Secondary figure; its meaning depends on the metric kind
    pub detail: u64,
    /// Unceiled total for sum metrics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_total: Option<Decimal>,
    /// Metric whose entitlement was merged into this result
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transformed_from: Option<String>,
}

impl ComputedLicenses {
    pub fn new(licenses: u64) -> Self {
        Self {
            licenses,
            ..Default::default()
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    pub fn with_detail(mut self, detail: u64) -> Self {
        self.detail = detail;
        self
    }

    pub fn with_raw_total(mut self, raw_total: Decimal) -> Self {
        self.raw_total = Some(raw_total);
        self
    }

    pub fn with_transform(mut self, source_metric: impl Into<String>) -> Self {
        self.transformed_from = Some(source_metric.into());
        self
    }
}
