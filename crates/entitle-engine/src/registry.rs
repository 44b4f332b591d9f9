//! Metric configuration registry
//!
//! Maps each metric kind to its description, its formula and the strategy
//! used to combine per-instance values. Resolving a [`MetricDefinition`]
//! against a scope's [`TypeCatalog`] validates every type and attribute
//! reference up front, so formulas never meet an unresolved name.

use entitle_common::{
    Attribute, AttributeValue, ConfigurationError, EntitleError, MetricConfig, MetricDefinition,
    MetricKind, ProcessorMetric, Result, TypeCatalog, TypeChain,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

use crate::aggregation::rounding::{aggregate_index, validate_levels};
use crate::formula::hybrid::{
    HybridFormula, SQL_SERVER_ENTERPRISE, SQL_SERVER_STANDARD, WINDOWS_SERVER_DATACENTER,
    WINDOWS_SERVER_STANDARD,
};
use crate::formula::{processor_value, InstanceFormula};
use crate::graph::AttributeRead;

/// Caller-supplied what-if values, keyed by attribute name
pub type SimulatedValues = HashMap<String, AttributeValue>;

/// How per-instance values are combined into licenses
#[derive(Debug, Clone, Copy)]
pub enum Strategy {
    /// Level-by-level traversal with a single rounding at the aggregate level
    Hierarchical(InstanceFormula),
    /// Hierarchical traversal reconciled against named users
    NamedUser(InstanceFormula),
    /// Per-instance values on the base type only
    BaseLevel(InstanceFormula),
    /// Base-level values split into production and non-production
    EnvironmentSplit(InstanceFormula),
    /// Physical servers and hosted virtual machines
    Hybrid(&'static dyn HybridFormula),
    EquipmentCount,
    InstanceCount,
    AttributeSum,
    UserCount,
    Fixed,
}

/// Registered metric kind
#[derive(Debug, Clone, Serialize)]
pub struct MetricSpec {
    pub kind: MetricKind,
    pub description: &'static str,
    #[serde(skip)]
    pub strategy: Strategy,
}

/// Chain, levels and attributes of a processor-style metric
#[derive(Debug, Clone)]
pub struct ProcessorLevels {
    /// Chain from the start type to the end type
    pub chain: TypeChain,
    pub base: usize,
    pub aggregate: usize,
    pub cpu: Attribute,
    pub cores: Attribute,
    pub core_factor: Attribute,
}

impl ProcessorLevels {
    pub fn top(&self) -> usize {
        self.chain.top()
    }

    /// Type name at a level
    pub fn type_at(&self, level: usize) -> &str {
        self.chain
            .get(level)
            .map(|t| t.name.as_str())
            .unwrap_or_default()
    }

    /// Attribute reads for the base formula, applying what-if values
    pub fn reads(&self, simulated: &SimulatedValues) -> Vec<AttributeRead> {
        [&self.cpu, &self.cores, &self.core_factor]
            .into_iter()
            .map(|attr| attribute_read(attr, simulated))
            .collect()
    }
}

/// Resolve one attribute read, honouring simulation only for simulated attributes
pub fn attribute_read(attribute: &Attribute, simulated: &SimulatedValues) -> AttributeRead {
    let value = simulated.get(&attribute.name).or_else(|| {
        simulated
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(&attribute.name))
            .map(|(_, v)| v)
    });
    match value {
        Some(value) if attribute.simulated => AttributeRead::simulated(&attribute.name, value.clone()),
        Some(_) => {
            warn!(attribute = %attribute.name, "Ignoring what-if value for non-simulated attribute");
            AttributeRead::stored(&attribute.name)
        }
        None => AttributeRead::stored(&attribute.name),
    }
}

/// Server and VM types of a hybrid metric
#[derive(Debug, Clone)]
pub struct HybridTypes {
    pub server_type: String,
    pub vm_type: String,
    pub cpu: Attribute,
    pub cores: Attribute,
    pub vcpu: Attribute,
}

/// Metric definition validated against a type catalog
#[derive(Debug, Clone)]
pub enum ResolvedMetric {
    Processor {
        levels: ProcessorLevels,
        formula: InstanceFormula,
    },
    NamedUser {
        levels: ProcessorLevels,
        formula: InstanceFormula,
        users_per_processor: u64,
    },
    BaseLevel {
        levels: ProcessorLevels,
        formula: InstanceFormula,
    },
    EnvironmentSplit {
        levels: ProcessorLevels,
        formula: InstanceFormula,
        environment: Attribute,
    },
    Hybrid {
        formula: &'static dyn HybridFormula,
        types: HybridTypes,
    },
    AttributeCounter {
        equipment_type: String,
        attribute: Attribute,
        value: String,
    },
    InstanceNumber {
        coefficient: Decimal,
    },
    AttributeSum {
        equipment_type: String,
        attribute: Attribute,
        reference_value: Decimal,
    },
    EquipmentAttribute {
        /// From the counted type up to the type carrying the environment
        chain: TypeChain,
        attribute: Attribute,
        environments: Vec<String>,
        reference_value: Decimal,
    },
    UserSum,
    UserNominative {
        profile: Option<String>,
    },
    UserConcurrent,
    Static {
        reference_value: u64,
    },
}

/// Registry of metric kinds
pub struct MetricRegistry {
    specs: HashMap<MetricKind, MetricSpec>,
}

impl MetricRegistry {
    /// Registry with every standard metric kind
    pub fn standard() -> Self {
        let mut registry = Self {
            specs: HashMap::new(),
        };
        let specs = [
            (
                MetricKind::OracleProcessor,
                "Processor licenses = CPU x cores per CPU x core factor",
                Strategy::Hierarchical(processor_value as InstanceFormula),
            ),
            (
                MetricKind::SagProcessor,
                "Processor licenses = MAX(production, non-production), each CPU x cores per CPU x core factor",
                Strategy::EnvironmentSplit(processor_value as InstanceFormula),
            ),
            (
                MetricKind::IbmPvu,
                "PVU licenses = CPU x cores per CPU x core factor",
                Strategy::BaseLevel(processor_value as InstanceFormula),
            ),
            (
                MetricKind::OracleNamedUser,
                "Named user plus = MAX(processors x minimum users per processor, current users)",
                Strategy::NamedUser(processor_value as InstanceFormula),
            ),
            (
                MetricKind::AttributeCounter,
                "Number of equipment of a type whose attribute holds a given value",
                Strategy::EquipmentCount,
            ),
            (
                MetricKind::InstanceNumber,
                "Number of product instances multiplied by a coefficient",
                Strategy::InstanceCount,
            ),
            (
                MetricKind::AttributeSum,
                "Sum of an attribute divided by a reference value",
                Strategy::AttributeSum,
            ),
            (
                MetricKind::EquipmentAttribute,
                "Sum of an attribute over equipment of selected environments divided by a reference value",
                Strategy::AttributeSum,
            ),
            (MetricKind::UserSum, "Sum of users", Strategy::UserCount),
            (
                MetricKind::UserNominative,
                "Number of nominative users of a profile",
                Strategy::UserCount,
            ),
            (
                MetricKind::UserConcurrent,
                "Sum of concurrent users",
                Strategy::UserCount,
            ),
            (
                MetricKind::Static,
                "Fixed number of licenses",
                Strategy::Fixed,
            ),
            (
                MetricKind::WindowsServerStandard,
                "Windows Server Standard core licenses for servers and hosted virtual machines",
                Strategy::Hybrid(&WINDOWS_SERVER_STANDARD),
            ),
            (
                MetricKind::WindowsServerDatacenter,
                "Windows Server Datacenter core licenses for servers and virtual machine hosts",
                Strategy::Hybrid(&WINDOWS_SERVER_DATACENTER),
            ),
            (
                MetricKind::SqlEnterprise,
                "SQL Server Enterprise core licenses for servers and virtual machines",
                Strategy::Hybrid(&SQL_SERVER_ENTERPRISE),
            ),
            (
                MetricKind::SqlStandard,
                "SQL Server Standard core licenses for servers and virtual machines",
                Strategy::Hybrid(&SQL_SERVER_STANDARD),
            ),
        ];
        for (kind, description, strategy) in specs {
            registry.register(MetricSpec {
                kind,
                description,
                strategy,
            });
        }
        registry
    }

    /// Register or replace a kind
    pub fn register(&mut self, spec: MetricSpec) {
        self.specs.insert(spec.kind, spec);
    }

    pub fn get(&self, kind: MetricKind) -> Option<&MetricSpec> {
        self.specs.get(&kind)
    }

    /// Registered kinds in catalog order
    pub fn specs(&self) -> Vec<&MetricSpec> {
        MetricKind::ALL
            .iter()
            .filter_map(|kind| self.specs.get(kind))
            .collect()
    }

    /// Validate a definition against the catalog
    pub fn resolve(
        &self,
        definition: &MetricDefinition,
        catalog: &TypeCatalog,
    ) -> Result<ResolvedMetric> {
        let spec = self.get(definition.kind()).ok_or_else(|| {
            ConfigurationError::UnknownMetricKind(definition.kind().to_string())
        })?;

        match (&definition.config, spec.strategy) {
            (MetricConfig::OracleProcessor(config), Strategy::Hierarchical(formula)) => {
                Ok(ResolvedMetric::Processor {
                    levels: resolve_processor(config, catalog)?,
                    formula,
                })
            }
            (MetricConfig::OracleNamedUser(config), Strategy::NamedUser(formula)) => {
                if config.users_per_processor == 0 {
                    return Err(ConfigurationError::InvalidParameter(format!(
                        "{}: users per processor must be positive",
                        definition.name
                    ))
                    .into());
                }
                Ok(ResolvedMetric::NamedUser {
                    levels: resolve_processor(&config.processor, catalog)?,
                    formula,
                    users_per_processor: config.users_per_processor,
                })
            }
            (MetricConfig::IbmPvu(config), Strategy::BaseLevel(formula)) => {
                Ok(ResolvedMetric::BaseLevel {
                    levels: resolve_base_level(
                        &config.base_type,
                        &config.num_cpu_attr,
                        &config.num_cores_attr,
                        &config.core_factor_attr,
                        catalog,
                    )?,
                    formula,
                })
            }
            (MetricConfig::SagProcessor(config), Strategy::EnvironmentSplit(formula)) => {
                let levels = resolve_base_level(
                    &config.base_type,
                    &config.num_cpu_attr,
                    &config.num_cores_attr,
                    &config.core_factor_attr,
                    catalog,
                )?;
                let environment = catalog
                    .require(&config.base_type)?
                    .require_attribute(&config.environment_attr)?
                    .clone();
                Ok(ResolvedMetric::EnvironmentSplit {
                    levels,
                    formula,
                    environment,
                })
            }
            (
                MetricConfig::WindowsServerStandard(config)
                | MetricConfig::WindowsServerDatacenter(config)
                | MetricConfig::SqlEnterprise(config)
                | MetricConfig::SqlStandard(config),
                Strategy::Hybrid(formula),
            ) => {
                let server = catalog.require(&config.server_type)?;
                let vm = catalog.require(&config.vm_type)?;
                Ok(ResolvedMetric::Hybrid {
                    formula,
                    types: HybridTypes {
                        server_type: server.name.clone(),
                        vm_type: vm.name.clone(),
                        cpu: server.require_numeric_attribute(&config.num_cpu_attr)?.clone(),
                        cores: server
                            .require_numeric_attribute(&config.num_cores_attr)?
                            .clone(),
                        vcpu: vm.require_numeric_attribute(&config.vcpu_attr)?.clone(),
                    },
                })
            }
            (MetricConfig::AttributeCounter(config), Strategy::EquipmentCount) => {
                let eq_type = catalog.require(&config.equipment_type)?;
                Ok(ResolvedMetric::AttributeCounter {
                    equipment_type: eq_type.name.clone(),
                    attribute: eq_type.require_attribute(&config.attribute)?.clone(),
                    value: config.value.clone(),
                })
            }
            (MetricConfig::InstanceNumber(config), Strategy::InstanceCount) => {
                positive(&definition.name, "coefficient", config.coefficient)?;
                Ok(ResolvedMetric::InstanceNumber {
                    coefficient: config.coefficient,
                })
            }
            (MetricConfig::AttributeSum(config), Strategy::AttributeSum) => {
                positive(&definition.name, "reference value", config.reference_value)?;
                let eq_type = catalog.require(&config.equipment_type)?;
                Ok(ResolvedMetric::AttributeSum {
                    equipment_type: eq_type.name.clone(),
                    attribute: eq_type.require_numeric_attribute(&config.attribute)?.clone(),
                    reference_value: config.reference_value,
                })
            }
            (MetricConfig::EquipmentAttribute(config), Strategy::AttributeSum) => {
                positive(&definition.name, "reference value", config.reference_value)?;
                let eq_type = catalog.require(&config.equipment_type)?;
                let attribute = eq_type.require_numeric_attribute(&config.attribute)?.clone();
                let hierarchy = catalog.parent_hierarchy(&eq_type.name)?;
                let environment_level = hierarchy
                    .types()
                    .iter()
                    .position(|t| t.attribute(ENVIRONMENT_ATTRIBUTE).is_some())
                    .ok_or_else(|| ConfigurationError::AttributeNotFound {
                        type_name: eq_type.name.clone(),
                        attribute: ENVIRONMENT_ATTRIBUTE.to_string(),
                    })?;
                Ok(ResolvedMetric::EquipmentAttribute {
                    chain: hierarchy.slice(0, environment_level),
                    attribute,
                    environments: config.environments.clone(),
                    reference_value: config.reference_value,
                })
            }
            (MetricConfig::UserSum, Strategy::UserCount) => Ok(ResolvedMetric::UserSum),
            (MetricConfig::UserNominative(config), Strategy::UserCount) => {
                Ok(ResolvedMetric::UserNominative {
                    profile: config.profile.clone(),
                })
            }
            (MetricConfig::UserConcurrent, Strategy::UserCount) => {
                Ok(ResolvedMetric::UserConcurrent)
            }
            (MetricConfig::Static(config), Strategy::Fixed) => Ok(ResolvedMetric::Static {
                reference_value: config.reference_value,
            }),
            (config, strategy) => Err(EntitleError::Internal(format!(
                "metric kind {} registered with incompatible strategy {:?}",
                config.kind(),
                strategy
            ))),
        }
    }
}

impl Default for MetricRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Attribute naming the environment of an equipment
pub const ENVIRONMENT_ATTRIBUTE: &str = "environment";

fn positive(metric: &str, what: &str, value: Decimal) -> Result<()> {
    if value > Decimal::ZERO {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidParameter(format!(
            "{}: {} must be positive, got {}",
            metric, what, value
        ))
        .into())
    }
}

fn resolve_processor(config: &ProcessorMetric, catalog: &TypeCatalog) -> Result<ProcessorLevels> {
    let hierarchy = catalog.parent_hierarchy(&config.start_type)?;
    let end = hierarchy.require_index(&config.end_type, "end")?;
    let chain = hierarchy.slice(0, end);
    let base = chain.require_index(&config.base_type, "base")?;
    let aggregate = aggregate_index(&chain, &config.aggregate_type)?;
    validate_levels(base, aggregate, chain.top())?;
    processor_levels(chain, base, aggregate, config.num_cpu_attr.as_str(), &config.num_cores_attr, &config.core_factor_attr)
}

fn resolve_base_level(
    base_type: &str,
    cpu: &str,
    cores: &str,
    core_factor: &str,
    catalog: &TypeCatalog,
) -> Result<ProcessorLevels> {
    let base = catalog.require(base_type)?;
    let chain = TypeChain::new(vec![base.clone()]);
    processor_levels(chain, 0, 0, cpu, cores, core_factor)
}

fn processor_levels(
    chain: TypeChain,
    base: usize,
    aggregate: usize,
    cpu: &str,
    cores: &str,
    core_factor: &str,
) -> Result<ProcessorLevels> {
    let base_type = chain
        .get(base)
        .ok_or_else(|| EntitleError::Internal("base level outside of chain".to_string()))?;
    Ok(ProcessorLevels {
        cpu: base_type.require_numeric_attribute(cpu)?.clone(),
        cores: base_type.require_numeric_attribute(cores)?.clone(),
        core_factor: base_type.require_numeric_attribute(core_factor)?.clone(),
        chain,
        base,
        aggregate,
    })
}
