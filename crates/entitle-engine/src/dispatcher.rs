//! License computation dispatcher
//!
//! Entry point of the engine. Resolves a metric by name, validates it
//! against the scope's type catalog, resolves allocations, and routes the
//! computation to the aggregation engine or to the matching formula.

use chrono::Utc;
use entitle_common::{
    ComputedLicenses, ConfigurationError, EntitleError, EquipmentId, MetricConfig,
    MetricDefinition, MetricKind, ProductId, Result,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::aggregation::{NamedUserAggregator, ProcessorAggregator};
use crate::config::EngineConfig;
use crate::context::ComputationContext;
use crate::formula::{attribute, base_level, counting, hybrid, users};
use crate::graph::EquipmentGraph;
use crate::registry::{MetricRegistry, MetricSpec, ResolvedMetric, SimulatedValues};
use crate::resolver::resolve_allocations;
use crate::store::MetricStore;

/// One license computation for a set of products
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ComputeRequest {
    pub scope: String,
    pub metric: String,
    pub products: Vec<ProductId>,
    /// What-if attribute values
    #[serde(default)]
    pub simulated: SimulatedValues,
    /// Restrict the computation to these equipment ids
    #[serde(default)]
    pub equipment: Vec<EquipmentId>,
}

impl ComputeRequest {
    pub fn new(scope: impl Into<String>, metric: impl Into<String>, products: Vec<ProductId>) -> Self {
        Self {
            scope: scope.into(),
            metric: metric.into(),
            products,
            ..Default::default()
        }
    }

    pub fn with_simulated(
        mut self,
        attribute: impl Into<String>,
        value: entitle_common::AttributeValue,
    ) -> Self {
        self.simulated.insert(attribute.into(), value);
        self
    }

    pub fn with_equipment(mut self, ids: Vec<EquipmentId>) -> Self {
        self.equipment = ids;
        self
    }
}

/// Computation result with its provenance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationReport {
    pub computation_id: Uuid,
    /// Unix millis
    pub computed_at: i64,
    pub scope: String,
    pub metric: String,
    pub kind: MetricKind,
    pub products: Vec<ProductId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregation: Option<String>,
    pub result: ComputedLicenses,
}

/// License computation dispatcher
pub struct Dispatcher {
    graph: Arc<dyn EquipmentGraph>,
    metrics: Arc<dyn MetricStore>,
    registry: MetricRegistry,
    config: EngineConfig,
}

impl Dispatcher {
    pub fn new(graph: Arc<dyn EquipmentGraph>, metrics: Arc<dyn MetricStore>) -> Self {
        Self {
            graph,
            metrics,
            registry: MetricRegistry::standard(),
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_registry(mut self, registry: MetricRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Registered metric kinds and their descriptions
    pub fn metric_kinds(&self) -> Vec<&MetricSpec> {
        self.registry.specs()
    }

    /// Compute the licenses a set of products requires under a metric
    #[instrument(skip(self, request), fields(scope = %request.scope, metric = %request.metric))]
    pub async fn compute_licenses(&self, request: ComputeRequest) -> Result<ComputedLicenses> {
        let definition = self.definition(&request.scope, &request.metric).await?;
        self.compute(&request, &definition).await
    }

    /// Compute the licenses of an aggregation's members as one entitlement
    #[instrument(skip(self))]
    pub async fn compute_licenses_for_aggregation(
        &self,
        scope: &str,
        metric: &str,
        aggregation: &str,
    ) -> Result<ComputedLicenses> {
        let definition = self.definition(scope, metric).await?;
        let (_, result) = self
            .compute_members(scope, &definition, aggregation)
            .await?;
        Ok(result)
    }

    /// [`Self::compute_licenses`] wrapped in a report
    pub async fn report(&self, request: ComputeRequest) -> Result<ComputationReport> {
        let definition = self.definition(&request.scope, &request.metric).await?;
        let result = self.compute(&request, &definition).await?;
        Ok(ComputationReport {
            computation_id: Uuid::now_v7(),
            computed_at: Utc::now().timestamp_millis(),
            scope: request.scope,
            metric: definition.name,
            kind: definition.config.kind(),
            products: request.products,
            aggregation: None,
            result,
        })
    }

    /// [`Self::compute_licenses_for_aggregation`] wrapped in a report
    pub async fn report_for_aggregation(
        &self,
        scope: &str,
        metric: &str,
        aggregation: &str,
    ) -> Result<ComputationReport> {
        let definition = self.definition(scope, metric).await?;
        let (products, result) = self
            .compute_members(scope, &definition, aggregation)
            .await?;
        Ok(ComputationReport {
            computation_id: Uuid::now_v7(),
            computed_at: Utc::now().timestamp_millis(),
            scope: scope.to_string(),
            metric: definition.name.clone(),
            kind: definition.config.kind(),
            products,
            aggregation: Some(aggregation.to_string()),
            result,
        })
    }

    async fn compute_members(
        &self,
        scope: &str,
        definition: &MetricDefinition,
        aggregation: &str,
    ) -> Result<(Vec<ProductId>, ComputedLicenses)> {
        let members = self
            .graph
            .aggregation_products(scope, aggregation, &definition.name)
            .await?;
        if members.is_empty() {
            info!(aggregation, "No aggregation member holds the metric");
            return Ok((members, ComputedLicenses::zero()));
        }
        debug!(members = members.len(), "Aggregation members");
        let request = ComputeRequest::new(scope, definition.name.clone(), members);
        let result = self.compute(&request, definition).await?;
        Ok((request.products, result))
    }

    async fn definition(&self, scope: &str, metric: &str) -> Result<MetricDefinition> {
        self.metrics.metric(scope, metric).await?.ok_or_else(|| {
            ConfigurationError::UnknownMetric {
                name: metric.to_string(),
            }
            .into()
        })
    }

    async fn compute(
        &self,
        request: &ComputeRequest,
        definition: &MetricDefinition,
    ) -> Result<ComputedLicenses> {
        // A transformed named-user metric is computed as its processor target
        let (definition, transformed_from) = match &definition.config {
            MetricConfig::OracleNamedUser(config) if config.transform => {
                let target = config.transform_metric_name.as_deref().ok_or_else(|| {
                    ConfigurationError::InvalidParameter(format!(
                        "{}: transform requires a target metric",
                        definition.name
                    ))
                })?;
                let target = self.definition(&request.scope, target).await?;
                if target.kind() != MetricKind::OracleProcessor {
                    return Err(ConfigurationError::KindMismatch {
                        name: target.name.clone(),
                        expected: MetricKind::OracleProcessor.to_string(),
                        actual: target.kind().to_string(),
                    }
                    .into());
                }
                info!(from = %definition.name, to = %target.name, "Named user metric transformed");
                (target, Some(definition.name.clone()))
            }
            _ => (definition.clone(), None),
        };

        let catalog = self.metrics.equipment_types(&request.scope).await?;
        let resolved = self.registry.resolve(&definition, &catalog)?;

        for id in &request.equipment {
            self.graph.equipment(&request.scope, id).await?;
        }

        let vm_type = match &resolved {
            ResolvedMetric::Hybrid { types, .. } => Some(types.vm_type.as_str()),
            _ => None,
        };
        let scope_metrics = self.metrics.metrics(&request.scope).await?;
        let partition = resolve_allocations(
            self.graph.as_ref(),
            &request.scope,
            &request.products,
            &definition,
            &scope_metrics,
            vm_type,
        )
        .await?;

        let mut ctx = ComputationContext::new(
            Arc::clone(&self.graph),
            request.scope.clone(),
            request.products.clone(),
        )
        .with_simulated(request.simulated.clone())
        .with_partition(&partition)
        .with_concurrency(self.config.member_fetch_concurrency);
        if !request.equipment.is_empty() {
            ctx = ctx.with_only(request.equipment.clone());
        }

        let result = match self.evaluate(&ctx, &definition, &resolved).await {
            Ok(result) => result,
            Err(EntitleError::NoData(reason)) => {
                warn!(%reason, "No data, reporting zero licenses");
                ComputedLicenses::zero()
            }
            Err(e) => return Err(e),
        };

        let result = match transformed_from.or(partition.transform_source) {
            Some(source) => result.with_transform(source),
            None => result,
        };
        info!(
            metric = %definition.name,
            licenses = result.licenses,
            detail = result.detail,
            "Licenses computed"
        );
        Ok(result)
    }

    async fn evaluate(
        &self,
        ctx: &ComputationContext,
        definition: &MetricDefinition,
        resolved: &ResolvedMetric,
    ) -> Result<ComputedLicenses> {
        match resolved {
            ResolvedMetric::Processor { levels, formula }
            | ResolvedMetric::BaseLevel { levels, formula } => {
                let aggregation = ProcessorAggregator::new(levels, *formula)
                    .aggregate(ctx)
                    .await?;
                Ok(ComputedLicenses::new(aggregation.licenses()?))
            }
            ResolvedMetric::NamedUser {
                levels,
                formula,
                users_per_processor,
            } => {
                let aggregation = NamedUserAggregator::new(levels, *formula, *users_per_processor)
                    .aggregate(ctx)
                    .await?;
                Ok(ComputedLicenses::new(aggregation.licenses()).with_detail(aggregation.reconciled))
            }
            ResolvedMetric::EnvironmentSplit {
                levels,
                formula,
                environment,
            } => base_level::environment_split(
                ctx,
                levels,
                *formula,
                environment,
                &self.config.production_environment,
            )
            .await?
            .licenses(),
            ResolvedMetric::Hybrid { formula, types } => {
                let software_assurance = ctx.acquired_rights().await?.iter().any(|r| {
                    r.software_assurance && r.metric.eq_ignore_ascii_case(&definition.name)
                });
                hybrid::hybrid_licenses(ctx, types, *formula, software_assurance).await
            }
            ResolvedMetric::AttributeCounter {
                equipment_type,
                attribute,
                value,
            } => counting::attribute_counter(ctx, equipment_type, attribute, value).await,
            ResolvedMetric::InstanceNumber { coefficient } => {
                counting::instance_number(ctx, *coefficient).await
            }
            ResolvedMetric::AttributeSum {
                equipment_type,
                attribute,
                reference_value,
            } => attribute::attribute_sum(ctx, equipment_type, attribute, *reference_value).await,
            ResolvedMetric::EquipmentAttribute {
                chain,
                attribute,
                environments,
                reference_value,
            } => {
                attribute::equipment_attribute(ctx, chain, attribute, environments, *reference_value)
                    .await
            }
            ResolvedMetric::UserSum => users::user_sum(ctx).await,
            ResolvedMetric::UserNominative { profile } => {
                users::user_nominative(ctx, profile.as_deref()).await
            }
            ResolvedMetric::UserConcurrent => users::user_concurrent(ctx).await,
            ResolvedMetric::Static { reference_value } => {
                let held = ctx
                    .acquired_rights()
                    .await?
                    .iter()
                    .any(|r| r.metric.eq_ignore_ascii_case(&definition.name));
                Ok(if held {
                    ComputedLicenses::new(*reference_value)
                } else {
                    ComputedLicenses::zero()
                })
            }
        }
    }
}
