//! Processor values on the base type, split by environment

use entitle_common::{Attribute, ComputedLicenses, Result};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use super::{numeric_row, require_row_len, InstanceFormula};
use crate::aggregation::rounding::ceil_to_u64;
use crate::context::ComputationContext;
use crate::graph::AttributeRead;
use crate::registry::ProcessorLevels;

/// Production and non-production totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvironmentSplit {
    pub production: Decimal,
    pub non_production: Decimal,
}

impl EnvironmentSplit {
    pub fn licenses(&self) -> Result<ComputedLicenses> {
        let production = ceil_to_u64(self.production)?;
        let non_production = ceil_to_u64(self.non_production)?;
        Ok(ComputedLicenses::new(production.max(non_production)).with_detail(non_production))
    }
}

/// Each base instance is rounded up, then summed into its environment
#[instrument(skip(ctx, levels, formula, environment), fields(base = levels.type_at(levels.base)))]
pub async fn environment_split(
    ctx: &ComputationContext,
    levels: &ProcessorLevels,
    formula: InstanceFormula,
    environment: &Attribute,
    production_label: &str,
) -> Result<EnvironmentSplit> {
    let ids = ctx.product_equipment(levels.type_at(levels.base)).await?;
    let mut reads = levels.reads(ctx.simulated());
    reads.push(AttributeRead::stored(&environment.name));
    let rows = ctx.attribute_values(&ids, &reads).await?;

    let mut split = EnvironmentSplit::default();
    for id in &ids {
        let Some(row) = rows.get(id) else {
            continue;
        };
        require_row_len(id, row, reads.len())?;
        let (capacity, env) = row.split_at(row.len() - 1);
        let value = formula(&numeric_row(id, capacity)).ceil();
        let is_production = env[0]
            .as_ref()
            .map(|v| v.matches(production_label))
            .unwrap_or(false);
        if is_production {
            split.production += value;
        } else {
            split.non_production += value;
        }
    }
    debug!(production = %split.production, non_production = %split.non_production, "Environment split");
    Ok(split)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::processor_value;
    use crate::graph::InMemoryEquipmentGraph;
    use entitle_common::{DataKind, Equipment, EquipmentType, TypeChain};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn server(id: &str, cores: i64, env: &str) -> Equipment {
        Equipment::new(id, "server")
            .with_int("cpu", 1)
            .with_int("cores", cores)
            .with_float("core_factor", dec!(0.5))
            .with_text("environment", env)
    }

    #[tokio::test]
    async fn test_split_by_environment() {
        let graph = InMemoryEquipmentGraph::new();
        graph.insert_equipment("sc", server("s1", 3, "Production"));
        graph.insert_equipment("sc", server("s2", 4, "production"));
        graph.insert_equipment("sc", server("s3", 5, "Development"));
        graph.link_product(
            "sc",
            "db",
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string()],
        );
        let ctx = ComputationContext::new(Arc::new(graph), "sc", vec!["db".into()]);
        let levels = ProcessorLevels {
            chain: TypeChain::new(vec![EquipmentType::new("server")]),
            base: 0,
            aggregate: 0,
            cpu: Attribute::new("cpu", DataKind::Int),
            cores: Attribute::new("cores", DataKind::Int),
            core_factor: Attribute::new("core_factor", DataKind::Float),
        };
        let environment = Attribute::new("environment", DataKind::String);

        let split = environment_split(&ctx, &levels, processor_value, &environment, "Production")
            .await
            .unwrap();
        // ceil(1.5) + 2 and ceil(2.5)
        assert_eq!(split.production, dec!(4));
        assert_eq!(split.non_production, dec!(3));

        let result = split.licenses().unwrap();
        assert_eq!(result.licenses, 4);
        assert_eq!(result.detail, 3);
    }

    #[tokio::test]
    async fn test_empty_row_is_an_accessor_error() {
        use crate::graph::MockEquipmentGraph;
        use entitle_common::EntitleError;

        let mut mock = MockEquipmentGraph::new();
        mock.expect_product_equipment()
            .returning(|_, _, _| Ok(vec!["s1".to_string()]));
        mock.expect_attribute_values()
            .returning(|_, _, _| Ok([("s1".to_string(), Vec::new())].into_iter().collect()));
        let ctx = ComputationContext::new(Arc::new(mock), "sc", vec!["db".into()]);
        let levels = ProcessorLevels {
            chain: TypeChain::new(vec![EquipmentType::new("server")]),
            base: 0,
            aggregate: 0,
            cpu: Attribute::new("cpu", DataKind::Int),
            cores: Attribute::new("cores", DataKind::Int),
            core_factor: Attribute::new("core_factor", DataKind::Float),
        };
        let environment = Attribute::new("environment", DataKind::String);

        let err = environment_split(&ctx, &levels, processor_value, &environment, "Production")
            .await
            .unwrap_err();
        assert!(matches!(err, EntitleError::Accessor(_)));
    }
}
