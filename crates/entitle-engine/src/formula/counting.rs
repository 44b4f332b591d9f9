//! Equipment and instance counters

use entitle_common::{Attribute, ComputedLicenses, Result};
use rust_decimal::Decimal;
use tracing::{debug, instrument};

use crate::aggregation::rounding::ceil_to_u64;
use crate::context::ComputationContext;
use crate::registry::attribute_read;

/// Product equipment of a type whose attribute holds `value`
#[instrument(skip(ctx, attribute), fields(attribute = %attribute.name))]
pub async fn attribute_counter(
    ctx: &ComputationContext,
    equipment_type: &str,
    attribute: &Attribute,
    value: &str,
) -> Result<ComputedLicenses> {
    let ids = ctx.product_equipment(equipment_type).await?;
    let reads = [attribute_read(attribute, ctx.simulated())];
    let rows = ctx.attribute_values(&ids, &reads).await?;

    let count = rows
        .values()
        .filter(|row| {
            row.first()
                .and_then(|v| v.as_ref())
                .map(|v| v.matches(value))
                .unwrap_or(false)
        })
        .count() as u64;

    debug!(candidates = ids.len(), count, "Attribute counter");
    Ok(ComputedLicenses::new(count))
}

/// Distinct equipment linked to the products, scaled by a coefficient
#[instrument(skip(ctx))]
pub async fn instance_number(
    ctx: &ComputationContext,
    coefficient: Decimal,
) -> Result<ComputedLicenses> {
    let linked = ctx.linked_equipment().await?;
    let instances = if linked.is_empty() {
        0
    } else {
        ctx.graph().count_distinct(ctx.scope(), &linked).await?
    };
    let licenses = ceil_to_u64(Decimal::from(instances) * coefficient)?;
    Ok(ComputedLicenses::new(licenses).with_detail(instances))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::InMemoryEquipmentGraph;
    use entitle_common::{DataKind, Equipment};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn ctx() -> ComputationContext {
        let graph = InMemoryEquipmentGraph::new();
        graph.insert_equipment("sc", Equipment::new("s1", "server").with_text("edition", "Enterprise"));
        graph.insert_equipment("sc", Equipment::new("s2", "server").with_text("edition", "standard"));
        graph.insert_equipment("sc", Equipment::new("s3", "server").with_text("edition", "enterprise"));
        graph.insert_equipment("sc", Equipment::new("vm1", "virtualmachine"));
        graph.link_product(
            "sc",
            "db",
            vec!["s1".to_string(), "s2".to_string(), "s3".to_string(), "vm1".to_string()],
        );
        ComputationContext::new(Arc::new(graph), "sc", vec!["db".into()])
    }

    #[tokio::test]
    async fn test_attribute_counter_matches_case_insensitively() {
        let attribute = Attribute::new("edition", DataKind::String);
        let result = attribute_counter(&ctx(), "server", &attribute, "ENTERPRISE")
            .await
            .unwrap();
        assert_eq!(result.licenses, 2);
    }

    #[tokio::test]
    async fn test_instance_number() {
        let result = instance_number(&ctx(), dec!(0.5)).await.unwrap();
        assert_eq!(result.detail, 4);
        assert_eq!(result.licenses, 2);

        let result = instance_number(&ctx(), dec!(0.3)).await.unwrap();
        assert_eq!(result.licenses, 2);
    }
}
