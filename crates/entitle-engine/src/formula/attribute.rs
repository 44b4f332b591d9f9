//! Attribute sums over product equipment
//!
//! - [`attribute_sum`]: every product equipment of one type
//! - [`equipment_attribute`]: only equipment whose environment, read on the
//!   type itself or on its nearest ancestor carrying it, is allowed

use entitle_common::{Attribute, ComputedLicenses, EquipmentId, Result, TypeChain};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::aggregation::rounding::ceil_to_u64;
use crate::context::ComputationContext;
use crate::graph::AttributeRead;
use crate::registry::{attribute_read, ENVIRONMENT_ATTRIBUTE};

async fn sum_attribute(
    ctx: &ComputationContext,
    ids: &[EquipmentId],
    attribute: &Attribute,
) -> Result<Decimal> {
    let reads = [attribute_read(attribute, ctx.simulated())];
    let rows = ctx.attribute_values(ids, &reads).await?;
    Ok(rows
        .values()
        .filter_map(|row| row.first().and_then(|v| v.as_ref()).and_then(|v| v.as_decimal()))
        .sum())
}

fn sum_result(total: Decimal, reference_value: Decimal) -> Result<ComputedLicenses> {
    let licenses = ceil_to_u64(total / reference_value)?;
    let detail = total.trunc().to_u64().unwrap_or_default();
    Ok(ComputedLicenses::new(licenses)
        .with_detail(detail)
        .with_raw_total(total))
}

/// ceil(sum of the attribute / reference value)
#[instrument(skip(ctx, attribute), fields(attribute = %attribute.name))]
pub async fn attribute_sum(
    ctx: &ComputationContext,
    equipment_type: &str,
    attribute: &Attribute,
    reference_value: Decimal,
) -> Result<ComputedLicenses> {
    let ids = ctx.product_equipment(equipment_type).await?;
    let total = sum_attribute(ctx, &ids, attribute).await?;
    debug!(equipment = ids.len(), total = %total, "Attribute sum");
    sum_result(total, reference_value)
}

/// Attribute sum restricted to allowed environments; an empty list allows all
#[instrument(skip(ctx, chain, attribute), fields(chain = %chain, attribute = %attribute.name))]
pub async fn equipment_attribute(
    ctx: &ComputationContext,
    chain: &TypeChain,
    attribute: &Attribute,
    environments: &[String],
    reference_value: Decimal,
) -> Result<ComputedLicenses> {
    let Some(eq_type) = chain.get(0) else {
        return Ok(ComputedLicenses::zero());
    };
    let ids = ctx.product_equipment(&eq_type.name).await?;

    let kept: Vec<EquipmentId> = if environments.is_empty() {
        ids
    } else {
        // Follow each instance to the level carrying the environment
        let mut owner: HashMap<EquipmentId, EquipmentId> =
            ids.iter().map(|id| (id.clone(), id.clone())).collect();
        for level in 1..chain.len() {
            let current: Vec<EquipmentId> = owner.values().cloned().collect();
            let parents = ctx.parents(&current, &chain.types()[level].name).await?;
            owner = owner
                .into_iter()
                .filter_map(|(id, node)| parents.get(&node).map(|p| (id, p.clone())))
                .collect();
        }
        let carriers: Vec<EquipmentId> = owner.values().cloned().collect();
        let rows = ctx
            .attribute_values(&carriers, &[AttributeRead::stored(ENVIRONMENT_ATTRIBUTE)])
            .await?;
        let mut kept: Vec<EquipmentId> = owner
            .into_iter()
            .filter(|(_, carrier)| {
                rows.get(carrier)
                    .and_then(|row| row.first().cloned().flatten())
                    .map(|env| environments.iter().any(|allowed| env.matches(allowed)))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id)
            .collect();
        kept.sort();
        kept
    };

    let total = sum_attribute(ctx, &kept, attribute).await?;
    debug!(kept = kept.len(), total = %total, "Equipment attribute sum");
    sum_result(total, reference_value)
}
