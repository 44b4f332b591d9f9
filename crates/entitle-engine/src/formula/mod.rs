//! License formulas
//!
//! - [`processor_value`]: per-instance processor capacity
//! - [`hybrid`]: server and virtual machine core formulas
//! - [`counting`]: equipment and instance counters
//! - [`attribute`]: attribute sums over equipment
//! - [`users`]: user based metrics
//! - [`base_level`]: per-instance processor metrics without hierarchy

pub mod attribute;
pub mod base_level;
pub mod counting;
pub mod hybrid;
pub mod users;

use entitle_common::{AccessorError, AttributeValue, EquipmentId, Result};
use rust_decimal::Decimal;
use tracing::debug;

use crate::graph::AttributeRow;

/// Pure function from attribute values to one instance's contribution
pub type InstanceFormula = fn(&[Decimal]) -> Decimal;

/// CPU x cores per CPU x core factor
pub fn processor_value(values: &[Decimal]) -> Decimal {
    values.iter().copied().product()
}

/// Numeric view of one attribute row; missing or non-numeric values count as zero
pub fn numeric_row(id: &EquipmentId, row: &[Option<AttributeValue>]) -> Vec<Decimal> {
    row.iter()
        .enumerate()
        .map(|(position, value)| match value.as_ref().and_then(|v| v.as_decimal()) {
            Some(value) => value,
            None => {
                debug!(equipment = %id, position, "Attribute missing, counted as zero");
                Decimal::ZERO
            }
        })
        .collect()
}

/// Fail when an accessor row does not hold one value per read
pub fn require_row_len(
    id: &EquipmentId,
    row: &[Option<AttributeValue>],
    reads: usize,
) -> Result<()> {
    if row.len() != reads {
        return Err(AccessorError::Query(format!(
            "equipment {}: {} attribute values for {} reads",
            id,
            row.len(),
            reads
        ))
        .into());
    }
    Ok(())
}

/// Evaluate a formula over an attribute row, zero when the instance has no row
pub fn evaluate(formula: InstanceFormula, id: &EquipmentId, row: Option<&AttributeRow>) -> Decimal {
    match row {
        Some(row) => formula(&numeric_row(id, row)),
        None => {
            debug!(equipment = %id, "No attributes for equipment, counted as zero");
            Decimal::ZERO
        }
    }
}
