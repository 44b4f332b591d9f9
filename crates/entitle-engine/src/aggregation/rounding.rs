//! Rounding rules of the aggregation engine
//!
//! Fractional license quantities are rounded up exactly once, at the
//! aggregate level. These predicates operate on chain indexes only, so the
//! invariant can be checked without any traversal.

use entitle_common::{ConfigurationError, EntitleError, Result, TypeChain};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Whether a value produced at `level` is rounded before it flows upward.
pub fn ceil_level(level: usize, aggregate: usize) -> bool {
    level == aggregate
}

/// Whether the step from `level` to `parent_level` rounds its input.
///
/// `parent_level == level` denotes a root: a node with no parent in the
/// chain. Roots at or below the aggregate level are rounded on their own.
pub fn ceil_required(level: usize, parent_level: usize, aggregate: usize) -> bool {
    aggregate == level || (level <= aggregate && parent_level == level)
}

/// Index of the aggregate type in the chain
pub fn aggregate_index(chain: &TypeChain, aggregate_type: &str) -> Result<usize> {
    chain.require_index(aggregate_type, "aggregate")
}

/// Validate `base <= aggregate <= top`
pub fn validate_levels(base: usize, aggregate: usize, top: usize) -> Result<()> {
    if base <= aggregate && aggregate <= top {
        Ok(())
    } else {
        Err(ConfigurationError::InvalidLevelOrder {
            base,
            aggregate,
            top,
        }
        .into())
    }
}

/// Round up and convert to a license count; negative values count as zero
pub fn ceil_to_u64(value: Decimal) -> Result<u64> {
    if value <= Decimal::ZERO {
        return Ok(0);
    }
    value
        .ceil()
        .to_u64()
        .ok_or_else(|| EntitleError::Internal(format!("license count overflow: {}", value)))
}

/// Apply the rounding for `level` when `required` holds
pub fn round_if(value: Decimal, required: bool) -> Decimal {
    if required {
        value.ceil()
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use entitle_common::EquipmentType;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ceil_level_only_at_aggregate() {
        assert!(!ceil_level(1, 2));
        assert!(ceil_level(2, 2));
        assert!(!ceil_level(3, 2));
    }

    #[test]
    fn test_ceil_required_for_steps() {
        // server -> cluster with aggregate = cluster
        assert!(!ceil_required(1, 2, 2));
        // cluster -> vcenter with aggregate = cluster
        assert!(ceil_required(2, 3, 2));
        // vcenter -> datacenter with aggregate = cluster
        assert!(!ceil_required(3, 4, 2));
    }

    #[test]
    fn test_ceil_required_for_roots() {
        assert!(ceil_required(1, 1, 2));
        assert!(ceil_required(2, 2, 2));
        assert!(!ceil_required(3, 3, 2));
    }

    #[test]
    fn test_aggregate_index() {
        let chain = TypeChain::new(vec![
            EquipmentType::new("partition"),
            EquipmentType::new("server"),
            EquipmentType::new("cluster"),
        ]);
        assert_eq!(aggregate_index(&chain, "Cluster").unwrap(), 2);
        assert!(aggregate_index(&chain, "vcenter").is_err());
    }

    #[test]
    fn test_validate_levels() {
        assert!(validate_levels(1, 1, 1).is_ok());
        assert!(validate_levels(1, 2, 4).is_ok());
        assert!(validate_levels(2, 1, 4).is_err());
        assert!(validate_levels(1, 5, 4).is_err());
    }

    #[test]
    fn test_ceil_to_u64() {
        assert_eq!(ceil_to_u64(dec!(0)).unwrap(), 0);
        assert_eq!(ceil_to_u64(dec!(-3.5)).unwrap(), 0);
        assert_eq!(ceil_to_u64(dec!(2.01)).unwrap(), 3);
        assert_eq!(ceil_to_u64(dec!(112)).unwrap(), 112);
    }
}
