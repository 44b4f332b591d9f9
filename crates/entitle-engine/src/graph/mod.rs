//! Equipment graph accessor
//!
//! Read-only, scope-isolated view over equipment instances, their typed
//! attributes and parent/child edges. The engine drives every traversal
//! through [`EquipmentGraph`]; the backing store is an external collaborator.
//!
//! Every operation returns an empty collection when nothing matches. Errors
//! are reserved for backend failures and for explicitly requested ids that
//! do not exist.

pub mod memory;

use async_trait::async_trait;
use entitle_common::{
    AcquiredRight, Allocation, AttributeValue, Equipment, EquipmentId, ProductId, Result,
    UserAllocation, UserRecord,
};
use std::collections::HashMap;

pub use memory::{GraphSnapshot, InMemoryEquipmentGraph};

/// Attribute values of one instance, aligned with the requested reads
pub type AttributeRow = Vec<Option<AttributeValue>>;

/// One attribute to read, optionally replaced by a what-if value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRead {
    pub name: String,
    pub simulated: Option<AttributeValue>,
}

impl AttributeRead {
    pub fn stored(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            simulated: None,
        }
    }

    pub fn simulated(name: impl Into<String>, value: AttributeValue) -> Self {
        Self {
            name: name.into(),
            simulated: Some(value),
        }
    }
}

/// Equality filter on an attribute value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeFilter {
    pub name: String,
    pub value: String,
}

impl AttributeFilter {
    pub fn eq(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn accepts(&self, equipment: &Equipment) -> bool {
        equipment
            .attribute(&self.name)
            .map(|v| v.matches(&self.value))
            .unwrap_or(false)
    }
}

/// Scoped equipment graph operations required by the engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EquipmentGraph: Send + Sync {
    /// Get one equipment instance; fails with NodeNotFound when absent
    async fn equipment(&self, scope: &str, id: &str) -> Result<Equipment>;

    /// Equipment of `eq_type` directly linked to any of the products
    async fn product_equipment(
        &self,
        scope: &str,
        products: &[ProductId],
        eq_type: &str,
    ) -> Result<Vec<EquipmentId>>;

    /// Every product to equipment link, whatever the equipment type
    async fn product_links(
        &self,
        scope: &str,
        products: &[ProductId],
    ) -> Result<Vec<(ProductId, EquipmentId)>>;

    /// Immediate parents of `parent_type`, keyed by child id
    async fn parents(
        &self,
        scope: &str,
        ids: &[EquipmentId],
        parent_type: &str,
    ) -> Result<HashMap<EquipmentId, EquipmentId>>;

    /// Immediate children of `child_type` passing every filter, keyed by parent id
    async fn children(
        &self,
        scope: &str,
        ids: &[EquipmentId],
        child_type: &str,
        filters: &[AttributeFilter],
    ) -> Result<HashMap<EquipmentId, Vec<EquipmentId>>>;

    /// Attribute values for each existing id
    async fn attribute_values(
        &self,
        scope: &str,
        ids: &[EquipmentId],
        reads: &[AttributeRead],
    ) -> Result<HashMap<EquipmentId, AttributeRow>>;

    /// Number of distinct existing instances among the ids
    async fn count_distinct(&self, scope: &str, ids: &[EquipmentId]) -> Result<u64>;

    /// Acquired rights held by the products
    async fn acquired_rights(
        &self,
        scope: &str,
        products: &[ProductId],
    ) -> Result<Vec<AcquiredRight>>;

    /// User records of the products
    async fn user_records(&self, scope: &str, products: &[ProductId]) -> Result<Vec<UserRecord>>;

    /// Equipment allocations of the products
    async fn allocations(&self, scope: &str, products: &[ProductId]) -> Result<Vec<Allocation>>;

    /// User allocations of the products
    async fn user_allocations(
        &self,
        scope: &str,
        products: &[ProductId],
    ) -> Result<Vec<UserAllocation>>;

    /// Members of an aggregation holding an acquired right on `metric`
    async fn aggregation_products(
        &self,
        scope: &str,
        aggregation: &str,
        metric: &str,
    ) -> Result<Vec<ProductId>>;
}
