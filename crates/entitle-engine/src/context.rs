//! Computation context
//!
//! Everything one license computation reads from the equipment graph goes
//! through [`ComputationContext`]: the products in scope, the what-if
//! values, and the equipment and users excluded by allocations to other
//! metrics. Per-product reads fan out concurrently and are merged as a set
//! union.

use entitle_common::{AcquiredRight, EquipmentId, ProductId, Result, UserRecord};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::graph::{AttributeFilter, AttributeRead, AttributeRow, EquipmentGraph};
use crate::registry::SimulatedValues;
use crate::resolver::AllocationPartition;

/// Default number of concurrent per-product reads
pub const DEFAULT_MEMBER_FETCH_CONCURRENCY: usize = 8;

/// Read access for one computation
#[derive(Clone)]
pub struct ComputationContext {
    graph: Arc<dyn EquipmentGraph>,
    scope: String,
    products: Vec<ProductId>,
    simulated: SimulatedValues,
    excluded_equipment: HashSet<EquipmentId>,
    excluded_users: HashSet<String>,
    only: Option<HashSet<EquipmentId>>,
    concurrency: usize,
}

impl ComputationContext {
    pub fn new(graph: Arc<dyn EquipmentGraph>, scope: impl Into<String>, products: Vec<ProductId>) -> Self {
        Self {
            graph,
            scope: scope.into(),
            products,
            simulated: SimulatedValues::new(),
            excluded_equipment: HashSet::new(),
            excluded_users: HashSet::new(),
            only: None,
            concurrency: DEFAULT_MEMBER_FETCH_CONCURRENCY,
        }
    }

    pub fn with_simulated(mut self, simulated: SimulatedValues) -> Self {
        self.simulated = simulated;
        self
    }

    /// Exclude what allocations to other metrics claim
    pub fn with_partition(mut self, partition: &AllocationPartition) -> Self {
        self.excluded_equipment = partition
            .excluded_servers
            .iter()
            .chain(partition.excluded_virtual_machines.iter())
            .cloned()
            .collect();
        self.excluded_users = partition.excluded_users.iter().cloned().collect();
        self
    }

    /// Restrict product equipment to an explicit list
    pub fn with_only(mut self, ids: Vec<EquipmentId>) -> Self {
        self.only = Some(ids.into_iter().collect());
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn products(&self) -> &[ProductId] {
        &self.products
    }

    pub fn simulated(&self) -> &SimulatedValues {
        &self.simulated
    }

    pub fn graph(&self) -> &dyn EquipmentGraph {
        self.graph.as_ref()
    }

    fn admits(&self, id: &EquipmentId) -> bool {
        !self.excluded_equipment.contains(id)
            && self.only.as_ref().map(|only| only.contains(id)).unwrap_or(true)
    }

    /// Product equipment of a type, union over every product
    #[instrument(skip(self), fields(scope = %self.scope, products = self.products.len()))]
    pub async fn product_equipment(&self, eq_type: &str) -> Result<Vec<EquipmentId>> {
        let per_product: Vec<Vec<EquipmentId>> = stream::iter(self.products.iter().cloned())
            .map(|product| {
                let graph = Arc::clone(&self.graph);
                let scope = self.scope.clone();
                let eq_type = eq_type.to_string();
                async move {
                    graph
                        .product_equipment(&scope, std::slice::from_ref(&product), &eq_type)
                        .await
                }
            })
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let merged: BTreeSet<EquipmentId> = per_product
            .into_iter()
            .flatten()
            .filter(|id| self.admits(id))
            .collect();
        debug!(eq_type, count = merged.len(), "Product equipment");
        Ok(merged.into_iter().collect())
    }

    /// Distinct equipment linked to the products, whatever the type
    pub async fn linked_equipment(&self) -> Result<Vec<EquipmentId>> {
        let links = self.graph.product_links(&self.scope, &self.products).await?;
        let ids: BTreeSet<EquipmentId> = links
            .into_iter()
            .map(|(_, id)| id)
            .filter(|id| self.admits(id))
            .collect();
        Ok(ids.into_iter().collect())
    }

    /// User records of the products not claimed by other metrics
    pub async fn users(&self) -> Result<Vec<UserRecord>> {
        let users = self.graph.user_records(&self.scope, &self.products).await?;
        Ok(users
            .into_iter()
            .filter(|u| !self.excluded_users.contains(&u.id))
            .collect())
    }

    pub async fn acquired_rights(&self) -> Result<Vec<AcquiredRight>> {
        self.graph.acquired_rights(&self.scope, &self.products).await
    }

    pub async fn parents(
        &self,
        ids: &[EquipmentId],
        parent_type: &str,
    ) -> Result<HashMap<EquipmentId, EquipmentId>> {
        if ids.is_empty() {
            return Ok(Default::default());
        }
        self.graph.parents(&self.scope, ids, parent_type).await
    }

    pub async fn children(
        &self,
        ids: &[EquipmentId],
        child_type: &str,
        filters: &[AttributeFilter],
    ) -> Result<HashMap<EquipmentId, Vec<EquipmentId>>> {
        if ids.is_empty() {
            return Ok(Default::default());
        }
        self.graph.children(&self.scope, ids, child_type, filters).await
    }

    pub async fn attribute_values(
        &self,
        ids: &[EquipmentId],
        reads: &[AttributeRead],
    ) -> Result<HashMap<EquipmentId, AttributeRow>> {
        if ids.is_empty() {
            return Ok(Default::default());
        }
        self.graph.attribute_values(&self.scope, ids, reads).await
    }
}
