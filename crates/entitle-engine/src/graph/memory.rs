//! In-memory equipment graph
//!
//! DashMap-backed implementation of [`EquipmentGraph`], partitioned by scope.
//! Used by the snapshot runner, tests and benches.

use async_trait::async_trait;
use dashmap::DashMap;
use entitle_common::{
    AcquiredRight, Allocation, EntitleError, Equipment, EquipmentId, EquipmentType,
    MetricDefinition, Product, ProductAggregation, ProductId, Result, UserAllocation,
    UserRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use super::{AttributeFilter, AttributeRead, AttributeRow, EquipmentGraph};

/// Serializable dump of one scope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub scope: String,
    #[serde(default)]
    pub equipment_types: Vec<EquipmentType>,
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
    #[serde(default)]
    pub equipment: Vec<Equipment>,
    #[serde(default)]
    pub products: Vec<Product>,
    #[serde(default)]
    pub acquired_rights: Vec<AcquiredRight>,
    #[serde(default)]
    pub users: Vec<UserRecord>,
    #[serde(default)]
    pub allocations: Vec<Allocation>,
    #[serde(default)]
    pub user_allocations: Vec<UserAllocation>,
    #[serde(default)]
    pub aggregations: Vec<ProductAggregation>,
}

#[derive(Debug, Default)]
struct ScopeGraph {
    equipment: HashMap<EquipmentId, Equipment>,
    children: HashMap<EquipmentId, BTreeSet<EquipmentId>>,
    products: HashMap<ProductId, BTreeSet<EquipmentId>>,
    rights: Vec<AcquiredRight>,
    users: HashMap<String, UserRecord>,
    /// One metric per (product, equipment)
    allocations: HashMap<(ProductId, EquipmentId), String>,
    /// One metric per (product, user record)
    user_allocations: HashMap<(ProductId, String), String>,
    aggregations: HashMap<String, BTreeSet<ProductId>>,
}

impl ScopeGraph {
    fn linked<'a>(
        &'a self,
        products: &'a [ProductId],
    ) -> impl Iterator<Item = (&'a ProductId, &'a EquipmentId)> + 'a {
        products
            .iter()
            .filter_map(|p| self.products.get_key_value(p))
            .flat_map(|(p, ids)| ids.iter().map(move |id| (p, id)))
    }
}

/// In-memory equipment graph
pub struct InMemoryEquipmentGraph {
    scopes: DashMap<String, ScopeGraph>,
}

impl InMemoryEquipmentGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self {
            scopes: DashMap::new(),
        }
    }

    /// Load every record of a snapshot into its scope
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        let graph = Self::new();
        graph.load_snapshot(snapshot);
        graph
    }

    /// Merge a snapshot into the graph
    pub fn load_snapshot(&self, snapshot: &GraphSnapshot) {
        let scope = snapshot.scope.as_str();
        for equipment in &snapshot.equipment {
            self.insert_equipment(scope, equipment.clone());
        }
        for product in &snapshot.products {
            self.link_product(scope, &product.id, product.equipment.iter().cloned());
        }
        for right in &snapshot.acquired_rights {
            self.insert_acquired_right(scope, right.clone());
        }
        for user in &snapshot.users {
            self.insert_user(scope, user.clone());
        }
        for allocation in &snapshot.allocations {
            self.allocate(scope, allocation.clone());
        }
        for allocation in &snapshot.user_allocations {
            self.allocate_user(scope, allocation.clone());
        }
        for aggregation in &snapshot.aggregations {
            self.insert_aggregation(scope, aggregation.clone());
        }
        debug!(
            scope = %scope,
            equipment = snapshot.equipment.len(),
            products = snapshot.products.len(),
            "Loaded graph snapshot"
        );
    }

    /// Insert or replace an equipment instance
    pub fn insert_equipment(&self, scope: &str, equipment: Equipment) {
        let mut graph = self.scopes.entry(scope.to_string()).or_default();

        if let Some(previous) = graph.equipment.get(&equipment.id).and_then(|e| e.parent.clone()) {
            if let Some(siblings) = graph.children.get_mut(&previous) {
                siblings.remove(&equipment.id);
            }
        }
        if let Some(parent) = &equipment.parent {
            graph
                .children
                .entry(parent.clone())
                .or_default()
                .insert(equipment.id.clone());
        }
        graph.equipment.insert(equipment.id.clone(), equipment);
    }

    /// Link equipment to a product
    pub fn link_product<I>(&self, scope: &str, product: &str, equipment: I)
    where
        I: IntoIterator<Item = EquipmentId>,
    {
        let mut graph = self.scopes.entry(scope.to_string()).or_default();
        graph
            .products
            .entry(product.to_string())
            .or_default()
            .extend(equipment);
    }

    pub fn insert_acquired_right(&self, scope: &str, right: AcquiredRight) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .rights
            .push(right);
    }

    pub fn insert_user(&self, scope: &str, user: UserRecord) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .users
            .insert(user.id.clone(), user);
    }

    /// Allocate equipment to a metric; a later allocation replaces an earlier one
    pub fn allocate(&self, scope: &str, allocation: Allocation) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .allocations
            .insert(
                (allocation.product, allocation.equipment_id),
                allocation.metric,
            );
    }

    pub fn allocate_user(&self, scope: &str, allocation: UserAllocation) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .user_allocations
            .insert((allocation.product, allocation.user_id), allocation.metric);
    }

    pub fn insert_aggregation(&self, scope: &str, aggregation: ProductAggregation) {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .aggregations
            .entry(aggregation.name)
            .or_default()
            .extend(aggregation.products);
    }

    /// Number of equipment instances in a scope
    pub fn equipment_count(&self, scope: &str) -> usize {
        self.scopes
            .get(scope)
            .map(|g| g.equipment.len())
            .unwrap_or(0)
    }
}

impl Default for InMemoryEquipmentGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EquipmentGraph for InMemoryEquipmentGraph {
    async fn equipment(&self, scope: &str, id: &str) -> Result<Equipment> {
        self.scopes
            .get(scope)
            .and_then(|g| g.equipment.get(id).cloned())
            .ok_or_else(|| EntitleError::equipment_not_found(id))
    }

    async fn product_equipment(
        &self,
        scope: &str,
        products: &[ProductId],
        eq_type: &str,
    ) -> Result<Vec<EquipmentId>> {
        let Some(graph) = self.scopes.get(scope) else {
            return Ok(Vec::new());
        };
        let ids: BTreeSet<EquipmentId> = graph
            .linked(products)
            .filter(|(_, id)| {
                graph
                    .equipment
                    .get(*id)
                    .map(|e| e.is_of_type(eq_type))
                    .unwrap_or(false)
            })
            .map(|(_, id)| id.clone())
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn product_links(
        &self,
        scope: &str,
        products: &[ProductId],
    ) -> Result<Vec<(ProductId, EquipmentId)>> {
        let Some(graph) = self.scopes.get(scope) else {
            return Ok(Vec::new());
        };
        Ok(graph
            .linked(products)
            .map(|(p, id)| (p.clone(), id.clone()))
            .collect())
    }

    async fn parents(
        &self,
        scope: &str,
        ids: &[EquipmentId],
        parent_type: &str,
    ) -> Result<HashMap<EquipmentId, EquipmentId>> {
        let Some(graph) = self.scopes.get(scope) else {
            return Ok(HashMap::new());
        };
        let mut parents = HashMap::new();
        for id in ids {
            let parent = graph
                .equipment
                .get(id)
                .and_then(|e| e.parent.as_ref())
                .and_then(|p| graph.equipment.get(p))
                .filter(|p| p.is_of_type(parent_type));
            if let Some(parent) = parent {
                parents.insert(id.clone(), parent.id.clone());
            }
        }
        Ok(parents)
    }

    async fn children(
        &self,
        scope: &str,
        ids: &[EquipmentId],
        child_type: &str,
        filters: &[AttributeFilter],
    ) -> Result<HashMap<EquipmentId, Vec<EquipmentId>>> {
        let Some(graph) = self.scopes.get(scope) else {
            return Ok(HashMap::new());
        };
        let mut children = HashMap::new();
        for id in ids {
            let Some(candidates) = graph.children.get(id) else {
                continue;
            };
            let matching: Vec<EquipmentId> = candidates
                .iter()
                .filter_map(|c| graph.equipment.get(c))
                .filter(|c| c.is_of_type(child_type))
                .filter(|c| filters.iter().all(|f| f.accepts(c)))
                .map(|c| c.id.clone())
                .collect();
            if !matching.is_empty() {
                children.insert(id.clone(), matching);
            }
        }
        Ok(children)
    }

    async fn attribute_values(
        &self,
        scope: &str,
        ids: &[EquipmentId],
        reads: &[AttributeRead],
    ) -> Result<HashMap<EquipmentId, AttributeRow>> {
        let Some(graph) = self.scopes.get(scope) else {
            return Ok(HashMap::new());
        };
        let mut rows = HashMap::new();
        for id in ids {
            let Some(equipment) = graph.equipment.get(id) else {
                continue;
            };
            let row = reads
                .iter()
                .map(|read| match &read.simulated {
                    Some(value) => Some(value.clone()),
                    None => equipment.attribute(&read.name).cloned(),
                })
                .collect();
            rows.insert(id.clone(), row);
        }
        Ok(rows)
    }

    async fn count_distinct(&self, scope: &str, ids: &[EquipmentId]) -> Result<u64> {
        let Some(graph) = self.scopes.get(scope) else {
            return Ok(0);
        };
        let distinct: BTreeSet<&EquipmentId> = ids
            .iter()
            .filter(|id| graph.equipment.contains_key(*id))
            .collect();
        Ok(distinct.len() as u64)
    }

    async fn acquired_rights(
        &self,
        scope: &str,
        products: &[ProductId],
    ) -> Result<Vec<AcquiredRight>> {
        Ok(self
            .scopes
            .get(scope)
            .map(|g| {
                g.rights
                    .iter()
                    .filter(|r| products.contains(&r.product))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn user_records(&self, scope: &str, products: &[ProductId]) -> Result<Vec<UserRecord>> {
        let mut users: Vec<UserRecord> = self
            .scopes
            .get(scope)
            .map(|g| {
                g.users
                    .values()
                    .filter(|u| products.contains(&u.product))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        users.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(users)
    }

    async fn allocations(&self, scope: &str, products: &[ProductId]) -> Result<Vec<Allocation>> {
        Ok(self
            .scopes
            .get(scope)
            .map(|g| {
                g.allocations
                    .iter()
                    .filter(|((product, _), _)| products.contains(product))
                    .map(|((product, equipment_id), metric)| Allocation {
                        product: product.clone(),
                        equipment_id: equipment_id.clone(),
                        metric: metric.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn user_allocations(
        &self,
        scope: &str,
        products: &[ProductId],
    ) -> Result<Vec<UserAllocation>> {
        Ok(self
            .scopes
            .get(scope)
            .map(|g| {
                g.user_allocations
                    .iter()
                    .filter(|((product, _), _)| products.contains(product))
                    .map(|((product, user_id), metric)| UserAllocation {
                        product: product.clone(),
                        user_id: user_id.clone(),
                        metric: metric.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn aggregation_products(
        &self,
        scope: &str,
        aggregation: &str,
        metric: &str,
    ) -> Result<Vec<ProductId>> {
        let Some(graph) = self.scopes.get(scope) else {
            return Ok(Vec::new());
        };
        let Some(members) = graph.aggregations.get(aggregation) else {
            return Ok(Vec::new());
        };
        Ok(members
            .iter()
            .filter(|p| {
                graph
                    .rights
                    .iter()
                    .any(|r| &r.product == *p && r.metric.eq_ignore_ascii_case(metric))
            })
            .cloned()
            .collect())
    }
}
