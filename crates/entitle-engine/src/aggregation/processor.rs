//! Hierarchical processor aggregation
//!
//! Interprets a [`TraversalPlan`] against the equipment graph. Product
//! equipment is collected level by level up to the base type, the reached
//! nodes are followed to the top of the chain, and every root found on the
//! way is valued over its full subtree. Values are rounded up once, at the
//! aggregate level; roots below the aggregate level are rounded on their own.

use entitle_common::{EquipmentId, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, instrument};

use super::plan::{TraversalPlan, TraversalStep};
use super::rounding::{ceil_required, ceil_to_u64, round_if};
use crate::context::ComputationContext;
use crate::formula::{evaluate, InstanceFormula};
use crate::registry::ProcessorLevels;

/// Value of a node with no parent in the chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RootValue {
    pub id: EquipmentId,
    pub level: usize,
    pub value: Decimal,
}

/// Result of one hierarchical traversal
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProcessorAggregation {
    /// Sum of root values
    pub total: Decimal,
    pub roots: Vec<RootValue>,
    /// Nodes reached from product equipment, per level
    pub reached: Vec<Vec<EquipmentId>>,
    /// Parent at `level + 1` of each reached node at `level`
    #[serde(skip)]
    pub parents: Vec<HashMap<EquipmentId, EquipmentId>>,
}

impl ProcessorAggregation {
    /// Licenses required: the total rounded up
    pub fn licenses(&self) -> Result<u64> {
        ceil_to_u64(self.total)
    }

    pub fn is_reached(&self, level: usize, id: &str) -> bool {
        self.reached
            .get(level)
            .map(|ids| ids.iter().any(|r| r == id))
            .unwrap_or(false)
    }

    /// Follow parents from a reached node to its root
    pub fn climb(&self, level: usize, id: &str) -> Option<&RootValue> {
        if !self.is_reached(level, id) {
            return None;
        }
        let mut current = (level, id.to_string());
        loop {
            if let Some(root) = self.root(current.0, &current.1) {
                return Some(root);
            }
            let parent = self.parents.get(current.0)?.get(&current.1)?;
            current = (current.0 + 1, parent.clone());
        }
    }

    pub fn root(&self, level: usize, id: &str) -> Option<&RootValue> {
        self.roots.iter().find(|r| r.level == level && r.id == id)
    }
}

/// Interpreter for processor traversal plans
pub struct ProcessorAggregator<'a> {
    levels: &'a ProcessorLevels,
    formula: InstanceFormula,
    plan: TraversalPlan,
}

#[derive(Default)]
struct TraversalState {
    reached: Vec<BTreeSet<EquipmentId>>,
    parents: Vec<HashMap<EquipmentId, EquipmentId>>,
    roots: Vec<(usize, EquipmentId)>,
    kept: Vec<BTreeSet<EquipmentId>>,
    children: Vec<HashMap<EquipmentId, Vec<EquipmentId>>>,
    values: Vec<HashMap<EquipmentId, Decimal>>,
}

impl TraversalState {
    fn new(levels: usize) -> Self {
        Self {
            reached: vec![BTreeSet::new(); levels],
            parents: vec![HashMap::new(); levels],
            roots: Vec::new(),
            kept: vec![BTreeSet::new(); levels],
            children: vec![HashMap::new(); levels],
            values: vec![HashMap::new(); levels],
        }
    }

    /// Reached nodes at or above the base without a parent in the chain
    fn find_roots(&mut self, base: usize, top: usize) {
        for level in base..=top {
            for id in &self.reached[level] {
                if level == top || !self.parents[level].contains_key(id) {
                    self.roots.push((level, id.clone()));
                    self.kept[level].insert(id.clone());
                }
            }
        }
        for level in 0..base {
            let orphans = self.reached[level]
                .iter()
                .filter(|id| !self.parents[level].contains_key(*id))
                .count();
            if orphans > 0 {
                debug!(level, orphans, "Equipment below base without parent, ignored");
            }
        }
    }
}

impl<'a> ProcessorAggregator<'a> {
    pub fn new(levels: &'a ProcessorLevels, formula: InstanceFormula) -> Self {
        Self {
            plan: TraversalPlan::build(levels),
            levels,
            formula,
        }
    }

    pub fn plan(&self) -> &TraversalPlan {
        &self.plan
    }

    /// Run the plan for the products of the context
    #[instrument(skip(self, ctx), fields(chain = %self.levels.chain, scope = %ctx.scope()))]
    pub async fn aggregate(&self, ctx: &ComputationContext) -> Result<ProcessorAggregation> {
        let (base, top) = (self.plan.base, self.plan.top);
        let mut state = TraversalState::new(top + 1);
        let reads = self.levels.reads(ctx.simulated());

        for step in &self.plan.steps {
            match step {
                TraversalStep::Descend(s) => {
                    let mut frontier: BTreeSet<EquipmentId> =
                        ctx.product_equipment(&s.eq_type).await?.into_iter().collect();
                    if s.level > 0 {
                        let below: Vec<EquipmentId> =
                            state.reached[s.level - 1].iter().cloned().collect();
                        let parents = ctx.parents(&below, &s.eq_type).await?;
                        frontier.extend(parents.values().cloned());
                        state.parents[s.level - 1] = parents;
                    }
                    debug!(level = s.level, eq_type = %s.eq_type, count = frontier.len(), "Descend");
                    state.reached[s.level] = frontier;
                    if s.level == base && base == top {
                        state.find_roots(base, top);
                    }
                }
                TraversalStep::Ascend(s) => {
                    let below: Vec<EquipmentId> =
                        state.reached[s.level - 1].iter().cloned().collect();
                    let parents = ctx.parents(&below, &s.eq_type).await?;
                    state.reached[s.level] = parents.values().cloned().collect();
                    state.parents[s.level - 1] = parents;
                    debug!(level = s.level, eq_type = %s.eq_type, count = state.reached[s.level].len(), "Ascend");
                    if s.level == top {
                        state.find_roots(base, top);
                    }
                }
                TraversalStep::Expand(s) => {
                    let above: Vec<EquipmentId> =
                        state.kept[s.level + 1].iter().cloned().collect();
                    let children = ctx.children(&above, &s.eq_type, &[]).await?;
                    for ids in children.values() {
                        state.kept[s.level].extend(ids.iter().cloned());
                    }
                    state.children[s.level + 1] = children;
                }
                TraversalStep::Formula(s) => {
                    let ids: Vec<EquipmentId> = state.kept[s.level].iter().cloned().collect();
                    let rows = ctx.attribute_values(&ids, &reads).await?;
                    for id in ids {
                        let value = evaluate(self.formula, &id, rows.get(&id));
                        state.values[s.level].insert(id, round_if(value, s.ceil));
                    }
                }
                TraversalStep::Combine(s) => {
                    let (below, current) = state.values.split_at_mut(s.level);
                    let below = &below[s.level - 1];
                    for id in &state.kept[s.level] {
                        let sum: Decimal = state.children[s.level]
                            .get(id)
                            .map(|children| {
                                children.iter().filter_map(|c| below.get(c)).copied().sum()
                            })
                            .unwrap_or(Decimal::ZERO);
                        current[0].insert(id.clone(), round_if(sum, s.ceil));
                    }
                }
            }
        }

        let roots: Vec<RootValue> = state
            .roots
            .iter()
            .map(|(level, id)| {
                let value = state.values[*level].get(id).copied().unwrap_or_default();
                RootValue {
                    id: id.clone(),
                    level: *level,
                    value: round_if(value, ceil_required(*level, *level, self.plan.aggregate)),
                }
            })
            .collect();
        let total: Decimal = roots.iter().map(|r| r.value).sum();

        info!(total = %total, roots = roots.len(), "Processor aggregation complete");

        Ok(ProcessorAggregation {
            total,
            roots,
            reached: state
                .reached
                .into_iter()
                .map(|ids| ids.into_iter().collect())
                .collect(),
            parents: state.parents,
        })
    }
}
