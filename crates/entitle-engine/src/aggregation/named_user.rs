//! Named user reconciliation
//!
//! A named-user entitlement needs the larger of the minimum users implied
//! by the processor licenses and the users actually declared. Users are
//! attached to the roots of the processor traversal by following their
//! equipment upward, so each root can be reconciled on its own.

use entitle_common::{EquipmentId, Result, UserRecord};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, instrument};

use super::processor::{ProcessorAggregation, ProcessorAggregator};
use super::rounding::ceil_to_u64;
use crate::context::ComputationContext;
use crate::formula::{users::total_count, InstanceFormula};
use crate::registry::ProcessorLevels;

/// Users on `user_type` equipment whose root is a `root_type` node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPairStep {
    pub user_level: usize,
    pub user_type: String,
    pub root_level: usize,
    pub root_type: String,
}

/// Every (user level, root level) pair of a chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedUserPlan {
    pub steps: Vec<UserPairStep>,
}

impl NamedUserPlan {
    /// Users sit at or below the base, roots at or above it
    pub fn build(levels: &ProcessorLevels) -> Self {
        let mut steps = Vec::new();
        for root_level in levels.base..=levels.top() {
            for user_level in (0..=levels.base).rev() {
                steps.push(UserPairStep {
                    user_level,
                    user_type: levels.type_at(user_level).to_string(),
                    root_level,
                    root_type: levels.type_at(root_level).to_string(),
                });
            }
        }
        Self { steps }
    }

    fn position(&self, user_level: usize, root_level: usize) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.user_level == user_level && s.root_level == root_level)
    }
}

/// User count of one plan step
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserPairCount {
    #[serde(flatten)]
    pub step: UserPairStep,
    pub users: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamedUserAggregation {
    pub processor_licenses: u64,
    /// Users per processor x processor licenses
    pub minimum_users: u64,
    /// Declared users
    pub current_users: u64,
    /// Sum over roots of the larger of minimum and attached users
    pub reconciled: u64,
    pub pairs: Vec<UserPairCount>,
}

impl NamedUserAggregation {
    pub fn licenses(&self) -> u64 {
        self.minimum_users.max(self.current_users)
    }
}

/// Processor traversal followed by named user reconciliation
pub struct NamedUserAggregator<'a> {
    processor: ProcessorAggregator<'a>,
    plan: NamedUserPlan,
    users_per_processor: u64,
}

impl<'a> NamedUserAggregator<'a> {
    pub fn new(
        levels: &'a ProcessorLevels,
        formula: InstanceFormula,
        users_per_processor: u64,
    ) -> Self {
        Self {
            processor: ProcessorAggregator::new(levels, formula),
            plan: NamedUserPlan::build(levels),
            users_per_processor,
        }
    }

    pub fn plan(&self) -> &NamedUserPlan {
        &self.plan
    }

    #[instrument(skip(self, ctx), fields(users_per_processor = self.users_per_processor))]
    pub async fn aggregate(&self, ctx: &ComputationContext) -> Result<NamedUserAggregation> {
        let processor = self.processor.aggregate(ctx).await?;
        let users = dedup_users(ctx.users().await?);
        self.reconcile(&processor, &users)
    }

    fn reconcile(
        &self,
        processor: &ProcessorAggregation,
        users: &[UserRecord],
    ) -> Result<NamedUserAggregation> {
        let upp = Decimal::from(self.users_per_processor);
        let processor_licenses = processor.licenses()?;
        let current_users = total_count(users);

        let mut pairs: Vec<UserPairCount> = self
            .plan
            .steps
            .iter()
            .map(|step| UserPairCount {
                step: step.clone(),
                users: 0,
            })
            .collect();
        let mut by_root: HashMap<(usize, EquipmentId), u64> = HashMap::new();

        for user in users {
            let Some(equipment) = user.equipment_id.as_deref() else {
                continue;
            };
            let attached = (0..=self.processor.plan().base).find_map(|level| {
                processor
                    .climb(level, equipment)
                    .map(|root| (level, root.level, root.id.clone()))
            });
            match attached {
                Some((user_level, root_level, root)) => {
                    if let Some(position) = self.plan.position(user_level, root_level) {
                        let pair = &mut pairs[position].users;
                        *pair = pair.saturating_add(user.count);
                    }
                    let attached = by_root.entry((root_level, root)).or_default();
                    *attached = attached.saturating_add(user.count);
                }
                None => debug!(user = %user.id, equipment, "User equipment not reached"),
            }
        }

        let reconciled: Decimal = processor
            .roots
            .iter()
            .map(|root| {
                let attached = by_root
                    .get(&(root.level, root.id.clone()))
                    .copied()
                    .unwrap_or_default();
                (upp * root.value).max(Decimal::from(attached))
            })
            .sum();

        let result = NamedUserAggregation {
            processor_licenses,
            minimum_users: processor_licenses.saturating_mul(self.users_per_processor),
            current_users,
            reconciled: ceil_to_u64(reconciled)?,
            pairs,
        };
        info!(
            minimum = result.minimum_users,
            current = result.current_users,
            reconciled = result.reconciled,
            "Named users reconciled"
        );
        Ok(result)
    }
}

/// Keep one record per user id
fn dedup_users(users: Vec<UserRecord>) -> Vec<UserRecord> {
    let unique: BTreeMap<String, UserRecord> =
        users.into_iter().map(|u| (u.id.clone(), u)).collect();
    unique.into_values().collect()
}
