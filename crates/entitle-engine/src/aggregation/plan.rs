//! Traversal plans
//!
//! A [`TraversalPlan`] is the typed sequence of steps that evaluates a
//! processor metric over its type chain:
//!
//! - [`DescendStep`]: levels `0..=base`, product equipment merged with the
//!   parents of the previous frontier
//! - [`AscendStep`]: levels above the base, parents of the previous level
//! - [`ExpandStep`]: from the top down, every descendant of the reached roots
//! - [`FormulaStep`]: per-instance values at the base level
//! - [`CombineStep`]: bottom-up sums with the aggregate-level rounding
//!
//! The plan is built once per resolved metric and interpreted by
//! [`super::processor::ProcessorAggregator`].

use serde::Serialize;
use std::fmt;

use super::rounding::ceil_level;
use crate::registry::ProcessorLevels;

/// Build the frontier at one level at or below the base
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DescendStep {
    pub level: usize,
    pub eq_type: String,
    /// Type of the previous frontier, `None` at level 0
    pub from_type: Option<String>,
}

/// Reach the parents of the previous level
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AscendStep {
    pub level: usize,
    pub eq_type: String,
    pub from_type: String,
}

/// Collect every child of the nodes kept at `level + 1`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpandStep {
    pub level: usize,
    pub eq_type: String,
}

/// Evaluate the instance formula on the base type
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FormulaStep {
    pub level: usize,
    pub eq_type: String,
    /// Round each instance value before it flows upward
    pub ceil: bool,
}

/// Sum children into their parent at `level`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CombineStep {
    pub level: usize,
    pub eq_type: String,
    pub ceil: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum TraversalStep {
    Descend(DescendStep),
    Ascend(AscendStep),
    Expand(ExpandStep),
    Formula(FormulaStep),
    Combine(CombineStep),
}

impl fmt::Display for TraversalStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TraversalStep::Descend(s) => write!(f, "descend {}@{}", s.eq_type, s.level),
            TraversalStep::Ascend(s) => write!(f, "ascend {}@{}", s.eq_type, s.level),
            TraversalStep::Expand(s) => write!(f, "expand {}@{}", s.eq_type, s.level),
            TraversalStep::Formula(s) => {
                write!(f, "formula {}@{}{}", s.eq_type, s.level, if s.ceil { " ceil" } else { "" })
            }
            TraversalStep::Combine(s) => {
                write!(f, "combine {}@{}{}", s.eq_type, s.level, if s.ceil { " ceil" } else { "" })
            }
        }
    }
}

/// Ordered steps for one processor metric
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraversalPlan {
    pub base: usize,
    pub aggregate: usize,
    pub top: usize,
    pub steps: Vec<TraversalStep>,
}

impl TraversalPlan {
    pub fn build(levels: &ProcessorLevels) -> Self {
        let (base, aggregate, top) = (levels.base, levels.aggregate, levels.top());
        let mut steps = Vec::with_capacity(3 * (top + 1));

        for level in 0..=base {
            steps.push(TraversalStep::Descend(DescendStep {
                level,
                eq_type: levels.type_at(level).to_string(),
                from_type: level
                    .checked_sub(1)
                    .map(|below| levels.type_at(below).to_string()),
            }));
        }
        for level in base + 1..=top {
            steps.push(TraversalStep::Ascend(AscendStep {
                level,
                eq_type: levels.type_at(level).to_string(),
                from_type: levels.type_at(level - 1).to_string(),
            }));
        }
        for level in (base..top).rev() {
            steps.push(TraversalStep::Expand(ExpandStep {
                level,
                eq_type: levels.type_at(level).to_string(),
            }));
        }
        steps.push(TraversalStep::Formula(FormulaStep {
            level: base,
            eq_type: levels.type_at(base).to_string(),
            ceil: ceil_level(base, aggregate),
        }));
        for level in base + 1..=top {
            steps.push(TraversalStep::Combine(CombineStep {
                level,
                eq_type: levels.type_at(level).to_string(),
                ceil: ceil_level(level, aggregate),
            }));
        }

        Self {
            base,
            aggregate,
            top,
            steps,
        }
    }

    /// Number of steps that round
    pub fn rounding_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| match s {
                TraversalStep::Formula(f) => f.ceil,
                TraversalStep::Combine(c) => c.ceil,
                _ => false,
            })
            .count()
    }
}
