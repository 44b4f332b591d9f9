//! Hierarchical aggregation engine
//!
//! - [`plan`]: typed traversal steps over a type chain
//! - [`processor`]: the plan interpreter for processor metrics
//! - [`named_user`]: named user reconciliation on top of a processor traversal
//! - [`rounding`]: where fractional values are rounded up

pub mod named_user;
pub mod plan;
pub mod processor;
pub mod rounding;

pub use named_user::{NamedUserAggregation, NamedUserAggregator, NamedUserPlan};
pub use plan::{TraversalPlan, TraversalStep};
pub use processor::{ProcessorAggregation, ProcessorAggregator, RootValue};
