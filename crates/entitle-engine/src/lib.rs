//! # Entitle Engine
//!
//! Hierarchical license aggregation over an equipment graph.
//!
//! ## Aggregation Rule
//!
//! ```text
//! licenses = ceil( Σ roots value(root) )
//! value(node) = formula(node)              at the base level
//!             = Σ value(child)             above it
//!             rounded up once, at the aggregate level
//! ```
//!
//! ## Modules
//!
//! - [`graph`]: equipment graph accessor and its in-memory implementation
//! - [`store`]: metric definitions and equipment type catalogs
//! - [`registry`]: metric kinds, formulas and definition validation
//! - [`aggregation`]: traversal plans, processor and named user aggregation
//! - [`formula`]: flat and hybrid metric formulas
//! - [`resolver`]: allocation exclusions and transforms
//! - [`dispatcher`]: the computation entry point

pub mod aggregation;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod formula;
pub mod graph;
pub mod registry;
pub mod resolver;
pub mod store;

pub use config::EngineConfig;
pub use context::ComputationContext;
pub use dispatcher::{ComputationReport, ComputeRequest, Dispatcher};
pub use graph::{EquipmentGraph, GraphSnapshot, InMemoryEquipmentGraph};
pub use registry::{MetricRegistry, MetricSpec, ResolvedMetric};
pub use resolver::AllocationPartition;
pub use store::{InMemoryMetricStore, MetricStore};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
