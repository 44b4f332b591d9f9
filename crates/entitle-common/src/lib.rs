//! # Entitle Common
//!
//! Shared types and errors for the Entitle license aggregation engine.
//!
//! ## Core Types
//!
//! - [`EquipmentType`] / [`TypeCatalog`] / [`TypeChain`]: the tree of equipment types
//!   and the ordered paths metrics evaluate over
//! - [`Equipment`]: an equipment instance with typed attribute values
//! - [`Product`], [`AcquiredRight`], [`UserRecord`], [`Allocation`]: entitlement data
//! - [`MetricDefinition`] / [`MetricConfig`]: per-kind metric configuration
//! - [`ComputedLicenses`]: the result of a license computation
//!
//! ## Errors
//!
//! - [`EntitleError`]: unified error type with configuration, no-data,
//!   not-found and accessor variants

pub mod error;
pub mod metric;
pub mod model;

// Re-export commonly used types at crate root
pub use error::{AccessorError, ConfigurationError, EntitleError, Result};
pub use metric::{
    AttributeCounterMetric, AttributeSumMetric, ComputedLicenses, EquipmentAttributeMetric,
    HybridMetric, InstanceNumberMetric, MetricConfig, MetricDefinition, MetricKind,
    NamedUserMetric, ProcessorMetric, PvuMetric, SagProcessorMetric, StaticMetric,
    UserNominativeMetric,
};
pub use model::{
    AcquiredRight, Allocation, Attribute, AttributeValue, DataKind, Equipment, EquipmentId,
    EquipmentType, Product, ProductAggregation, ProductId, TypeCatalog, TypeChain,
    UserAllocation, UserRecord,
};

/// Entitle version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Scope used when none is configured
pub const DEFAULT_SCOPE: &str = "default";
