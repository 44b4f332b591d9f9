//! # Entitle
//!
//! License compliance over an equipment hierarchy: how many licenses a set
//! of products requires under a metric, computed from the equipment they
//! run on.
//!
//! - [`common`]: shared model, metric catalog and errors
//! - [`engine`]: graph accessor, aggregation engine, formulas and dispatcher

pub use entitle_common as common;
pub use entitle_engine as engine;

pub use entitle_common::{ComputedLicenses, EntitleError, MetricKind, Result};
pub use entitle_engine::{
    ComputationReport, ComputeRequest, Dispatcher, EngineConfig, EquipmentGraph, GraphSnapshot,
    InMemoryEquipmentGraph, InMemoryMetricStore, MetricStore,
};
