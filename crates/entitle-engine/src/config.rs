//! Engine configuration

use anyhow::Result;
use entitle_common::DEFAULT_SCOPE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::context::DEFAULT_MEMBER_FETCH_CONCURRENCY;

/// Label of the production environment for environment-split metrics
pub const DEFAULT_PRODUCTION_ENVIRONMENT: &str = "Production";

/// Engine and binary configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Scope computations run in
    pub scope: String,
    /// Graph snapshot loaded by the binary
    pub snapshot_path: Option<PathBuf>,
    /// Metric computed by the binary
    pub metric: Option<String>,
    /// Products computed by the binary
    pub products: Vec<String>,
    /// Aggregation computed by the binary, instead of products
    pub aggregation: Option<String>,
    /// Concurrent per-product reads for aggregations
    pub member_fetch_concurrency: usize,
    /// Environment value counted as production
    pub production_environment: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scope: DEFAULT_SCOPE.to_string(),
            snapshot_path: None,
            metric: None,
            products: Vec::new(),
            aggregation: None,
            member_fetch_concurrency: DEFAULT_MEMBER_FETCH_CONCURRENCY,
            production_environment: DEFAULT_PRODUCTION_ENVIRONMENT.to_string(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();
        Ok(Self::from_lookup(|key| std::env::var(key).ok()))
    }

    /// Build configuration from any key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(scope) = lookup("ENTITLE_SCOPE") {
            cfg.scope = scope;
        }
        if let Some(path) = lookup("ENTITLE_SNAPSHOT") {
            cfg.snapshot_path = Some(PathBuf::from(path));
        }
        if let Some(metric) = lookup("ENTITLE_METRIC") {
            cfg.metric = Some(metric);
        }
        if let Some(products) = lookup("ENTITLE_PRODUCTS") {
            cfg.products = products
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(aggregation) = lookup("ENTITLE_AGGREGATION") {
            cfg.aggregation = Some(aggregation);
        }
        if let Some(val) = lookup("ENTITLE_MEMBER_FETCH_CONCURRENCY") {
            if let Ok(v) = val.parse::<usize>() {
                cfg.member_fetch_concurrency = v.max(1);
            }
        }
        if let Some(env) = lookup("ENTITLE_PRODUCTION_ENVIRONMENT") {
            cfg.production_environment = env;
        }

        cfg
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_member_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.member_fetch_concurrency = concurrency.max(1);
        self
    }
}
