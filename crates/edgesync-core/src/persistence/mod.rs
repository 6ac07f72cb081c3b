// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Persistence interfaces and backends for edgesync-core.
//!
//! The delta engine only reads from the store: digest lists pre-filtered by
//! a category's scoping rule, selector rows for category-scoped entities,
//! full entity documents by ID, and the labels of an edge.

pub mod query_table;
pub mod sqlite;

pub use self::query_table::{Bind, QueryTable, QueryTemplate};
pub use self::sqlite::SqlitePersistence;

use async_trait::async_trait;

use crate::digest::VersionDigest;
use crate::error::StoreError;
use crate::model::{Category, InventoryEntity};
use crate::selector::{CategorySelector, EdgeLabelSet};

/// Authoritative digest lists the engine can request.
///
/// Each variant is one fixed, parameterized read query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DigestQuery {
    /// Explicit projects listing the edge.
    ExplicitProjects,
    /// All category-scoped projects of the tenant.
    CategoryProjects,
    /// All tenant categories.
    Categories,
    /// Data pipelines in the project set.
    DataPipelines,
    /// Scripts in the project set or tenant-global.
    Functions,
    /// Script runtimes in the project set or tenant-global.
    RuntimeEnvironments,
    /// ML models in the project set.
    MlModels,
    /// Log collectors in the project set or tenant-global.
    LogCollectors,
    /// Cloud profiles of the project set or of the given log collectors.
    CloudProfiles,
    /// Container registries of the project set.
    ContainerRegistries,
    /// Data sources owned by the edge.
    DataSources,
    /// Applications listing the edge inside the project set.
    ExplicitApplications,
    /// All applications of the project set.
    CategoryApplications,
    /// Project services in the project set or tenant-global.
    ProjectServices,
    /// Service instances of the edge's domain or the project set.
    SvcInstances,
    /// Service bindings: tenant-global, the edge's domain or the project set.
    SvcBindings,
    /// Data driver instances in the project set.
    DataDriverInstances,
}

impl DigestQuery {
    /// Category whose delta this query feeds.
    pub fn category(self) -> Category {
        match self {
            DigestQuery::ExplicitProjects | DigestQuery::CategoryProjects => Category::Projects,
            DigestQuery::Categories => Category::Categories,
            DigestQuery::DataPipelines => Category::DataPipelines,
            DigestQuery::Functions => Category::Functions,
            DigestQuery::RuntimeEnvironments => Category::RuntimeEnvironments,
            DigestQuery::MlModels => Category::MlModels,
            DigestQuery::LogCollectors => Category::LogCollectors,
            DigestQuery::CloudProfiles => Category::CloudProfiles,
            DigestQuery::ContainerRegistries => Category::ContainerRegistries,
            DigestQuery::DataSources => Category::DataSources,
            DigestQuery::ExplicitApplications | DigestQuery::CategoryApplications => {
                Category::Applications
            }
            DigestQuery::ProjectServices => Category::ProjectServices,
            DigestQuery::SvcInstances => Category::SvcInstances,
            DigestQuery::SvcBindings => Category::SvcBindings,
            DigestQuery::DataDriverInstances => Category::DataDriverInstances,
        }
    }
}

/// Selector lists the engine can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectorQuery {
    /// Selectors of every category-scoped project of the tenant.
    CategoryProjects,
    /// Selectors of applications in the project set.
    CategoryApplications,
}

/// Scope parameters bound into a query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScopeFilter {
    /// Requesting edge (service domain).
    pub edge_id: String,
    /// Project universe, or a subset of it, depending on the query.
    pub project_ids: Vec<String>,
    /// Log collectors visible to the edge.
    pub log_collector_ids: Vec<String>,
}

impl ScopeFilter {
    /// Filter for one edge with no projects.
    pub fn for_edge(edge_id: impl Into<String>) -> Self {
        Self {
            edge_id: edge_id.into(),
            ..Default::default()
        }
    }

    /// Replace the project set.
    pub fn with_projects(mut self, project_ids: Vec<String>) -> Self {
        self.project_ids = project_ids;
        self
    }

    /// Replace the log collector set.
    pub fn with_log_collectors(mut self, log_collector_ids: Vec<String>) -> Self {
        self.log_collector_ids = log_collector_ids;
        self
    }
}

/// Read-only view of the authoritative inventory.
///
/// All operations are tenant-scoped. Implementations must be strongly
/// consistent within one call; nothing is assumed across calls.
#[async_trait]
pub trait InventoryStore: Send + Sync {
    /// Digests matching `query` under `scope`.
    async fn digests(
        &self,
        tenant_id: &str,
        query: DigestQuery,
        scope: &ScopeFilter,
    ) -> Result<Vec<VersionDigest>, StoreError>;

    /// Selector rows matching `query` under `scope`.
    async fn selectors(
        &self,
        tenant_id: &str,
        query: SelectorQuery,
        scope: &ScopeFilter,
    ) -> Result<Vec<CategorySelector>, StoreError>;

    /// Full documents for `ids`. Unknown IDs are skipped.
    async fn entities_by_ids(
        &self,
        tenant_id: &str,
        category: Category,
        ids: &[String],
    ) -> Result<Vec<InventoryEntity>, StoreError>;

    /// Labels assigned to the edge.
    async fn edge_labels(&self, tenant_id: &str, edge_id: &str)
    -> Result<EdgeLabelSet, StoreError>;

    /// Check database connectivity.
    async fn health_check(&self) -> Result<bool, StoreError>;
}
