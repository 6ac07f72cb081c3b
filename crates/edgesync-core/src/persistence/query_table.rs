// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Query table: one fixed SQL statement per read the engine performs.
//!
//! Built once per backend and never mutated. ID sets are bound as a single
//! JSON array and expanded with `json_each`, so the statement text does not
//! depend on the number of IDs.

use std::collections::HashMap;

use crate::error::StoreError;
use crate::model::Category;

use super::{DigestQuery, SelectorQuery};

/// Positional parameter of a [`QueryTemplate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bind {
    /// Tenant ID.
    Tenant,
    /// Requesting edge ID.
    Edge,
    /// Project IDs, as a JSON array.
    ProjectIds,
    /// Log collector IDs, as a JSON array.
    LogCollectorIds,
    /// Requested entity IDs, as a JSON array.
    EntityIds,
}

/// SQL text plus the order in which its `?` parameters are bound.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryTemplate {
    /// Statement text.
    pub sql: String,
    /// Parameters, in placeholder order.
    pub binds: &'static [Bind],
}

impl QueryTemplate {
    fn new(sql: impl Into<String>, binds: &'static [Bind]) -> Self {
        Self {
            sql: sql.into(),
            binds,
        }
    }
}

const IN_JSON_IDS: &str = "IN (SELECT value FROM json_each(?))";

/// Read-only mapping from queries and categories to SQL.
#[derive(Debug, Clone)]
pub struct QueryTable {
    digests: HashMap<DigestQuery, QueryTemplate>,
    selectors: HashMap<SelectorQuery, QueryTemplate>,
    entities: HashMap<Category, QueryTemplate>,
}

impl QueryTable {
    /// Query table for the SQLite schema in `migrations/sqlite`.
    pub fn sqlite() -> Self {
        use Bind::*;

        let project_scoped = |table: &str| {
            QueryTemplate::new(
                format!(
                    "SELECT id, updated_at FROM {table} \
                     WHERE tenant_id = ? AND project_id {IN_JSON_IDS}"
                ),
                &[Tenant, ProjectIds],
            )
        };
        let project_or_global = |table: &str| {
            QueryTemplate::new(
                format!(
                    "SELECT id, updated_at FROM {table} \
                     WHERE tenant_id = ? AND (project_id {IN_JSON_IDS} OR project_id IS NULL)"
                ),
                &[Tenant, ProjectIds],
            )
        };

        let mut digests = HashMap::new();
        digests.insert(
            DigestQuery::ExplicitProjects,
            QueryTemplate::new(
                "SELECT id, updated_at FROM projects \
                 WHERE tenant_id = ? AND edge_selector_type = 'Explicit' \
                 AND id IN (SELECT project_id FROM project_edges WHERE edge_id = ?)",
                &[Tenant, Edge],
            ),
        );
        digests.insert(
            DigestQuery::CategoryProjects,
            QueryTemplate::new(
                "SELECT id, updated_at FROM projects \
                 WHERE tenant_id = ? AND edge_selector_type = 'Category'",
                &[Tenant],
            ),
        );
        digests.insert(
            DigestQuery::Categories,
            QueryTemplate::new(
                "SELECT id, updated_at FROM categories WHERE tenant_id = ?",
                &[Tenant],
            ),
        );
        digests.insert(DigestQuery::DataPipelines, project_scoped("data_pipelines"));
        digests.insert(DigestQuery::Functions, project_or_global("scripts"));
        digests.insert(
            DigestQuery::RuntimeEnvironments,
            project_or_global("script_runtimes"),
        );
        digests.insert(DigestQuery::MlModels, project_scoped("ml_models"));
        digests.insert(DigestQuery::LogCollectors, project_or_global("log_collectors"));
        digests.insert(
            DigestQuery::CloudProfiles,
            QueryTemplate::new(
                format!(
                    "SELECT id, updated_at FROM cloud_creds WHERE tenant_id = ? AND ( \
                     id IN (SELECT DISTINCT cloud_creds_id FROM project_cloud_creds \
                            WHERE project_id {IN_JSON_IDS}) \
                     OR id IN (SELECT DISTINCT cloud_creds_id FROM log_collectors \
                               WHERE tenant_id = ? AND id {IN_JSON_IDS}))"
                ),
                &[Tenant, ProjectIds, Tenant, LogCollectorIds],
            ),
        );
        digests.insert(
            DigestQuery::ContainerRegistries,
            QueryTemplate::new(
                format!(
                    "SELECT id, updated_at FROM container_registries WHERE tenant_id = ? \
                     AND id IN (SELECT DISTINCT registry_id FROM project_container_registries \
                                WHERE project_id {IN_JSON_IDS})"
                ),
                &[Tenant, ProjectIds],
            ),
        );
        digests.insert(
            DigestQuery::DataSources,
            QueryTemplate::new(
                "SELECT id, updated_at FROM data_sources WHERE tenant_id = ? AND edge_id = ?",
                &[Tenant, Edge],
            ),
        );
        digests.insert(
            DigestQuery::ExplicitApplications,
            QueryTemplate::new(
                format!(
                    "SELECT id, updated_at FROM applications WHERE tenant_id = ? \
                     AND id IN (SELECT application_id FROM application_edges WHERE edge_id = ?) \
                     AND project_id {IN_JSON_IDS}"
                ),
                &[Tenant, Edge, ProjectIds],
            ),
        );
        digests.insert(
            DigestQuery::CategoryApplications,
            project_scoped("applications"),
        );
        digests.insert(
            DigestQuery::ProjectServices,
            project_or_global("project_services"),
        );
        digests.insert(
            DigestQuery::SvcInstances,
            QueryTemplate::new(
                format!(
                    "SELECT id, updated_at FROM svc_instances WHERE tenant_id = ? \
                     AND (svc_domain_scope_id = ? OR project_scope_id {IN_JSON_IDS})"
                ),
                &[Tenant, Edge, ProjectIds],
            ),
        );
        digests.insert(
            DigestQuery::SvcBindings,
            QueryTemplate::new(
                format!(
                    "SELECT id, updated_at FROM svc_bindings WHERE tenant_id = ? \
                     AND (resource_type IS NULL OR svc_domain_resource_id = ? \
                          OR project_resource_id {IN_JSON_IDS})"
                ),
                &[Tenant, Edge, ProjectIds],
            ),
        );
        digests.insert(
            DigestQuery::DataDriverInstances,
            project_scoped("data_driver_instances"),
        );

        let mut selectors = HashMap::new();
        selectors.insert(
            SelectorQuery::CategoryProjects,
            QueryTemplate::new(
                "SELECT s.project_id AS entity_id, s.category_id, s.value \
                 FROM project_edge_selectors AS s \
                 INNER JOIN projects AS p ON s.project_id = p.id \
                 WHERE p.tenant_id = ? AND p.edge_selector_type = 'Category'",
                &[Tenant],
            ),
        );
        selectors.insert(
            SelectorQuery::CategoryApplications,
            QueryTemplate::new(
                format!(
                    "SELECT s.application_id AS entity_id, s.category_id, s.value \
                     FROM application_edge_selectors AS s \
                     INNER JOIN applications AS a ON s.application_id = a.id \
                     WHERE a.tenant_id = ? AND a.project_id {IN_JSON_IDS}"
                ),
                &[Tenant, ProjectIds],
            ),
        );

        let entity_tables = [
            (Category::Projects, "projects"),
            (Category::Applications, "applications"),
            (Category::ProjectServices, "project_services"),
            (Category::DataPipelines, "data_pipelines"),
            (Category::Functions, "scripts"),
            (Category::RuntimeEnvironments, "script_runtimes"),
            (Category::MlModels, "ml_models"),
            (Category::CloudProfiles, "cloud_creds"),
            (Category::ContainerRegistries, "container_registries"),
            (Category::Categories, "categories"),
            (Category::DataSources, "data_sources"),
            (Category::LogCollectors, "log_collectors"),
            (Category::SvcInstances, "svc_instances"),
            (Category::SvcBindings, "svc_bindings"),
            (Category::DataDriverInstances, "data_driver_instances"),
        ];
        let entities = entity_tables
            .into_iter()
            .map(|(category, table)| {
                let template = QueryTemplate::new(
                    format!(
                        "SELECT id, updated_at, doc FROM {table} \
                         WHERE tenant_id = ? AND id IN (SELECT value FROM json_each(?))"
                    ),
                    &[Tenant, EntityIds],
                );
                (category, template)
            })
            .collect();

        Self {
            digests,
            selectors,
            entities,
        }
    }

    /// Template for a digest query.
    pub fn digest(&self, query: DigestQuery) -> Result<&QueryTemplate, StoreError> {
        self.digests.get(&query).ok_or_else(|| StoreError::Database {
            operation: "digests".to_string(),
            details: format!("no query registered for {:?}", query),
        })
    }

    /// Template for a selector query.
    pub fn selector(&self, query: SelectorQuery) -> Result<&QueryTemplate, StoreError> {
        self.selectors.get(&query).ok_or_else(|| StoreError::Database {
            operation: "selectors".to_string(),
            details: format!("no query registered for {:?}", query),
        })
    }

    /// Template fetching full documents of a category by ID.
    ///
    /// Software updates are not stored as inventory documents and have none.
    pub fn entities(&self, category: Category) -> Result<&QueryTemplate, StoreError> {
        self.entities.get(&category).ok_or_else(|| StoreError::Database {
            operation: "entities_by_ids".to_string(),
            details: format!("no entity table for category {}", category),
        })
    }
}
