// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! SQLite-backed inventory store.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use sqlx::query::QueryAs;
use sqlx::sqlite::{Sqlite, SqliteArguments, SqlitePoolOptions};
use tracing::{debug, instrument};

use crate::digest::VersionDigest;
use crate::error::StoreError;
use crate::migrations;
use crate::model::{Category, InventoryEntity};
use crate::selector::{CategoryLabel, CategorySelector, EdgeLabelSet};
use crate::software_update::{SoftwareUpdate, SoftwareUpdateSource};

use super::{Bind, DigestQuery, InventoryStore, QueryTable, ScopeFilter, SelectorQuery};

type SqliteQueryAs<'q, O> = QueryAs<'q, Sqlite, O, SqliteArguments<'q>>;

#[derive(Debug, sqlx::FromRow)]
struct DigestRow {
    id: String,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct SelectorRow {
    entity_id: String,
    category_id: String,
    value: String,
}

#[derive(Debug, sqlx::FromRow)]
struct EntityRow {
    id: String,
    updated_at: DateTime<Utc>,
    doc: String,
}

#[derive(Debug, sqlx::FromRow)]
struct SoftwareUpdateRow {
    batch_id: String,
    svc_domain_id: String,
    release: String,
    state: String,
    progress: i32,
    eta: i32,
    failure_reason: Option<String>,
    state_updated_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    is_latest_batch: bool,
}

impl From<SoftwareUpdateRow> for SoftwareUpdate {
    fn from(row: SoftwareUpdateRow) -> Self {
        SoftwareUpdate {
            batch_id: row.batch_id,
            svc_domain_id: row.svc_domain_id,
            release: row.release,
            state: row.state,
            progress: row.progress,
            eta: row.eta,
            failure_reason: row.failure_reason,
            state_updated_at: row.state_updated_at,
            created_at: row.created_at,
            is_latest_batch: row.is_latest_batch,
        }
    }
}

/// Values available to a template's binds.
struct BindValues<'q> {
    tenant_id: &'q str,
    edge_id: &'q str,
    project_ids: &'q [String],
    log_collector_ids: &'q [String],
    entity_ids: &'q [String],
}

fn json_array(ids: &[String]) -> Result<String, StoreError> {
    Ok(serde_json::to_string(ids)?)
}

fn bind_all<'q, O>(
    mut query: SqliteQueryAs<'q, O>,
    binds: &[Bind],
    values: &BindValues<'q>,
) -> Result<SqliteQueryAs<'q, O>, StoreError> {
    for bind in binds {
        query = match bind {
            Bind::Tenant => query.bind(values.tenant_id),
            Bind::Edge => query.bind(values.edge_id),
            Bind::ProjectIds => query.bind(json_array(values.project_ids)?),
            Bind::LogCollectorIds => query.bind(json_array(values.log_collector_ids)?),
            Bind::EntityIds => query.bind(json_array(values.entity_ids)?),
        };
    }
    Ok(query)
}

fn db_error(operation: &str, err: sqlx::Error) -> StoreError {
    StoreError::Database {
        operation: operation.to_string(),
        details: err.to_string(),
    }
}

/// SQLite-backed inventory store.
#[derive(Clone)]
pub struct SqlitePersistence {
    pool: SqlitePool,
    queries: Arc<QueryTable>,
}

impl SqlitePersistence {
    /// Create a new SQLite store from an existing, migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            queries: Arc::new(QueryTable::sqlite()),
        }
    }

    /// Connect to `database_url` and run migrations.
    ///
    /// Accepts a `sqlite:` URL or a plain file path. In-memory databases are
    /// limited to one connection, since every connection would otherwise see
    /// its own empty database.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        if !database_url.starts_with("sqlite:") {
            return Self::open(Path::new(database_url), max_connections).await;
        }

        let max_connections = if database_url.contains(":memory:") {
            1
        } else {
            max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {}: {}", database_url, e),
            })?;

        Self::migrated(pool).await
    }

    /// Create and initialize a SQLite store from a file path.
    ///
    /// Creates parent directories and the database file if needed, then runs
    /// all migrations.
    ///
    /// ```ignore
    /// let store = SqlitePersistence::from_path(".data/inventory.db").await?;
    /// ```
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open(path.as_ref(), 5).await
    }

    async fn open(path: &Path, max_connections: u32) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Database {
                operation: "create_dir".to_string(),
                details: format!("Failed to create directory {:?}: {}", parent, e),
            })?;
        }

        let url = format!("sqlite:{}?mode=rwc", path.to_string_lossy());
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(&url)
            .await
            .map_err(|e| StoreError::Database {
                operation: "connect".to_string(),
                details: format!("Failed to connect to SQLite at {:?}: {}", path, e),
            })?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, StoreError> {
        migrations::run_sqlite(&pool)
            .await
            .map_err(|e| StoreError::Database {
                operation: "migrate".to_string(),
                details: format!("Failed to run migrations: {}", e),
            })?;
        Ok(Self::new(pool))
    }

    /// Underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

#[async_trait]
impl InventoryStore for SqlitePersistence {
    #[instrument(level = "debug", skip(self, scope), fields(projects = scope.project_ids.len()))]
    async fn digests(
        &self,
        tenant_id: &str,
        query: DigestQuery,
        scope: &ScopeFilter,
    ) -> Result<Vec<VersionDigest>, StoreError> {
        let template = self.queries.digest(query)?;
        let values = BindValues {
            tenant_id,
            edge_id: &scope.edge_id,
            project_ids: &scope.project_ids,
            log_collector_ids: &scope.log_collector_ids,
            entity_ids: &[],
        };

        let rows = bind_all(
            sqlx::query_as::<_, DigestRow>(&template.sql),
            template.binds,
            &values,
        )?
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("digests", e))?;

        debug!(rows = rows.len(), "Fetched digests");
        Ok(rows
            .into_iter()
            .map(|row| VersionDigest::new(row.id, row.updated_at))
            .collect())
    }

    #[instrument(level = "debug", skip(self, scope))]
    async fn selectors(
        &self,
        tenant_id: &str,
        query: SelectorQuery,
        scope: &ScopeFilter,
    ) -> Result<Vec<CategorySelector>, StoreError> {
        let template = self.queries.selector(query)?;
        let values = BindValues {
            tenant_id,
            edge_id: &scope.edge_id,
            project_ids: &scope.project_ids,
            log_collector_ids: &scope.log_collector_ids,
            entity_ids: &[],
        };

        let rows = bind_all(
            sqlx::query_as::<_, SelectorRow>(&template.sql),
            template.binds,
            &values,
        )?
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("selectors", e))?;

        Ok(rows
            .into_iter()
            .map(|row| CategorySelector::new(row.entity_id, row.category_id, row.value))
            .collect())
    }

    #[instrument(level = "debug", skip(self, ids), fields(ids = ids.len()))]
    async fn entities_by_ids(
        &self,
        tenant_id: &str,
        category: Category,
        ids: &[String],
    ) -> Result<Vec<InventoryEntity>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let template = self.queries.entities(category)?;
        let values = BindValues {
            tenant_id,
            edge_id: "",
            project_ids: &[],
            log_collector_ids: &[],
            entity_ids: ids,
        };

        let rows = bind_all(
            sqlx::query_as::<_, EntityRow>(&template.sql),
            template.binds,
            &values,
        )?
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("entities_by_ids", e))?;

        rows.into_iter()
            .map(|row| {
                let document: serde_json::Value =
                    serde_json::from_str(&row.doc).map_err(|e| StoreError::Decode {
                        operation: "entities_by_ids".to_string(),
                        details: format!("document of '{}' is not valid JSON: {}", row.id, e),
                    })?;
                InventoryEntity::from_document(row.id, row.updated_at, document)
            })
            .collect()
    }

    #[instrument(level = "debug", skip(self))]
    async fn edge_labels(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> Result<EdgeLabelSet, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT category_id, value
            FROM edge_labels
            WHERE tenant_id = ? AND edge_id = ?
            "#,
        )
        .bind(tenant_id)
        .bind(edge_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("edge_labels", e))?;

        Ok(rows
            .into_iter()
            .map(|(category_id, value)| CategoryLabel::new(category_id, value))
            .collect())
    }

    async fn health_check(&self) -> Result<bool, StoreError> {
        let result: Result<(i64,), _> = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await;
        Ok(result.is_ok())
    }
}

#[async_trait]
impl SoftwareUpdateSource for SqlitePersistence {
    #[instrument(level = "debug", skip(self))]
    async fn current_update(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> Result<Option<SoftwareUpdate>, StoreError> {
        let row = sqlx::query_as::<_, SoftwareUpdateRow>(
            r#"
            SELECT batch_id, svc_domain_id, release, state, progress, eta,
                   failure_reason, state_updated_at, created_at, is_latest_batch
            FROM software_update_batches
            WHERE tenant_id = ? AND svc_domain_id = ?
            ORDER BY is_latest_batch DESC, created_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(edge_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| db_error("current_update", e))?;

        Ok(row.map(SoftwareUpdate::from))
    }
}
