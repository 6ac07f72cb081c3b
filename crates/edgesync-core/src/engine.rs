// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inventory delta orchestrator.
//!
//! Runs every per-category assembler for one edge in a fixed order:
//!
//! 1. Projects: explicit projects listing the edge plus category projects
//!    whose selectors match the edge's labels. Produces the project universe.
//! 2. Categories (only when enabled).
//! 3. Project-scoped categories, log collectors, cloud profiles (which also
//!    follow the edge's log collectors), registries, data sources.
//! 4. Applications: explicit ones plus selector-matched ones of category
//!    projects.
//! 5. Project services, service instances and bindings, software updates,
//!    data driver instances.
//! 6. Lifecycle post-processing.
//!
//! Categories run sequentially; the first store failure aborts the request.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, instrument};

use crate::digest::{VersionDigest, compute_change_set};
use crate::error::{DeltaError, Result, StoreError};
use crate::lifecycle::reclassify_undeployed;
use crate::materialize::materialize_split;
use crate::model::{Category, CategoryDelta, DeltaResponse, ReportedInventory};
use crate::persistence::{DigestQuery, InventoryStore, ScopeFilter, SelectorQuery};
use crate::selector::{EdgeLabelSet, EntitySelectorSet, resolve_applicable};
use crate::software_update::{SoftwareUpdateSource, software_update_delta};

/// Engine options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeltaOptions {
    /// Include the tenant's categories in the delta. Edges do not track
    /// categories today, so the section would be re-sent in full.
    pub send_categories_delta: bool,
}

/// Project universe and labels of one edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeScope {
    /// Explicit projects listing the edge.
    pub explicit_project_ids: Vec<String>,
    /// Category projects whose selectors match the edge.
    pub category_project_ids: Vec<String>,
    /// Union of both, in that order.
    pub project_ids: Vec<String>,
    /// Labels assigned to the edge.
    pub labels: EdgeLabelSet,
}

/// One delta request in flight.
struct DeltaRequest<'a> {
    tenant_id: &'a str,
    edge_id: &'a str,
    reported: &'a ReportedInventory,
}

impl DeltaRequest<'_> {
    fn store_error(&self, category: Category) -> impl FnOnce(StoreError) -> DeltaError + '_ {
        move |source| DeltaError::Store {
            category,
            tenant_id: self.tenant_id.to_string(),
            edge_id: self.edge_id.to_string(),
            source,
        }
    }

    fn scope(&self) -> ScopeFilter {
        ScopeFilter::for_edge(self.edge_id)
    }
}

fn unique_ids(digests: &[VersionDigest]) -> Vec<String> {
    let mut seen = HashSet::with_capacity(digests.len());
    digests
        .iter()
        .filter(|d| seen.insert(d.id.as_str()))
        .map(|d| d.id.clone())
        .collect()
}

/// Computes inventory deltas against an [`InventoryStore`].
#[derive(Clone)]
pub struct InventoryDeltaEngine {
    store: Arc<dyn InventoryStore>,
    software_updates: Arc<dyn SoftwareUpdateSource>,
    options: DeltaOptions,
}

impl InventoryDeltaEngine {
    /// Create an engine.
    pub fn new(
        store: Arc<dyn InventoryStore>,
        software_updates: Arc<dyn SoftwareUpdateSource>,
        options: DeltaOptions,
    ) -> Self {
        Self {
            store,
            software_updates,
            options,
        }
    }

    /// Engine options.
    pub fn options(&self) -> DeltaOptions {
        self.options
    }

    /// Backing store.
    pub fn store(&self) -> &Arc<dyn InventoryStore> {
        &self.store
    }

    /// Compute the full delta for `edge_id` given what it reported.
    #[instrument(skip(self, reported), fields(tenant_id = %tenant_id, edge_id = %edge_id))]
    pub async fn compute_delta(
        &self,
        tenant_id: &str,
        edge_id: &str,
        reported: &ReportedInventory,
    ) -> Result<DeltaResponse> {
        let started = Instant::now();
        let request = DeltaRequest {
            tenant_id,
            edge_id,
            reported,
        };
        let mut response = DeltaResponse::new();

        let (scope, projects) = self.resolve_projects(&request).await?;
        self.record(&mut response, Category::Projects, projects, started);
        let projects_scope = request.scope().with_projects(scope.project_ids.clone());

        if self.options.send_categories_delta {
            let delta = self
                .scoped_category(&request, DigestQuery::Categories, &request.scope())
                .await?;
            self.record(&mut response, Category::Categories, delta, started);
        }

        for query in [
            DigestQuery::DataPipelines,
            DigestQuery::Functions,
            DigestQuery::RuntimeEnvironments,
            DigestQuery::MlModels,
        ] {
            let delta = self.scoped_category(&request, query, &projects_scope).await?;
            self.record(&mut response, query.category(), delta, started);
        }

        let log_collectors = self
            .fetch_digests(&request, DigestQuery::LogCollectors, &projects_scope)
            .await?;
        let log_collector_ids = unique_ids(&log_collectors);
        let delta = self
            .assemble(&request, Category::LogCollectors, log_collectors)
            .await?;
        self.record(&mut response, Category::LogCollectors, delta, started);

        let profiles_scope = projects_scope.clone().with_log_collectors(log_collector_ids);
        let delta = self
            .scoped_category(&request, DigestQuery::CloudProfiles, &profiles_scope)
            .await?;
        self.record(&mut response, Category::CloudProfiles, delta, started);

        let delta = self
            .scoped_category(&request, DigestQuery::ContainerRegistries, &projects_scope)
            .await?;
        self.record(&mut response, Category::ContainerRegistries, delta, started);

        let delta = self
            .scoped_category(&request, DigestQuery::DataSources, &request.scope())
            .await?;
        self.record(&mut response, Category::DataSources, delta, started);

        let delta = self.applications(&request, &scope).await?;
        self.record(&mut response, Category::Applications, delta, started);

        for query in [
            DigestQuery::ProjectServices,
            DigestQuery::SvcInstances,
            DigestQuery::SvcBindings,
        ] {
            let delta = self.scoped_category(&request, query, &projects_scope).await?;
            self.record(&mut response, query.category(), delta, started);
        }

        let delta = software_update_delta(
            self.software_updates.as_ref(),
            tenant_id,
            edge_id,
            reported.get(Category::SoftwareUpdates),
        )
        .await;
        self.record(&mut response, Category::SoftwareUpdates, delta, started);

        let delta = self
            .scoped_category(&request, DigestQuery::DataDriverInstances, &projects_scope)
            .await?;
        self.record(&mut response, Category::DataDriverInstances, delta, started);

        let undeployed = reclassify_undeployed(&mut response);

        info!(
            projects = scope.project_ids.len(),
            labels = scope.labels.len(),
            changes = response.change_count(),
            undeployed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Inventory delta computed"
        );
        Ok(response)
    }

    /// Resolve the edge's project universe and the Projects delta.
    pub async fn resolve_edge_scope(&self, tenant_id: &str, edge_id: &str) -> Result<EdgeScope> {
        let reported = ReportedInventory::new();
        let request = DeltaRequest {
            tenant_id,
            edge_id,
            reported: &reported,
        };
        let (scope, _) = self.resolve_projects(&request).await?;
        Ok(scope)
    }

    async fn resolve_projects(
        &self,
        request: &DeltaRequest<'_>,
    ) -> Result<(EdgeScope, CategoryDelta)> {
        let scope = request.scope();
        let explicit = self
            .fetch_digests(request, DigestQuery::ExplicitProjects, &scope)
            .await?;
        let all_category = self
            .fetch_digests(request, DigestQuery::CategoryProjects, &scope)
            .await?;
        let selectors = self
            .fetch_selectors(request, SelectorQuery::CategoryProjects, Category::Projects, &scope)
            .await?;
        let labels = self
            .store
            .edge_labels(request.tenant_id, request.edge_id)
            .await
            .map_err(request.store_error(Category::Projects))?;

        let category = resolve_applicable(
            &all_category,
            &EntitySelectorSet::group(selectors),
            &labels,
            false,
        );

        let explicit_project_ids = unique_ids(&explicit);
        let category_project_ids = unique_ids(&category);
        let mut projects = explicit;
        projects.extend(category);
        let project_ids = unique_ids(&projects);

        debug!(
            explicit = explicit_project_ids.len(),
            category = category_project_ids.len(),
            "Resolved edge projects"
        );

        let delta = self.assemble(request, Category::Projects, projects).await?;
        let edge_scope = EdgeScope {
            explicit_project_ids,
            category_project_ids,
            project_ids,
            labels,
        };
        Ok((edge_scope, delta))
    }

    async fn applications(
        &self,
        request: &DeltaRequest<'_>,
        scope: &EdgeScope,
    ) -> Result<CategoryDelta> {
        let explicit_scope = request
            .scope()
            .with_projects(scope.explicit_project_ids.clone());
        let mut applications = self
            .fetch_digests(request, DigestQuery::ExplicitApplications, &explicit_scope)
            .await?;

        if !scope.category_project_ids.is_empty() {
            let category_scope = request
                .scope()
                .with_projects(scope.category_project_ids.clone());
            let all_category = self
                .fetch_digests(request, DigestQuery::CategoryApplications, &category_scope)
                .await?;
            let selectors = self
                .fetch_selectors(
                    request,
                    SelectorQuery::CategoryApplications,
                    Category::Applications,
                    &category_scope,
                )
                .await?;
            applications.extend(resolve_applicable(
                &all_category,
                &EntitySelectorSet::group(selectors),
                &scope.labels,
                true,
            ));
        }

        self.assemble(request, Category::Applications, applications)
            .await
    }

    async fn scoped_category(
        &self,
        request: &DeltaRequest<'_>,
        query: DigestQuery,
        scope: &ScopeFilter,
    ) -> Result<CategoryDelta> {
        let authoritative = self.fetch_digests(request, query, scope).await?;
        self.assemble(request, query.category(), authoritative)
            .await
    }

    /// Diff against the edge's report and hydrate created/updated entities.
    async fn assemble(
        &self,
        request: &DeltaRequest<'_>,
        category: Category,
        authoritative: Vec<VersionDigest>,
    ) -> Result<CategoryDelta> {
        let change_set = compute_change_set(request.reported.get(category), &authoritative);
        let created_ids = change_set.created_ids();
        let updated_ids = change_set.updated_ids();

        let store = &self.store;
        let tenant_id = request.tenant_id;
        let (created, updated) = materialize_split(created_ids, updated_ids, |ids| async move {
            store.entities_by_ids(tenant_id, category, &ids).await
        })
        .await
        .map_err(request.store_error(category))?;

        Ok(CategoryDelta {
            deleted: change_set.deleted,
            created,
            updated,
        })
    }

    async fn fetch_digests(
        &self,
        request: &DeltaRequest<'_>,
        query: DigestQuery,
        scope: &ScopeFilter,
    ) -> Result<Vec<VersionDigest>> {
        self.store
            .digests(request.tenant_id, query, scope)
            .await
            .map_err(request.store_error(query.category()))
    }

    async fn fetch_selectors(
        &self,
        request: &DeltaRequest<'_>,
        query: SelectorQuery,
        category: Category,
        scope: &ScopeFilter,
    ) -> Result<Vec<crate::selector::CategorySelector>> {
        self.store
            .selectors(request.tenant_id, query, scope)
            .await
            .map_err(request.store_error(category))
    }

    fn record(
        &self,
        response: &mut DeltaResponse,
        category: Category,
        delta: CategoryDelta,
        started: Instant,
    ) {
        debug!(
            category = %category,
            deleted = delta.deleted.len(),
            created = delta.created.len(),
            updated = delta.updated.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Category delta assembled"
        );
        response.insert(category, delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InventoryEntity;
    use crate::selector::{CategoryLabel, CategorySelector};
    use crate::software_update::NoSoftwareUpdates;
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};
    use std::collections::HashMap;
    use std::sync::Mutex;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    /// In-memory store keyed by digest query; counts entity fetches.
    #[derive(Default)]
    struct MemoryStore {
        digests: HashMap<DigestQuery, Vec<VersionDigest>>,
        selectors: HashMap<SelectorQuery, Vec<CategorySelector>>,
        labels: Vec<CategoryLabel>,
        states: HashMap<String, &'static str>,
        fetches: Mutex<Vec<(Category, usize)>>,
        scopes: Mutex<Vec<(DigestQuery, ScopeFilter)>>,
    }

    #[async_trait]
    impl InventoryStore for MemoryStore {
        async fn digests(
            &self,
            _tenant_id: &str,
            query: DigestQuery,
            scope: &ScopeFilter,
        ) -> std::result::Result<Vec<VersionDigest>, StoreError> {
            self.scopes.lock().unwrap().push((query, scope.clone()));
            Ok(self.digests.get(&query).cloned().unwrap_or_default())
        }

        async fn selectors(
            &self,
            _tenant_id: &str,
            query: SelectorQuery,
            _scope: &ScopeFilter,
        ) -> std::result::Result<Vec<CategorySelector>, StoreError> {
            Ok(self.selectors.get(&query).cloned().unwrap_or_default())
        }

        async fn entities_by_ids(
            &self,
            _tenant_id: &str,
            category: Category,
            ids: &[String],
        ) -> std::result::Result<Vec<InventoryEntity>, StoreError> {
            self.fetches.lock().unwrap().push((category, ids.len()));
            ids.iter()
                .map(|id| {
                    let state = self.states.get(id).copied().unwrap_or("DEPLOY");
                    InventoryEntity::from_document(
                        id.clone(),
                        ts(10),
                        serde_json::json!({"state": state}),
                    )
                })
                .collect()
        }

        async fn edge_labels(
            &self,
            _tenant_id: &str,
            _edge_id: &str,
        ) -> std::result::Result<EdgeLabelSet, StoreError> {
            Ok(self.labels.iter().cloned().collect())
        }

        async fn health_check(&self) -> std::result::Result<bool, StoreError> {
            Ok(true)
        }
    }

    fn engine(store: Arc<MemoryStore>, options: DeltaOptions) -> InventoryDeltaEngine {
        InventoryDeltaEngine::new(store, Arc::new(NoSoftwareUpdates), options)
    }

    fn d(id: &str, secs: i64) -> VersionDigest {
        VersionDigest::new(id, ts(secs))
    }

    fn ids<T: crate::materialize::Identified>(items: &[T]) -> Vec<&str> {
        items.iter().map(|i| i.id()).collect()
    }

    #[tokio::test]
    async fn test_project_universe_feeds_scoped_categories() {
        let mut store = MemoryStore::default();
        store
            .digests
            .insert(DigestQuery::ExplicitProjects, vec![d("p-exp", 1)]);
        store.digests.insert(
            DigestQuery::CategoryProjects,
            vec![d("p-match", 1), d("p-nomatch", 1), d("p-unscoped", 1)],
        );
        store.selectors.insert(
            SelectorQuery::CategoryProjects,
            vec![
                CategorySelector::new("p-match", "env", "prod"),
                CategorySelector::new("p-nomatch", "env", "dev"),
            ],
        );
        store.labels = vec![CategoryLabel::new("env", "prod")];
        let store = Arc::new(store);

        let engine = engine(store.clone(), DeltaOptions::default());
        let response = engine
            .compute_delta("t1", "e1", &ReportedInventory::new())
            .await
            .unwrap();

        assert_eq!(ids(response.created(Category::Projects)), vec!["p-exp", "p-match"]);

        let scopes = store.scopes.lock().unwrap();
        let (_, pipelines_scope) = scopes
            .iter()
            .find(|(q, _)| *q == DigestQuery::DataPipelines)
            .unwrap();
        assert_eq!(pipelines_scope.project_ids, vec!["p-exp", "p-match"]);
        assert_eq!(pipelines_scope.edge_id, "e1");
    }

    #[tokio::test]
    async fn test_categories_only_when_enabled() {
        let mut store = MemoryStore::default();
        store.digests.insert(DigestQuery::Categories, vec![d("c1", 1)]);
        let store = Arc::new(store);

        let off = engine(store.clone(), DeltaOptions::default())
            .compute_delta("t1", "e1", &ReportedInventory::new())
            .await
            .unwrap();
        assert!(off.created(Category::Categories).is_empty());

        let on = engine(
            store,
            DeltaOptions {
                send_categories_delta: true,
            },
        )
        .compute_delta("t1", "e1", &ReportedInventory::new())
        .await
        .unwrap();
        assert_eq!(ids(on.created(Category::Categories)), vec!["c1"]);
    }

    #[tokio::test]
    async fn test_log_collectors_feed_cloud_profiles() {
        let mut store = MemoryStore::default();
        store
            .digests
            .insert(DigestQuery::LogCollectors, vec![d("lc1", 1), d("lc2", 1)]);
        let store = Arc::new(store);

        // the edge already has both collectors; their IDs still scope profiles
        let reported = ReportedInventory::new().with(
            Category::LogCollectors,
            vec![d("lc1", 1), d("lc2", 1)],
        );
        engine(store.clone(), DeltaOptions::default())
            .compute_delta("t1", "e1", &reported)
            .await
            .unwrap();

        let scopes = store.scopes.lock().unwrap();
        let (_, profiles_scope) = scopes
            .iter()
            .find(|(q, _)| *q == DigestQuery::CloudProfiles)
            .unwrap();
        assert_eq!(profiles_scope.log_collector_ids, vec!["lc1", "lc2"]);
    }

    #[tokio::test]
    async fn test_applications_explicit_and_category() {
        let mut store = MemoryStore::default();
        store
            .digests
            .insert(DigestQuery::ExplicitProjects, vec![d("p-exp", 1)]);
        store
            .digests
            .insert(DigestQuery::CategoryProjects, vec![d("p-cat", 1)]);
        store.selectors.insert(
            SelectorQuery::CategoryProjects,
            vec![CategorySelector::new("p-cat", "site", "berlin")],
        );
        store.labels = vec![CategoryLabel::new("site", "berlin")];
        store
            .digests
            .insert(DigestQuery::ExplicitApplications, vec![d("a-exp", 1)]);
        store.digests.insert(
            DigestQuery::CategoryApplications,
            vec![d("a-all", 1), d("a-berlin", 1), d("a-paris", 1)],
        );
        store.selectors.insert(
            SelectorQuery::CategoryApplications,
            vec![
                CategorySelector::new("a-berlin", "site", "berlin"),
                CategorySelector::new("a-paris", "site", "paris"),
            ],
        );
        let store = Arc::new(store);

        let response = engine(store.clone(), DeltaOptions::default())
            .compute_delta("t1", "e1", &ReportedInventory::new())
            .await
            .unwrap();

        assert_eq!(
            ids(response.created(Category::Applications)),
            vec!["a-exp", "a-all", "a-berlin"]
        );

        let scopes = store.scopes.lock().unwrap();
        let scope_of = |query: DigestQuery| {
            scopes
                .iter()
                .find(|(q, _)| *q == query)
                .map(|(_, s)| s.project_ids.clone())
                .unwrap()
        };
        assert_eq!(scope_of(DigestQuery::ExplicitApplications), vec!["p-exp"]);
        assert_eq!(scope_of(DigestQuery::CategoryApplications), vec!["p-cat"]);
    }

    #[tokio::test]
    async fn test_no_category_projects_skips_category_applications() {
        let store = Arc::new(MemoryStore::default());
        engine(store.clone(), DeltaOptions::default())
            .compute_delta("t1", "e1", &ReportedInventory::new())
            .await
            .unwrap();
        let scopes = store.scopes.lock().unwrap();
        assert!(
            !scopes
                .iter()
                .any(|(q, _)| *q == DigestQuery::CategoryApplications)
        );
    }

    #[tokio::test]
    async fn test_one_fetch_per_category_and_undeploy_pass() {
        let mut store = MemoryStore::default();
        store
            .digests
            .insert(DigestQuery::ExplicitProjects, vec![d("p1", 1)]);
        store.digests.insert(
            DigestQuery::ExplicitApplications,
            vec![d("a-new", 2), d("a-changed", 2), d("a-gone-soft", 2)],
        );
        store
            .states
            .insert("a-gone-soft".to_string(), "UNDEPLOY");
        let store = Arc::new(store);

        let reported = ReportedInventory::new().with(
            Category::Applications,
            vec![d("a-changed", 1), d("a-gone-soft", 1), d("a-removed", 1)],
        );
        let response = engine(store.clone(), DeltaOptions::default())
            .compute_delta("t1", "e1", &reported)
            .await
            .unwrap();

        assert_eq!(ids(response.created(Category::Applications)), vec!["a-new"]);
        assert_eq!(ids(response.updated(Category::Applications)), vec!["a-changed"]);
        assert_eq!(
            response.deleted(Category::Applications),
            ["a-removed".to_string(), "a-gone-soft".to_string()]
        );

        let fetches = store.fetches.lock().unwrap();
        let app_fetches: Vec<_> = fetches
            .iter()
            .filter(|(c, _)| *c == Category::Applications)
            .collect();
        assert_eq!(app_fetches.len(), 1);
        assert_eq!(app_fetches[0].1, 3);
        // categories with nothing to hydrate never hit the store
        assert!(fetches.iter().all(|(c, _)| *c == Category::Applications || *c == Category::Projects));
    }

    #[tokio::test]
    async fn test_resolve_edge_scope() {
        let mut store = MemoryStore::default();
        store
            .digests
            .insert(DigestQuery::ExplicitProjects, vec![d("p1", 1), d("p1", 1)]);
        store.labels = vec![CategoryLabel::new("env", "prod")];
        let scope = engine(Arc::new(store), DeltaOptions::default())
            .resolve_edge_scope("t1", "e1")
            .await
            .unwrap();
        assert_eq!(scope.project_ids, vec!["p1"]);
        assert_eq!(scope.labels.len(), 1);
        assert!(scope.category_project_ids.is_empty());
    }
}
