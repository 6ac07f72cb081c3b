// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Common test infrastructure for edgesync-core integration tests.
//!
//! Provides TestContext: an in-memory SQLite store with the inventory schema
//! and helpers to seed it.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::{Value, json};
use sqlx::SqlitePool;

use edgesync_core::digest::VersionDigest;
use edgesync_core::engine::{DeltaOptions, InventoryDeltaEngine};
use edgesync_core::handlers::DeltaHandlerState;
use edgesync_core::persistence::SqlitePersistence;

pub const TENANT: &str = "tenant-acme";
pub const EDGE: &str = "edge-berlin-01";

/// Fixed timestamp `secs` after a base instant.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_714_557_600 + secs, 0).unwrap()
}

/// Digest helper.
pub fn digest(id: &str, secs: i64) -> VersionDigest {
    VersionDigest::new(id, at(secs))
}

/// Test context around one in-memory store.
pub struct TestContext {
    pub store: Arc<SqlitePersistence>,
}

impl TestContext {
    pub async fn new() -> Self {
        let store = SqlitePersistence::connect("sqlite::memory:", 1)
            .await
            .expect("Failed to create in-memory store");
        Self {
            store: Arc::new(store),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        self.store.pool()
    }

    pub fn engine(&self, options: DeltaOptions) -> InventoryDeltaEngine {
        InventoryDeltaEngine::new(self.store.clone(), self.store.clone(), options)
    }

    pub fn handler_state(&self) -> DeltaHandlerState {
        DeltaHandlerState::new(Arc::new(self.engine(DeltaOptions::default())))
    }

    async fn exec(&self, sql: &str, binds: &[Option<&str>]) {
        let mut query = sqlx::query(sql);
        for bind in binds {
            query = query.bind(*bind);
        }
        query.execute(self.pool()).await.expect(sql);
    }

    // ------------------------------------------------------------------
    // Projects and labels
    // ------------------------------------------------------------------

    pub async fn explicit_project(&self, id: &str, secs: i64, edges: &[&str]) {
        self.project(id, "Explicit", secs).await;
        for edge in edges {
            self.exec(
                "INSERT INTO project_edges (project_id, edge_id) VALUES (?, ?)",
                &[Some(id), Some(*edge)],
            )
            .await;
        }
    }

    pub async fn category_project(&self, id: &str, secs: i64, selectors: &[(&str, &str)]) {
        self.project(id, "Category", secs).await;
        for (category, value) in selectors {
            self.exec(
                "INSERT INTO project_edge_selectors (project_id, category_id, value) VALUES (?, ?, ?)",
                &[Some(id), Some(*category), Some(*value)],
            )
            .await;
        }
    }

    async fn project(&self, id: &str, kind: &str, secs: i64) {
        sqlx::query(
            "INSERT INTO projects (id, tenant_id, edge_selector_type, updated_at, doc) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(TENANT)
        .bind(kind)
        .bind(at(secs))
        .bind(json!({"name": id, "edgeSelectorType": kind}).to_string())
        .execute(self.pool())
        .await
        .unwrap();
    }

    pub async fn edge_label(&self, edge: &str, category: &str, value: &str) {
        self.exec(
            "INSERT INTO edge_labels (tenant_id, edge_id, category_id, value) VALUES (?, ?, ?, ?)",
            &[Some(TENANT), Some(edge), Some(category), Some(value)],
        )
        .await;
    }

    pub async fn category(&self, id: &str, secs: i64) {
        self.document("categories", id, secs, json!({"name": id}))
            .await;
    }

    // ------------------------------------------------------------------
    // Applications
    // ------------------------------------------------------------------

    pub async fn application(&self, id: &str, project: &str, secs: i64, state: &str) {
        sqlx::query(
            "INSERT INTO applications (id, tenant_id, project_id, updated_at, doc) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(TENANT)
        .bind(project)
        .bind(at(secs))
        .bind(json!({"name": id, "projectId": project, "state": state}).to_string())
        .execute(self.pool())
        .await
        .unwrap();
    }

    pub async fn application_edge(&self, application: &str, edge: &str) {
        self.exec(
            "INSERT INTO application_edges (application_id, edge_id) VALUES (?, ?)",
            &[Some(application), Some(edge)],
        )
        .await;
    }

    pub async fn application_selector(&self, application: &str, category: &str, value: &str) {
        self.exec(
            "INSERT INTO application_edge_selectors (application_id, category_id, value) VALUES (?, ?, ?)",
            &[Some(application), Some(category), Some(value)],
        )
        .await;
    }

    // ------------------------------------------------------------------
    // Other entities
    // ------------------------------------------------------------------

    /// Row in a table scoped by a nullable `project_id`.
    pub async fn project_scoped(&self, table: &str, id: &str, project: Option<&str>, secs: i64) {
        self.project_scoped_doc(table, id, project, secs, json!({"name": id}))
            .await;
    }

    pub async fn project_scoped_doc(
        &self,
        table: &str,
        id: &str,
        project: Option<&str>,
        secs: i64,
        doc: Value,
    ) {
        sqlx::query(&format!(
            "INSERT INTO {} (id, tenant_id, project_id, updated_at, doc) VALUES (?, ?, ?, ?, ?)",
            table
        ))
        .bind(id)
        .bind(TENANT)
        .bind(project)
        .bind(at(secs))
        .bind(doc.to_string())
        .execute(self.pool())
        .await
        .unwrap();
    }

    pub async fn data_source(&self, id: &str, edge: &str, secs: i64) {
        sqlx::query(
            "INSERT INTO data_sources (id, tenant_id, edge_id, updated_at, doc) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(TENANT)
        .bind(edge)
        .bind(at(secs))
        .bind(json!({"name": id}).to_string())
        .execute(self.pool())
        .await
        .unwrap();
    }

    pub async fn software_update(&self, batch: &str, edge: &str, state_secs: i64) {
        sqlx::query(
            "INSERT INTO software_update_batches (batch_id, tenant_id, svc_domain_id, release, state, progress, state_updated_at, created_at, is_latest_batch) VALUES (?, ?, ?, '2.4.0', 'DOWNLOADING', 50, ?, ?, 1)",
        )
        .bind(batch)
        .bind(TENANT)
        .bind(edge)
        .bind(at(state_secs))
        .bind(at(0))
        .execute(self.pool())
        .await
        .unwrap();
    }

    /// Row in a table with no scope columns besides the tenant.
    pub async fn document(&self, table: &str, id: &str, secs: i64, doc: Value) {
        sqlx::query(&format!(
            "INSERT INTO {} (id, tenant_id, updated_at, doc) VALUES (?, ?, ?, ?)",
            table
        ))
        .bind(id)
        .bind(TENANT)
        .bind(at(secs))
        .bind(doc.to_string())
        .execute(self.pool())
        .await
        .unwrap();
    }

    pub async fn raw(&self, sql: &str) {
        self.exec(sql, &[]).await;
    }
}
