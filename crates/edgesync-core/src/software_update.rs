// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Software update sub-section of the delta.
//!
//! The current update batch of an edge lives outside the tenant inventory
//! store. The edge reports at most one digest for it, keyed by batch ID and
//! stamped with the batch state time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::digest::VersionDigest;
use crate::error::StoreError;
use crate::model::{CategoryDelta, InventoryEntity};

/// Current software update batch of one edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareUpdate {
    /// Update batch ID. Used as the entity ID on the wire.
    pub batch_id: String,
    /// The edge (service domain) being updated.
    pub svc_domain_id: String,
    /// Target release.
    pub release: String,
    /// Batch state, e.g. `DOWNLOADING`, `UPGRADED`.
    pub state: String,
    /// Progress in percent.
    pub progress: i32,
    /// Estimated minutes remaining.
    pub eta: i32,
    /// Failure reason, if the batch failed on this edge.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Time of the last state change. Compared against the edge's digest.
    pub state_updated_at: DateTime<Utc>,
    /// Batch creation time.
    pub created_at: DateTime<Utc>,
    /// Whether this is the newest batch for the edge.
    pub is_latest_batch: bool,
}

impl SoftwareUpdate {
    /// Convert into the wire entity (`id` = batch ID, `updatedAt` = state time).
    pub fn into_entity(self) -> Result<InventoryEntity, StoreError> {
        let id = self.batch_id.clone();
        let updated_at = self.state_updated_at;
        let document = serde_json::to_value(self)?;
        InventoryEntity::from_document(id, updated_at, document)
    }
}

/// Source of current software update batches.
#[async_trait]
pub trait SoftwareUpdateSource: Send + Sync {
    /// Current batch for `edge_id`, or `None` if the edge has none.
    async fn current_update(
        &self,
        tenant_id: &str,
        edge_id: &str,
    ) -> Result<Option<SoftwareUpdate>, StoreError>;
}

/// Source that never reports an update batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSoftwareUpdates;

#[async_trait]
impl SoftwareUpdateSource for NoSoftwareUpdates {
    async fn current_update(
        &self,
        _tenant_id: &str,
        _edge_id: &str,
    ) -> Result<Option<SoftwareUpdate>, StoreError> {
        Ok(None)
    }
}

/// Classify the current batch against the edge's reported digest.
///
/// Only the first reported digest is considered.
pub fn classify_software_update(
    reported: &[VersionDigest],
    current: Option<SoftwareUpdate>,
) -> Result<CategoryDelta, StoreError> {
    let Some(current) = current else {
        return Ok(CategoryDelta::default());
    };

    let mut delta = CategoryDelta::default();
    match reported.first() {
        None => delta.created.push(current.into_entity()?),
        Some(known) if known.id != current.batch_id => {
            delta.deleted.push(known.id.clone());
            delta.created.push(current.into_entity()?);
        }
        Some(known) if current.state_updated_at > known.updated_at => {
            delta.updated.push(current.into_entity()?);
        }
        Some(_) => {}
    }
    Ok(delta)
}

/// Software update delta for one edge.
///
/// Failures are logged and produce an empty sub-section; they never fail the
/// surrounding request.
pub async fn software_update_delta(
    source: &dyn SoftwareUpdateSource,
    tenant_id: &str,
    edge_id: &str,
    reported: &[VersionDigest],
) -> CategoryDelta {
    let current = match source.current_update(tenant_id, edge_id).await {
        Ok(current) => current,
        Err(e) => {
            warn!(
                tenant_id = %tenant_id,
                edge_id = %edge_id,
                error = %e,
                "Failed to fetch current software update, skipping"
            );
            return CategoryDelta::default();
        }
    };

    match classify_software_update(reported, current) {
        Ok(delta) => {
            debug!(
                edge_id = %edge_id,
                deleted = delta.deleted.len(),
                created = delta.created.len(),
                updated = delta.updated.len(),
                "Software update delta computed"
            );
            delta
        }
        Err(e) => {
            warn!(
                tenant_id = %tenant_id,
                edge_id = %edge_id,
                error = %e,
                "Failed to convert software update, skipping"
            );
            CategoryDelta::default()
        }
    }
}
