// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Request handlers for edgesync-core.
//!
//! Transport-agnostic entry points: the caller identity is already
//! authenticated, query parameters are passed as decoded pairs and the body
//! as raw JSON bytes.

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

use crate::engine::InventoryDeltaEngine;
use crate::error::{DeltaError, Result};
use crate::identity::{CallerIdentity, resolve_effective_edge_identity};
use crate::model::{DeltaResponse, ReportedInventory};

/// Shared state for delta handlers.
pub struct DeltaHandlerState {
    /// Delta engine.
    pub engine: Arc<InventoryDeltaEngine>,
    /// When the service started (for uptime calculation).
    pub start_time: Instant,
    /// Service version string.
    pub version: String,
}

impl DeltaHandlerState {
    /// Create handler state around an engine.
    pub fn new(engine: Arc<InventoryDeltaEngine>) -> Self {
        Self {
            engine,
            start_time: Instant::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Get the service uptime in milliseconds.
    pub fn uptime_ms(&self) -> i64 {
        self.start_time.elapsed().as_millis() as i64
    }
}

/// Error body returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Stable error code (`BAD_REQUEST`, `PERMISSION_DENIED`, `INTERNAL`).
    pub code: String,
    /// Caller-safe message.
    pub message: String,
}

impl From<&DeltaError> for ErrorResponse {
    fn from(err: &DeltaError) -> Self {
        Self {
            code: err.error_code().to_string(),
            message: err.client_message(),
        }
    }
}

/// Health report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// Whether the store answered.
    pub healthy: bool,
    /// Service version.
    pub version: String,
    /// Uptime in milliseconds.
    pub uptime_ms: i64,
}

// ============================================================================
// Inventory Delta
// ============================================================================

/// Handle an inventory delta request.
///
/// Resolves the effective edge (edges call as themselves; infra admins name
/// an edge with `edgeId`), decodes the reported inventory and computes the
/// delta.
///
/// # Errors
///
/// - `BadRequest` for a missing or ambiguous `edgeId`, or a malformed body
/// - `PermissionDenied` for callers that are neither edge nor infra admin
/// - `Store` / `Internal` when the delta cannot be computed; logged here in
///   full, reported to the caller without details
#[instrument(skip(state, caller, query_params, body), fields(tenant_id = %caller.tenant_id))]
pub async fn handle_inventory_delta(
    state: &DeltaHandlerState,
    caller: &CallerIdentity,
    query_params: &[(String, String)],
    body: &[u8],
) -> Result<DeltaResponse> {
    let (tenant_id, edge_id) = match resolve_effective_edge_identity(caller, query_params) {
        Ok(identity) => identity,
        Err(e) => {
            warn!(code = e.error_code(), error = %e, "Rejected inventory delta request");
            return Err(e);
        }
    };

    let reported: ReportedInventory = serde_json::from_slice(body).map_err(|e| {
        warn!(edge_id = %edge_id, error = %e, "Malformed inventory delta body");
        DeltaError::bad_request("body", format!("malformed body: {}", e))
    })?;

    debug!(edge_id = %edge_id, bytes = body.len(), "Inventory delta requested");

    match state.engine.compute_delta(&tenant_id, &edge_id, &reported).await {
        Ok(response) => {
            info!(
                edge_id = %edge_id,
                changes = response.change_count(),
                "Inventory delta served"
            );
            Ok(response)
        }
        Err(e) => {
            if e.is_internal() {
                error!(edge_id = %edge_id, error = %e, "Inventory delta failed");
            }
            Err(e)
        }
    }
}

// ============================================================================
// Health Check
// ============================================================================

/// Handle a health check.
#[instrument(skip(state))]
pub async fn handle_health_check(state: &DeltaHandlerState) -> HealthReport {
    let healthy = state.engine.store().health_check().await.unwrap_or(false);
    HealthReport {
        healthy,
        version: state.version.clone(),
        uptime_ms: state.uptime_ms(),
    }
}
