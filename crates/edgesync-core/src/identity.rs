// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Effective edge identity.
//!
//! Edges call with their own identity. Infra admins may impersonate an edge
//! for diagnostics by naming it in a single `edgeId` query parameter.

use crate::error::{DeltaError, Result};

/// Query parameter used by admins to name the impersonated edge.
pub const EDGE_ID_PARAM: &str = "edgeId";

/// Role carried by an already-authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallerRole {
    /// An edge calling on its own behalf.
    Edge {
        /// The calling edge.
        edge_id: String,
    },
    /// Infrastructure administrator.
    InfraAdmin,
    /// Regular tenant user.
    User,
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    /// Tenant of the caller.
    pub tenant_id: String,
    /// Role of the caller.
    pub role: CallerRole,
}

impl CallerIdentity {
    /// Identity of an edge.
    pub fn edge(tenant_id: impl Into<String>, edge_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            role: CallerRole::Edge {
                edge_id: edge_id.into(),
            },
        }
    }

    /// Identity of an infra admin.
    pub fn infra_admin(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            role: CallerRole::InfraAdmin,
        }
    }

    /// Identity of a regular user.
    pub fn user(tenant_id: impl Into<String>) -> Self {
        Self {
            tenant_id: tenant_id.into(),
            role: CallerRole::User,
        }
    }
}

/// Resolve the `(tenant_id, edge_id)` a delta request runs as.
pub fn resolve_effective_edge_identity(
    caller: &CallerIdentity,
    query_params: &[(String, String)],
) -> Result<(String, String)> {
    match &caller.role {
        CallerRole::Edge { edge_id } => {
            if edge_id.trim().is_empty() {
                return Err(DeltaError::bad_request(
                    EDGE_ID_PARAM,
                    "edge identity carries an empty edge ID",
                ));
            }
            Ok((caller.tenant_id.clone(), edge_id.clone()))
        }
        CallerRole::InfraAdmin => {
            let mut values = query_params
                .iter()
                .filter(|(key, _)| key == EDGE_ID_PARAM)
                .map(|(_, value)| value.trim());

            match (values.next(), values.next()) {
                (Some(edge_id), None) if !edge_id.is_empty() => {
                    Ok((caller.tenant_id.clone(), edge_id.to_string()))
                }
                (None, _) => Err(DeltaError::bad_request(
                    EDGE_ID_PARAM,
                    "missing edgeId query parameter",
                )),
                (Some(_), Some(_)) => Err(DeltaError::bad_request(
                    EDGE_ID_PARAM,
                    "exactly one edgeId query parameter required",
                )),
                (Some(_), None) => Err(DeltaError::bad_request(
                    EDGE_ID_PARAM,
                    "edgeId query parameter is empty",
                )),
            }
        }
        CallerRole::User => Err(DeltaError::PermissionDenied {
            reason: "caller is neither an edge nor an infra admin".to_string(),
        }),
    }
}
