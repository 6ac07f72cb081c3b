// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Error types for edgesync-core.
//!
//! Two layers: [`StoreError`] for failures of the backing store, and
//! [`DeltaError`] for failures of a whole inventory delta request. Store
//! errors are wrapped with the category, tenant and edge that were being
//! processed, but never surface verbatim to the caller.

use thiserror::Error;

use crate::model::Category;

/// Result type using DeltaError
pub type Result<T> = std::result::Result<T, DeltaError>;

/// Errors raised by an [`InventoryStore`](crate::persistence::InventoryStore)
/// or a [`SoftwareUpdateSource`](crate::software_update::SoftwareUpdateSource).
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// Database operation failed.
    #[error("Database error during '{operation}': {details}")]
    Database {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },

    /// A stored row or document could not be converted.
    #[error("Decode error during '{operation}': {details}")]
    Decode {
        /// The operation that failed.
        operation: String,
        /// Error details.
        details: String,
    },
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database {
            operation: "query".to_string(),
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Decode {
            operation: "json".to_string(),
            details: err.to_string(),
        }
    }
}

/// Errors that abort an inventory delta request.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DeltaError {
    /// Missing or ambiguous edge identity, or a malformed request body.
    #[error("Bad request for '{field}': {message}")]
    BadRequest {
        /// The offending field or parameter.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// The caller is neither an edge nor an infra admin.
    #[error("Permission denied: {reason}")]
    PermissionDenied {
        /// Why the caller was rejected.
        reason: String,
    },

    /// A store query failed while assembling one category.
    #[error("Store failure for {category} (tenant '{tenant_id}', edge '{edge_id}'): {source}")]
    Store {
        /// The category being assembled.
        category: Category,
        /// Tenant of the request.
        tenant_id: String,
        /// Edge of the request.
        edge_id: String,
        /// Underlying store error.
        #[source]
        source: StoreError,
    },

    /// Any other internal failure (conversion, encoding).
    #[error("Internal error: {message}")]
    Internal {
        /// Error details.
        message: String,
    },
}

impl DeltaError {
    /// Shorthand for [`DeltaError::BadRequest`].
    pub fn bad_request(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::BadRequest {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Get the error code string for this error type.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => "BAD_REQUEST",
            Self::PermissionDenied { .. } => "PERMISSION_DENIED",
            Self::Store { .. } | Self::Internal { .. } => "INTERNAL",
        }
    }

    /// Message safe to return to the caller.
    ///
    /// Internal failures collapse to a generic message; the full error is
    /// only meant for logs.
    pub fn client_message(&self) -> String {
        match self {
            Self::BadRequest { .. } | Self::PermissionDenied { .. } => self.to_string(),
            Self::Store { .. } | Self::Internal { .. } => {
                "Internal error while computing inventory delta".to_string()
            }
        }
    }

    /// Whether this error is an internal failure rather than a caller mistake.
    pub fn is_internal(&self) -> bool {
        matches!(self, Self::Store { .. } | Self::Internal { .. })
    }
}
