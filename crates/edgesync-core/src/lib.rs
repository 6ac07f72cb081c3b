// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! edgesync Core - Edge Inventory Delta Engine
//!
//! Edges periodically report a digest (`id`, `updatedAt`) of every entity they
//! hold. This crate compares that report against the authoritative store and
//! returns the minimal set of instructions that brings the edge up to date:
//! IDs to delete, full documents to create, full documents to update.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                Edge (or infra admin impersonating one)                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │ reported digests
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  handlers   identity resolution, body decoding, error mapping           │
//! └─────────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  engine     projects → scoped categories → applications → ...           │
//! │             digest diff · selector resolution · batched hydration       │
//! │             lifecycle post-processing                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//!           │                                              │
//!           ▼                                              ▼
//! ┌───────────────────────┐                    ┌─────────────────────────────┐
//! │   InventoryStore      │                    │   SoftwareUpdateSource      │
//! │   (SQLite via sqlx)   │                    │   (best effort)             │
//! └───────────────────────┘                    └─────────────────────────────┘
//! ```
//!
//! # Per-Category Assembly
//!
//! Every category goes through the same steps:
//!
//! 1. Fetch the authoritative digests, pre-filtered by the category's scope
//!    (tenant-global, edge, project set, or project set plus selectors).
//! 2. Diff them against the edge's digests ([`digest::compute_change_set`]).
//! 3. Hydrate created and updated IDs with one store round trip
//!    ([`materialize::materialize_split`]).
//!
//! Any store failure aborts the whole request. A partial delta is never
//! returned.
//!
//! # Lifecycle Post-Processing
//!
//! Applications and data pipelines in `UNDEPLOY` state are removed from the
//! response. If the edge already held them they are listed under `Deleted`.
//!
//! # Configuration
//!
//! Configuration is loaded from environment variables:
//!
//! | Variable | Required | Default | Description |
//! |----------|----------|---------|-------------|
//! | `EDGESYNC_DATABASE_URL` | Yes | - | SQLite URL or file path |
//! | `EDGESYNC_MAX_DB_CONNECTIONS` | No | `5` | Connection pool size |
//! | `EDGESYNC_SEND_CATEGORIES_DELTA` | No | `false` | Include tenant categories |
//!
//! # Modules
//!
//! - [`config`]: Configuration from environment variables
//! - [`digest`]: Version digests and the change-set computer
//! - [`engine`]: Per-category assemblers and the delta orchestrator
//! - [`error`]: Error types with stable error codes
//! - [`handlers`]: Request entry points
//! - [`identity`]: Effective edge identity
//! - [`lifecycle`]: `UNDEPLOY` reclassification
//! - [`materialize`]: Batched created/updated hydration
//! - [`migrations`]: Embedded SQLite schema
//! - [`model`]: Categories, entities, request and response envelopes
//! - [`persistence`]: Store trait, query table, SQLite backend
//! - [`selector`]: Label-selector scope resolution
//! - [`software_update`]: Software update sub-section

#![deny(missing_docs)]

/// Configuration loaded from environment variables.
pub mod config;

/// Version digests and change-set computation.
pub mod digest;

/// Delta orchestration across all categories.
pub mod engine;

/// Error types with stable error codes.
pub mod error;

/// Request handlers (inventory delta, health).
pub mod handlers;

/// Effective edge identity resolution.
pub mod identity;

/// Lifecycle post-processing of the aggregate response.
pub mod lifecycle;

/// Batched hydration of created and updated IDs.
pub mod materialize;

/// Embedded database migrations.
pub mod migrations;

/// Inventory categories and wire envelopes.
pub mod model;

/// Store abstraction and the SQLite backend.
pub mod persistence;

/// Label-selector scope resolution.
pub mod selector;

/// Software update sub-section.
pub mod software_update;

pub use engine::{DeltaOptions, InventoryDeltaEngine};
pub use error::{DeltaError, Result, StoreError};
pub use identity::{CallerIdentity, CallerRole};
pub use model::{Category, DeltaResponse, InventoryEntity, ReportedInventory};
