// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Inventory categories, entity documents and the request/response envelopes.
//!
//! The wire format is fixed by deployed edges: category keys are PascalCase
//! (`Projects`, `MLModels`, `SvcBindings`, ...) and the response is split into
//! `Deleted`, `Created` and `Updated` sections.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::digest::VersionDigest;
use crate::error::StoreError;

/// Entity category tracked in an edge inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Projects (explicit and category based).
    Projects,
    /// Applications (explicit and category based).
    Applications,
    /// Project services.
    ProjectServices,
    /// Data pipelines (data streams).
    DataPipelines,
    /// Scripts.
    Functions,
    /// Script runtimes.
    RuntimeEnvironments,
    /// Machine learning models.
    #[serde(rename = "MLModels")]
    MlModels,
    /// Cloud credentials.
    CloudProfiles,
    /// Container registry profiles.
    ContainerRegistries,
    /// Tenant categories (labels).
    Categories,
    /// Data sources attached to the edge.
    DataSources,
    /// Log collectors.
    LogCollectors,
    /// Software update batch for the edge.
    SoftwareUpdates,
    /// Service instances.
    SvcInstances,
    /// Service bindings.
    SvcBindings,
    /// Data driver instances.
    DataDriverInstances,
}

impl Category {
    /// Every category, in wire declaration order.
    pub const ALL: [Category; 16] = [
        Category::Projects,
        Category::Applications,
        Category::ProjectServices,
        Category::DataPipelines,
        Category::Functions,
        Category::RuntimeEnvironments,
        Category::MlModels,
        Category::CloudProfiles,
        Category::ContainerRegistries,
        Category::Categories,
        Category::DataSources,
        Category::LogCollectors,
        Category::SoftwareUpdates,
        Category::SvcInstances,
        Category::SvcBindings,
        Category::DataDriverInstances,
    ];

    /// Key used for this category in request and response bodies.
    pub fn wire_name(self) -> &'static str {
        match self {
            Category::Projects => "Projects",
            Category::Applications => "Applications",
            Category::ProjectServices => "ProjectServices",
            Category::DataPipelines => "DataPipelines",
            Category::Functions => "Functions",
            Category::RuntimeEnvironments => "RuntimeEnvironments",
            Category::MlModels => "MLModels",
            Category::CloudProfiles => "CloudProfiles",
            Category::ContainerRegistries => "ContainerRegistries",
            Category::Categories => "Categories",
            Category::DataSources => "DataSources",
            Category::LogCollectors => "LogCollectors",
            Category::SoftwareUpdates => "SoftwareUpdates",
            Category::SvcInstances => "SvcInstances",
            Category::SvcBindings => "SvcBindings",
            Category::DataDriverInstances => "DataDriverInstances",
        }
    }

    /// Parse a wire key. Returns `None` for keys this engine does not track.
    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.wire_name() == name)
    }

    /// Whether entities of this category carry a deploy lifecycle state.
    pub fn has_lifecycle_state(self) -> bool {
        matches!(self, Category::Applications | Category::DataPipelines)
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Deploy lifecycle state of applications and data pipelines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntityState {
    /// Active on the edge.
    #[default]
    Deploy,
    /// Removal from the edge requested; record kept in the store.
    Undeploy,
}

impl std::fmt::Display for EntityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityState::Deploy => write!(f, "DEPLOY"),
            EntityState::Undeploy => write!(f, "UNDEPLOY"),
        }
    }
}

impl std::str::FromStr for EntityState {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "DEPLOY" => Ok(EntityState::Deploy),
            "UNDEPLOY" => Ok(EntityState::Undeploy),
            _ => Err(format!("Unknown entity state: {}", s)),
        }
    }
}

/// Full entity document sent to the edge in `Created` / `Updated`.
///
/// `id` and `updatedAt` are typed; every other field of the stored document
/// is carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryEntity {
    /// Entity ID.
    pub id: String,
    /// Last-modified marker, compared exactly against the edge's digest.
    pub updated_at: DateTime<Utc>,
    /// Remaining category-specific fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InventoryEntity {
    /// Build an entity from its stored JSON document.
    ///
    /// The document must be a JSON object. Any `id` / `updatedAt` keys inside
    /// it are dropped in favour of the row's own columns.
    pub fn from_document(
        id: impl Into<String>,
        updated_at: DateTime<Utc>,
        document: Value,
    ) -> Result<Self, StoreError> {
        let id = id.into();
        let mut fields = match document {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                return Err(StoreError::Decode {
                    operation: "entity_document".to_string(),
                    details: format!("entity '{}' document is not an object: {}", id, other),
                });
            }
        };
        fields.remove("id");
        fields.remove("updatedAt");
        Ok(Self {
            id,
            updated_at,
            fields,
        })
    }

    /// Lifecycle state read from the document's `state` field.
    ///
    /// Missing or unrecognised values count as [`EntityState::Deploy`].
    pub fn lifecycle_state(&self) -> EntityState {
        self.fields
            .get("state")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Digest of this entity.
    pub fn digest(&self) -> VersionDigest {
        VersionDigest::new(self.id.clone(), self.updated_at)
    }
}

/// Inventory snapshot reported by an edge: per category, the digests it holds.
///
/// Unknown category keys and `null` lists are accepted and ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Option<Vec<VersionDigest>>>")]
pub struct ReportedInventory {
    #[serde(flatten)]
    digests: BTreeMap<Category, Vec<VersionDigest>>,
}

impl From<BTreeMap<String, Option<Vec<VersionDigest>>>> for ReportedInventory {
    fn from(raw: BTreeMap<String, Option<Vec<VersionDigest>>>) -> Self {
        let digests = raw
            .into_iter()
            .filter_map(|(key, list)| {
                Category::from_wire_name(&key).map(|c| (c, list.unwrap_or_default()))
            })
            .collect();
        Self { digests }
    }
}

impl ReportedInventory {
    /// Empty inventory (a freshly provisioned edge).
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter for one category.
    pub fn with(mut self, category: Category, digests: Vec<VersionDigest>) -> Self {
        self.digests.insert(category, digests);
        self
    }

    /// Digests reported for a category (empty if the edge sent none).
    pub fn get(&self, category: Category) -> &[VersionDigest] {
        self.digests
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Created/updated/deleted result for one category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CategoryDelta {
    /// IDs the edge must delete.
    pub deleted: Vec<String>,
    /// Entities the edge does not have yet.
    pub created: Vec<InventoryEntity>,
    /// Entities whose digest differs from the edge's.
    pub updated: Vec<InventoryEntity>,
}

/// Aggregate delta returned to the edge.
///
/// Every category key is present in every section, so edges never have to
/// distinguish a missing key from an empty list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeltaResponse {
    /// IDs to delete, per category.
    #[serde(rename = "Deleted")]
    pub deleted: BTreeMap<Category, Vec<String>>,
    /// Entities to create, per category.
    #[serde(rename = "Created")]
    pub created: BTreeMap<Category, Vec<InventoryEntity>>,
    /// Entities to update, per category.
    #[serde(rename = "Updated")]
    pub updated: BTreeMap<Category, Vec<InventoryEntity>>,
}

impl Default for DeltaResponse {
    fn default() -> Self {
        Self::new()
    }
}

impl DeltaResponse {
    /// Response with an empty list under every category.
    pub fn new() -> Self {
        Self {
            deleted: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            created: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
            updated: Category::ALL.iter().map(|c| (*c, Vec::new())).collect(),
        }
    }

    /// Store the result of one category, replacing any previous value.
    pub fn insert(&mut self, category: Category, delta: CategoryDelta) {
        self.deleted.insert(category, delta.deleted);
        self.created.insert(category, delta.created);
        self.updated.insert(category, delta.updated);
    }

    /// Deleted IDs for a category.
    pub fn deleted(&self, category: Category) -> &[String] {
        self.deleted
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Created entities for a category.
    pub fn created(&self, category: Category) -> &[InventoryEntity] {
        self.created
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Updated entities for a category.
    pub fn updated(&self, category: Category) -> &[InventoryEntity] {
        self.updated
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of instructions across all categories.
    pub fn change_count(&self) -> usize {
        self.deleted.values().map(Vec::len).sum::<usize>()
            + self.created.values().map(Vec::len).sum::<usize>()
            + self.updated.values().map(Vec::len).sum::<usize>()
    }

    /// Whether the edge is already in sync.
    pub fn is_empty(&self) -> bool {
        self.change_count() == 0
    }
}
