// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Label-selector scope resolution.
//!
//! Category-scoped projects and applications carry selectors of the form
//! `(category_id, value)`. An entity applies to an edge when any one of its
//! selectors is among the edge's labels. Entities without selectors are
//! governed by the `include_unscoped` policy flag of the caller.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::digest::VersionDigest;

/// One `(category, value)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryLabel {
    /// Category (label key) ID.
    pub category_id: String,
    /// Label value.
    pub value: String,
}

impl CategoryLabel {
    /// Create a label.
    pub fn new(category_id: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            category_id: category_id.into(),
            value: value.into(),
        }
    }
}

/// A selector row: entity `entity_id` is scoped to one label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySelector {
    /// Project or application ID.
    pub entity_id: String,
    /// Category ID.
    pub category_id: String,
    /// Label value.
    pub value: String,
}

impl CategorySelector {
    /// Create a selector row.
    pub fn new(
        entity_id: impl Into<String>,
        category_id: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            entity_id: entity_id.into(),
            category_id: category_id.into(),
            value: value.into(),
        }
    }
}

/// All selectors of one entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySelectorSet {
    /// Project or application ID.
    pub entity_id: String,
    /// Labels the entity is scoped to.
    pub labels: Vec<CategoryLabel>,
}

impl EntitySelectorSet {
    /// Group flat selector rows by entity, preserving first-seen order.
    pub fn group(selectors: Vec<CategorySelector>) -> Vec<EntitySelectorSet> {
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut sets: Vec<EntitySelectorSet> = Vec::new();
        for selector in selectors {
            let label = CategoryLabel::new(selector.category_id, selector.value);
            match index.get(&selector.entity_id) {
                Some(&i) => sets[i].labels.push(label),
                None => {
                    index.insert(selector.entity_id.clone(), sets.len());
                    sets.push(EntitySelectorSet {
                        entity_id: selector.entity_id,
                        labels: vec![label],
                    });
                }
            }
        }
        sets
    }
}

/// Labels currently assigned to one edge.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EdgeLabelSet {
    labels: HashSet<CategoryLabel>,
}

impl EdgeLabelSet {
    /// Whether the edge carries `label`.
    pub fn contains(&self, label: &CategoryLabel) -> bool {
        self.labels.contains(label)
    }

    /// Number of distinct labels.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the edge has no labels at all.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl FromIterator<CategoryLabel> for EdgeLabelSet {
    fn from_iter<I: IntoIterator<Item = CategoryLabel>>(iter: I) -> Self {
        Self {
            labels: iter.into_iter().collect(),
        }
    }
}

/// Filter `all_entities` down to those applicable to an edge with `edge_labels`.
///
/// - Entity without selectors: kept iff `include_unscoped`.
/// - Entity with selectors: kept iff any selector is in `edge_labels`.
///
/// Input order is preserved.
pub fn resolve_applicable(
    all_entities: &[VersionDigest],
    selector_sets: &[EntitySelectorSet],
    edge_labels: &EdgeLabelSet,
    include_unscoped: bool,
) -> Vec<VersionDigest> {
    let mut labels_by_entity: HashMap<&str, Vec<&CategoryLabel>> = HashMap::new();
    for set in selector_sets {
        labels_by_entity
            .entry(set.entity_id.as_str())
            .or_default()
            .extend(set.labels.iter());
    }

    all_entities
        .iter()
        .filter(|entity| match labels_by_entity.get(entity.id.as_str()) {
            Some(labels) if !labels.is_empty() => {
                labels.iter().any(|label| edge_labels.contains(label))
            }
            _ => include_unscoped,
        })
        .cloned()
        .collect()
}
