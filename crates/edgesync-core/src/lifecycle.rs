// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Lifecycle post-processing of the aggregate response.
//!
//! Edges have no notion of `UNDEPLOY`. An undeployed entity the edge already
//! holds becomes a delete instruction; one it never had is dropped.

use tracing::debug;

use crate::model::{Category, DeltaResponse, EntityState, InventoryEntity};

/// Rewrite `UNDEPLOY` entities of every lifecycle category in place.
///
/// Returns the number of entities moved from `Updated` to `Deleted`.
pub fn reclassify_undeployed(response: &mut DeltaResponse) -> usize {
    let mut moved = 0;
    for category in Category::ALL.into_iter().filter(|c| c.has_lifecycle_state()) {
        if let Some(created) = response.created.get_mut(&category) {
            let before = created.len();
            created.retain(is_deployed);
            let dropped = before - created.len();
            if dropped > 0 {
                debug!(category = %category, dropped, "Dropped undeployed entities from created");
            }
        }

        let mut to_delete = Vec::new();
        if let Some(updated) = response.updated.get_mut(&category) {
            updated.retain(|entity| {
                if is_deployed(entity) {
                    true
                } else {
                    to_delete.push(entity.id.clone());
                    false
                }
            });
        }

        if !to_delete.is_empty() {
            let deleted = response.deleted.entry(category).or_default();
            for id in to_delete {
                if !deleted.contains(&id) {
                    deleted.push(id);
                    moved += 1;
                }
            }
        }
    }
    moved
}

fn is_deployed(entity: &InventoryEntity) -> bool {
    entity.lifecycle_state() != EntityState::Undeploy
}
