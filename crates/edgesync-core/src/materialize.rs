// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Batched materializer.
//!
//! Hydrates the created and updated ID lists of a change set with a single
//! store fetch and splits the result back into the two groups.

use std::collections::HashSet;
use std::future::Future;

use crate::model::InventoryEntity;

/// Anything with a stable string ID.
pub trait Identified {
    /// The entity ID.
    fn id(&self) -> &str;
}

impl Identified for InventoryEntity {
    fn id(&self) -> &str {
        &self.id
    }
}

/// Fetch `created_ids` and `updated_ids` with at most one call to `fetch`.
///
/// - both empty: no fetch
/// - one empty: one fetch of the other list
/// - both non-empty: one fetch of the concatenation, split by membership
///   in `created_ids`
///
/// The two ID lists must be disjoint. IDs the store no longer knows are
/// simply absent from the output.
pub async fn materialize_split<T, E, F, Fut>(
    created_ids: Vec<String>,
    updated_ids: Vec<String>,
    fetch: F,
) -> Result<(Vec<T>, Vec<T>), E>
where
    T: Identified,
    F: FnOnce(Vec<String>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, E>>,
{
    match (created_ids.is_empty(), updated_ids.is_empty()) {
        (true, true) => Ok((Vec::new(), Vec::new())),
        (false, true) => Ok((fetch(created_ids).await?, Vec::new())),
        (true, false) => Ok((Vec::new(), fetch(updated_ids).await?)),
        (false, false) => {
            let created_set: HashSet<String> = created_ids.iter().cloned().collect();
            let mut ids = created_ids;
            ids.extend(updated_ids);

            let (created, updated) = fetch(ids)
                .await?
                .into_iter()
                .partition(|entity| created_set.contains(entity.id()));
            Ok((created, updated))
        }
    }
}
