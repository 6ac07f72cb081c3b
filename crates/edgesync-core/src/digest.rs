// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Version digests and the change-set computer.
//!
//! A digest is the pair `(id, updatedAt)`. Comparing the edge's reported
//! digests against the authoritative ones classifies every entity as
//! created, updated, deleted or unchanged without moving entity bodies.
//!
//! `updatedAt` equality is exact. Two writes that land on the same
//! timestamp are indistinguishable here, so a store with coarse clock
//! resolution can hide the second write until the entity changes again.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// "I have entity `id` as of `updated_at`."
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionDigest {
    /// Opaque entity ID.
    pub id: String,
    /// Last-modified marker.
    pub updated_at: DateTime<Utc>,
}

impl VersionDigest {
    /// Create a digest.
    pub fn new(id: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            updated_at,
        }
    }
}

/// Deleted/created/updated classification for one category.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    /// Reported IDs no longer in the authoritative set.
    pub deleted: Vec<String>,
    /// Authoritative digests the edge does not hold.
    pub created: Vec<VersionDigest>,
    /// Authoritative digests whose `updated_at` differs from the edge's.
    pub updated: Vec<VersionDigest>,
}

impl ChangeSet {
    /// IDs of the created digests.
    pub fn created_ids(&self) -> Vec<String> {
        self.created.iter().map(|d| d.id.clone()).collect()
    }

    /// IDs of the updated digests.
    pub fn updated_ids(&self) -> Vec<String> {
        self.updated.iter().map(|d| d.id.clone()).collect()
    }

    /// True when the edge is already in sync for this category.
    pub fn is_empty(&self) -> bool {
        self.deleted.is_empty() && self.created.is_empty() && self.updated.is_empty()
    }
}

/// Compare an edge's reported digests against the authoritative set.
///
/// Duplicate IDs on either side are collapsed (first occurrence wins) so
/// the three output lists stay pairwise disjoint.
pub fn compute_change_set(
    reported: &[VersionDigest],
    authoritative: &[VersionDigest],
) -> ChangeSet {
    let mut reported_by_id: HashMap<&str, &DateTime<Utc>> = HashMap::with_capacity(reported.len());
    for digest in reported {
        reported_by_id
            .entry(digest.id.as_str())
            .or_insert(&digest.updated_at);
    }

    let mut change_set = ChangeSet::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(authoritative.len());

    for digest in authoritative {
        if !seen.insert(digest.id.as_str()) {
            continue;
        }
        match reported_by_id.get(digest.id.as_str()) {
            None => change_set.created.push(digest.clone()),
            Some(updated_at) if **updated_at != digest.updated_at => {
                change_set.updated.push(digest.clone())
            }
            Some(_) => {}
        }
    }

    let mut deleted: HashSet<&str> = HashSet::new();
    for digest in reported {
        let id = digest.id.as_str();
        if !seen.contains(id) && deleted.insert(id) {
            change_set.deleted.push(digest.id.clone());
        }
    }

    change_set
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn d(id: &str, secs: i64) -> VersionDigest {
        VersionDigest::new(id, ts(secs))
    }

    #[test]
    fn test_identical_lists_yield_no_changes() {
        let list = vec![d("p1", 10), d("p2", 20), d("p3", 30)];
        let change_set = compute_change_set(&list, &list);
        assert!(change_set.is_empty());
    }

    #[test]
    fn test_new_authoritative_entity_is_created() {
        let reported = vec![d("p1", 0)];
        let authoritative = vec![d("p1", 0), d("p2", 1)];

        let change_set = compute_change_set(&reported, &authoritative);

        assert!(change_set.deleted.is_empty());
        assert_eq!(change_set.created_ids(), vec!["p2"]);
        assert!(change_set.updated.is_empty());
    }

    #[test]
    fn test_changed_timestamp_is_updated() {
        let reported = vec![d("p1", 0)];
        let authoritative = vec![d("p1", 1)];

        let change_set = compute_change_set(&reported, &authoritative);

        assert_eq!(change_set.updated_ids(), vec!["p1"]);
        assert!(change_set.created.is_empty());
        assert!(change_set.deleted.is_empty());
    }

    #[test]
    fn test_older_authoritative_timestamp_is_still_updated() {
        let change_set = compute_change_set(&[d("p1", 50)], &[d("p1", 40)]);
        assert_eq!(change_set.updated_ids(), vec!["p1"]);
    }

    #[test]
    fn test_subsecond_drift_is_a_change() {
        let base = ts(100);
        let drifted = base + chrono::Duration::microseconds(1);
        let change_set = compute_change_set(
            &[VersionDigest::new("p1", base)],
            &[VersionDigest::new("p1", drifted)],
        );
        assert_eq!(change_set.updated_ids(), vec!["p1"]);
    }

    #[test]
    fn test_missing_authoritative_entity_is_deleted() {
        let change_set = compute_change_set(&[d("p1", 0)], &[]);
        assert_eq!(change_set.deleted, vec!["p1"]);
        assert!(change_set.created.is_empty());
        assert!(change_set.updated.is_empty());
    }

    #[test]
    fn test_empty_report_creates_everything() {
        let authoritative = vec![d("a", 1), d("b", 2)];
        let change_set = compute_change_set(&[], &authoritative);
        assert_eq!(change_set.created, authoritative);
    }

    #[test]
    fn test_duplicates_do_not_break_disjointness() {
        let reported = vec![d("x", 1), d("x", 1), d("gone", 1), d("gone", 2)];
        let authoritative = vec![d("x", 2), d("x", 2), d("new", 1), d("new", 1)];

        let change_set = compute_change_set(&reported, &authoritative);

        assert_eq!(change_set.updated_ids(), vec!["x"]);
        assert_eq!(change_set.created_ids(), vec!["new"]);
        assert_eq!(change_set.deleted, vec!["gone"]);
    }

    #[test]
    fn test_partition_is_disjoint_and_complete() {
        let reported = vec![d("a", 1), d("b", 1), d("c", 1), d("d", 1)];
        let authoritative = vec![d("a", 1), d("b", 2), d("e", 1), d("f", 3)];

        let change_set = compute_change_set(&reported, &authoritative);

        let mut all: Vec<String> = change_set.deleted.clone();
        all.extend(change_set.created_ids());
        all.extend(change_set.updated_ids());
        let unique: HashSet<&String> = all.iter().collect();
        assert_eq!(unique.len(), all.len());

        // every authoritative digest that differs shows up exactly once
        for digest in &authoritative {
            let in_reported = reported.contains(digest);
            assert_eq!(all.contains(&digest.id), !in_reported, "{}", digest.id);
        }
        let mut deleted = change_set.deleted.clone();
        deleted.sort();
        assert_eq!(deleted, vec!["c", "d"]);
    }

    #[test]
    fn test_digest_wire_format() {
        let json = serde_json::to_value(d("p1", 0)).unwrap();
        assert_eq!(json, serde_json::json!({"id": "p1", "updatedAt": "1970-01-01T00:00:00Z"}));
    }
}
