// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Policy tree reconciliation.
//!
//! Brings the live records of one policy namespace in line with the desired tree:
//!
//! 1. Live records missing from the desired tree are deleted, in their own batch
//! 2. Desired records missing from the zone are created, and records whose live set
//!    does not already satisfy the desired encoding are upserted, in a second batch
//!
//! Removals go first because the provider refuses to mix routing kinds under one
//! name, which happens whenever a tree switches between flat and latency shape.

use super::policy_tree::in_policy_namespace;
use crate::record::wire::record_set_satisfies;
use crate::record::Record;
use crate::route53::zone_store::LiveRecord;
use crate::route53::ZoneRecordStore;
use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Change counts of one tree reconciliation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeChanges {
    /// Live records deleted
    pub removed: usize,
    /// Records created
    pub created: usize,
    /// Records upserted because the live set differed
    pub updated: usize,
}

impl TreeChanges {
    /// Whether anything was sent to the provider.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.removed == 0 && self.created == 0 && self.updated == 0
    }
}

/// Reconcile the namespace `namespace` of a zone against `desired`.
///
/// An empty `desired` removes the whole namespace.
///
/// # Arguments
///
/// * `store` - Record store of the zone
/// * `namespace` - Policy namespace (e.g., `_zn_pol1`)
/// * `desired` - Desired records, all inside `namespace`
///
/// # Errors
///
/// Returns an error if the zone cannot be listed or either batch is rejected.
pub async fn reconcile_policy_tree(
    store: &mut ZoneRecordStore,
    namespace: &str,
    desired: &[Record],
) -> Result<TreeChanges> {
    let mut changes = TreeChanges::default();

    let desired: BTreeMap<String, &Record> = desired
        .iter()
        .map(|record| (store.record_id(record), record))
        .collect();

    let live: BTreeMap<String, LiveRecord> = store
        .records()
        .await?
        .iter()
        .filter(|(_, live)| in_policy_namespace(&live.record.name, namespace))
        .map(|(id, live)| (id.clone(), live.clone()))
        .collect();

    for (id, stale) in &live {
        if !desired.contains_key(id) {
            store
                .add_record_changes(&stale.record.clone().marked_deleted())
                .await?;
            changes.removed += 1;
        }
    }
    store
        .commit()
        .await
        .with_context(|| format!("Failed to remove stale records of {namespace}"))?;

    for (id, record) in &desired {
        match live.get(id) {
            None => {
                store.add_record_changes(record).await?;
                changes.created += 1;
            }
            Some(existing) => {
                let encoded = record.encode(store.root())?;
                if record_set_satisfies(&encoded, &existing.record_set) {
                    debug!(namespace, name = %record.name, "Record already up to date");
                } else {
                    store.add_record_changes(record).await?;
                    changes.updated += 1;
                }
            }
        }
    }
    store
        .commit()
        .await
        .with_context(|| format!("Failed to write records of {namespace}"))?;

    if changes.is_empty() {
        debug!(zone = %store.root(), namespace, "Policy tree already in sync");
    } else {
        info!(
            zone = %store.root(),
            namespace,
            removed = changes.removed,
            created = changes.created,
            updated = changes.updated,
            "Reconciled policy tree"
        );
    }
    Ok(changes)
}

#[cfg(test)]
#[path = "policy_tests.rs"]
mod policy_tests;
