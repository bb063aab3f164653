// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Pass-scoped record store for one hosted zone.
//!
//! A [`ZoneRecordStore`] is built at the start of a reconciliation step and dropped
//! at its end. It lists the zone once, keys the live records by identity, collects
//! changes into a single batch and submits that batch atomically.
//!
//! The cache is dropped after every successful commit. The provider is eventually
//! consistent and a stale listing would produce wrong `CREATE`/`UPSERT` decisions,
//! so the next read always goes back to the provider.

use super::types::{Change, ChangeAction, RecordSet};
use super::Route53Client;
use crate::errors::ProviderError;
use crate::record::{Record, RecordHasher};
use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// A record as listed from the provider, with the exact record set it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiveRecord {
    /// Decoded record
    pub record: Record,
    /// Record set as the provider returned it, used verbatim for `DELETE`
    pub record_set: RecordSet,
}

#[derive(Debug, Default)]
struct Snapshot {
    exists: bool,
    records: BTreeMap<String, LiveRecord>,
    unmodelled: Vec<RecordSet>,
}

/// Record cache and pending change batch for one zone.
#[derive(Debug)]
pub struct ZoneRecordStore {
    client: Route53Client,
    hasher: Arc<RecordHasher>,
    zone_id: String,
    root: String,
    snapshot: Option<Snapshot>,
    pending: Vec<Change>,
}

impl ZoneRecordStore {
    /// Create a store for one zone.
    ///
    /// # Arguments
    ///
    /// * `client` - Provider client
    /// * `hasher` - Record identity hasher
    /// * `zone_id` - Hosted zone id
    /// * `root` - Zone root with trailing dot
    #[must_use]
    pub fn new(
        client: Route53Client,
        hasher: Arc<RecordHasher>,
        zone_id: impl Into<String>,
        root: impl Into<String>,
    ) -> Self {
        Self {
            client,
            hasher,
            zone_id: zone_id.into(),
            root: root.into(),
            snapshot: None,
            pending: Vec::new(),
        }
    }

    /// Hosted zone id.
    #[must_use]
    pub fn zone_id(&self) -> &str {
        &self.zone_id
    }

    /// Zone root with trailing dot.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Identity of a record within this zone.
    #[must_use]
    pub fn record_id(&self, record: &Record) -> String {
        record.id(&self.zone_id, &self.hasher)
    }

    async fn snapshot(&mut self) -> Result<&Snapshot, ProviderError> {
        if self.snapshot.is_none() {
            let listed = self.client.list_all_record_sets(&self.zone_id).await?;
            let mut snapshot = Snapshot {
                exists: listed.is_some(),
                ..Snapshot::default()
            };

            for set in listed.unwrap_or_default() {
                match Record::decode(&set, &self.root) {
                    Ok(record) => {
                        let id = record.id(&self.zone_id, &self.hasher);
                        snapshot.records.insert(
                            id,
                            LiveRecord {
                                record,
                                record_set: set,
                            },
                        );
                    }
                    Err(e) => {
                        debug!(zone = %self.root, error = %e, "Keeping unmodelled record set");
                        snapshot.unmodelled.push(set);
                    }
                }
            }

            debug!(
                zone = %self.root,
                exists = snapshot.exists,
                records = snapshot.records.len(),
                "Loaded zone records"
            );
            self.snapshot = Some(snapshot);
        }

        Ok(self.snapshot.get_or_insert_with(Snapshot::default))
    }

    /// Whether the hosted zone exists at the provider.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the listing fails.
    pub async fn exists(&mut self) -> Result<bool, ProviderError> {
        Ok(self.snapshot().await?.exists)
    }

    /// Live records keyed by identity, fetched once per cache lifetime.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the listing fails.
    pub async fn records(&mut self) -> Result<&BTreeMap<String, LiveRecord>, ProviderError> {
        Ok(&self.snapshot().await?.records)
    }

    /// Queue the change that brings `record` to the provider.
    ///
    /// - `CREATE` if no live record has the same identity
    /// - `DELETE` if one does and `record.deleted` is set, using the live record set
    /// - `UPSERT` otherwise
    ///
    /// Deleting a record that is not live is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the zone cannot be listed or the record cannot be encoded.
    pub async fn add_record_changes(&mut self, record: &Record) -> Result<()> {
        let id = self.record_id(record);
        let live = self.records().await?.get(&id).map(|l| l.record_set.clone());

        let change = match (live, record.deleted) {
            (Some(record_set), true) => Change {
                action: ChangeAction::Delete,
                record_set,
            },
            (None, true) => {
                debug!(zone = %self.root, name = %record.name, "Record already absent, nothing to delete");
                return Ok(());
            }
            (Some(_), false) => Change {
                action: ChangeAction::Upsert,
                record_set: record.encode(&self.root)?,
            },
            (None, false) => Change {
                action: ChangeAction::Create,
                record_set: record.encode(&self.root)?,
            },
        };

        debug!(
            zone = %self.root,
            name = %record.name,
            record_type = %record.record_type,
            action = %change.action,
            "Queued record change"
        );
        self.pending.push(change);
        Ok(())
    }

    /// Queue deletion of every record set except the apex NS and SOA.
    ///
    /// Record sets whose type is not modelled are deleted as listed.
    ///
    /// # Errors
    ///
    /// Returns the provider error if the listing fails.
    pub async fn delete_all_records(&mut self) -> Result<usize, ProviderError> {
        let snapshot = self.snapshot().await?;
        let mut changes: Vec<Change> = snapshot
            .records
            .values()
            .filter(|live| !live.record.is_apex_ns_or_soa())
            .map(|live| Change {
                action: ChangeAction::Delete,
                record_set: live.record_set.clone(),
            })
            .collect();
        changes.extend(snapshot.unmodelled.iter().map(|set| Change {
            action: ChangeAction::Delete,
            record_set: set.clone(),
        }));

        let count = changes.len();
        self.pending.extend(changes);
        Ok(count)
    }

    /// Changes waiting for the next commit.
    #[must_use]
    pub fn pending_changes(&self) -> &[Change] {
        &self.pending
    }

    /// Submit the pending changes as one atomic batch.
    ///
    /// An empty batch makes no provider call. On success the batch is cleared and
    /// the cache dropped.
    ///
    /// # Returns
    ///
    /// `true` if a batch was submitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the batch or retries are exhausted.
    /// The pending changes are kept.
    pub async fn commit(&mut self) -> Result<bool> {
        if self.pending.is_empty() {
            debug!(zone = %self.root, "Nothing to commit");
            return Ok(false);
        }

        if let Err(e) = self
            .client
            .change_record_sets(&self.zone_id, &self.root, &self.pending)
            .await
        {
            warn!(
                zone = %self.root,
                changes = self.pending.len(),
                error = %e,
                "Change batch failed"
            );
            return Err(e).with_context(|| {
                format!(
                    "Failed to commit {} change(s) to zone {}",
                    self.pending.len(),
                    self.root
                )
            });
        }

        self.pending.clear();
        self.snapshot = None;
        Ok(true)
    }
}

#[cfg(test)]
#[path = "zone_store_tests.rs"]
mod zone_store_tests;
