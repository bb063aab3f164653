// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared context for all reconcilers.
//!
//! Every pass receives an `Arc<Context>` holding:
//! - the retrying Route53 client
//! - the persisted-state store
//! - the lease store
//! - settings and the record identity hasher
//! - per-zone locks and the NS lookup
//!
//! Nothing in here is global. Tests build a context over the in-memory provider,
//! state store and lease store.

use crate::config::Settings;
use crate::lease::LeaseStore;
use crate::ns_propagation::{NameServerLookup, ResolverLookup};
use crate::record::RecordHasher;
use crate::route53::{Route53Client, ZoneRecordStore};
use crate::state::{StateStore, ZoneId};
use anyhow::Result;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

/// Shared context passed to all reconcilers.
#[derive(Clone)]
pub struct Context {
    /// Route53 client with retries and metrics
    pub client: Route53Client,

    /// Persisted zones, policies, members, policy records and IPs
    pub state: Arc<dyn StateStore>,

    /// Leases guarding the policy-record pass
    pub leases: Arc<dyn LeaseStore>,

    /// Runtime settings
    pub settings: Arc<Settings>,

    /// Record identity hasher salted with the deployment secret
    pub hasher: Arc<RecordHasher>,

    /// Serializes work on a single zone
    pub zone_locks: ZoneLocks,

    /// NS delegation lookups for the propagation check
    pub ns_lookup: Arc<dyn NameServerLookup>,
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("client", &self.client)
            .field("policy_prefix", &self.settings.policy_prefix)
            .finish_non_exhaustive()
    }
}

impl Context {
    /// Build a context.
    ///
    /// # Errors
    ///
    /// Returns an error if the identity hasher cannot be built from the settings.
    pub fn new(
        client: Route53Client,
        state: Arc<dyn StateStore>,
        leases: Arc<dyn LeaseStore>,
        settings: Settings,
    ) -> Result<Self> {
        let hasher = RecordHasher::new(&settings.secret, settings.hash_min_length)?;
        let ns_lookup = Arc::new(ResolverLookup::new(settings.ns_resolver));
        Ok(Self {
            client,
            state,
            leases,
            settings: Arc::new(settings),
            hasher: Arc::new(hasher),
            zone_locks: ZoneLocks::default(),
            ns_lookup,
        })
    }

    /// Replace the NS lookup used by the propagation check.
    #[must_use]
    pub fn with_ns_lookup(mut self, ns_lookup: Arc<dyn NameServerLookup>) -> Self {
        self.ns_lookup = ns_lookup;
        self
    }

    /// Pass-scoped record store for one hosted zone.
    #[must_use]
    pub fn zone_store(&self, route53_id: &str, root: &str) -> ZoneRecordStore {
        ZoneRecordStore::new(
            self.client.clone(),
            Arc::clone(&self.hasher),
            route53_id,
            root,
        )
    }
}

/// One async mutex per zone.
///
/// The zone pass and the policy-record pass both mutate a zone's records; holding
/// the zone's lock keeps their change batches from interleaving.
#[derive(Debug, Clone, Default)]
pub struct ZoneLocks {
    locks: Arc<Mutex<HashMap<ZoneId, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ZoneLocks {
    /// Wait for and take the lock of `zone_id`.
    pub async fn lock(&self, zone_id: ZoneId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            Arc::clone(locks.entry(zone_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the lock entry of a zone that no longer exists.
    pub fn forget(&self, zone_id: ZoneId) {
        self.locks
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&zone_id);
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod context_tests;
