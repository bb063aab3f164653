// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Cooperative leases.
//!
//! The policy-record pass must not run twice at the same time, across processes as
//! well as within one. A lease is held by one holder identity until it is released or
//! its TTL runs out without being extended. A holder that stalls longer than the TTL
//! loses the lease to the next acquirer.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// A named, expiring mutual-exclusion lock.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Take the lease if it is free or expired.
    ///
    /// Returns `false` if another holder has it. Re-acquiring a lease this holder
    /// already has succeeds and renews it.
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Push out the expiry of a lease this holder has.
    ///
    /// Returns `false` if the lease was lost.
    async fn extend(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// Give up the lease if this holder has it.
    async fn release(&self, key: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
struct LeaseEntry {
    holder: String,
    expires_at: Instant,
}

/// In-process lease table.
///
/// Stores created with [`MemoryLeaseStore::handle`] share the table and act as
/// separate holders, which is how tests model competing processes.
#[derive(Debug, Clone)]
pub struct MemoryLeaseStore {
    holder: String,
    leases: Arc<Mutex<HashMap<String, LeaseEntry>>>,
}

impl MemoryLeaseStore {
    /// A new lease table with one holder.
    #[must_use]
    pub fn new(holder: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            leases: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Another holder on the same table.
    #[must_use]
    pub fn handle(&self, holder: impl Into<String>) -> Self {
        Self {
            holder: holder.into(),
            leases: Arc::clone(&self.leases),
        }
    }

    /// Holder identity of this handle.
    #[must_use]
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Current holder of `key`, if the lease is live.
    #[must_use]
    pub fn current_holder(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        self.table()
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.holder.clone())
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, LeaseEntry>> {
        self.leases
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl LeaseStore for MemoryLeaseStore {
    async fn acquire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut table = self.table();

        if let Some(entry) = table.get(key) {
            if entry.holder != self.holder && entry.expires_at > now {
                debug!(key, holder = %entry.holder, "Lease held elsewhere");
                return Ok(false);
            }
            if entry.holder != self.holder {
                info!(key, previous = %entry.holder, holder = %self.holder, "Lease expired, taking over");
            }
        }

        table.insert(
            key.to_string(),
            LeaseEntry {
                holder: self.holder.clone(),
                expires_at: now + ttl,
            },
        );
        debug!(key, holder = %self.holder, ttl_secs = ttl.as_secs(), "Lease acquired");
        Ok(true)
    }

    async fn extend(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut table = self.table();

        match table.get_mut(key) {
            Some(entry) if entry.holder == self.holder && entry.expires_at > now => {
                entry.expires_at = now + ttl;
                Ok(true)
            }
            _ => {
                debug!(key, holder = %self.holder, "Lease lost before extension");
                Ok(false)
            }
        }
    }

    async fn release(&self, key: &str) -> Result<()> {
        let mut table = self.table();
        if table
            .get(key)
            .is_some_and(|entry| entry.holder == self.holder)
        {
            table.remove(key);
            debug!(key, holder = %self.holder, "Lease released");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "lease_tests.rs"]
mod lease_tests;
