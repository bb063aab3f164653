// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

// Common test utilities for integration tests

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::Arc;
use zinc::config::Settings;
use zinc::context::Context;
use zinc::lease::MemoryLeaseStore;
use zinc::ns_propagation::StaticLookup;
use zinc::route53::memory::MemoryRoute53;
use zinc::route53::types::RecordSet;
use zinc::route53::{RetryPolicy, Route53Client};
use zinc::state::{MemoryStateStore, StateStore, Zone};

/// One worker's view of a shared provider, state store and lease table.
pub struct TestEnv {
    pub ctx: Arc<Context>,
    pub provider: Arc<MemoryRoute53>,
    pub state: Arc<MemoryStateStore>,
    pub leases: MemoryLeaseStore,
}

impl TestEnv {
    /// Fresh provider, state store and lease table.
    pub fn new() -> Self {
        Self::build(
            Arc::new(MemoryRoute53::new()),
            Arc::new(MemoryStateStore::new()),
            MemoryLeaseStore::new("worker-1"),
        )
    }

    /// Another worker sharing everything with `self` but with its own holder identity.
    pub fn second_worker(&self, holder: &str) -> Self {
        Self::build(
            Arc::clone(&self.provider),
            Arc::clone(&self.state),
            self.leases.handle(holder),
        )
    }

    fn build(
        provider: Arc<MemoryRoute53>,
        state: Arc<MemoryStateStore>,
        leases: MemoryLeaseStore,
    ) -> Self {
        let ctx = Context::new(
            Route53Client::new(provider.clone(), RetryPolicy::immediate(3)),
            state.clone(),
            Arc::new(leases.clone()),
            Settings::with_secret("integration-secret").expect("default settings parse"),
        )
        .expect("context builds")
        .with_ns_lookup(Arc::new(StaticLookup::failing()));

        Self {
            ctx: Arc::new(ctx),
            provider,
            state,
            leases,
        }
    }

    /// Current row of the zone rooted at `root`.
    pub async fn zone(&self, root: &str) -> Zone {
        self.state
            .zone_by_root(root)
            .await
            .expect("state store answers")
            .expect("zone exists")
    }

    /// Live record sets of the zone rooted at `root`.
    pub async fn record_sets(&self, root: &str) -> Vec<RecordSet> {
        let zone = self.zone(root).await;
        let route53_id = zone.route53_id.expect("zone created");
        self.provider.record_sets(&route53_id)
    }

    /// Sorted names of the live record sets of `root`.
    pub async fn record_names(&self, root: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .record_sets(root)
            .await
            .into_iter()
            .map(|set| set.name)
            .collect();
        names.sort();
        names
    }

    /// Number of dirty policy records across all zones.
    pub async fn dirty_records(&self) -> usize {
        let mut count = 0;
        for zone in self.state.zones().await.expect("zones") {
            count += self
                .state
                .policy_records(zone.id)
                .await
                .expect("policy records")
                .iter()
                .filter(|record| record.dirty)
                .count();
        }
        count
    }
}

pub fn ip(last: u8) -> Ipv4Addr {
    Ipv4Addr::new(192, 0, 2, last)
}
