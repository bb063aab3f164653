// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! NS delegation propagation check.
//!
//! A zone is propagated once a public resolver answers the root's NS query with the
//! name servers the provider assigned. The result is cached on the zone and only
//! refreshed when it is older than the configured TTL.

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use hickory_client::client::{Client, SyncClient};
use hickory_client::rr::{DNSClass, Name, RData, RecordType};
use hickory_client::udp::UdpClientConnection;
use std::collections::BTreeSet;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Mutex;

/// Looks up the NS set of a domain.
#[async_trait]
pub trait NameServerLookup: Send + Sync {
    /// Name servers currently delegated for `root`.
    async fn name_servers(&self, root: &str) -> Result<Vec<String>>;
}

/// Queries a DNS resolver over UDP.
#[derive(Debug, Clone)]
pub struct ResolverLookup {
    resolver: SocketAddr,
}

impl ResolverLookup {
    #[must_use]
    pub fn new(resolver: SocketAddr) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl NameServerLookup for ResolverLookup {
    async fn name_servers(&self, root: &str) -> Result<Vec<String>> {
        let resolver = self.resolver;
        let root = root.to_string();

        tokio::task::spawn_blocking(move || {
            let conn = UdpClientConnection::new(resolver)
                .context("Failed to create UDP connection for query")?;
            let client = SyncClient::new(conn);

            let name = Name::from_str(&root).with_context(|| format!("Invalid zone name: {root}"))?;
            let response = client
                .query(&name, DNSClass::IN, RecordType::NS)
                .with_context(|| format!("Failed to query NS records for {root}"))?;

            let servers = response
                .answers()
                .iter()
                .filter_map(|record| match record.data() {
                    Some(RData::NS(ns)) => Some(ns.0.to_string()),
                    _ => None,
                })
                .collect();
            Ok(servers)
        })
        .await
        .context("DNS query task failed")?
    }
}

/// Fixed answers, for tests and offline runs.
#[derive(Debug, Default)]
pub struct StaticLookup {
    answers: Mutex<Option<Vec<String>>>,
}

impl StaticLookup {
    /// Answer every query with `servers`.
    #[must_use]
    pub fn answering(servers: Vec<String>) -> Self {
        Self {
            answers: Mutex::new(Some(servers)),
        }
    }

    /// Fail every query.
    #[must_use]
    pub fn failing() -> Self {
        Self::default()
    }

    /// Change the answer.
    pub fn set_answer(&self, servers: Option<Vec<String>>) {
        *self
            .answers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = servers;
    }
}

#[async_trait]
impl NameServerLookup for StaticLookup {
    async fn name_servers(&self, root: &str) -> Result<Vec<String>> {
        self.answers
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
            .with_context(|| format!("No resolver answer for {root}"))
    }
}

fn normalize(server: &str) -> String {
    server.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Whether the resolver's answer matches the provider's name servers.
///
/// Comparison ignores case, trailing dots and order. An empty answer never matches.
#[must_use]
pub fn name_servers_match(expected: &[String], observed: &[String]) -> bool {
    let expected: BTreeSet<String> = expected.iter().map(|s| normalize(s)).collect();
    let observed: BTreeSet<String> = observed.iter().map(|s| normalize(s)).collect();
    !observed.is_empty() && expected == observed
}

/// Whether a cached result taken at `checked_at` is older than `ttl_secs`.
#[must_use]
pub fn check_is_stale(checked_at: Option<DateTime<Utc>>, now: DateTime<Utc>, ttl_secs: i64) -> bool {
    checked_at.map_or(true, |at| now - at >= Duration::seconds(ttl_secs))
}

#[cfg(test)]
#[path = "ns_propagation_tests.rs"]
mod ns_propagation_tests;
