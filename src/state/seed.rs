// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired-state seed file.
//!
//! The binary has no database of its own. It loads a YAML document describing zones,
//! policies, IPs and policy records into a [`StateStore`] at startup.
//!
//! ```yaml
//! zones:
//!   - root: example.com
//! ips:
//!   - ip: 192.0.2.1
//!     hostname: web1.example.net
//! policies:
//!   - name: pol1
//!     routing: latency
//!     members:
//!       - ip: 192.0.2.1
//!         region: us-east-1
//!         weight: 10
//! policy_records:
//!   - zone: example.com
//!     name: www
//!     policy: pol1
//! ```

use super::{Ip, RoutingMode, StateStore};
use crate::errors::PolicyError;
use crate::validation::{normalize_zone_root, validate_policy_name, validate_record_name};
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::Path;
use tracing::info;

/// Top-level seed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub zones: Vec<ZoneSeed>,
    pub ips: Vec<Ip>,
    pub policies: Vec<PolicySeed>,
    pub policy_records: Vec<PolicyRecordSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneSeed {
    pub root: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicySeed {
    pub name: String,
    #[serde(default)]
    pub routing: RoutingMode,
    #[serde(default)]
    pub members: Vec<MemberSeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSeed {
    pub ip: Ipv4Addr,
    pub region: String,
    pub weight: u32,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecordSeed {
    pub zone: String,
    pub name: String,
    pub policy: String,
}

/// Counts of rows created by [`Seed::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub zones: usize,
    pub ips: usize,
    pub policies: usize,
    pub members: usize,
    pub policy_records: usize,
}

impl Seed {
    /// Parse a seed document.
    ///
    /// # Errors
    ///
    /// Returns an error if the YAML is malformed.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).context("Failed to parse seed document")
    }

    /// Read and parse a seed file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read seed file {}", path.display()))?;
        Self::from_yaml(&contents)
            .with_context(|| format!("Invalid seed file {}", path.display()))
    }

    /// Insert every entity into `store`.
    ///
    /// Names are validated and zone roots normalized on the way in. Policy records
    /// start dirty so the first pass builds them.
    ///
    /// # Errors
    ///
    /// Returns an error on the first invalid or duplicate entity, or a policy record
    /// naming an unknown zone or policy.
    pub async fn apply(&self, store: &dyn StateStore) -> Result<SeedSummary> {
        let mut summary = SeedSummary::default();

        for zone in &self.zones {
            let root = normalize_zone_root(&zone.root)?;
            store.insert_zone(&root).await?;
            summary.zones += 1;
        }

        for ip in &self.ips {
            store.insert_ip(ip.clone()).await?;
            summary.ips += 1;
        }

        for policy in &self.policies {
            validate_policy_name(&policy.name)?;
            let created = store.insert_policy(&policy.name, policy.routing).await?;
            summary.policies += 1;

            for member in &policy.members {
                let mut row = store
                    .insert_member(created.id, member.ip, &member.region, member.weight)
                    .await
                    .with_context(|| {
                        format!("Invalid member {} of policy {}", member.ip, policy.name)
                    })?;
                if !member.enabled {
                    row.enabled = false;
                    store.save_member(&row).await?;
                }
                summary.members += 1;
            }
        }

        for record in &self.policy_records {
            validate_record_name(&record.name)?;
            let root = normalize_zone_root(&record.zone)?;
            let zone = store
                .zone_by_root(&root)
                .await?
                .with_context(|| format!("Policy record {} names unknown zone {root}", record.name))?;
            let policy = store.policy_by_name(&record.policy).await?.ok_or_else(|| {
                PolicyError::UnknownPolicy {
                    name: record.policy.clone(),
                }
            })?;
            store
                .insert_policy_record(zone.id, &record.name, policy.id)
                .await?;
            summary.policy_records += 1;
        }

        info!(
            zones = summary.zones,
            ips = summary.ips,
            policies = summary.policies,
            members = summary.members,
            policy_records = summary.policy_records,
            "Loaded desired state"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "seed_tests.rs"]
mod seed_tests;
