// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Desired record tree of a traffic policy.
//!
//! A policy owns every record whose name is `{prefix}_{policy}` or starts with
//! `{prefix}_{policy}_`. Policy names never contain `_`, so namespaces of different
//! policies never overlap.
//!
//! # Tree shapes
//!
//! Weighted routing with a single region is flat:
//!
//! ```text
//! _zn_pol1   A  weighted  set_id "{member}-{region}"  -> member IP
//! ```
//!
//! Latency routing, or more than one region, adds a latency layer of aliases:
//!
//! ```text
//! _zn_pol1              A alias  region, set_id "{region}"  -> _zn_pol1_{region}
//! _zn_pol1_{region}     A        weighted, set_id "{member}-{region}" -> member IP
//! ```

use crate::constants::POLICY_RECORD_TTL_SECS;
use crate::context::Context;
use crate::errors::PolicyError;
use crate::record::wire::fqdn;
use crate::record::{AliasTarget, Record, RecordType};
use crate::state::{Ip, Policy, PolicyMember, RoutingMode};
use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Top name of a policy's namespace.
#[must_use]
pub fn policy_namespace(prefix: &str, policy: &str) -> String {
    format!("{prefix}_{policy}")
}

/// Whether a relative record name belongs to the namespace `{prefix}_{policy}`.
#[must_use]
pub fn in_policy_namespace(name: &str, namespace: &str) -> bool {
    name == namespace
        || name
            .strip_prefix(namespace)
            .is_some_and(|rest| rest.starts_with('_'))
}

/// Name of the policy owning a relative record name, if it lies in any policy
/// namespace under `prefix`.
#[must_use]
pub fn owning_policy<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = name.strip_prefix(prefix)?.strip_prefix('_')?;
    let policy = rest.split('_').next().unwrap_or(rest);
    (!policy.is_empty()).then_some(policy)
}

/// A member joined with its IP row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeMember {
    pub member: PolicyMember,
    pub ip: Ip,
}

impl TreeMember {
    /// Weight above 0, member enabled, IP enabled and not deleted.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        self.member.weight > 0 && self.member.enabled && self.ip.enabled && !self.ip.deleted
    }

    fn set_identifier(&self) -> String {
        format!("{}-{}", self.member.id, self.member.region)
    }

    fn leaf(&self, name: &str) -> Result<Record> {
        let record = Record::plain(
            name,
            RecordType::A,
            POLICY_RECORD_TTL_SECS,
            vec![self.member.ip.to_string()],
        )?
        .with_set_identifier(self.set_identifier())
        .with_weight(self.member.weight)
        .with_health_check(self.ip.health_check_id.clone());
        Ok(record)
    }
}

/// Build the desired records of a policy.
///
/// # Arguments
///
/// * `policy` - The policy
/// * `members` - All members of the policy with their IPs; ineligible ones are skipped
/// * `prefix` - Policy namespace prefix (e.g., `_zn`)
/// * `hosted_zone_id` - Hosted zone the tree is built in, used as alias target zone
/// * `root` - Zone root with trailing dot
///
/// # Errors
///
/// Returns [`PolicyError::NoEligibleRegions`] if no member is eligible, and a record
/// error if a generated name or value is invalid.
pub fn build_policy_tree(
    policy: &Policy,
    members: &[TreeMember],
    prefix: &str,
    hosted_zone_id: &str,
    root: &str,
) -> Result<Vec<Record>> {
    let mut regions: BTreeMap<&str, Vec<&TreeMember>> = BTreeMap::new();
    for member in members.iter().filter(|m| m.is_eligible()) {
        regions
            .entry(member.member.region.as_str())
            .or_default()
            .push(member);
    }

    if regions.is_empty() {
        return Err(PolicyError::NoEligibleRegions {
            policy: policy.name.clone(),
        }
        .into());
    }

    let namespace = policy_namespace(prefix, &policy.name);
    let mut records = Vec::new();

    if policy.routing == RoutingMode::Weighted && regions.len() == 1 {
        for member in regions.values().flatten() {
            records.push(member.leaf(&namespace)?);
        }
    } else {
        for (region, region_members) in &regions {
            let leaf_name = format!("{namespace}_{region}");
            for member in region_members {
                records.push(member.leaf(&leaf_name)?);
            }

            let alias = Record::alias(
                &namespace,
                RecordType::A,
                AliasTarget {
                    dns_name: fqdn(&leaf_name, root),
                    hosted_zone_id: hosted_zone_id.to_string(),
                    evaluate_target_health: true,
                },
            )?
            .with_set_identifier(*region)
            .with_region(*region);
            records.push(alias);
        }
    }

    debug!(
        policy = %policy.name,
        routing = %policy.routing,
        regions = regions.len(),
        records = records.len(),
        "Built policy tree"
    );
    Ok(records)
}

/// Load a policy's members and build its tree for one zone.
///
/// # Errors
///
/// Returns an error if the state store fails or the tree cannot be built.
pub async fn load_policy_tree(
    ctx: &Context,
    policy: &Policy,
    hosted_zone_id: &str,
    root: &str,
) -> Result<Vec<Record>> {
    let mut members = Vec::new();
    for member in ctx.state.members(policy.id).await? {
        let ip = ctx
            .state
            .ip(member.ip)
            .await
            .with_context(|| format!("Member {} of policy {} has no IP row", member.id, policy.name))?;
        members.push(TreeMember { member, ip });
    }

    build_policy_tree(
        policy,
        &members,
        &ctx.settings.policy_prefix,
        hosted_zone_id,
        root,
    )
}

#[cfg(test)]
#[path = "policy_tree_tests.rs"]
mod policy_tree_tests;
