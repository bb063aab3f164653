// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Dirty propagation.
//!
//! Every mutation that changes what a policy tree or a top-level alias should look
//! like goes through one of these functions. Each one writes the change and marks the
//! affected [`PolicyRecord`](super::PolicyRecord)s dirty so the next policy-record
//! pass rebuilds them.
//!
//! Functions that mark records return the ids they marked.

use super::{MemberId, PolicyId, PolicyRecordId, StateStore, ZoneId};
use anyhow::{Context as _, Result};
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use tracing::debug;

/// Mark every record referencing `policy_id` dirty, across all zones.
///
/// # Errors
///
/// Returns an error if the state store fails.
pub async fn mark_policy_dirty(
    store: &dyn StateStore,
    policy_id: PolicyId,
) -> Result<Vec<PolicyRecordId>> {
    let mut marked = Vec::new();
    // Always written, so a pass already holding the row sees a new revision.
    for mut record in store.policy_records_for_policy(policy_id).await? {
        record.dirty = true;
        store.save_policy_record(&record).await?;
        marked.push(record.id);
    }
    debug!(policy_id = %policy_id, marked = marked.len(), "Marked policy records dirty");
    Ok(marked)
}

/// Mark every record whose policy has a member on `ip` dirty.
///
/// # Errors
///
/// Returns an error if the state store fails.
pub async fn mark_ip_dirty(store: &dyn StateStore, ip: Ipv4Addr) -> Result<Vec<PolicyRecordId>> {
    let policies: BTreeSet<PolicyId> = store
        .members_for_ip(ip)
        .await?
        .into_iter()
        .map(|member| member.policy_id)
        .collect();

    let mut marked = Vec::new();
    for policy_id in policies {
        marked.extend(mark_policy_dirty(store, policy_id).await?);
    }
    Ok(marked)
}

/// Change a member's weight. A weight of 0 keeps the member out of the tree.
///
/// # Errors
///
/// Returns an error if the member does not exist or the state store fails.
pub async fn set_member_weight(
    store: &dyn StateStore,
    member_id: MemberId,
    weight: u32,
) -> Result<Vec<PolicyRecordId>> {
    let mut member = store.member(member_id).await?;
    member.weight = weight;
    store.save_member(&member).await?;
    mark_policy_dirty(store, member.policy_id).await
}

/// Enable or disable a member.
///
/// # Errors
///
/// Returns an error if the member does not exist or the state store fails.
pub async fn set_member_enabled(
    store: &dyn StateStore,
    member_id: MemberId,
    enabled: bool,
) -> Result<Vec<PolicyRecordId>> {
    let mut member = store.member(member_id).await?;
    member.enabled = enabled;
    store.save_member(&member).await?;
    mark_policy_dirty(store, member.policy_id).await
}

/// Move a member to another region.
///
/// # Errors
///
/// Returns an error if the member does not exist or the state store fails.
pub async fn set_member_region(
    store: &dyn StateStore,
    member_id: MemberId,
    region: &str,
) -> Result<Vec<PolicyRecordId>> {
    let mut member = store.member(member_id).await?;
    member.region = region.to_string();
    store.save_member(&member).await?;
    mark_policy_dirty(store, member.policy_id).await
}

/// Enable or disable an IP.
///
/// # Errors
///
/// Returns an error if the IP does not exist or the state store fails.
pub async fn set_ip_enabled(
    store: &dyn StateStore,
    ip: Ipv4Addr,
    enabled: bool,
) -> Result<Vec<PolicyRecordId>> {
    let mut row = store.ip(ip).await?;
    row.enabled = enabled;
    store.save_ip(&row).await?;
    mark_ip_dirty(store, ip).await
}

/// Soft-delete an IP. The health-check pass removes its check and the row.
///
/// # Errors
///
/// Returns an error if the IP does not exist or the state store fails.
pub async fn soft_delete_ip(store: &dyn StateStore, ip: Ipv4Addr) -> Result<Vec<PolicyRecordId>> {
    let mut row = store.ip(ip).await?;
    row.deleted = true;
    store.save_ip(&row).await?;
    mark_ip_dirty(store, ip).await
}

/// Point a record at another policy.
///
/// The old policy's subtree is collected on the next pass once nothing in the zone
/// references it.
///
/// # Errors
///
/// Returns an error if the record or policy does not exist or the state store fails.
pub async fn set_policy_record_policy(
    store: &dyn StateStore,
    record_id: PolicyRecordId,
    policy_id: PolicyId,
) -> Result<Vec<PolicyRecordId>> {
    store
        .policy(policy_id)
        .await
        .context("Cannot point record at unknown policy")?;
    let mut record = store.policy_record(record_id).await?;
    record.policy_id = policy_id;
    record.dirty = true;
    store.save_policy_record(&record).await?;
    Ok(vec![record.id])
}

/// Soft-delete a record. The row is removed after the provider side is cleaned up.
///
/// # Errors
///
/// Returns an error if the record does not exist or the state store fails.
pub async fn soft_delete_policy_record(
    store: &dyn StateStore,
    record_id: PolicyRecordId,
) -> Result<Vec<PolicyRecordId>> {
    let mut record = store.policy_record(record_id).await?;
    record.deleted = true;
    record.dirty = true;
    store.save_policy_record(&record).await?;
    Ok(vec![record.id])
}

/// Soft-delete a zone. The zone pass removes its hosted zone and then the row.
///
/// # Errors
///
/// Returns an error if the zone does not exist or the state store fails.
pub async fn soft_delete_zone(store: &dyn StateStore, zone_id: ZoneId) -> Result<()> {
    let mut zone = store.zone(zone_id).await?;
    zone.deleted = true;
    store.save_zone(&zone).await
}

#[cfg(test)]
#[path = "dirty_tests.rs"]
mod dirty_tests;
