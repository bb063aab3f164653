// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Zone reconciliation.
//!
//! # Lifecycle
//!
//! ```text
//! absent -> creating -> exists -> deleting -> gone
//! ```
//!
//! - `deleted` set: every record except the apex NS/SOA is removed, then the hosted
//!   zone, then the row. A deleted zone is never recreated.
//! - no hosted zone id: the zone is created with a caller reference that is persisted
//!   before the call and reused until the call succeeds.
//! - hosted zone id set but the provider no longer knows it: the zone is recreated
//!   and its policy records are marked dirty.
//!
//! Policy records of a zone are rebuilt by [`reconcile_zone_policy_records`], which the
//! lease-guarded policy-record pass calls for every zone with dirty records.

use super::policy::reconcile_policy_tree;
use super::policy_tree::{load_policy_tree, owning_policy, policy_namespace};
use super::{PassSummary, KIND_ZONE};
use crate::context::Context;
use crate::errors::{error_category, PolicyError, ZoneError};
use crate::metrics;
use crate::ns_propagation::{check_is_stale, name_servers_match};
use crate::record::wire::{fqdn, record_set_satisfies, relative_name};
use crate::record::{AliasTarget, Record, RecordType};
use crate::route53::ZoneRecordStore;
use crate::state::{Policy, PolicyId, PolicyRecord, Zone, ZoneId};
use anyhow::{Context as _, Result};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What [`reconcile_zone`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneOutcome {
    /// The hosted zone was created for the first time
    Created,
    /// The hosted zone had vanished and was created again
    Recreated,
    /// The hosted zone and the row were removed
    Deleted,
    /// Nothing to do
    InSync,
}

/// What [`reconcile_zone_policy_records`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyRecordsOutcome {
    /// Policy trees rebuilt
    pub trees: usize,
    /// Dirty records brought in sync (deleted ones included)
    pub records: usize,
    /// Unreferenced policy namespaces removed
    pub collected: usize,
    /// Policies that could not be applied; their records stay dirty
    pub failed_policies: Vec<String>,
}

/// Fresh idempotency token for hosted zone creation.
fn new_caller_reference(root: &str) -> String {
    format!(
        "zinc-{}-{}-{:016x}",
        root.trim_end_matches('.'),
        Utc::now().timestamp_millis(),
        rand::random::<u64>()
    )
}

/// Reconcile one zone's hosted zone.
///
/// Holds the zone's lock for the whole call.
///
/// # Errors
///
/// Returns an error if the state store or the provider fails. A failed creation
/// keeps its persisted caller reference for the next attempt.
pub async fn reconcile_zone(ctx: &Context, zone_id: ZoneId) -> Result<ZoneOutcome> {
    let _guard = ctx.zone_locks.lock(zone_id).await;
    let mut zone = ctx.state.zone(zone_id).await?;

    info!(zone = %zone.root, "Reconciling zone");
    debug!(
        zone = %zone.root,
        route53_id = ?zone.route53_id,
        deleted = zone.deleted,
        "Zone state"
    );

    if zone.deleted {
        delete_zone(ctx, &zone).await?;
        return Ok(ZoneOutcome::Deleted);
    }

    let outcome = match zone.route53_id.clone() {
        None => {
            create_hosted_zone(ctx, &mut zone).await?;
            ZoneOutcome::Created
        }
        Some(route53_id) => {
            if ctx.client.hosted_zone_exists(&route53_id).await? {
                ZoneOutcome::InSync
            } else {
                warn!(
                    zone = %zone.root,
                    route53_id = %route53_id,
                    "Hosted zone vanished at the provider, recreating"
                );
                zone.route53_id = None;
                zone.ns_propagated = false;
                zone.ns_checked_at = None;
                ctx.state.save_zone(&zone).await?;
                create_hosted_zone(ctx, &mut zone).await?;
                mark_zone_records_dirty(ctx, &zone).await?;
                ZoneOutcome::Recreated
            }
        }
    };

    refresh_ns_propagation(ctx, &mut zone).await?;
    Ok(outcome)
}

/// Create the hosted zone, persisting the caller reference first.
///
/// A caller reference the provider refuses as already used is replaced once.
async fn create_hosted_zone(ctx: &Context, zone: &mut Zone) -> Result<()> {
    let mut regenerated = false;
    loop {
        let caller_reference = if let Some(existing) = &zone.caller_reference {
            existing.clone()
        } else {
            let fresh = new_caller_reference(&zone.root);
            zone.caller_reference = Some(fresh.clone());
            ctx.state.save_zone(zone).await?;
            fresh
        };

        match ctx
            .client
            .create_hosted_zone(&zone.root, &caller_reference)
            .await
        {
            Ok(hosted_zone) => {
                info!(
                    zone = %zone.root,
                    route53_id = %hosted_zone.id,
                    "Created hosted zone"
                );
                zone.route53_id = Some(hosted_zone.id);
                ctx.state.save_zone(zone).await?;
                return Ok(());
            }
            Err(e) if e.is_caller_reference_conflict() && !regenerated => {
                warn!(
                    zone = %zone.root,
                    caller_reference = %caller_reference,
                    "Caller reference already used, retrying with a fresh one"
                );
                zone.caller_reference = None;
                ctx.state.save_zone(zone).await?;
                regenerated = true;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create hosted zone for {}", zone.root));
            }
        }
    }
}

/// Remove everything the zone owns at the provider, then the row.
async fn delete_zone(ctx: &Context, zone: &Zone) -> Result<()> {
    if let Some(route53_id) = &zone.route53_id {
        let mut store = ctx.zone_store(route53_id, &zone.root);
        if store.exists().await? {
            let removed = store.delete_all_records().await?;
            store.commit().await?;
            debug!(zone = %zone.root, removed, "Emptied hosted zone");
        }
        if !ctx.client.delete_hosted_zone(route53_id).await? {
            debug!(zone = %zone.root, "Hosted zone already gone");
        }
    }

    ctx.state.delete_zone(zone.id).await?;
    ctx.zone_locks.forget(zone.id);
    info!(zone = %zone.root, "Deleted zone");
    Ok(())
}

async fn mark_zone_records_dirty(ctx: &Context, zone: &Zone) -> Result<()> {
    for mut record in ctx.state.policy_records(zone.id).await? {
        record.dirty = true;
        ctx.state.save_policy_record(&record).await?;
    }
    Ok(())
}

/// Refresh the cached NS propagation state when it is stale.
///
/// Lookup failures are logged and keep the cached value.
async fn refresh_ns_propagation(ctx: &Context, zone: &mut Zone) -> Result<()> {
    let Some(route53_id) = zone.route53_id.clone() else {
        return Ok(());
    };
    let now = Utc::now();
    if !check_is_stale(zone.ns_checked_at, now, ctx.settings.ns_check_ttl_secs) {
        return Ok(());
    }

    let mut store = ctx.zone_store(&route53_id, &zone.root);
    let expected: Vec<String> = store
        .records()
        .await?
        .values()
        .find(|live| live.record.is_apex() && live.record.record_type == RecordType::Ns)
        .map(|live| live.record.values())
        .unwrap_or_default();

    match ctx.ns_lookup.name_servers(&zone.root).await {
        Ok(observed) => {
            let propagated = name_servers_match(&expected, &observed);
            if propagated != zone.ns_propagated {
                info!(zone = %zone.root, propagated, "NS propagation changed");
            }
            zone.ns_propagated = propagated;
            zone.ns_checked_at = Some(now);
            ctx.state.save_zone(zone).await?;
        }
        Err(e) => {
            warn!(zone = %zone.root, error = %e, "NS lookup failed, keeping cached state");
        }
    }
    Ok(())
}

/// Reconcile every zone, logging and skipping failures.
///
/// # Errors
///
/// Returns an error only if the zones cannot be listed.
pub async fn reconcile_all_zones(ctx: Arc<Context>) -> Result<PassSummary> {
    let mut summary = PassSummary::default();

    for zone in ctx.state.zones().await? {
        let start = Instant::now();
        match reconcile_zone(&ctx, zone.id).await {
            Ok(outcome) => {
                debug!(zone = %zone.root, ?outcome, "Zone reconciled");
                metrics::record_reconciliation_success(KIND_ZONE, start.elapsed());
                summary.succeeded += 1;
            }
            Err(e) => {
                error!(zone = %zone.root, error = ?e, "Zone reconciliation failed");
                metrics::record_reconciliation_error(KIND_ZONE, start.elapsed());
                metrics::record_error(KIND_ZONE, error_category(&e));
                summary.failed += 1;
            }
        }
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Zone pass finished"
    );
    Ok(summary)
}

/// Top-level alias binding a policy record's name to its policy tree.
fn top_level_alias(
    name: &str,
    namespace: &str,
    root: &str,
    route53_id: &str,
) -> Result<Record> {
    let alias = Record::alias(
        name,
        RecordType::A,
        AliasTarget {
            dns_name: fqdn(namespace, root),
            hosted_zone_id: route53_id.to_string(),
            evaluate_target_health: false,
        },
    )?;
    Ok(alias)
}

/// Queue an alias change unless the live record already matches.
async fn queue_alias(store: &mut ZoneRecordStore, alias: &Record) -> Result<()> {
    if !alias.deleted {
        let id = store.record_id(alias);
        let encoded = alias.encode(store.root())?;
        if let Some(live) = store.records().await?.get(&id) {
            if record_set_satisfies(&encoded, &live.record_set) {
                return Ok(());
            }
        }
    }
    store.add_record_changes(alias).await
}

/// Rebuild the dirty policy records of one zone.
///
/// 1. Each distinct policy referenced by a live dirty record gets its tree rebuilt
/// 2. Each dirty record's top-level alias is written, or removed for deleted records
/// 3. Policy namespaces no longer referenced by any record are removed
/// 4. Deleted rows are removed and the dirty flags cleared
///
/// A policy that cannot be applied (no eligible regions) is reported in
/// [`PolicyRecordsOutcome::failed_policies`]; its records and tree stay untouched
/// and dirty while the rest of the zone proceeds.
///
/// # Errors
///
/// Returns an error if the zone has no hosted zone, the state store fails, or the
/// provider rejects a batch.
pub async fn reconcile_zone_policy_records(
    ctx: &Context,
    zone_id: ZoneId,
) -> Result<PolicyRecordsOutcome> {
    let _guard = ctx.zone_locks.lock(zone_id).await;
    let zone = ctx.state.zone(zone_id).await?;
    let mut outcome = PolicyRecordsOutcome::default();

    if zone.deleted {
        return Err(ZoneError::ZoneDeleted { root: zone.root }.into());
    }
    let Some(route53_id) = zone.route53_id.clone() else {
        return Err(ZoneError::NotCreated { root: zone.root }.into());
    };

    let records = ctx.state.policy_records(zone.id).await?;
    let dirty: Vec<&PolicyRecord> = records.iter().filter(|r| r.dirty).collect();
    if dirty.is_empty() {
        debug!(zone = %zone.root, "No dirty policy records");
        return Ok(outcome);
    }

    let mut store = ctx.zone_store(&route53_id, &zone.root);
    if !store.exists().await? {
        return Err(ZoneError::NotCreated { root: zone.root }.into());
    }

    let mut policies: BTreeMap<PolicyId, Policy> = BTreeMap::new();
    for record in &records {
        if !policies.contains_key(&record.policy_id) {
            policies.insert(record.policy_id, ctx.state.policy(record.policy_id).await?);
        }
    }
    let prefix = ctx.settings.policy_prefix.clone();

    // 1. Trees
    let dirty_policies: BTreeSet<PolicyId> = dirty
        .iter()
        .filter(|r| !r.deleted)
        .map(|r| r.policy_id)
        .collect();
    let mut failed: BTreeSet<PolicyId> = BTreeSet::new();

    for policy_id in &dirty_policies {
        let Some(policy) = policies.get(policy_id) else {
            continue;
        };
        let namespace = policy_namespace(&prefix, &policy.name);
        match load_policy_tree(ctx, policy, &route53_id, &zone.root).await {
            Ok(desired) => {
                reconcile_policy_tree(&mut store, &namespace, &desired).await?;
                outcome.trees += 1;
            }
            Err(e) if e.downcast_ref::<PolicyError>().is_some() => {
                warn!(
                    zone = %zone.root,
                    policy = %policy.name,
                    error = %e,
                    "Policy cannot be applied, leaving its records untouched"
                );
                metrics::record_error(KIND_ZONE, error_category(&e));
                failed.insert(*policy_id);
                outcome.failed_policies.push(policy.name.clone());
            }
            Err(e) => return Err(e),
        }
    }

    // 2. Top-level aliases
    let mut settled: Vec<&PolicyRecord> = Vec::new();
    for record in &dirty {
        if !record.deleted && failed.contains(&record.policy_id) {
            continue;
        }
        let Some(policy) = policies.get(&record.policy_id) else {
            continue;
        };
        let namespace = policy_namespace(&prefix, &policy.name);
        let alias = top_level_alias(&record.name, &namespace, &zone.root, &route53_id)?;
        let alias = if record.deleted {
            alias.marked_deleted()
        } else {
            alias
        };
        queue_alias(&mut store, &alias).await?;
        settled.push(*record);
    }
    store
        .commit()
        .await
        .with_context(|| format!("Failed to write policy record aliases of {}", zone.root))?;

    // 3. Unreferenced namespaces
    outcome.collected = collect_orphaned_trees(&mut store, &records, &policies, &prefix).await?;

    // 4. Rows. A row written since it was read stays dirty for the next pass.
    for record in settled {
        if ctx
            .state
            .settle_policy_record(record.id, record.revision)
            .await?
        {
            outcome.records += 1;
        } else {
            debug!(zone = %zone.root, name = %record.name, "Policy record changed during pass");
        }
    }

    info!(
        zone = %zone.root,
        trees = outcome.trees,
        records = outcome.records,
        collected = outcome.collected,
        failed = outcome.failed_policies.len(),
        "Reconciled policy records"
    );
    Ok(outcome)
}

/// Remove policy namespaces nothing points at any more.
///
/// A namespace is kept while a non-deleted record references its policy, or while
/// a live alias outside any policy namespace still targets it. The second rule keeps
/// the old tree of a record whose new policy failed to apply.
async fn collect_orphaned_trees(
    store: &mut ZoneRecordStore,
    records: &[PolicyRecord],
    policies: &BTreeMap<PolicyId, Policy>,
    prefix: &str,
) -> Result<usize> {
    let mut keep: BTreeSet<String> = records
        .iter()
        .filter(|r| !r.deleted)
        .filter_map(|r| policies.get(&r.policy_id))
        .map(|p| p.name.clone())
        .collect();

    let root = store.root().to_string();
    let mut present: BTreeSet<String> = BTreeSet::new();
    for live in store.records().await?.values() {
        match owning_policy(&live.record.name, prefix) {
            Some(policy) => {
                present.insert(policy.to_string());
            }
            None => {
                let target = live
                    .record
                    .alias_target()
                    .and_then(|target| relative_name(&target.dns_name, &root).ok());
                if let Some(policy) = target.as_deref().and_then(|t| owning_policy(t, prefix)) {
                    keep.insert(policy.to_string());
                }
            }
        }
    }

    let mut collected = 0;
    for policy in present.difference(&keep) {
        let namespace = policy_namespace(prefix, policy);
        info!(zone = %root, namespace = %namespace, "Removing unreferenced policy tree");
        reconcile_policy_tree(store, &namespace, &[]).await?;
        collected += 1;
    }
    Ok(collected)
}

#[cfg(test)]
#[path = "zone_tests.rs"]
mod zone_tests;
