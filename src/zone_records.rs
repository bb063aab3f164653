// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! User-facing record operations of a zone.
//!
//! These run synchronously on behalf of the API layer, unlike the periodic passes:
//!
//! - [`list_records`] returns what a user sees in a zone. Policy tree internals are
//!   hidden and each policy record shows up as one `POLICY_ROUTED` record.
//! - [`apply_records`] writes a set of user records. Plain records go to the
//!   provider in one change batch; `POLICY_ROUTED` records become policy record rows
//!   that the policy-record pass realises later.

use crate::context::Context;
use crate::errors::{PolicyError, RecordError, ZoneError};
use crate::reconcilers::policy_tree::owning_policy;
use crate::record::wire::relative_name;
use crate::record::{Record, RecordData, RecordType};
use crate::state::dirty::{set_policy_record_policy, soft_delete_policy_record};
use crate::state::{Policy, PolicyRecord, Zone, ZoneId};
use crate::validation::{validate_record_name, validate_ttl, validate_values};
use anyhow::{Context as _, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// What [`apply_records`] did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    /// Plain record changes sent to the provider
    pub changes: usize,
    /// Policy record rows created, repointed or deleted
    pub policy_records: usize,
}

async fn created_zone(ctx: &Context, zone_id: ZoneId) -> Result<(Zone, String)> {
    let zone = ctx.state.zone(zone_id).await?;
    if zone.deleted {
        return Err(ZoneError::ZoneDeleted { root: zone.root }.into());
    }
    match zone.route53_id.clone() {
        Some(route53_id) => Ok((zone, route53_id)),
        None => Err(ZoneError::NotCreated { root: zone.root }.into()),
    }
}

/// Whether a live record belongs to the policy machinery rather than to the user.
fn is_policy_internal(record: &Record, root: &str, prefix: &str) -> bool {
    if owning_policy(&record.name, prefix).is_some() {
        return true;
    }
    record
        .alias_target()
        .and_then(|target| relative_name(&target.dns_name, root).ok())
        .is_some_and(|target| owning_policy(&target, prefix).is_some())
}

/// List the records of a zone as a user sees them.
///
/// # Errors
///
/// Returns an error if the zone is deleted or not yet created, or the provider or
/// state store fails.
pub async fn list_records(ctx: &Context, zone_id: ZoneId) -> Result<Vec<Record>> {
    let (zone, route53_id) = created_zone(ctx, zone_id).await?;
    let prefix = &ctx.settings.policy_prefix;

    let mut store = ctx.zone_store(&route53_id, &zone.root);
    let mut records: Vec<Record> = store
        .records()
        .await?
        .values()
        .filter(|live| !is_policy_internal(&live.record, &zone.root, prefix))
        .map(|live| live.record.clone())
        .collect();

    for row in ctx.state.policy_records(zone.id).await? {
        if row.deleted {
            continue;
        }
        let policy = ctx.state.policy(row.policy_id).await?;
        records.push(Record::policy_routed(&row.name, &policy.name)?);
    }

    records.sort_by(|a, b| {
        (a.name.as_str(), a.record_type, a.set_identifier.as_deref()).cmp(&(
            b.name.as_str(),
            b.record_type,
            b.set_identifier.as_deref(),
        ))
    });
    Ok(records)
}

/// Re-check a record that may have been deserialized without its constructor.
fn validate_user_record(record: &Record, prefix: &str) -> Result<(), RecordError> {
    validate_record_name(&record.name)?;
    let managed = || RecordError::ManagedRecord {
        name: record.name.clone(),
        record_type: record.record_type.to_string(),
    };
    if owning_policy(&record.name, prefix).is_some() {
        return Err(managed());
    }
    match &record.data {
        RecordData::PolicyRouted { .. } if record.record_type != RecordType::PolicyRouted => {
            Err(RecordError::InvalidType {
                record_type: record.record_type.to_string(),
                reason: "policy payload on a non POLICY_ROUTED record".into(),
            })
        }
        RecordData::PolicyRouted { .. } => Ok(()),
        _ if record.record_type == RecordType::PolicyRouted => Err(RecordError::InvalidType {
            record_type: record.record_type.to_string(),
            reason: "POLICY_ROUTED records carry exactly one policy name".into(),
        }),
        _ if record.managed() => Err(managed()),
        RecordData::Plain { ttl, values } => {
            validate_ttl(&record.name, u64::from(*ttl))?;
            validate_values(&record.name, record.record_type, values)
        }
        RecordData::Alias(_) => Err(managed()),
    }
}

/// Apply user records to a zone.
///
/// Every record is validated before anything is written. `POLICY_ROUTED` records
/// are stored as policy record rows (created, repointed, or soft-deleted when the
/// record carries delete intent); plain records are committed as one change batch.
///
/// # Errors
///
/// Returns a [`RecordError`] for invalid or managed records, a [`PolicyError`] for
/// unknown policies, a [`ZoneError`] if the zone is deleted or not yet created, and
/// the provider error if the batch is rejected.
pub async fn apply_records(
    ctx: &Context,
    zone_id: ZoneId,
    records: &[Record],
) -> Result<ApplyOutcome> {
    let (zone, route53_id) = created_zone(ctx, zone_id).await?;
    let prefix = ctx.settings.policy_prefix.clone();

    let mut policies: BTreeMap<String, Policy> = BTreeMap::new();
    for record in records {
        validate_user_record(record, &prefix)?;
        if let RecordData::PolicyRouted { policy } = &record.data {
            if policies.contains_key(policy) {
                continue;
            }
            let found = ctx
                .state
                .policy_by_name(policy)
                .await?
                .ok_or_else(|| PolicyError::UnknownPolicy {
                    name: policy.clone(),
                })?;
            policies.insert(policy.clone(), found);
        }
    }

    let _guard = ctx.zone_locks.lock(zone.id).await;
    let mut outcome = ApplyOutcome::default();

    let rows: BTreeMap<String, PolicyRecord> = ctx
        .state
        .policy_records(zone.id)
        .await?
        .into_iter()
        .map(|row| (row.name.clone(), row))
        .collect();

    let mut store = ctx.zone_store(&route53_id, &zone.root);
    for record in records {
        let RecordData::PolicyRouted { policy } = &record.data else {
            store.add_record_changes(record).await?;
            continue;
        };
        let Some(policy) = policies.get(policy) else {
            continue;
        };

        match rows.get(&record.name) {
            Some(row) if record.deleted => {
                soft_delete_policy_record(ctx.state.as_ref(), row.id).await?;
                outcome.policy_records += 1;
            }
            None if record.deleted => {
                debug!(zone = %zone.root, name = %record.name, "Policy record already absent");
            }
            Some(row) if row.deleted => {
                let mut revived = row.clone();
                revived.deleted = false;
                revived.dirty = true;
                revived.policy_id = policy.id;
                ctx.state.save_policy_record(&revived).await?;
                outcome.policy_records += 1;
            }
            Some(row) if row.policy_id != policy.id => {
                set_policy_record_policy(ctx.state.as_ref(), row.id, policy.id).await?;
                outcome.policy_records += 1;
            }
            Some(_) => {
                debug!(zone = %zone.root, name = %record.name, "Policy record unchanged");
            }
            None => {
                ctx.state
                    .insert_policy_record(zone.id, &record.name, policy.id)
                    .await?;
                outcome.policy_records += 1;
            }
        }
    }

    outcome.changes = store.pending_changes().len();
    store
        .commit()
        .await
        .with_context(|| format!("Failed to apply records to {}", zone.root))?;

    info!(
        zone = %zone.root,
        changes = outcome.changes,
        policy_records = outcome.policy_records,
        "Applied user records"
    );
    Ok(outcome)
}

#[cfg(test)]
#[path = "zone_records_tests.rs"]
mod zone_records_tests;
