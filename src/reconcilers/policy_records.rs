// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Lease-guarded pass over every zone with dirty policy records.
//!
//! Only one worker at a time runs this pass. The lease is short lived and extended
//! after every zone, so a crashed holder blocks the pass for at most one TTL.

use super::zone::reconcile_zone_policy_records;
use super::{PassOutcome, PassSummary, KIND_POLICY_RECORD};
use crate::constants::POLICY_RECORD_LEASE_KEY;
use crate::context::Context;
use crate::errors::error_category;
use crate::metrics;
use crate::state::Zone;
use anyhow::Result;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Zones the pass should visit: live, created, with at least one dirty record.
async fn zones_with_dirty_records(ctx: &Context) -> Result<Vec<Zone>> {
    let mut selected = Vec::new();
    for zone in ctx.state.zones().await? {
        if zone.deleted || zone.route53_id.is_none() {
            continue;
        }
        if ctx
            .state
            .policy_records(zone.id)
            .await?
            .iter()
            .any(|record| record.dirty)
        {
            selected.push(zone);
        }
    }
    Ok(selected)
}

/// Rebuild the dirty policy records of every zone.
///
/// Returns [`PassOutcome::Skipped`] without touching anything when another holder
/// owns the lease. Zone failures are logged and counted; the pass moves on.
///
/// # Errors
///
/// Returns an error if the lease store or the state store fails.
pub async fn reconcile_dirty_policy_records(ctx: Arc<Context>) -> Result<PassOutcome> {
    let ttl = ctx.settings.lease_ttl();
    if !ctx.leases.acquire(POLICY_RECORD_LEASE_KEY, ttl).await? {
        debug!(lease = POLICY_RECORD_LEASE_KEY, "Lease held elsewhere, skipping pass");
        metrics::record_lease_outcome("busy");
        metrics::record_reconciliation_skipped(KIND_POLICY_RECORD);
        return Ok(PassOutcome::Skipped);
    }
    metrics::record_lease_outcome("acquired");

    let result = run_pass(&ctx).await;

    if let Err(e) = ctx.leases.release(POLICY_RECORD_LEASE_KEY).await {
        warn!(lease = POLICY_RECORD_LEASE_KEY, error = %e, "Failed to release lease");
    } else {
        metrics::record_lease_outcome("released");
    }

    result.map(PassOutcome::Completed)
}

async fn run_pass(ctx: &Arc<Context>) -> Result<PassSummary> {
    let zones = zones_with_dirty_records(ctx).await?;
    if zones.is_empty() {
        debug!("No zones with dirty policy records");
        return Ok(PassSummary::default());
    }
    info!(zones = zones.len(), "Reconciling dirty policy records");

    let ttl = ctx.settings.lease_ttl();
    let concurrency = ctx.settings.zone_concurrency.max(1);

    let results: Vec<bool> = stream::iter(zones)
        .map(|zone| {
            let ctx = Arc::clone(ctx);
            async move {
                let start = Instant::now();
                let ok = match reconcile_zone_policy_records(&ctx, zone.id).await {
                    Ok(outcome) => {
                        debug!(zone = %zone.root, ?outcome, "Policy records reconciled");
                        metrics::record_reconciliation_success(KIND_POLICY_RECORD, start.elapsed());
                        true
                    }
                    Err(e) => {
                        error!(zone = %zone.root, error = ?e, "Policy record reconciliation failed");
                        metrics::record_reconciliation_error(KIND_POLICY_RECORD, start.elapsed());
                        metrics::record_error(KIND_POLICY_RECORD, error_category(&e));
                        false
                    }
                };

                match ctx.leases.extend(POLICY_RECORD_LEASE_KEY, ttl).await {
                    Ok(true) => metrics::record_lease_outcome("extended"),
                    Ok(false) => {
                        warn!(lease = POLICY_RECORD_LEASE_KEY, "Lease lost during pass");
                    }
                    Err(e) => {
                        warn!(lease = POLICY_RECORD_LEASE_KEY, error = %e, "Failed to extend lease");
                    }
                }
                ok
            }
        })
        .buffer_unordered(concurrency)
        .collect()
        .await;

    let succeeded = results.iter().filter(|ok| **ok).count();
    let summary = PassSummary {
        succeeded,
        failed: results.len() - succeeded,
    };
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Policy record pass finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "policy_records_tests.rs"]
mod policy_records_tests;
