// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Health check reconciliation.
//!
//! Every IP owns at most one provider health check:
//!
//! ```text
//! none -> creating -> exists -> (config drift -> delete + recreate) -> deleting -> none
//! ```
//!
//! Creating, recreating or removing a check marks the policy records using the IP
//! dirty, so the next policy-record pass writes the new check id into the leaves.

use super::{PassSummary, KIND_HEALTH_CHECK};
use crate::context::Context;
use crate::errors::error_category;
use crate::metrics;
use crate::record::wire::is_subset;
use crate::route53::types::HealthCheckConfig;
use crate::state::dirty::mark_ip_dirty;
use crate::state::Ip;
use anyhow::{Context as _, Result};
use chrono::Utc;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// What [`reconcile_health_check`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthCheckOutcome {
    /// A health check was created for an IP that had none
    Created,
    /// The live check was missing or drifted and was replaced
    Recreated,
    /// The check and the IP row were removed
    Deleted,
    /// Nothing to do
    InSync,
}

fn new_caller_reference(ip: Ipv4Addr) -> String {
    format!(
        "zinc-hc-{ip}-{}-{:016x}",
        Utc::now().timestamp_millis(),
        rand::random::<u64>()
    )
}

/// Whether the live configuration carries every desired field.
fn config_satisfies(desired: &HealthCheckConfig, live: &HealthCheckConfig) -> Result<bool> {
    let desired = serde_json::to_value(desired)?;
    let live = serde_json::to_value(live)?;
    Ok(is_subset(&desired, &live))
}

/// Reconcile the health check of one IP.
///
/// # Errors
///
/// Returns an error if the state store or the provider fails. A failed creation
/// keeps its persisted caller reference for the next attempt.
pub async fn reconcile_health_check(ctx: &Context, ip: Ipv4Addr) -> Result<HealthCheckOutcome> {
    let mut row = ctx.state.ip(ip).await?;
    debug!(
        ip = %ip,
        health_check_id = ?row.health_check_id,
        deleted = row.deleted,
        "Reconciling health check"
    );

    if row.deleted {
        if let Some(health_check_id) = &row.health_check_id {
            if !ctx.client.delete_health_check(health_check_id).await? {
                debug!(ip = %ip, health_check_id = %health_check_id, "Health check already gone");
            }
        }
        mark_ip_dirty(ctx.state.as_ref(), ip).await?;
        ctx.state.delete_ip(ip).await?;
        info!(ip = %ip, "Deleted IP and its health check");
        return Ok(HealthCheckOutcome::Deleted);
    }

    let desired = ctx.settings.health_check_config(&row);

    let outcome = match row.health_check_id.clone() {
        None => HealthCheckOutcome::Created,
        Some(health_check_id) => match ctx.client.get_health_check(&health_check_id).await? {
            Some(live) if config_satisfies(&desired, &live.config)? => {
                return Ok(HealthCheckOutcome::InSync);
            }
            Some(_) => {
                warn!(
                    ip = %ip,
                    health_check_id = %health_check_id,
                    "Health check configuration drifted, recreating"
                );
                ctx.client.delete_health_check(&health_check_id).await?;
                HealthCheckOutcome::Recreated
            }
            None => {
                warn!(
                    ip = %ip,
                    health_check_id = %health_check_id,
                    "Health check vanished at the provider, recreating"
                );
                HealthCheckOutcome::Recreated
            }
        },
    };

    if outcome == HealthCheckOutcome::Recreated {
        row.health_check_id = None;
        row.health_check_caller_reference = None;
        ctx.state.save_ip(&row).await?;
    }

    create_health_check(ctx, &mut row, &desired).await?;
    let marked = mark_ip_dirty(ctx.state.as_ref(), ip).await?;
    debug!(ip = %ip, marked = marked.len(), "Marked policy records using the IP dirty");
    Ok(outcome)
}

/// Create the health check, persisting the caller reference first.
///
/// A caller reference the provider refuses as already used is replaced once.
async fn create_health_check(ctx: &Context, row: &mut Ip, desired: &HealthCheckConfig) -> Result<()> {
    let mut regenerated = false;
    loop {
        let caller_reference = if let Some(existing) = &row.health_check_caller_reference {
            existing.clone()
        } else {
            let fresh = new_caller_reference(row.ip);
            row.health_check_caller_reference = Some(fresh.clone());
            ctx.state.save_ip(row).await?;
            fresh
        };

        match ctx
            .client
            .create_health_check(&caller_reference, desired)
            .await
        {
            Ok(check) => {
                info!(ip = %row.ip, health_check_id = %check.id, "Created health check");
                row.health_check_id = Some(check.id);
                ctx.state.save_ip(row).await?;
                return Ok(());
            }
            Err(e) if e.is_caller_reference_conflict() && !regenerated => {
                warn!(
                    ip = %row.ip,
                    caller_reference = %caller_reference,
                    "Caller reference already used, retrying with a fresh one"
                );
                row.health_check_caller_reference = None;
                ctx.state.save_ip(row).await?;
                regenerated = true;
            }
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("Failed to create health check for {}", row.ip));
            }
        }
    }
}

/// Reconcile every IP's health check, logging and skipping failures.
///
/// # Errors
///
/// Returns an error only if the IPs cannot be listed.
pub async fn reconcile_all_health_checks(ctx: Arc<Context>) -> Result<PassSummary> {
    let mut summary = PassSummary::default();

    for row in ctx.state.ips().await? {
        let start = Instant::now();
        match reconcile_health_check(&ctx, row.ip).await {
            Ok(outcome) => {
                debug!(ip = %row.ip, ?outcome, "Health check reconciled");
                metrics::record_reconciliation_success(KIND_HEALTH_CHECK, start.elapsed());
                summary.succeeded += 1;
            }
            Err(e) => {
                error!(ip = %row.ip, error = ?e, "Health check reconciliation failed");
                metrics::record_reconciliation_error(KIND_HEALTH_CHECK, start.elapsed());
                metrics::record_error(KIND_HEALTH_CHECK, error_category(&e));
                summary.failed += 1;
            }
        }
    }

    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        "Health check pass finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "healthcheck_tests.rs"]
mod healthcheck_tests;
