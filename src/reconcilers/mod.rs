// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of zones, policy records and health checks.
//!
//! Each reconciler compares the persisted desired state with what the provider
//! reports and sends the difference. Every reconciler is safe to run repeatedly: a
//! converged entity costs list calls and nothing else.
//!
//! # Available Reconcilers
//!
//! ## Zones
//!
//! - [`reconcile_zone`] - Creates, repairs or deletes one hosted zone
//! - [`reconcile_all_zones`] - Periodic pass over every zone
//!
//! ## Policy Records
//!
//! - [`reconcile_zone_policy_records`] - Rebuilds the dirty policy records of one zone
//! - [`reconcile_dirty_policy_records`] - Lease-guarded periodic pass over all zones
//! - [`reconcile_policy_tree`] - Diffs one policy namespace against its desired tree
//!
//! ## Health Checks
//!
//! - [`reconcile_health_check`] - Creates, repairs or deletes one IP's health check
//! - [`reconcile_all_health_checks`] - Periodic pass over every IP
//!
//! # Example: One Policy-Record Pass
//!
//! ```rust,no_run
//! use zinc::context::Context;
//! use zinc::reconcilers::{reconcile_dirty_policy_records, PassOutcome};
//! use std::sync::Arc;
//!
//! async fn run_once(ctx: Arc<Context>) -> anyhow::Result<()> {
//!     match reconcile_dirty_policy_records(ctx).await? {
//!         PassOutcome::Completed(summary) => println!("{} zone(s) failed", summary.failed),
//!         PassOutcome::Skipped => println!("another worker holds the lease"),
//!     }
//!     Ok(())
//! }
//! ```

pub mod healthcheck;
pub mod policy;
pub mod policy_records;
pub mod policy_tree;
pub mod zone;

pub use healthcheck::{reconcile_all_health_checks, reconcile_health_check, HealthCheckOutcome};
pub use policy::{reconcile_policy_tree, TreeChanges};
pub use policy_records::reconcile_dirty_policy_records;
pub use policy_tree::{build_policy_tree, load_policy_tree, policy_namespace};
pub use zone::{
    reconcile_all_zones, reconcile_zone, reconcile_zone_policy_records, PolicyRecordsOutcome,
    ZoneOutcome,
};

/// Metric and log label of zone reconciliation.
pub const KIND_ZONE: &str = "Zone";
/// Metric and log label of policy-record reconciliation.
pub const KIND_POLICY_RECORD: &str = "PolicyRecord";
/// Metric and log label of health-check reconciliation.
pub const KIND_HEALTH_CHECK: &str = "HealthCheck";

/// Per-entity results of a batch pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassSummary {
    /// Entities reconciled without error
    pub succeeded: usize,
    /// Entities whose reconciliation failed and was logged
    pub failed: usize,
}

/// Result of a lease-guarded pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// The pass ran
    Completed(PassSummary),
    /// Another holder had the lease; nothing was done
    Skipped,
}
