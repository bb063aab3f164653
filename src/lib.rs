// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # Zinc - Route53 zone and traffic policy reconciler
//!
//! Zinc keeps Route53 hosted zones, record sets and health checks in line with a
//! persisted desired state of zones, traffic policies, policy members, policy records
//! and backend IPs.
//!
//! ## Overview
//!
//! A policy routes traffic across IPs, weighted or by latency region. Binding a
//! record name to a policy (a `POLICY_ROUTED` record) makes Zinc build a tree of
//! alias and weighted A records under a reserved namespace of the zone and point the
//! name at the tree root. Changes to policies, members or IPs mark the affected
//! policy records dirty; a periodic, lease-guarded pass rebuilds them.
//!
//! ## Modules
//!
//! - [`record`] - Record model, wire encoding and record identities
//! - [`route53`] - Provider API, retrying client and the per-zone record store
//! - [`state`] - Persisted entities and dirty-marking operations
//! - [`reconcilers`] - Zone, policy-record and health-check reconciliation
//! - [`zone_records`] - Listing and applying user records of a zone
//! - [`lease`] - Leases serializing the policy-record pass
//! - [`ns_propagation`] - Name server delegation check
//! - [`config`] - Command line and environment settings
//! - [`metrics`] - Prometheus metrics
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zinc::config::Settings;
//! use zinc::context::Context;
//! use zinc::lease::MemoryLeaseStore;
//! use zinc::reconcilers::reconcile_all_zones;
//! use zinc::route53::{aws::AwsRoute53, Route53Client};
//! use zinc::state::MemoryStateStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let settings = Settings::with_secret("s3cr3t")?;
//! let client = Route53Client::new(
//!     Arc::new(AwsRoute53::from_env().await),
//!     settings.retry_policy(),
//! );
//! let ctx = Context::new(
//!     client,
//!     Arc::new(MemoryStateStore::new()),
//!     Arc::new(MemoryLeaseStore::new("worker-1")),
//!     settings,
//! )?;
//! let summary = reconcile_all_zones(Arc::new(ctx)).await?;
//! println!("{} zone(s) failed", summary.failed);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod lease;
pub mod metrics;
pub mod ns_propagation;
pub mod reconcilers;
pub mod record;
pub mod route53;
pub mod state;
pub mod validation;
pub mod zone_records;
