// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Route53 provider boundary.
//!
//! ## Layers
//!
//! - [`Route53Api`] - one method per provider operation, no retries
//! - [`aws::AwsRoute53`] - the real provider, backed by `aws-sdk-route53`
//! - [`memory::MemoryRoute53`] - in-memory provider with the same observable behavior,
//!   used by tests and dry runs
//! - [`client::Route53Client`] - retrying, metered client the reconcilers use
//! - [`zone_store::ZoneRecordStore`] - pass-scoped record cache and change batch for
//!   one zone

pub mod aws;
pub mod client;
pub mod memory;
pub mod retry;
pub mod types;
pub mod zone_store;

pub use client::Route53Client;
pub use retry::RetryPolicy;
pub use zone_store::ZoneRecordStore;

use crate::errors::ProviderError;
use async_trait::async_trait;
use types::{Change, HealthCheck, HealthCheckConfig, HostedZone, RecordSetCursor, RecordSetPage};

// ============================================================================
// Operation Names
// ============================================================================

/// Provider operation names, used in errors, logs and metrics
pub mod ops {
    pub const LIST_RESOURCE_RECORD_SETS: &str = "ListResourceRecordSets";
    pub const CHANGE_RESOURCE_RECORD_SETS: &str = "ChangeResourceRecordSets";
    pub const CREATE_HOSTED_ZONE: &str = "CreateHostedZone";
    pub const GET_HOSTED_ZONE: &str = "GetHostedZone";
    pub const DELETE_HOSTED_ZONE: &str = "DeleteHostedZone";
    pub const CREATE_HEALTH_CHECK: &str = "CreateHealthCheck";
    pub const GET_HEALTH_CHECK: &str = "GetHealthCheck";
    pub const DELETE_HEALTH_CHECK: &str = "DeleteHealthCheck";
}

/// Raw Route53 operations.
///
/// Implementations perform exactly one request per call and report failures as
/// [`ProviderError`]s classified by provider error code. Retrying is the job of
/// [`Route53Client`].
#[async_trait]
pub trait Route53Api: Send + Sync {
    /// List one page of record sets, starting at `start` (or the beginning).
    async fn list_resource_record_sets(
        &self,
        zone_id: &str,
        start: Option<&RecordSetCursor>,
    ) -> Result<RecordSetPage, ProviderError>;

    /// Apply a change batch atomically.
    async fn change_resource_record_sets(
        &self,
        zone_id: &str,
        changes: &[Change],
    ) -> Result<(), ProviderError>;

    /// Create a hosted zone, idempotent on `caller_reference`.
    async fn create_hosted_zone(
        &self,
        name: &str,
        caller_reference: &str,
    ) -> Result<HostedZone, ProviderError>;

    /// Fetch a hosted zone.
    async fn get_hosted_zone(&self, zone_id: &str) -> Result<HostedZone, ProviderError>;

    /// Delete a hosted zone. It must only contain its apex NS and SOA.
    async fn delete_hosted_zone(&self, zone_id: &str) -> Result<(), ProviderError>;

    /// Create a health check, idempotent on `caller_reference`.
    async fn create_health_check(
        &self,
        caller_reference: &str,
        config: &HealthCheckConfig,
    ) -> Result<HealthCheck, ProviderError>;

    /// Fetch a health check.
    async fn get_health_check(&self, health_check_id: &str) -> Result<HealthCheck, ProviderError>;

    /// Delete a health check.
    async fn delete_health_check(&self, health_check_id: &str) -> Result<(), ProviderError>;
}
