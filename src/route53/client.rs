// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Retrying, metered Route53 client.
//!
//! Every call goes through [`retry_provider_call`] with the client's
//! [`RetryPolicy`]. Absence is reported as `None`/`false` where the reconcilers
//! treat a missing resource as a normal state rather than a failure.

use super::retry::{retry_provider_call, RetryPolicy};
use super::types::{Change, HealthCheck, HealthCheckConfig, HostedZone, RecordSet};
use super::{ops, Route53Api};
use crate::errors::ProviderError;
use crate::metrics;
use std::sync::Arc;
use tracing::{debug, info};

/// Injectable Route53 client shared by all reconcilers.
#[derive(Clone)]
pub struct Route53Client {
    api: Arc<dyn Route53Api>,
    retry: RetryPolicy,
}

impl std::fmt::Debug for Route53Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Route53Client")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl Route53Client {
    /// Create a client over a provider implementation.
    ///
    /// # Arguments
    ///
    /// * `api` - Raw provider operations
    /// * `retry` - Retry strategy applied to every call
    #[must_use]
    pub fn new(api: Arc<dyn Route53Api>, retry: RetryPolicy) -> Self {
        Self { api, retry }
    }

    /// The retry strategy in use.
    #[must_use]
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// List every record set of a zone, following pagination.
    ///
    /// # Returns
    ///
    /// `None` if the hosted zone does not exist.
    ///
    /// # Errors
    ///
    /// Returns the provider error once retries are exhausted.
    pub async fn list_all_record_sets(
        &self,
        zone_id: &str,
    ) -> Result<Option<Vec<RecordSet>>, ProviderError> {
        let mut all_sets = Vec::new();
        let mut cursor = None;
        let mut page_count = 0;

        loop {
            page_count += 1;
            let result = retry_provider_call(
                &self.retry,
                || self.api.list_resource_record_sets(zone_id, cursor.as_ref()),
                ops::LIST_RESOURCE_RECORD_SETS,
            )
            .await;

            let page = match result {
                Ok(page) => page,
                Err(e) if e.is_no_such_hosted_zone() => return Ok(None),
                Err(e) => return Err(e),
            };

            let set_count = page.record_sets.len();
            all_sets.extend(page.record_sets);

            debug!(
                zone_id = zone_id,
                page = page_count,
                sets_in_page = set_count,
                total_sets = all_sets.len(),
                "Fetched record set page from Route53"
            );

            match page.next {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }

        debug!(
            zone_id = zone_id,
            total_pages = page_count,
            total_sets = all_sets.len(),
            "Completed record set listing"
        );

        Ok(Some(all_sets))
    }

    /// Submit a change batch.
    ///
    /// # Arguments
    ///
    /// * `zone_id` - Hosted zone id
    /// * `zone_root` - Zone root, used for logs and metrics only
    /// * `changes` - Changes applied atomically
    ///
    /// # Errors
    ///
    /// Returns the provider error once retries are exhausted. Rejected batches are
    /// never retried.
    pub async fn change_record_sets(
        &self,
        zone_id: &str,
        zone_root: &str,
        changes: &[Change],
    ) -> Result<(), ProviderError> {
        retry_provider_call(
            &self.retry,
            || self.api.change_resource_record_sets(zone_id, changes),
            ops::CHANGE_RESOURCE_RECORD_SETS,
        )
        .await?;

        metrics::record_change_batch(changes);
        info!(
            zone = zone_root,
            zone_id = zone_id,
            changes = changes.len(),
            "Committed change batch"
        );
        Ok(())
    }

    /// Create a hosted zone.
    ///
    /// # Errors
    ///
    /// Returns the provider error, including caller reference conflicts.
    pub async fn create_hosted_zone(
        &self,
        name: &str,
        caller_reference: &str,
    ) -> Result<HostedZone, ProviderError> {
        let zone = retry_provider_call(
            &self.retry,
            || self.api.create_hosted_zone(name, caller_reference),
            ops::CREATE_HOSTED_ZONE,
        )
        .await?;
        metrics::record_resource_created("HostedZone");
        Ok(zone)
    }

    /// Whether a hosted zone exists.
    ///
    /// # Errors
    ///
    /// Returns any provider error other than `NoSuchHostedZone`.
    pub async fn hosted_zone_exists(&self, zone_id: &str) -> Result<bool, ProviderError> {
        match retry_provider_call(
            &self.retry,
            || self.api.get_hosted_zone(zone_id),
            ops::GET_HOSTED_ZONE,
        )
        .await
        {
            Ok(_) => Ok(true),
            Err(e) if e.is_no_such_hosted_zone() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Delete a hosted zone.
    ///
    /// # Returns
    ///
    /// `false` if the zone was already gone.
    ///
    /// # Errors
    ///
    /// Returns any provider error other than `NoSuchHostedZone`.
    pub async fn delete_hosted_zone(&self, zone_id: &str) -> Result<bool, ProviderError> {
        match retry_provider_call(
            &self.retry,
            || self.api.delete_hosted_zone(zone_id),
            ops::DELETE_HOSTED_ZONE,
        )
        .await
        {
            Ok(()) => {
                metrics::record_resource_deleted("HostedZone");
                Ok(true)
            }
            Err(e) if e.is_no_such_hosted_zone() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Create a health check.
    ///
    /// # Errors
    ///
    /// Returns the provider error, including caller reference conflicts.
    pub async fn create_health_check(
        &self,
        caller_reference: &str,
        config: &HealthCheckConfig,
    ) -> Result<HealthCheck, ProviderError> {
        let check = retry_provider_call(
            &self.retry,
            || self.api.create_health_check(caller_reference, config),
            ops::CREATE_HEALTH_CHECK,
        )
        .await?;
        metrics::record_resource_created("HealthCheck");
        Ok(check)
    }

    /// Fetch a health check.
    ///
    /// # Returns
    ///
    /// `None` if the health check does not exist.
    ///
    /// # Errors
    ///
    /// Returns any provider error other than `NoSuchHealthCheck`.
    pub async fn get_health_check(
        &self,
        health_check_id: &str,
    ) -> Result<Option<HealthCheck>, ProviderError> {
        match retry_provider_call(
            &self.retry,
            || self.api.get_health_check(health_check_id),
            ops::GET_HEALTH_CHECK,
        )
        .await
        {
            Ok(check) => Ok(Some(check)),
            Err(e) if e.is_no_such_health_check() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Delete a health check.
    ///
    /// # Returns
    ///
    /// `false` if the health check was already gone.
    ///
    /// # Errors
    ///
    /// Returns any provider error other than `NoSuchHealthCheck`.
    pub async fn delete_health_check(&self, health_check_id: &str) -> Result<bool, ProviderError> {
        match retry_provider_call(
            &self.retry,
            || self.api.delete_health_check(health_check_id),
            ops::DELETE_HEALTH_CHECK,
        )
        .await
        {
            Ok(()) => {
                metrics::record_resource_deleted("HealthCheck");
                Ok(true)
            }
            Err(e) if e.is_no_such_health_check() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
