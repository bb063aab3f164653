// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Route53 provider backed by `aws-sdk-route53`.
//!
//! Converts between the SDK's builder types and the crate's wire types, and maps
//! SDK failures onto [`ProviderError`]:
//!
//! | SDK failure | `ProviderError` |
//! |-------------|-----------------|
//! | service error with a throttling code | `Throttled` |
//! | service error with any other code | `Api` |
//! | timeout, dispatch or response failure | `Transient` |
//! | request construction failure | `InvalidRequest` |

use super::types::{
    normalize_hosted_zone_id, AliasTargetSet, Change, ChangeAction, HealthCheck,
    HealthCheckConfig, HostedZone, RecordSet, RecordSetCursor, RecordSetPage,
    ResourceRecordValue,
};
use super::{ops, Route53Api};
use crate::constants::RECORD_SET_PAGE_SIZE;
use crate::errors::ProviderError;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_route53::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_route53::types as sdk;
use aws_sdk_route53::Client;
use std::fmt::{Debug, Display};
use tracing::debug;

/// Route53 provider using the AWS SDK.
#[derive(Debug, Clone)]
pub struct AwsRoute53 {
    client: Client,
}

impl AwsRoute53 {
    /// Wrap an SDK client.
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build a client from the default AWS credential and region chain.
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        debug!(region = ?config.region(), "Loaded AWS configuration");
        Self::new(Client::new(&config))
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

fn provider_error<E, R>(operation: &str, err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
    R: Debug,
{
    if let Some(code) = err.code() {
        return ProviderError::from_code(operation, code, err.message().unwrap_or_default());
    }
    let message = DisplayErrorContext(&err).to_string();
    match err {
        SdkError::ConstructionFailure(_) => ProviderError::InvalidRequest {
            operation: operation.to_string(),
            message,
        },
        _ => ProviderError::Transient {
            operation: operation.to_string(),
            message,
        },
    }
}

fn invalid_request(operation: &str, err: impl Display) -> ProviderError {
    ProviderError::InvalidRequest {
        operation: operation.to_string(),
        message: err.to_string(),
    }
}

fn missing_field(operation: &str, field: &str) -> ProviderError {
    ProviderError::Transient {
        operation: operation.to_string(),
        message: format!("response did not contain {field}"),
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn to_sdk_record_set(set: &RecordSet) -> Result<sdk::ResourceRecordSet, ProviderError> {
    let op = ops::CHANGE_RESOURCE_RECORD_SETS;
    let mut builder = sdk::ResourceRecordSet::builder()
        .name(&set.name)
        .r#type(sdk::RrType::from(set.record_type.as_str()))
        .set_ttl(set.ttl)
        .set_set_identifier(set.set_identifier.clone())
        .set_weight(set.weight)
        .set_region(set.region.as_deref().map(sdk::ResourceRecordSetRegion::from))
        .set_health_check_id(set.health_check_id.clone())
        .set_traffic_policy_instance_id(set.traffic_policy_instance_id.clone());

    for value in &set.resource_records {
        let record = sdk::ResourceRecord::builder()
            .value(&value.value)
            .build()
            .map_err(|e| invalid_request(op, e))?;
        builder = builder.resource_records(record);
    }

    if let Some(alias) = &set.alias_target {
        let target = sdk::AliasTarget::builder()
            .hosted_zone_id(&alias.hosted_zone_id)
            .dns_name(&alias.dns_name)
            .evaluate_target_health(alias.evaluate_target_health)
            .build()
            .map_err(|e| invalid_request(op, e))?;
        builder = builder.alias_target(target);
    }

    builder.build().map_err(|e| invalid_request(op, e))
}

fn from_sdk_record_set(set: &sdk::ResourceRecordSet) -> RecordSet {
    RecordSet {
        name: set.name().to_string(),
        record_type: set.r#type().as_str().to_string(),
        ttl: set.ttl(),
        resource_records: set
            .resource_records()
            .iter()
            .map(|rr| ResourceRecordValue::new(rr.value()))
            .collect(),
        alias_target: set.alias_target().map(|alias| AliasTargetSet {
            hosted_zone_id: normalize_hosted_zone_id(alias.hosted_zone_id()),
            dns_name: alias.dns_name().to_string(),
            evaluate_target_health: alias.evaluate_target_health(),
        }),
        set_identifier: set.set_identifier().map(str::to_string),
        weight: set.weight(),
        region: set.region().map(|r| r.as_str().to_string()),
        health_check_id: set.health_check_id().map(str::to_string),
        traffic_policy_instance_id: set.traffic_policy_instance_id().map(str::to_string),
    }
}

fn to_sdk_change(change: &Change) -> Result<sdk::Change, ProviderError> {
    let action = match change.action {
        ChangeAction::Create => sdk::ChangeAction::Create,
        ChangeAction::Delete => sdk::ChangeAction::Delete,
        ChangeAction::Upsert => sdk::ChangeAction::Upsert,
    };
    sdk::Change::builder()
        .action(action)
        .resource_record_set(to_sdk_record_set(&change.record_set)?)
        .build()
        .map_err(|e| invalid_request(ops::CHANGE_RESOURCE_RECORD_SETS, e))
}

fn to_sdk_health_check_config(
    config: &HealthCheckConfig,
) -> Result<sdk::HealthCheckConfig, ProviderError> {
    sdk::HealthCheckConfig::builder()
        .ip_address(&config.ip_address)
        .port(i32::from(config.port))
        .r#type(sdk::HealthCheckType::from(config.check_type.as_str()))
        .set_resource_path(config.resource_path.clone())
        .set_fully_qualified_domain_name(config.fully_qualified_domain_name.clone())
        .request_interval(i32::try_from(config.request_interval).unwrap_or(i32::MAX))
        .failure_threshold(i32::try_from(config.failure_threshold).unwrap_or(i32::MAX))
        .build()
        .map_err(|e| invalid_request(ops::CREATE_HEALTH_CHECK, e))
}

fn from_sdk_health_check(check: &sdk::HealthCheck) -> HealthCheck {
    let config = check.health_check_config();
    HealthCheck {
        id: check.id().to_string(),
        caller_reference: check.caller_reference().to_string(),
        config: HealthCheckConfig {
            ip_address: config
                .and_then(sdk::HealthCheckConfig::ip_address)
                .unwrap_or_default()
                .to_string(),
            port: config
                .and_then(sdk::HealthCheckConfig::port)
                .and_then(|p| u16::try_from(p).ok())
                .unwrap_or_default(),
            check_type: config
                .map(|c| c.r#type().as_str().to_string())
                .unwrap_or_default(),
            resource_path: config
                .and_then(sdk::HealthCheckConfig::resource_path)
                .map(str::to_string),
            fully_qualified_domain_name: config
                .and_then(sdk::HealthCheckConfig::fully_qualified_domain_name)
                .map(str::to_string),
            request_interval: config
                .and_then(sdk::HealthCheckConfig::request_interval)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or_default(),
            failure_threshold: config
                .and_then(sdk::HealthCheckConfig::failure_threshold)
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or_default(),
        },
    }
}

fn from_sdk_hosted_zone(zone: &sdk::HostedZone) -> HostedZone {
    HostedZone {
        id: normalize_hosted_zone_id(zone.id()),
        name: zone.name().to_string(),
        caller_reference: zone.caller_reference().to_string(),
    }
}

// ============================================================================
// Provider Implementation
// ============================================================================

#[async_trait]
impl Route53Api for AwsRoute53 {
    async fn list_resource_record_sets(
        &self,
        zone_id: &str,
        start: Option<&RecordSetCursor>,
    ) -> Result<RecordSetPage, ProviderError> {
        let op = ops::LIST_RESOURCE_RECORD_SETS;
        let mut request = self
            .client
            .list_resource_record_sets()
            .hosted_zone_id(zone_id)
            .max_items(i32::try_from(RECORD_SET_PAGE_SIZE).unwrap_or(i32::MAX));
        if let Some(cursor) = start {
            request = request
                .start_record_name(&cursor.name)
                .start_record_type(sdk::RrType::from(cursor.record_type.as_str()))
                .set_start_record_identifier(cursor.set_identifier.clone());
        }

        let output = request.send().await.map_err(|e| provider_error(op, e))?;

        let record_sets = output
            .resource_record_sets()
            .iter()
            .map(from_sdk_record_set)
            .collect();
        let next = if output.is_truncated() {
            output.next_record_name().map(|name| RecordSetCursor {
                name: name.to_string(),
                record_type: output
                    .next_record_type()
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_default(),
                set_identifier: output.next_record_identifier().map(str::to_string),
            })
        } else {
            None
        };

        Ok(RecordSetPage { record_sets, next })
    }

    async fn change_resource_record_sets(
        &self,
        zone_id: &str,
        changes: &[Change],
    ) -> Result<(), ProviderError> {
        let op = ops::CHANGE_RESOURCE_RECORD_SETS;
        let changes = changes
            .iter()
            .map(to_sdk_change)
            .collect::<Result<Vec<_>, _>>()?;
        let batch = sdk::ChangeBatch::builder()
            .set_changes(Some(changes))
            .build()
            .map_err(|e| invalid_request(op, e))?;

        let output = self
            .client
            .change_resource_record_sets()
            .hosted_zone_id(zone_id)
            .change_batch(batch)
            .send()
            .await
            .map_err(|e| provider_error(op, e))?;

        debug!(
            zone_id = zone_id,
            change_id = ?output.change_info().map(sdk::ChangeInfo::id),
            "Change batch accepted"
        );
        Ok(())
    }

    async fn create_hosted_zone(
        &self,
        name: &str,
        caller_reference: &str,
    ) -> Result<HostedZone, ProviderError> {
        let op = ops::CREATE_HOSTED_ZONE;
        let output = self
            .client
            .create_hosted_zone()
            .name(name)
            .caller_reference(caller_reference)
            .send()
            .await
            .map_err(|e| provider_error(op, e))?;

        output
            .hosted_zone()
            .map(from_sdk_hosted_zone)
            .ok_or_else(|| missing_field(op, "HostedZone"))
    }

    async fn get_hosted_zone(&self, zone_id: &str) -> Result<HostedZone, ProviderError> {
        let op = ops::GET_HOSTED_ZONE;
        let output = self
            .client
            .get_hosted_zone()
            .id(zone_id)
            .send()
            .await
            .map_err(|e| provider_error(op, e))?;

        output
            .hosted_zone()
            .map(from_sdk_hosted_zone)
            .ok_or_else(|| missing_field(op, "HostedZone"))
    }

    async fn delete_hosted_zone(&self, zone_id: &str) -> Result<(), ProviderError> {
        self.client
            .delete_hosted_zone()
            .id(zone_id)
            .send()
            .await
            .map_err(|e| provider_error(ops::DELETE_HOSTED_ZONE, e))?;
        Ok(())
    }

    async fn create_health_check(
        &self,
        caller_reference: &str,
        config: &HealthCheckConfig,
    ) -> Result<HealthCheck, ProviderError> {
        let op = ops::CREATE_HEALTH_CHECK;
        let output = self
            .client
            .create_health_check()
            .caller_reference(caller_reference)
            .health_check_config(to_sdk_health_check_config(config)?)
            .send()
            .await
            .map_err(|e| provider_error(op, e))?;

        output
            .health_check()
            .map(from_sdk_health_check)
            .ok_or_else(|| missing_field(op, "HealthCheck"))
    }

    async fn get_health_check(&self, health_check_id: &str) -> Result<HealthCheck, ProviderError> {
        let op = ops::GET_HEALTH_CHECK;
        let output = self
            .client
            .get_health_check()
            .health_check_id(health_check_id)
            .send()
            .await
            .map_err(|e| provider_error(op, e))?;

        output
            .health_check()
            .map(from_sdk_health_check)
            .ok_or_else(|| missing_field(op, "HealthCheck"))
    }

    async fn delete_health_check(&self, health_check_id: &str) -> Result<(), ProviderError> {
        self.client
            .delete_health_check()
            .health_check_id(health_check_id)
            .send()
            .await
            .map_err(|e| provider_error(ops::DELETE_HEALTH_CHECK, e))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "aws_tests.rs"]
mod aws_tests;
