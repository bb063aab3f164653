// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Wire types exchanged with the Route53 provider.
//!
//! Field names serialize with the provider's own casing (`Name`, `TTL`,
//! `ResourceRecords`, `AliasTarget`, ...). The serialized form is what the record
//! diff compares, so optional fields are omitted when absent rather than sent as
//! `null`.

use crate::constants::HOSTED_ZONE_ID_PREFIX;
use serde::{Deserialize, Serialize};

/// One resource record set as the provider represents it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordSet {
    /// Fully qualified name with trailing dot
    pub name: String,

    /// Record type (e.g., `A`, `TXT`)
    #[serde(rename = "Type")]
    pub record_type: String,

    /// TTL in seconds, absent for alias record sets
    #[serde(rename = "TTL", default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<i64>,

    /// Plain values, empty for alias record sets
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_records: Vec<ResourceRecordValue>,

    /// Alias target, exclusive with `ttl` and `resource_records`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias_target: Option<AliasTargetSet>,

    /// Disambiguates record sets sharing name and type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_identifier: Option<String>,

    /// Weighted routing weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,

    /// Latency-based routing region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,

    /// Health check attached to this record set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_id: Option<String>,

    /// Traffic policy instance that owns this record set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_policy_instance_id: Option<String>,
}

/// A single value of a plain record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResourceRecordValue {
    /// The raw value as sent to the provider
    pub value: String,
}

impl ResourceRecordValue {
    /// Wrap a raw value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

/// Alias target of an alias record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AliasTargetSet {
    /// Hosted zone containing the target
    pub hosted_zone_id: String,

    /// Fully qualified target name
    #[serde(rename = "DNSName")]
    pub dns_name: String,

    /// Whether the provider evaluates the target's health
    pub evaluate_target_health: bool,
}

/// Action applied to a record set within a change batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeAction {
    /// Record set must not exist yet
    Create,
    /// Record set must exist and match exactly
    Delete,
    /// Create or replace
    Upsert,
}

impl ChangeAction {
    /// Provider spelling of the action.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Delete => "DELETE",
            Self::Upsert => "UPSERT",
        }
    }
}

impl std::fmt::Display for ChangeAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a change batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Change {
    /// What to do with the record set
    pub action: ChangeAction,
    /// The record set the action applies to
    #[serde(rename = "ResourceRecordSet")]
    pub record_set: RecordSet,
}

/// A hosted zone at the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostedZone {
    /// Zone id without the `/hostedzone/` prefix
    pub id: String,
    /// Zone name with trailing dot
    pub name: String,
    /// Caller reference used when the zone was created
    pub caller_reference: String,
}

/// Position from which a record set listing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSetCursor {
    /// Next record name
    pub name: String,
    /// Next record type
    pub record_type: String,
    /// Next set identifier, for record sets sharing name and type
    pub set_identifier: Option<String>,
}

/// One page of a record set listing.
#[derive(Debug, Clone, Default)]
pub struct RecordSetPage {
    /// Record sets in this page
    pub record_sets: Vec<RecordSet>,
    /// Where the next page starts, `None` on the last page
    pub next: Option<RecordSetCursor>,
}

/// Health check configuration as the provider represents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HealthCheckConfig {
    /// Probed IPv4 address
    #[serde(rename = "IPAddress")]
    pub ip_address: String,

    /// Probed port
    pub port: u16,

    /// Probe protocol (`HTTP`, `HTTPS`, `TCP`, ...)
    #[serde(rename = "Type")]
    pub check_type: String,

    /// Probed path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_path: Option<String>,

    /// Host header sent with the probe
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fully_qualified_domain_name: Option<String>,

    /// Seconds between probes
    pub request_interval: u32,

    /// Failed probes before the endpoint is considered unhealthy
    pub failure_threshold: u32,
}

/// A health check at the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Health check id
    pub id: String,
    /// Caller reference used when the health check was created
    pub caller_reference: String,
    /// Live configuration
    pub config: HealthCheckConfig,
}

/// Strip the `/hostedzone/` prefix the provider puts on zone ids.
///
/// # Example
///
/// ```rust
/// use zinc::route53::types::normalize_hosted_zone_id;
///
/// assert_eq!(normalize_hosted_zone_id("/hostedzone/Z123"), "Z123");
/// assert_eq!(normalize_hosted_zone_id("Z123"), "Z123");
/// ```
#[must_use]
pub fn normalize_hosted_zone_id(id: &str) -> String {
    id.strip_prefix(HOSTED_ZONE_ID_PREFIX)
        .unwrap_or(id)
        .to_string()
}
