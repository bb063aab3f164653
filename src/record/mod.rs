// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS record value objects.
//!
//! A [`Record`] is one RRset of a zone. Records are never persisted: each
//! reconciliation pass builds them either from the provider's listing
//! ([`Record::decode`]) or from desired state (the policy tree builder), compares
//! them, and throws them away.
//!
//! The record payload is a tagged union ([`RecordData`]) so that alias records can
//! never carry a TTL or plain values, and POLICY_ROUTED records always carry exactly
//! one policy reference.
//!
//! # Example
//!
//! ```rust
//! use zinc::record::{Record, RecordType};
//!
//! let record = Record::plain("www", RecordType::A, 300, vec!["192.0.2.1".into()])
//!     .unwrap()
//!     .with_set_identifier("blue")
//!     .with_weight(10);
//!
//! assert!(record.managed());
//! assert_eq!(record.ttl(), Some(300));
//! ```

pub mod identity;
pub mod wire;

pub use identity::RecordHasher;

use crate::constants::{APEX_NAME, MAX_RECORD_TTL_SECS};
use crate::errors::RecordError;
use crate::validation::{validate_record_name, validate_ttl, validate_values};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Record types understood by Zinc.
///
/// `PolicyRouted` is synthetic: it binds a name to a traffic policy and is realised
/// at the provider as an alias into the policy tree. The declaration order matters,
/// [`RecordType::code`] is derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecordType {
    /// Binds a name to a traffic policy
    #[serde(rename = "POLICY_ROUTED")]
    PolicyRouted,
    /// IPv4 address
    #[serde(rename = "A")]
    A,
    /// IPv6 address
    #[serde(rename = "AAAA")]
    Aaaa,
    /// Canonical name
    #[serde(rename = "CNAME")]
    Cname,
    /// Mail exchange
    #[serde(rename = "MX")]
    Mx,
    /// Text
    #[serde(rename = "TXT")]
    Txt,
    /// Start of authority
    #[serde(rename = "SOA")]
    Soa,
    /// Sender policy framework
    #[serde(rename = "SPF")]
    Spf,
    /// Service locator
    #[serde(rename = "SRV")]
    Srv,
    /// Name server
    #[serde(rename = "NS")]
    Ns,
}

impl RecordType {
    /// All record types in declaration order.
    pub const ALL: [RecordType; 10] = [
        RecordType::PolicyRouted,
        RecordType::A,
        RecordType::Aaaa,
        RecordType::Cname,
        RecordType::Mx,
        RecordType::Txt,
        RecordType::Soa,
        RecordType::Spf,
        RecordType::Srv,
        RecordType::Ns,
    ];

    /// Small integer used in record identities.
    ///
    /// `POLICY_ROUTED` is 0, the provider types are numbered from 1 in declaration
    /// order.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::PolicyRouted => 0,
            Self::A => 1,
            Self::Aaaa => 2,
            Self::Cname => 3,
            Self::Mx => 4,
            Self::Txt => 5,
            Self::Soa => 6,
            Self::Spf => 7,
            Self::Srv => 8,
            Self::Ns => 9,
        }
    }

    /// Canonical spelling (`A`, `AAAA`, `POLICY_ROUTED`, ...).
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PolicyRouted => "POLICY_ROUTED",
            Self::A => "A",
            Self::Aaaa => "AAAA",
            Self::Cname => "CNAME",
            Self::Mx => "MX",
            Self::Txt => "TXT",
            Self::Soa => "SOA",
            Self::Spf => "SPF",
            Self::Srv => "SRV",
            Self::Ns => "NS",
        }
    }

    /// Types that hold exactly one value.
    #[must_use]
    pub fn single_value(self) -> bool {
        matches!(self, Self::Cname | Self::PolicyRouted)
    }

    /// Types whose values are quoted character-strings on the wire.
    #[must_use]
    pub fn is_text(self) -> bool {
        matches!(self, Self::Txt | Self::Spf)
    }

    /// Whether the type exists at the provider.
    #[must_use]
    pub fn is_wire(self) -> bool {
        self != Self::PolicyRouted
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RecordError::InvalidType {
                record_type: s.to_string(),
                reason: "unsupported record type".into(),
            })
    }
}

/// Target of an alias record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AliasTarget {
    /// Fully qualified target name with trailing dot
    pub dns_name: String,
    /// Hosted zone containing the target
    pub hosted_zone_id: String,
    /// Whether the provider should evaluate the target's health
    pub evaluate_target_health: bool,
}

/// Payload of a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordData {
    /// TTL plus an ordered list of values
    Plain {
        /// TTL in seconds
        ttl: u32,
        /// Values in the order they were given
        values: Vec<String>,
    },
    /// Points at another record set of the provider
    Alias(AliasTarget),
    /// Binds the name to a traffic policy
    PolicyRouted {
        /// Policy name
        policy: String,
    },
}

/// One DNS RRset of a zone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Name relative to the zone root, `@` for the apex
    pub name: String,
    /// Record type
    pub record_type: RecordType,
    /// Payload
    pub data: RecordData,
    /// Disambiguates record sets sharing name and type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_identifier: Option<String>,
    /// Weighted routing weight
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u32>,
    /// Latency-based routing region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Health check attached to the record set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_id: Option<String>,
    /// Traffic policy instance that owns the record set (read-only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub traffic_policy_instance_id: Option<String>,
    /// Delete intent for the next change batch
    #[serde(default)]
    pub deleted: bool,
    /// Needs to be written to the provider
    #[serde(default)]
    pub dirty: bool,
}

impl Record {
    // Names compare case-insensitively; the provider hands them back lowercased.
    fn with_data(name: &str, record_type: RecordType, data: RecordData) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            record_type,
            data,
            set_identifier: None,
            weight: None,
            region: None,
            health_check_id: None,
            traffic_policy_instance_id: None,
            deleted: false,
            dirty: false,
        }
    }

    /// Build a plain record with a TTL and values.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] if the name, TTL or values are invalid for the type,
    /// or if `record_type` is `POLICY_ROUTED`.
    pub fn plain(
        name: &str,
        record_type: RecordType,
        ttl: u32,
        values: Vec<String>,
    ) -> Result<Self, RecordError> {
        if !record_type.is_wire() {
            return Err(RecordError::InvalidType {
                record_type: record_type.to_string(),
                reason: "use Record::policy_routed for policy records".into(),
            });
        }
        validate_record_name(name)?;
        validate_ttl(name, u64::from(ttl))?;
        validate_values(name, record_type, &values)?;
        Ok(Self::with_data(
            name,
            record_type,
            RecordData::Plain { ttl, values },
        ))
    }

    /// Build an alias record.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] if the name is invalid, the target name is empty, or
    /// `record_type` is `POLICY_ROUTED`.
    pub fn alias(
        name: &str,
        record_type: RecordType,
        target: AliasTarget,
    ) -> Result<Self, RecordError> {
        if !record_type.is_wire() {
            return Err(RecordError::InvalidType {
                record_type: record_type.to_string(),
                reason: "POLICY_ROUTED records cannot be aliases".into(),
            });
        }
        validate_record_name(name)?;
        if target.dns_name.is_empty() || target.hosted_zone_id.is_empty() {
            return Err(RecordError::InvalidValue {
                name: name.to_string(),
                record_type: record_type.to_string(),
                reason: "alias target needs a DNS name and a hosted zone id".into(),
            });
        }
        Ok(Self::with_data(name, record_type, RecordData::Alias(target)))
    }

    /// Build a POLICY_ROUTED record binding `name` to `policy`.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] if the name is invalid or the policy name is empty.
    pub fn policy_routed(name: &str, policy: &str) -> Result<Self, RecordError> {
        validate_record_name(name)?;
        if policy.is_empty() {
            return Err(RecordError::WrongValueCount {
                name: name.to_string(),
                record_type: RecordType::PolicyRouted.to_string(),
                expected: 1,
                actual: 0,
            });
        }
        Ok(Self::with_data(
            name,
            RecordType::PolicyRouted,
            RecordData::PolicyRouted {
                policy: policy.to_string(),
            },
        ))
    }

    /// Set the set identifier.
    #[must_use]
    pub fn with_set_identifier(mut self, set_identifier: impl Into<String>) -> Self {
        self.set_identifier = Some(set_identifier.into());
        self
    }

    /// Set the routing weight.
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = Some(weight);
        self
    }

    /// Set the latency routing region.
    #[must_use]
    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    /// Attach a health check.
    #[must_use]
    pub fn with_health_check(mut self, health_check_id: Option<String>) -> Self {
        self.health_check_id = health_check_id;
        self
    }

    /// Mark the record for deletion in the next change batch.
    #[must_use]
    pub fn marked_deleted(mut self) -> Self {
        self.deleted = true;
        self
    }

    /// TTL of a plain record, `None` for alias and POLICY_ROUTED records.
    #[must_use]
    pub fn ttl(&self) -> Option<u32> {
        match &self.data {
            RecordData::Plain { ttl, .. } => Some(*ttl),
            _ => None,
        }
    }

    /// Values of the record.
    ///
    /// Plain records return their values, POLICY_ROUTED records their policy name,
    /// alias records nothing.
    #[must_use]
    pub fn values(&self) -> Vec<String> {
        match &self.data {
            RecordData::Plain { values, .. } => values.clone(),
            RecordData::PolicyRouted { policy } => vec![policy.clone()],
            RecordData::Alias(_) => Vec::new(),
        }
    }

    /// Alias target, if this is an alias record.
    #[must_use]
    pub fn alias_target(&self) -> Option<&AliasTarget> {
        match &self.data {
            RecordData::Alias(target) => Some(target),
            _ => None,
        }
    }

    /// Whether this is an alias record.
    #[must_use]
    pub fn is_alias(&self) -> bool {
        matches!(self.data, RecordData::Alias(_))
    }

    /// Whether this is the zone apex.
    #[must_use]
    pub fn is_apex(&self) -> bool {
        self.name == APEX_NAME
    }

    /// Whether this is the apex NS or SOA record the provider maintains.
    #[must_use]
    pub fn is_apex_ns_or_soa(&self) -> bool {
        self.is_apex() && matches!(self.record_type, RecordType::Ns | RecordType::Soa)
    }

    /// Managed records are not user-editable.
    ///
    /// A record is managed when it is an alias, carries a set identifier, or is the
    /// apex NS/SOA.
    #[must_use]
    pub fn managed(&self) -> bool {
        self.is_alias() || self.set_identifier.is_some() || self.is_apex_ns_or_soa()
    }

    /// Identity of this record within a zone.
    ///
    /// Depends only on the zone id, name, type and set identifier, so changing the
    /// TTL, the values or the weight keeps the same identity.
    #[must_use]
    pub fn id(&self, zone_id: &str, hasher: &RecordHasher) -> String {
        hasher.record_id(
            zone_id,
            &self.name,
            self.record_type,
            self.set_identifier.as_deref(),
        )
    }
}

/// Clamp a provider TTL into the range a [`Record`] accepts.
pub(crate) fn ttl_from_wire(ttl: i64) -> u32 {
    u32::try_from(ttl.clamp(0, i64::from(MAX_RECORD_TTL_SECS))).unwrap_or(MAX_RECORD_TTL_SECS)
}
