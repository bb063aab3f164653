// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persisted entities.
//!
//! The surrounding API layer owns these rows; the reconcilers read them and only
//! write back provider ids, idempotency tokens and the `dirty`/`deleted` flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

entity_id!(
    /// Primary key of a [`Zone`]
    ZoneId
);
entity_id!(
    /// Primary key of a [`Policy`]
    PolicyId
);
entity_id!(
    /// Primary key of a [`PolicyMember`]
    MemberId
);
entity_id!(
    /// Primary key of a [`PolicyRecord`]
    PolicyRecordId
);

/// A DNS zone, 1:1 with a hosted zone at the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zone {
    /// Primary key
    pub id: ZoneId,

    /// Zone root, lowercase with trailing dot
    pub root: String,

    /// Hosted zone id, unset until the zone is created at the provider
    #[serde(default)]
    pub route53_id: Option<String>,

    /// Idempotency token for hosted zone creation, persisted before the call
    #[serde(default)]
    pub caller_reference: Option<String>,

    /// Delete intent; a deleted zone only moves toward deletion
    #[serde(default)]
    pub deleted: bool,

    /// Whether the public resolver returned the provider's name servers last time
    #[serde(default)]
    pub ns_propagated: bool,

    /// When the NS propagation state was last refreshed
    #[serde(default)]
    pub ns_checked_at: Option<DateTime<Utc>>,
}

/// How a policy spreads traffic across its members.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingMode {
    /// Weighted across members; a single region yields a flat tree
    #[default]
    Weighted,
    /// Latency-based across regions, weighted within each region
    Latency,
}

impl fmt::Display for RoutingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Weighted => f.write_str("weighted"),
            Self::Latency => f.write_str("latency"),
        }
    }
}

/// A named traffic routing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Primary key
    pub id: PolicyId,
    /// Unique name, lowercase alphanumerics and hyphens
    pub name: String,
    /// Tree shape selector
    pub routing: RoutingMode,
}

/// One IP's participation in a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMember {
    /// Primary key
    pub id: MemberId,
    /// Owning policy
    pub policy_id: PolicyId,
    /// Backend endpoint
    pub ip: Ipv4Addr,
    /// Provider region (e.g., `us-east-1`)
    pub region: String,
    /// Routing weight; 0 keeps the member out of the tree
    pub weight: u32,
    /// Soft on/off switch
    pub enabled: bool,
}

/// Binds a record name within a zone to a policy (a POLICY_ROUTED record).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    /// Primary key
    pub id: PolicyRecordId,
    /// Record name relative to the zone root
    pub name: String,
    /// Owning zone
    pub zone_id: ZoneId,
    /// Referenced policy
    pub policy_id: PolicyId,
    /// Provider side is stale and needs a rebuild
    pub dirty: bool,
    /// Delete intent
    pub deleted: bool,
    /// Bumped by the store on every write
    #[serde(default)]
    pub revision: u64,
}

/// A backend endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ip {
    /// The address, also the primary key
    pub ip: Ipv4Addr,

    /// Host name of the endpoint
    #[serde(default)]
    pub hostname: Option<String>,

    /// Human readable label
    #[serde(default)]
    pub friendly_name: Option<String>,

    /// Soft on/off switch
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delete intent
    #[serde(default)]
    pub deleted: bool,

    /// Provider health check id
    #[serde(default)]
    pub health_check_id: Option<String>,

    /// Idempotency token for health check creation, persisted before the call
    #[serde(default)]
    pub health_check_caller_reference: Option<String>,
}

fn default_true() -> bool {
    true
}

impl Ip {
    /// A new, enabled endpoint without a health check.
    #[must_use]
    pub fn new(ip: Ipv4Addr) -> Self {
        Self {
            ip,
            hostname: None,
            friendly_name: None,
            enabled: true,
            deleted: false,
            health_check_id: None,
            health_check_caller_reference: None,
        }
    }
}
