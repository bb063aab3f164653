// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Persisted-state boundary.
//!
//! The database behind the API layer is external; the reconcilers reach it through
//! the [`StateStore`] trait. [`memory::MemoryStateStore`] is the in-process
//! implementation used by tests and by the binary, which seeds it from a YAML file
//! ([`seed`]).
//!
//! The `dirty` and `deleted` flags are the only channel through which the API layer
//! asks for reconciliation work. Mutations that affect provider state go through
//! the propagation functions in [`dirty`].

pub mod dirty;
pub mod memory;
pub mod models;
pub mod seed;

pub use memory::MemoryStateStore;
pub use models::{
    Ip, MemberId, Policy, PolicyId, PolicyMember, PolicyRecord, PolicyRecordId, RoutingMode,
    Zone, ZoneId,
};

use anyhow::Result;
use async_trait::async_trait;
use std::net::Ipv4Addr;

/// Access to the persisted entities.
///
/// Lookups by id fail with [`crate::errors::StateError::NotFound`]; inserts that would
/// break a uniqueness rule fail with [`crate::errors::StateError::Duplicate`].
#[async_trait]
pub trait StateStore: Send + Sync {
    // ------------------------------------------------------------------------
    // Zones
    // ------------------------------------------------------------------------

    /// All zones, deleted ones included.
    async fn zones(&self) -> Result<Vec<Zone>>;

    /// One zone.
    async fn zone(&self, id: ZoneId) -> Result<Zone>;

    /// Zone by normalized root.
    async fn zone_by_root(&self, root: &str) -> Result<Option<Zone>>;

    /// Create a zone. `root` must already be normalized and unique.
    async fn insert_zone(&self, root: &str) -> Result<Zone>;

    /// Write back a zone. `route53_id` must be unique when set.
    async fn save_zone(&self, zone: &Zone) -> Result<()>;

    /// Remove a zone and its policy records.
    async fn delete_zone(&self, id: ZoneId) -> Result<()>;

    // ------------------------------------------------------------------------
    // Policies and members
    // ------------------------------------------------------------------------

    /// All policies.
    async fn policies(&self) -> Result<Vec<Policy>>;

    /// One policy.
    async fn policy(&self, id: PolicyId) -> Result<Policy>;

    /// Policy by unique name.
    async fn policy_by_name(&self, name: &str) -> Result<Option<Policy>>;

    /// Create a policy with a unique name.
    async fn insert_policy(&self, name: &str, routing: RoutingMode) -> Result<Policy>;

    /// Members of a policy, ordered by id.
    async fn members(&self, policy_id: PolicyId) -> Result<Vec<PolicyMember>>;

    /// One member.
    async fn member(&self, id: MemberId) -> Result<PolicyMember>;

    /// Members pointing at an IP, across all policies.
    async fn members_for_ip(&self, ip: Ipv4Addr) -> Result<Vec<PolicyMember>>;

    /// Add an enabled member to a policy.
    async fn insert_member(
        &self,
        policy_id: PolicyId,
        ip: Ipv4Addr,
        region: &str,
        weight: u32,
    ) -> Result<PolicyMember>;

    /// Write back a member.
    async fn save_member(&self, member: &PolicyMember) -> Result<()>;

    // ------------------------------------------------------------------------
    // Policy records
    // ------------------------------------------------------------------------

    /// Policy records of a zone, ordered by id.
    async fn policy_records(&self, zone_id: ZoneId) -> Result<Vec<PolicyRecord>>;

    /// Policy records referencing a policy, across all zones.
    async fn policy_records_for_policy(&self, policy_id: PolicyId) -> Result<Vec<PolicyRecord>>;

    /// One policy record.
    async fn policy_record(&self, id: PolicyRecordId) -> Result<PolicyRecord>;

    /// Create a dirty policy record; `(zone, name)` must be unique. The name is
    /// stored lowercased.
    async fn insert_policy_record(
        &self,
        zone_id: ZoneId,
        name: &str,
        policy_id: PolicyId,
    ) -> Result<PolicyRecord>;

    /// Write back a policy record. The stored revision is bumped.
    async fn save_policy_record(&self, record: &PolicyRecord) -> Result<()>;

    /// Settle a record whose provider side a pass has just written.
    ///
    /// Acts only if the row is still at `revision`: a deleted row is removed, any
    /// other row has `dirty` cleared. Returns `false` and leaves the row alone when
    /// it was written after the pass read it, or is gone.
    async fn settle_policy_record(&self, id: PolicyRecordId, revision: u64) -> Result<bool>;

    /// Remove a policy record.
    async fn delete_policy_record(&self, id: PolicyRecordId) -> Result<()>;

    // ------------------------------------------------------------------------
    // IPs
    // ------------------------------------------------------------------------

    /// All IPs, deleted ones included.
    async fn ips(&self) -> Result<Vec<Ip>>;

    /// One IP.
    async fn ip(&self, ip: Ipv4Addr) -> Result<Ip>;

    /// Create an IP; the address must be unique.
    async fn insert_ip(&self, ip: Ip) -> Result<Ip>;

    /// Write back an IP.
    async fn save_ip(&self, ip: &Ip) -> Result<()>;

    /// Remove an IP and the policy members pointing at it.
    async fn delete_ip(&self, ip: Ipv4Addr) -> Result<()>;
}
