// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory [`StateStore`].

use super::models::{
    Ip, MemberId, Policy, PolicyId, PolicyMember, PolicyRecord, PolicyRecordId, RoutingMode, Zone,
    ZoneId,
};
use super::StateStore;
use crate::errors::StateError;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::net::Ipv4Addr;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    next_id: u64,
    zones: BTreeMap<ZoneId, Zone>,
    policies: BTreeMap<PolicyId, Policy>,
    members: BTreeMap<MemberId, PolicyMember>,
    policy_records: BTreeMap<PolicyRecordId, PolicyRecord>,
    ips: BTreeMap<Ipv4Addr, Ip>,
}

impl Tables {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

fn not_found(kind: &'static str, id: impl ToString) -> anyhow::Error {
    StateError::NotFound {
        kind,
        id: id.to_string(),
    }
    .into()
}

fn duplicate(kind: &'static str, key: impl ToString) -> anyhow::Error {
    StateError::Duplicate {
        kind,
        key: key.to_string(),
    }
    .into()
}

/// State store holding every table in process.
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    tables: RwLock<Tables>,
}

impl MemoryStateStore {
    /// An empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn zones(&self) -> Result<Vec<Zone>> {
        Ok(self.tables.read().await.zones.values().cloned().collect())
    }

    async fn zone(&self, id: ZoneId) -> Result<Zone> {
        self.tables
            .read()
            .await
            .zones
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Zone", id))
    }

    async fn zone_by_root(&self, root: &str) -> Result<Option<Zone>> {
        Ok(self
            .tables
            .read()
            .await
            .zones
            .values()
            .find(|zone| zone.root == root)
            .cloned())
    }

    async fn insert_zone(&self, root: &str) -> Result<Zone> {
        let mut tables = self.tables.write().await;
        if tables.zones.values().any(|zone| zone.root == root) {
            return Err(duplicate("Zone", root));
        }
        let zone = Zone {
            id: ZoneId(tables.next_id()),
            root: root.to_string(),
            route53_id: None,
            caller_reference: None,
            deleted: false,
            ns_propagated: false,
            ns_checked_at: None,
        };
        tables.zones.insert(zone.id, zone.clone());
        Ok(zone)
    }

    async fn save_zone(&self, zone: &Zone) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.zones.contains_key(&zone.id) {
            return Err(not_found("Zone", zone.id));
        }
        if let Some(route53_id) = &zone.route53_id {
            let taken = tables
                .zones
                .values()
                .any(|other| other.id != zone.id && other.route53_id.as_ref() == Some(route53_id));
            if taken {
                return Err(duplicate("Zone", route53_id));
            }
        }
        tables.zones.insert(zone.id, zone.clone());
        Ok(())
    }

    async fn delete_zone(&self, id: ZoneId) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables
            .zones
            .remove(&id)
            .ok_or_else(|| not_found("Zone", id))?;
        tables.policy_records.retain(|_, record| record.zone_id != id);
        Ok(())
    }

    async fn policies(&self) -> Result<Vec<Policy>> {
        Ok(self.tables.read().await.policies.values().cloned().collect())
    }

    async fn policy(&self, id: PolicyId) -> Result<Policy> {
        self.tables
            .read()
            .await
            .policies
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("Policy", id))
    }

    async fn policy_by_name(&self, name: &str) -> Result<Option<Policy>> {
        Ok(self
            .tables
            .read()
            .await
            .policies
            .values()
            .find(|policy| policy.name == name)
            .cloned())
    }

    async fn insert_policy(&self, name: &str, routing: RoutingMode) -> Result<Policy> {
        let mut tables = self.tables.write().await;
        if tables.policies.values().any(|policy| policy.name == name) {
            return Err(duplicate("Policy", name));
        }
        let policy = Policy {
            id: PolicyId(tables.next_id()),
            name: name.to_string(),
            routing,
        };
        tables.policies.insert(policy.id, policy.clone());
        Ok(policy)
    }

    async fn members(&self, policy_id: PolicyId) -> Result<Vec<PolicyMember>> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .values()
            .filter(|member| member.policy_id == policy_id)
            .cloned()
            .collect())
    }

    async fn member(&self, id: MemberId) -> Result<PolicyMember> {
        self.tables
            .read()
            .await
            .members
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("PolicyMember", id))
    }

    async fn members_for_ip(&self, ip: Ipv4Addr) -> Result<Vec<PolicyMember>> {
        Ok(self
            .tables
            .read()
            .await
            .members
            .values()
            .filter(|member| member.ip == ip)
            .cloned()
            .collect())
    }

    async fn insert_member(
        &self,
        policy_id: PolicyId,
        ip: Ipv4Addr,
        region: &str,
        weight: u32,
    ) -> Result<PolicyMember> {
        let mut tables = self.tables.write().await;
        if !tables.policies.contains_key(&policy_id) {
            return Err(not_found("Policy", policy_id));
        }
        if !tables.ips.contains_key(&ip) {
            return Err(not_found("Ip", ip));
        }
        let member = PolicyMember {
            id: MemberId(tables.next_id()),
            policy_id,
            ip,
            region: region.to_string(),
            weight,
            enabled: true,
        };
        tables.members.insert(member.id, member.clone());
        Ok(member)
    }

    async fn save_member(&self, member: &PolicyMember) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.members.contains_key(&member.id) {
            return Err(not_found("PolicyMember", member.id));
        }
        tables.members.insert(member.id, member.clone());
        Ok(())
    }

    async fn policy_records(&self, zone_id: ZoneId) -> Result<Vec<PolicyRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .policy_records
            .values()
            .filter(|record| record.zone_id == zone_id)
            .cloned()
            .collect())
    }

    async fn policy_records_for_policy(&self, policy_id: PolicyId) -> Result<Vec<PolicyRecord>> {
        Ok(self
            .tables
            .read()
            .await
            .policy_records
            .values()
            .filter(|record| record.policy_id == policy_id)
            .cloned()
            .collect())
    }

    async fn policy_record(&self, id: PolicyRecordId) -> Result<PolicyRecord> {
        self.tables
            .read()
            .await
            .policy_records
            .get(&id)
            .cloned()
            .ok_or_else(|| not_found("PolicyRecord", id))
    }

    async fn insert_policy_record(
        &self,
        zone_id: ZoneId,
        name: &str,
        policy_id: PolicyId,
    ) -> Result<PolicyRecord> {
        let mut tables = self.tables.write().await;
        if !tables.zones.contains_key(&zone_id) {
            return Err(not_found("Zone", zone_id));
        }
        if !tables.policies.contains_key(&policy_id) {
            return Err(not_found("Policy", policy_id));
        }
        let name = name.to_ascii_lowercase();
        if tables
            .policy_records
            .values()
            .any(|record| record.zone_id == zone_id && record.name == name)
        {
            return Err(duplicate("PolicyRecord", format!("{name} in zone {zone_id}")));
        }
        let record = PolicyRecord {
            id: PolicyRecordId(tables.next_id()),
            name,
            zone_id,
            policy_id,
            dirty: true,
            deleted: false,
            revision: 1,
        };
        tables.policy_records.insert(record.id, record.clone());
        Ok(record)
    }

    async fn save_policy_record(&self, record: &PolicyRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        let Some(stored) = tables.policy_records.get(&record.id) else {
            return Err(not_found("PolicyRecord", record.id));
        };
        let mut row = record.clone();
        row.revision = stored.revision + 1;
        tables.policy_records.insert(record.id, row);
        Ok(())
    }

    async fn settle_policy_record(&self, id: PolicyRecordId, revision: u64) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let deleted = match tables.policy_records.get_mut(&id) {
            Some(row) if row.revision == revision => {
                if !row.deleted {
                    row.dirty = false;
                    row.revision += 1;
                }
                row.deleted
            }
            _ => return Ok(false),
        };
        if deleted {
            tables.policy_records.remove(&id);
        }
        Ok(true)
    }

    async fn delete_policy_record(&self, id: PolicyRecordId) -> Result<()> {
        self.tables
            .write()
            .await
            .policy_records
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("PolicyRecord", id))
    }

    async fn ips(&self) -> Result<Vec<Ip>> {
        Ok(self.tables.read().await.ips.values().cloned().collect())
    }

    async fn ip(&self, ip: Ipv4Addr) -> Result<Ip> {
        self.tables
            .read()
            .await
            .ips
            .get(&ip)
            .cloned()
            .ok_or_else(|| not_found("Ip", ip))
    }

    async fn insert_ip(&self, ip: Ip) -> Result<Ip> {
        let mut tables = self.tables.write().await;
        if tables.ips.contains_key(&ip.ip) {
            return Err(duplicate("Ip", ip.ip));
        }
        tables.ips.insert(ip.ip, ip.clone());
        Ok(ip)
    }

    async fn save_ip(&self, ip: &Ip) -> Result<()> {
        let mut tables = self.tables.write().await;
        if !tables.ips.contains_key(&ip.ip) {
            return Err(not_found("Ip", ip.ip));
        }
        tables.ips.insert(ip.ip, ip.clone());
        Ok(())
    }

    async fn delete_ip(&self, ip: Ipv4Addr) -> Result<()> {
        let mut tables = self.tables.write().await;
        tables.ips.remove(&ip).ok_or_else(|| not_found("Ip", ip))?;
        tables.members.retain(|_, member| member.ip != ip);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
