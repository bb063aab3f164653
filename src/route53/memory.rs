// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory Route53 provider.
//!
//! [`MemoryRoute53`] keeps hosted zones, record sets and health checks in process
//! and enforces the provider rules the reconcilers depend on:
//!
//! - new hosted zones start with an apex NS and SOA record set
//! - caller references are single use; reusing one for a different request (or
//!   after the resource was deleted) fails with `HostedZoneAlreadyExists` /
//!   `HealthCheckAlreadyExists`
//! - change batches are atomic; `CREATE` of an existing record set, `DELETE` of a
//!   missing or different one, aliases to missing targets and mixed routing
//!   policies under one name and type reject the whole batch with
//!   `InvalidChangeBatch`
//! - a hosted zone can only be deleted once it holds nothing but its apex NS/SOA
//! - listings are paginated
//!
//! Failures can be injected per operation, and every call is counted, so tests can
//! assert both outcomes and the number of provider round trips.

use super::types::{
    normalize_hosted_zone_id, Change, ChangeAction, HealthCheck, HealthCheckConfig, HostedZone,
    RecordSet, RecordSetCursor, RecordSetPage, ResourceRecordValue,
};
use super::{ops, Route53Api};
use crate::constants::{
    CODE_HEALTH_CHECK_ALREADY_EXISTS, CODE_HOSTED_ZONE_ALREADY_EXISTS, CODE_INVALID_CHANGE_BATCH,
    CODE_NO_SUCH_HEALTH_CHECK, CODE_NO_SUCH_HOSTED_ZONE, RECORD_SET_PAGE_SIZE,
};
use crate::errors::ProviderError;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Error code returned when deleting a zone that still has records
const CODE_HOSTED_ZONE_NOT_EMPTY: &str = "HostedZoneNotEmpty";

/// TTL of the apex NS record set of a new zone
const APEX_NS_TTL: i64 = 172_800;

/// TTL of the apex SOA record set of a new zone
const APEX_SOA_TTL: i64 = 900;

type RecordKey = (String, String, String);

#[derive(Debug, Clone)]
struct MemoryZone {
    name: String,
    caller_reference: String,
    record_sets: BTreeMap<RecordKey, RecordSet>,
}

#[derive(Debug, Default)]
struct MemoryState {
    next_id: u64,
    zones: BTreeMap<String, MemoryZone>,
    zone_caller_references: HashMap<String, (String, String)>,
    health_checks: BTreeMap<String, HealthCheck>,
    health_check_caller_references: HashMap<String, (String, HealthCheckConfig)>,
    calls: HashMap<&'static str, usize>,
    failures: HashMap<&'static str, VecDeque<ProviderError>>,
    submitted_batches: Vec<(String, Vec<Change>)>,
}

/// In-memory implementation of [`Route53Api`].
#[derive(Debug)]
pub struct MemoryRoute53 {
    page_size: usize,
    state: Mutex<MemoryState>,
}

impl Default for MemoryRoute53 {
    fn default() -> Self {
        Self::new()
    }
}

fn record_key(set: &RecordSet) -> RecordKey {
    (
        set.name.to_ascii_lowercase(),
        set.record_type.clone(),
        set.set_identifier.clone().unwrap_or_default(),
    )
}

fn normalized(set: &RecordSet) -> RecordSet {
    let mut set = set.clone();
    set.name = set.name.to_ascii_lowercase();
    set
}

fn invalid_batch(message: String) -> ProviderError {
    ProviderError::from_code(
        ops::CHANGE_RESOURCE_RECORD_SETS,
        CODE_INVALID_CHANGE_BATCH,
        message,
    )
}

/// Routing flavour of a record set, record sets sharing name and type must agree.
fn routing_kind(set: &RecordSet) -> &'static str {
    if set.set_identifier.is_none() {
        "simple"
    } else if set.region.is_some() {
        "latency"
    } else {
        "weighted"
    }
}

impl MemoryRoute53 {
    /// Create an empty provider with the provider's page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(RECORD_SET_PAGE_SIZE)
    }

    /// Create an empty provider returning `page_size` record sets per listing page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and pop an injected failure, if any.
    fn enter(&self, operation: &'static str) -> Result<MutexGuard<'_, MemoryState>, ProviderError> {
        let mut state = self.lock();
        *state.calls.entry(operation).or_default() += 1;
        if let Some(err) = state
            .failures
            .get_mut(operation)
            .and_then(VecDeque::pop_front)
        {
            return Err(err);
        }
        Ok(state)
    }

    // ------------------------------------------------------------------------
    // Test controls
    // ------------------------------------------------------------------------

    /// Make the next `times` calls of `operation` fail with `error`.
    pub fn fail_next(&self, operation: &'static str, error: ProviderError, times: usize) {
        let mut state = self.lock();
        let queue = state.failures.entry(operation).or_default();
        for _ in 0..times {
            queue.push_back(error.clone());
        }
    }

    /// Make the next `times` calls of `operation` fail with a throttling error.
    pub fn throttle_next(&self, operation: &'static str, times: usize) {
        self.fail_next(
            operation,
            ProviderError::from_code(operation, "Throttling", "Rate exceeded"),
            times,
        );
    }

    /// Number of calls made to `operation`, failed calls included.
    #[must_use]
    pub fn call_count(&self, operation: &str) -> usize {
        self.lock().calls.get(operation).copied().unwrap_or_default()
    }

    /// Number of change batches applied successfully.
    #[must_use]
    pub fn change_batch_count(&self) -> usize {
        self.lock().submitted_batches.len()
    }

    /// Change batches applied successfully, with their zone ids, in order.
    #[must_use]
    pub fn submitted_batches(&self) -> Vec<(String, Vec<Change>)> {
        self.lock().submitted_batches.clone()
    }

    /// Ids of all hosted zones.
    #[must_use]
    pub fn hosted_zone_ids(&self) -> Vec<String> {
        self.lock().zones.keys().cloned().collect()
    }

    /// Find a hosted zone by name.
    #[must_use]
    pub fn hosted_zone_by_name(&self, name: &str) -> Option<HostedZone> {
        let name = name.to_ascii_lowercase();
        self.lock()
            .zones
            .iter()
            .find(|(_, zone)| zone.name == name)
            .map(|(id, zone)| HostedZone {
                id: id.clone(),
                name: zone.name.clone(),
                caller_reference: zone.caller_reference.clone(),
            })
    }

    /// All record sets of a zone, or an empty list for an unknown zone.
    #[must_use]
    pub fn record_sets(&self, zone_id: &str) -> Vec<RecordSet> {
        self.lock()
            .zones
            .get(&normalize_hosted_zone_id(zone_id))
            .map(|zone| zone.record_sets.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Write a record set directly, bypassing change-batch validation.
    pub fn put_record_set(&self, zone_id: &str, set: RecordSet) {
        if let Some(zone) = self.lock().zones.get_mut(&normalize_hosted_zone_id(zone_id)) {
            let set = normalized(&set);
            zone.record_sets.insert(record_key(&set), set);
        }
    }

    /// Remove a hosted zone behind the reconciler's back.
    pub fn remove_hosted_zone(&self, zone_id: &str) {
        self.lock().zones.remove(&normalize_hosted_zone_id(zone_id));
    }

    /// All health checks.
    #[must_use]
    pub fn health_checks(&self) -> Vec<HealthCheck> {
        self.lock().health_checks.values().cloned().collect()
    }

    /// Replace the configuration of a health check behind the reconciler's back.
    pub fn set_health_check_config(&self, health_check_id: &str, config: HealthCheckConfig) {
        if let Some(check) = self.lock().health_checks.get_mut(health_check_id) {
            check.config = config;
        }
    }

    /// Remove a health check behind the reconciler's back.
    pub fn remove_health_check(&self, health_check_id: &str) {
        self.lock().health_checks.remove(health_check_id);
    }

    // ------------------------------------------------------------------------
    // Change batch validation
    // ------------------------------------------------------------------------

    fn apply_changes(
        zone_id: &str,
        records: &BTreeMap<RecordKey, RecordSet>,
        changes: &[Change],
    ) -> Result<BTreeMap<RecordKey, RecordSet>, ProviderError> {
        if changes.is_empty() {
            return Err(invalid_batch("Change batch must not be empty".into()));
        }

        let mut next = records.clone();
        for change in changes {
            let set = normalized(&change.record_set);
            let key = record_key(&set);
            match change.action {
                ChangeAction::Create => {
                    if next.contains_key(&key) {
                        return Err(invalid_batch(format!(
                            "Tried to create resource record set [name='{}', type='{}'] but it already exists",
                            set.name, set.record_type
                        )));
                    }
                    next.insert(key, set);
                }
                ChangeAction::Upsert => {
                    next.insert(key, set);
                }
                ChangeAction::Delete => match next.get(&key) {
                    Some(existing) if *existing == set => {
                        next.remove(&key);
                    }
                    Some(_) => {
                        return Err(invalid_batch(format!(
                            "Tried to delete resource record set [name='{}', type='{}'] but the values provided do not match the current values",
                            set.name, set.record_type
                        )));
                    }
                    None => {
                        return Err(invalid_batch(format!(
                            "Tried to delete resource record set [name='{}', type='{}'] but it was not found",
                            set.name, set.record_type
                        )));
                    }
                },
            }
        }

        for change in changes.iter().filter(|c| c.action != ChangeAction::Delete) {
            let Some(alias) = &change.record_set.alias_target else {
                continue;
            };
            let target = alias.dns_name.to_ascii_lowercase();
            let local = normalize_hosted_zone_id(&alias.hosted_zone_id) == zone_id;
            if local && !next.keys().any(|(name, _, _)| *name == target) {
                return Err(invalid_batch(format!(
                    "Tried to create an alias that targets {target}, but that target was not found"
                )));
            }
        }

        let mut routing: HashMap<(&str, &str), &'static str> = HashMap::new();
        for ((name, record_type, _), set) in &next {
            let kind = routing_kind(set);
            match routing.insert((name.as_str(), record_type.as_str()), kind) {
                Some(previous) if previous != kind => {
                    return Err(invalid_batch(format!(
                        "RRSet of type {record_type} with DNS name {name} mixes routing policies"
                    )));
                }
                _ => {}
            }
        }

        Ok(next)
    }

    fn next_id(state: &mut MemoryState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}{:012}", state.next_id)
    }
}

#[async_trait]
impl Route53Api for MemoryRoute53 {
    async fn list_resource_record_sets(
        &self,
        zone_id: &str,
        start: Option<&RecordSetCursor>,
    ) -> Result<RecordSetPage, ProviderError> {
        let state = self.enter(ops::LIST_RESOURCE_RECORD_SETS)?;
        let zone = state
            .zones
            .get(&normalize_hosted_zone_id(zone_id))
            .ok_or_else(|| {
                ProviderError::from_code(
                    ops::LIST_RESOURCE_RECORD_SETS,
                    CODE_NO_SUCH_HOSTED_ZONE,
                    format!("No hosted zone found with ID: {zone_id}"),
                )
            })?;

        let start_key = start.map(|cursor| {
            (
                cursor.name.to_ascii_lowercase(),
                cursor.record_type.clone(),
                cursor.set_identifier.clone().unwrap_or_default(),
            )
        });
        let mut remaining = zone
            .record_sets
            .iter()
            .filter(|(key, _)| start_key.as_ref().map_or(true, |start| *key >= start));

        let record_sets: Vec<RecordSet> = remaining
            .by_ref()
            .take(self.page_size)
            .map(|(_, set)| set.clone())
            .collect();
        let next = remaining.next().map(|(_, set)| RecordSetCursor {
            name: set.name.clone(),
            record_type: set.record_type.clone(),
            set_identifier: set.set_identifier.clone(),
        });

        Ok(RecordSetPage { record_sets, next })
    }

    async fn change_resource_record_sets(
        &self,
        zone_id: &str,
        changes: &[Change],
    ) -> Result<(), ProviderError> {
        let mut state = self.enter(ops::CHANGE_RESOURCE_RECORD_SETS)?;
        let zone_id = normalize_hosted_zone_id(zone_id);
        let zone = state.zones.get_mut(&zone_id).ok_or_else(|| {
            ProviderError::from_code(
                ops::CHANGE_RESOURCE_RECORD_SETS,
                CODE_NO_SUCH_HOSTED_ZONE,
                format!("No hosted zone found with ID: {zone_id}"),
            )
        })?;

        zone.record_sets = Self::apply_changes(&zone_id, &zone.record_sets, changes)?;
        state.submitted_batches.push((zone_id, changes.to_vec()));
        Ok(())
    }

    async fn create_hosted_zone(
        &self,
        name: &str,
        caller_reference: &str,
    ) -> Result<HostedZone, ProviderError> {
        let mut state = self.enter(ops::CREATE_HOSTED_ZONE)?;
        let name = name.to_ascii_lowercase();

        if let Some((zone_id, zone_name)) = state.zone_caller_references.get(caller_reference) {
            if *zone_name == name && state.zones.contains_key(zone_id) {
                return Ok(HostedZone {
                    id: zone_id.clone(),
                    name,
                    caller_reference: caller_reference.to_string(),
                });
            }
            return Err(ProviderError::from_code(
                ops::CREATE_HOSTED_ZONE,
                CODE_HOSTED_ZONE_ALREADY_EXISTS,
                format!("A hosted zone has already been created with the caller reference {caller_reference}"),
            ));
        }

        let zone_id = Self::next_id(&mut state, "Z");
        let mut record_sets = BTreeMap::new();
        let ns = RecordSet {
            name: name.clone(),
            record_type: "NS".into(),
            ttl: Some(APEX_NS_TTL),
            resource_records: (1..=4)
                .map(|n| ResourceRecordValue::new(format!("ns-{n}.awsdns-{n:02}.example.net.")))
                .collect(),
            ..RecordSet::default()
        };
        let soa = RecordSet {
            name: name.clone(),
            record_type: "SOA".into(),
            ttl: Some(APEX_SOA_TTL),
            resource_records: vec![ResourceRecordValue::new(
                "ns-1.awsdns-01.example.net. awsdns-hostmaster.amazon.com. 1 7200 900 1209600 86400",
            )],
            ..RecordSet::default()
        };
        record_sets.insert(record_key(&ns), ns);
        record_sets.insert(record_key(&soa), soa);

        state.zones.insert(
            zone_id.clone(),
            MemoryZone {
                name: name.clone(),
                caller_reference: caller_reference.to_string(),
                record_sets,
            },
        );
        state
            .zone_caller_references
            .insert(caller_reference.to_string(), (zone_id.clone(), name.clone()));

        Ok(HostedZone {
            id: zone_id,
            name,
            caller_reference: caller_reference.to_string(),
        })
    }

    async fn get_hosted_zone(&self, zone_id: &str) -> Result<HostedZone, ProviderError> {
        let state = self.enter(ops::GET_HOSTED_ZONE)?;
        let zone_id = normalize_hosted_zone_id(zone_id);
        state
            .zones
            .get(&zone_id)
            .map(|zone| HostedZone {
                id: zone_id.clone(),
                name: zone.name.clone(),
                caller_reference: zone.caller_reference.clone(),
            })
            .ok_or_else(|| {
                ProviderError::from_code(
                    ops::GET_HOSTED_ZONE,
                    CODE_NO_SUCH_HOSTED_ZONE,
                    format!("No hosted zone found with ID: {zone_id}"),
                )
            })
    }

    async fn delete_hosted_zone(&self, zone_id: &str) -> Result<(), ProviderError> {
        let mut state = self.enter(ops::DELETE_HOSTED_ZONE)?;
        let zone_id = normalize_hosted_zone_id(zone_id);
        let zone = state.zones.get(&zone_id).ok_or_else(|| {
            ProviderError::from_code(
                ops::DELETE_HOSTED_ZONE,
                CODE_NO_SUCH_HOSTED_ZONE,
                format!("No hosted zone found with ID: {zone_id}"),
            )
        })?;

        let only_apex = zone.record_sets.values().all(|set| {
            set.name == zone.name && (set.record_type == "NS" || set.record_type == "SOA")
        });
        if !only_apex {
            return Err(ProviderError::from_code(
                ops::DELETE_HOSTED_ZONE,
                CODE_HOSTED_ZONE_NOT_EMPTY,
                "The hosted zone contains resource record sets in addition to the default NS and SOA",
            ));
        }

        state.zones.remove(&zone_id);
        Ok(())
    }

    async fn create_health_check(
        &self,
        caller_reference: &str,
        config: &HealthCheckConfig,
    ) -> Result<HealthCheck, ProviderError> {
        let mut state = self.enter(ops::CREATE_HEALTH_CHECK)?;

        if let Some((id, previous)) = state.health_check_caller_references.get(caller_reference) {
            if previous == config {
                if let Some(existing) = state.health_checks.get(id) {
                    return Ok(existing.clone());
                }
            }
            return Err(ProviderError::from_code(
                ops::CREATE_HEALTH_CHECK,
                CODE_HEALTH_CHECK_ALREADY_EXISTS,
                format!("A health check has already been created with the caller reference {caller_reference}"),
            ));
        }

        let id = Self::next_id(&mut state, "hc-");
        let check = HealthCheck {
            id: id.clone(),
            caller_reference: caller_reference.to_string(),
            config: config.clone(),
        };
        state.health_checks.insert(id.clone(), check.clone());
        state
            .health_check_caller_references
            .insert(caller_reference.to_string(), (id, config.clone()));
        Ok(check)
    }

    async fn get_health_check(&self, health_check_id: &str) -> Result<HealthCheck, ProviderError> {
        let state = self.enter(ops::GET_HEALTH_CHECK)?;
        state.health_checks.get(health_check_id).cloned().ok_or_else(|| {
            ProviderError::from_code(
                ops::GET_HEALTH_CHECK,
                CODE_NO_SUCH_HEALTH_CHECK,
                format!("A health check with id {health_check_id} does not exist"),
            )
        })
    }

    async fn delete_health_check(&self, health_check_id: &str) -> Result<(), ProviderError> {
        let mut state = self.enter(ops::DELETE_HEALTH_CHECK)?;
        state
            .health_checks
            .remove(health_check_id)
            .map(|_| ())
            .ok_or_else(|| {
                ProviderError::from_code(
                    ops::DELETE_HEALTH_CHECK,
                    CODE_NO_SUCH_HEALTH_CHECK,
                    format!("A health check with id {health_check_id} does not exist"),
                )
            })
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod memory_tests;
