// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `zone.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::config::Settings;
    use crate::errors::ProviderError;
    use crate::lease::MemoryLeaseStore;
    use crate::ns_propagation::StaticLookup;
    use crate::route53::memory::MemoryRoute53;
    use crate::route53::types::RecordSet;
    use crate::route53::{ops, RetryPolicy, Route53Client};
    use crate::state::dirty;
    use crate::state::{
        Ip, MemberId, MemoryStateStore, PolicyMember, PolicyRecordId, RoutingMode, StateStore,
    };
    use std::net::Ipv4Addr;

    const ROOT: &str = "example.com.";

    struct Harness {
        ctx: Context,
        provider: Arc<MemoryRoute53>,
        state: Arc<MemoryStateStore>,
        lookup: Arc<StaticLookup>,
    }

    fn harness() -> Harness {
        let provider = Arc::new(MemoryRoute53::new());
        let state = Arc::new(MemoryStateStore::new());
        let lookup = Arc::new(StaticLookup::failing());
        let ctx = Context::new(
            Route53Client::new(provider.clone(), RetryPolicy::immediate(3)),
            state.clone(),
            Arc::new(MemoryLeaseStore::new("test")),
            Settings::with_secret("secret").unwrap(),
        )
        .unwrap()
        .with_ns_lookup(lookup.clone());
        Harness {
            ctx,
            provider,
            state,
            lookup,
        }
    }

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 0, 2, last)
    }

    /// A created zone with policy `pol1` (latency, us-east-1 and us-east-2) bound to `www`.
    async fn pol1_zone(h: &Harness) -> Zone {
        let zone = h.state.insert_zone(ROOT).await.unwrap();
        let policy = h.state.insert_policy("pol1", RoutingMode::Latency).await.unwrap();
        for (last, region) in [(1, "us-east-1"), (2, "us-east-2")] {
            h.state.insert_ip(Ip::new(addr(last))).await.unwrap();
            h.state
                .insert_member(policy.id, addr(last), region, 10)
                .await
                .unwrap();
        }
        h.state
            .insert_policy_record(zone.id, "www", policy.id)
            .await
            .unwrap();
        reconcile_zone(&h.ctx, zone.id).await.unwrap();
        h.state.zone(zone.id).await.unwrap()
    }

    fn live_names(h: &Harness, zone: &Zone) -> Vec<String> {
        let mut names: Vec<String> = h
            .provider
            .record_sets(zone.route53_id.as_deref().unwrap())
            .into_iter()
            .map(|set| set.name)
            .collect();
        names.sort();
        names
    }

    fn find_set(h: &Harness, zone: &Zone, name: &str) -> Vec<RecordSet> {
        h.provider
            .record_sets(zone.route53_id.as_deref().unwrap())
            .into_iter()
            .filter(|set| set.name == name)
            .collect()
    }

    // ------------------------------------------------------------------------
    // Hosted zone lifecycle
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_creates_hosted_zone_once() {
        let h = harness();
        let zone = h.state.insert_zone(ROOT).await.unwrap();

        assert_eq!(reconcile_zone(&h.ctx, zone.id).await.unwrap(), ZoneOutcome::Created);
        let zone = h.state.zone(zone.id).await.unwrap();
        let route53_id = zone.route53_id.clone().unwrap();
        let hosted = h.provider.hosted_zone_by_name(ROOT).unwrap();
        assert_eq!(hosted.id, route53_id);
        assert_eq!(Some(hosted.caller_reference), zone.caller_reference);

        assert_eq!(reconcile_zone(&h.ctx, zone.id).await.unwrap(), ZoneOutcome::InSync);
        assert_eq!(h.provider.hosted_zone_ids(), vec![route53_id]);
    }

    #[tokio::test]
    async fn test_failed_create_reuses_persisted_caller_reference() {
        let h = harness();
        let zone = h.state.insert_zone(ROOT).await.unwrap();
        h.provider.fail_next(
            ops::CREATE_HOSTED_ZONE,
            ProviderError::from_code(ops::CREATE_HOSTED_ZONE, "InvalidInput", "try later"),
            1,
        );

        assert!(reconcile_zone(&h.ctx, zone.id).await.is_err());
        let persisted = h.state.zone(zone.id).await.unwrap().caller_reference.unwrap();

        reconcile_zone(&h.ctx, zone.id).await.unwrap();
        let hosted = h.provider.hosted_zone_by_name(ROOT).unwrap();
        assert_eq!(hosted.caller_reference, persisted);
    }

    #[tokio::test]
    async fn test_drift_recreates_zone_and_dirties_records() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();
        let old_id = zone.route53_id.clone().unwrap();

        h.provider.remove_hosted_zone(&old_id);
        assert_eq!(
            reconcile_zone(&h.ctx, zone.id).await.unwrap(),
            ZoneOutcome::Recreated,
            "a stale caller reference is replaced once"
        );

        let zone = h.state.zone(zone.id).await.unwrap();
        assert_ne!(zone.route53_id.as_deref(), Some(old_id.as_str()));
        let records = h.state.policy_records(zone.id).await.unwrap();
        assert!(records.iter().all(|r| r.dirty));

        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();
        assert_eq!(find_set(&h, &zone, "www.example.com.").len(), 1);
    }

    #[tokio::test]
    async fn test_deleted_zone_is_emptied_and_removed() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        dirty::soft_delete_zone(h.state.as_ref(), zone.id).await.unwrap();
        assert_eq!(reconcile_zone(&h.ctx, zone.id).await.unwrap(), ZoneOutcome::Deleted);

        assert!(h.provider.hosted_zone_ids().is_empty());
        assert!(h.state.zone(zone.id).await.is_err());
        assert!(h.state.policy_records(zone.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deleted_zone_without_hosted_zone() {
        let h = harness();
        let zone = h.state.insert_zone(ROOT).await.unwrap();
        dirty::soft_delete_zone(h.state.as_ref(), zone.id).await.unwrap();

        assert_eq!(reconcile_zone(&h.ctx, zone.id).await.unwrap(), ZoneOutcome::Deleted);
        assert_eq!(h.provider.call_count(ops::DELETE_HOSTED_ZONE), 0);
        assert_eq!(h.provider.call_count(ops::CREATE_HOSTED_ZONE), 0);
    }

    #[tokio::test]
    async fn test_ns_propagation() {
        let h = harness();
        let zone = h.state.insert_zone(ROOT).await.unwrap();
        reconcile_zone(&h.ctx, zone.id).await.unwrap();
        let zone = h.state.zone(zone.id).await.unwrap();
        assert!(!zone.ns_propagated);
        assert!(zone.ns_checked_at.is_none(), "failed lookups keep the cached state");

        let ns: Vec<String> = find_set(&h, &zone, ROOT)
            .into_iter()
            .find(|set| set.record_type == "NS")
            .unwrap()
            .resource_records
            .into_iter()
            .map(|rr| rr.value.to_uppercase())
            .collect();
        h.lookup.set_answer(Some(ns));

        reconcile_zone(&h.ctx, zone.id).await.unwrap();
        let zone = h.state.zone(zone.id).await.unwrap();
        assert!(zone.ns_propagated);
        let checked_at = zone.ns_checked_at.unwrap();

        h.lookup.set_answer(Some(vec!["ns.elsewhere.example.".into()]));
        reconcile_zone(&h.ctx, zone.id).await.unwrap();
        let zone = h.state.zone(zone.id).await.unwrap();
        assert!(zone.ns_propagated, "fresh results are not re-queried");
        assert_eq!(zone.ns_checked_at, Some(checked_at));

        let mut stale = zone.clone();
        stale.ns_checked_at = Some(checked_at - chrono::Duration::days(1));
        h.state.save_zone(&stale).await.unwrap();
        reconcile_zone(&h.ctx, zone.id).await.unwrap();
        let zone = h.state.zone(zone.id).await.unwrap();
        assert!(!zone.ns_propagated, "stale results are re-queried");
        assert!(zone.ns_checked_at.unwrap() > checked_at - chrono::Duration::days(1));
    }

    #[tokio::test]
    async fn test_zone_pass_continues_past_failures() {
        let h = harness();
        let first = h.state.insert_zone("a.example.").await.unwrap();
        h.state.insert_zone("b.example.").await.unwrap();
        h.provider.fail_next(
            ops::CREATE_HOSTED_ZONE,
            ProviderError::from_code(ops::CREATE_HOSTED_ZONE, "InvalidInput", "bad"),
            1,
        );

        let summary = reconcile_all_zones(Arc::new(h.ctx.clone())).await.unwrap();
        assert_eq!(summary, PassSummary { succeeded: 1, failed: 1 });
        assert!(h.state.zone(first.id).await.unwrap().route53_id.is_none());
    }

    // ------------------------------------------------------------------------
    // Policy records
    // ------------------------------------------------------------------------

    #[tokio::test]
    async fn test_pol1_end_to_end() {
        let h = harness();
        let zone = pol1_zone(&h).await;

        let outcome = reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();
        assert_eq!(outcome.trees, 1);
        assert_eq!(outcome.records, 1);
        assert!(outcome.failed_policies.is_empty());

        assert_eq!(
            live_names(&h, &zone),
            vec![
                "_zn_pol1.example.com.",
                "_zn_pol1.example.com.",
                "_zn_pol1_us-east-1.example.com.",
                "_zn_pol1_us-east-2.example.com.",
                "example.com.",
                "example.com.",
                "www.example.com.",
            ]
        );

        let www = &find_set(&h, &zone, "www.example.com.")[0];
        let target = www.alias_target.as_ref().unwrap();
        assert_eq!(target.dns_name, "_zn_pol1.example.com.");
        assert!(!target.evaluate_target_health);

        let records = h.state.policy_records(zone.id).await.unwrap();
        assert!(records.iter().all(|r| !r.dirty));
    }

    #[tokio::test]
    async fn test_second_run_sends_nothing() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();
        let batches = h.provider.change_batch_count();

        let policy = h.state.policy_by_name("pol1").await.unwrap().unwrap();
        dirty::mark_policy_dirty(h.state.as_ref(), policy.id).await.unwrap();
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        assert_eq!(h.provider.change_batch_count(), batches);
        let records = h.state.policy_records(zone.id).await.unwrap();
        assert!(records.iter().all(|r| !r.dirty));
    }

    #[tokio::test]
    async fn test_member_change_updates_tree() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        let policy = h.state.policy_by_name("pol1").await.unwrap().unwrap();
        let east2 = h
            .state
            .members(policy.id)
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.region == "us-east-2")
            .unwrap();
        dirty::set_member_enabled(h.state.as_ref(), east2.id, false).await.unwrap();
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        assert!(find_set(&h, &zone, "_zn_pol1_us-east-2.example.com.").is_empty());
        assert_eq!(find_set(&h, &zone, "_zn_pol1.example.com.").len(), 1);
    }

    /// Store that changes a member's weight the first time the pass reads members
    /// after being armed, as a concurrent API write would.
    struct WeightChangingStore {
        inner: Arc<MemoryStateStore>,
        armed: std::sync::atomic::AtomicBool,
        member: std::sync::Mutex<Option<(MemberId, u32)>>,
    }

    #[async_trait::async_trait]
    impl StateStore for WeightChangingStore {
        async fn zones(&self) -> anyhow::Result<Vec<Zone>> {
            self.inner.zones().await
        }
        async fn zone(&self, id: ZoneId) -> anyhow::Result<Zone> {
            self.inner.zone(id).await
        }
        async fn zone_by_root(&self, root: &str) -> anyhow::Result<Option<Zone>> {
            self.inner.zone_by_root(root).await
        }
        async fn insert_zone(&self, root: &str) -> anyhow::Result<Zone> {
            self.inner.insert_zone(root).await
        }
        async fn save_zone(&self, zone: &Zone) -> anyhow::Result<()> {
            self.inner.save_zone(zone).await
        }
        async fn delete_zone(&self, id: ZoneId) -> anyhow::Result<()> {
            self.inner.delete_zone(id).await
        }
        async fn policies(&self) -> anyhow::Result<Vec<Policy>> {
            self.inner.policies().await
        }
        async fn policy(&self, id: PolicyId) -> anyhow::Result<Policy> {
            self.inner.policy(id).await
        }
        async fn policy_by_name(&self, name: &str) -> anyhow::Result<Option<Policy>> {
            self.inner.policy_by_name(name).await
        }
        async fn insert_policy(&self, name: &str, routing: RoutingMode) -> anyhow::Result<Policy> {
            self.inner.insert_policy(name, routing).await
        }
        async fn members(&self, policy_id: PolicyId) -> anyhow::Result<Vec<PolicyMember>> {
            let members = self.inner.members(policy_id).await?;
            if self.armed.swap(false, std::sync::atomic::Ordering::SeqCst) {
                let change = *self.member.lock().unwrap();
                if let Some((id, weight)) = change {
                    dirty::set_member_weight(self.inner.as_ref(), id, weight).await?;
                }
            }
            Ok(members)
        }
        async fn member(&self, id: MemberId) -> anyhow::Result<PolicyMember> {
            self.inner.member(id).await
        }
        async fn members_for_ip(&self, ip: Ipv4Addr) -> anyhow::Result<Vec<PolicyMember>> {
            self.inner.members_for_ip(ip).await
        }
        async fn insert_member(
            &self,
            policy_id: PolicyId,
            ip: Ipv4Addr,
            region: &str,
            weight: u32,
        ) -> anyhow::Result<PolicyMember> {
            self.inner.insert_member(policy_id, ip, region, weight).await
        }
        async fn save_member(&self, member: &PolicyMember) -> anyhow::Result<()> {
            self.inner.save_member(member).await
        }
        async fn policy_records(&self, zone_id: ZoneId) -> anyhow::Result<Vec<PolicyRecord>> {
            self.inner.policy_records(zone_id).await
        }
        async fn policy_records_for_policy(
            &self,
            policy_id: PolicyId,
        ) -> anyhow::Result<Vec<PolicyRecord>> {
            self.inner.policy_records_for_policy(policy_id).await
        }
        async fn policy_record(&self, id: PolicyRecordId) -> anyhow::Result<PolicyRecord> {
            self.inner.policy_record(id).await
        }
        async fn insert_policy_record(
            &self,
            zone_id: ZoneId,
            name: &str,
            policy_id: PolicyId,
        ) -> anyhow::Result<PolicyRecord> {
            self.inner.insert_policy_record(zone_id, name, policy_id).await
        }
        async fn save_policy_record(&self, record: &PolicyRecord) -> anyhow::Result<()> {
            self.inner.save_policy_record(record).await
        }
        async fn settle_policy_record(
            &self,
            id: PolicyRecordId,
            revision: u64,
        ) -> anyhow::Result<bool> {
            self.inner.settle_policy_record(id, revision).await
        }
        async fn delete_policy_record(&self, id: PolicyRecordId) -> anyhow::Result<()> {
            self.inner.delete_policy_record(id).await
        }
        async fn ips(&self) -> anyhow::Result<Vec<Ip>> {
            self.inner.ips().await
        }
        async fn ip(&self, ip: Ipv4Addr) -> anyhow::Result<Ip> {
            self.inner.ip(ip).await
        }
        async fn insert_ip(&self, ip: Ip) -> anyhow::Result<Ip> {
            self.inner.insert_ip(ip).await
        }
        async fn save_ip(&self, ip: &Ip) -> anyhow::Result<()> {
            self.inner.save_ip(ip).await
        }
        async fn delete_ip(&self, ip: Ipv4Addr) -> anyhow::Result<()> {
            self.inner.delete_ip(ip).await
        }
    }

    #[tokio::test]
    async fn test_write_during_pass_keeps_record_dirty() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        let store = Arc::new(WeightChangingStore {
            inner: h.state.clone(),
            armed: std::sync::atomic::AtomicBool::new(false),
            member: std::sync::Mutex::new(None),
        });
        let ctx = Context {
            state: store.clone(),
            ..h.ctx.clone()
        };

        let policy = h.state.policy_by_name("pol1").await.unwrap().unwrap();
        let east1 = h
            .state
            .members(policy.id)
            .await
            .unwrap()
            .into_iter()
            .find(|m| m.region == "us-east-1")
            .unwrap();
        *store.member.lock().unwrap() = Some((east1.id, 20));
        store.armed.store(true, std::sync::atomic::Ordering::SeqCst);

        let outcome = reconcile_zone_policy_records(&ctx, zone.id).await.unwrap();
        assert_eq!(outcome.records, 0);
        let leaf = &find_set(&h, &zone, "_zn_pol1_us-east-1.example.com.")[0];
        assert_eq!(leaf.weight, Some(10), "the pass built from what it read");
        assert!(h.state.policy_records(zone.id).await.unwrap()[0].dirty);

        reconcile_zone_policy_records(&ctx, zone.id).await.unwrap();
        let leaf = &find_set(&h, &zone, "_zn_pol1_us-east-1.example.com.")[0];
        assert_eq!(leaf.weight, Some(20));
        assert!(!h.state.policy_records(zone.id).await.unwrap()[0].dirty);
    }

    #[tokio::test]
    async fn test_policy_switch_during_pass_is_kept() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        let other = h.state.insert_policy("pol2", RoutingMode::Weighted).await.unwrap();
        let record = h.state.policy_records(zone.id).await.unwrap().remove(0);

        // A row read by a pass, then switched before the pass settles it.
        dirty::set_policy_record_policy(h.state.as_ref(), record.id, other.id)
            .await
            .unwrap();
        assert!(!h.state.settle_policy_record(record.id, record.revision).await.unwrap());

        let row = h.state.policy_record(record.id).await.unwrap();
        assert_eq!(row.policy_id, other.id);
        assert!(row.dirty);
    }

    #[tokio::test]
    async fn test_unapplicable_policy_leaves_records_untouched() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        let pol2 = h.state.insert_policy("pol2", RoutingMode::Weighted).await.unwrap();
        h.state.insert_ip(Ip::new(addr(9))).await.unwrap();
        h.state.insert_member(pol2.id, addr(9), "us-east-1", 0).await.unwrap();
        let api = h
            .state
            .insert_policy_record(zone.id, "api", pol2.id)
            .await
            .unwrap();

        let outcome = reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();
        assert_eq!(outcome.failed_policies, vec!["pol2".to_string()]);
        assert!(h.state.policy_record(api.id).await.unwrap().dirty);
        assert!(find_set(&h, &zone, "api.example.com.").is_empty());
        assert_eq!(find_set(&h, &zone, "www.example.com.").len(), 1);
    }

    #[tokio::test]
    async fn test_shared_policy_survives_one_deletion() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        let policy = h.state.policy_by_name("pol1").await.unwrap().unwrap();
        let api = h
            .state
            .insert_policy_record(zone.id, "api", policy.id)
            .await
            .unwrap();
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        let www = h
            .state
            .policy_records(zone.id)
            .await
            .unwrap()
            .into_iter()
            .find(|r| r.name == "www")
            .unwrap();
        dirty::soft_delete_policy_record(h.state.as_ref(), www.id).await.unwrap();
        let outcome = reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        assert_eq!(outcome.collected, 0);
        assert!(find_set(&h, &zone, "www.example.com.").is_empty());
        assert_eq!(find_set(&h, &zone, "_zn_pol1.example.com.").len(), 2);
        assert!(h.state.policy_record(www.id).await.is_err(), "row removed");

        dirty::soft_delete_policy_record(h.state.as_ref(), api.id).await.unwrap();
        let outcome = reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();
        assert_eq!(outcome.collected, 1);
        assert_eq!(live_names(&h, &zone), vec!["example.com.", "example.com."]);
    }

    #[tokio::test]
    async fn test_policy_switch_collects_old_tree() {
        let h = harness();
        let zone = pol1_zone(&h).await;
        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        let pol2 = h.state.insert_policy("pol2", RoutingMode::Weighted).await.unwrap();
        h.state.insert_member(pol2.id, addr(1), "us-east-1", 5).await.unwrap();
        let www = h.state.policy_records(zone.id).await.unwrap()[0].clone();
        dirty::set_policy_record_policy(h.state.as_ref(), www.id, pol2.id)
            .await
            .unwrap();

        let outcome = reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();
        assert_eq!(outcome.collected, 1);
        assert_eq!(
            live_names(&h, &zone),
            vec![
                "_zn_pol2.example.com.",
                "example.com.",
                "example.com.",
                "www.example.com.",
            ]
        );
        let www_set = &find_set(&h, &zone, "www.example.com.")[0];
        assert_eq!(
            www_set.alias_target.as_ref().unwrap().dns_name,
            "_zn_pol2.example.com."
        );
    }

    #[tokio::test]
    async fn test_one_ip_in_two_regions() {
        let h = harness();
        let zone = h.state.insert_zone(ROOT).await.unwrap();
        let policy = h.state.insert_policy("pol1", RoutingMode::Latency).await.unwrap();
        let shared = Ipv4Addr::new(1, 2, 3, 4);
        h.state.insert_ip(Ip::new(shared)).await.unwrap();
        for region in ["us-east-1", "us-east-2"] {
            h.state
                .insert_member(policy.id, shared, region, 10)
                .await
                .unwrap();
        }
        h.state
            .insert_policy_record(zone.id, "www", policy.id)
            .await
            .unwrap();
        reconcile_zone(&h.ctx, zone.id).await.unwrap();
        let zone = h.state.zone(zone.id).await.unwrap();

        reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap();

        for region in ["us-east-1", "us-east-2"] {
            let leaf = &find_set(&h, &zone, &format!("_zn_pol1_{region}.example.com."))[0];
            assert_eq!(leaf.ttl, Some(30));
            assert_eq!(leaf.weight, Some(10));
            assert_eq!(leaf.resource_records[0].value, "1.2.3.4");
        }
        let mut aliases: Vec<(String, String)> = find_set(&h, &zone, "_zn_pol1.example.com.")
            .into_iter()
            .map(|set| {
                let target = set.alias_target.unwrap();
                assert!(target.evaluate_target_health);
                (set.region.unwrap(), target.dns_name)
            })
            .collect();
        aliases.sort();
        assert_eq!(
            aliases,
            vec![
                ("us-east-1".to_string(), "_zn_pol1_us-east-1.example.com.".to_string()),
                ("us-east-2".to_string(), "_zn_pol1_us-east-2.example.com.".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_policy_records_need_hosted_zone() {
        let h = harness();
        let zone = h.state.insert_zone(ROOT).await.unwrap();
        let err = reconcile_zone_policy_records(&h.ctx, zone.id).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ZoneError>(),
            Some(ZoneError::NotCreated { .. })
        ));
    }
}
