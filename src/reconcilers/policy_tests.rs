// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `policy.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::reconcilers::policy_tree::{build_policy_tree, TreeMember};
    use crate::record::{RecordHasher, RecordType};
    use crate::route53::memory::MemoryRoute53;
    use crate::route53::types::ChangeAction;
    use crate::route53::{ops, RetryPolicy, Route53Client};
    use crate::state::{Ip, MemberId, Policy, PolicyId, PolicyMember, RoutingMode};
    use std::net::Ipv4Addr;
    use std::sync::Arc;

    const ROOT: &str = "example.com.";

    async fn setup() -> (Arc<MemoryRoute53>, ZoneRecordStore) {
        let provider = Arc::new(MemoryRoute53::new());
        let client = Route53Client::new(provider.clone(), RetryPolicy::immediate(3));
        let zone = client.create_hosted_zone(ROOT, "ref-1").await.unwrap();
        let hasher = Arc::new(RecordHasher::new("secret", 8).unwrap());
        (provider, ZoneRecordStore::new(client, hasher, zone.id, ROOT))
    }

    fn member(id: u64, last: u8, region: &str, weight: u32) -> TreeMember {
        let ip = Ipv4Addr::new(192, 0, 2, last);
        TreeMember {
            member: PolicyMember {
                id: MemberId(id),
                policy_id: PolicyId(1),
                ip,
                region: region.into(),
                weight,
                enabled: true,
            },
            ip: Ip::new(ip),
        }
    }

    fn tree(store: &ZoneRecordStore, routing: RoutingMode, members: &[TreeMember]) -> Vec<Record> {
        let policy = Policy {
            id: PolicyId(1),
            name: "pol1".into(),
            routing,
        };
        build_policy_tree(&policy, members, "_zn", store.zone_id(), ROOT).unwrap()
    }

    fn policy_set_count(provider: &MemoryRoute53, store: &ZoneRecordStore) -> usize {
        provider
            .record_sets(store.zone_id())
            .iter()
            .filter(|set| set.name.starts_with("_zn_pol1"))
            .count()
    }

    #[tokio::test]
    async fn test_creates_tree_then_is_idempotent() {
        let (provider, mut store) = setup().await;
        let desired = tree(
            &store,
            RoutingMode::Latency,
            &[member(1, 1, "us-east-1", 10), member(2, 2, "us-east-2", 10)],
        );

        let first = reconcile_policy_tree(&mut store, "_zn_pol1", &desired).await.unwrap();
        assert_eq!(
            first,
            TreeChanges {
                removed: 0,
                created: 4,
                updated: 0
            }
        );
        assert_eq!(policy_set_count(&provider, &store), 4);

        let batches = provider.change_batch_count();
        let second = reconcile_policy_tree(&mut store, "_zn_pol1", &desired).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(provider.change_batch_count(), batches, "no batch on a converged tree");
    }

    #[tokio::test]
    async fn test_weight_change_upserts_leaf() {
        let (_provider, mut store) = setup().await;
        let before = tree(&store, RoutingMode::Weighted, &[member(1, 1, "us-east-1", 10)]);
        reconcile_policy_tree(&mut store, "_zn_pol1", &before).await.unwrap();

        let after = tree(&store, RoutingMode::Weighted, &[member(1, 1, "us-east-1", 30)]);
        let changes = reconcile_policy_tree(&mut store, "_zn_pol1", &after).await.unwrap();
        assert_eq!(changes.updated, 1);
        assert_eq!(changes.created + changes.removed, 0);

        let live = store.records().await.unwrap();
        let leaf = live.values().find(|l| l.record.name == "_zn_pol1").unwrap();
        assert_eq!(leaf.record.weight, Some(30));
    }

    #[tokio::test]
    async fn test_shape_switch_removes_before_creating() {
        let (provider, mut store) = setup().await;
        let flat = tree(&store, RoutingMode::Weighted, &[member(1, 1, "us-east-1", 10)]);
        reconcile_policy_tree(&mut store, "_zn_pol1", &flat).await.unwrap();

        let latency = tree(&store, RoutingMode::Latency, &[member(1, 1, "us-east-1", 10)]);
        let changes = reconcile_policy_tree(&mut store, "_zn_pol1", &latency).await.unwrap();
        assert_eq!(changes.removed, 1);
        assert_eq!(changes.created, 2);

        let batches = provider.submitted_batches();
        let (_, removal) = &batches[batches.len() - 2];
        assert!(removal.iter().all(|c| c.action == ChangeAction::Delete));
        let (_, creation) = &batches[batches.len() - 1];
        assert!(creation.iter().all(|c| c.action == ChangeAction::Create));
    }

    #[tokio::test]
    async fn test_other_records_are_left_alone() {
        let (_provider, mut store) = setup().await;
        let www = Record::plain("www", RecordType::A, 300, vec!["198.51.100.1".into()]).unwrap();
        let other = Record::plain("_zn_pol10", RecordType::A, 30, vec!["198.51.100.2".into()]).unwrap();
        store.add_record_changes(&www).await.unwrap();
        store.add_record_changes(&other).await.unwrap();
        store.commit().await.unwrap();

        let desired = tree(&store, RoutingMode::Weighted, &[member(1, 1, "us-east-1", 10)]);
        let changes = reconcile_policy_tree(&mut store, "_zn_pol1", &desired).await.unwrap();
        assert_eq!(changes.removed, 0);

        let names: Vec<String> = store
            .records()
            .await
            .unwrap()
            .values()
            .map(|l| l.record.name.clone())
            .collect();
        assert!(names.contains(&"www".to_string()));
        assert!(names.contains(&"_zn_pol10".to_string()));
    }

    #[tokio::test]
    async fn test_empty_desired_removes_namespace() {
        let (provider, mut store) = setup().await;
        let desired = tree(
            &store,
            RoutingMode::Latency,
            &[member(1, 1, "us-east-1", 10), member(2, 2, "us-east-2", 10)],
        );
        reconcile_policy_tree(&mut store, "_zn_pol1", &desired).await.unwrap();

        let changes = reconcile_policy_tree(&mut store, "_zn_pol1", &[]).await.unwrap();
        assert_eq!(changes.removed, 4);
        assert_eq!(policy_set_count(&provider, &store), 0);
    }

    #[tokio::test]
    async fn test_rejected_batch_surfaces_error() {
        let (provider, mut store) = setup().await;
        let desired = tree(&store, RoutingMode::Weighted, &[member(1, 1, "us-east-1", 10)]);
        provider.throttle_next(ops::CHANGE_RESOURCE_RECORD_SETS, 10);

        assert!(reconcile_policy_tree(&mut store, "_zn_pol1", &desired).await.is_err());
        assert_eq!(policy_set_count(&provider, &store), 0);
    }
}
