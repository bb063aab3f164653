// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `dirty.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::state::{Ip, MemoryStateStore, PolicyMember, RoutingMode};

    struct Fixture {
        store: MemoryStateStore,
        zone: ZoneId,
        pol1: PolicyId,
        pol2: PolicyId,
        member: PolicyMember,
    }

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 0, 2, last)
    }

    /// Two policies in one zone; only `pol1` has a member on 192.0.2.1.
    async fn fixture() -> Fixture {
        let store = MemoryStateStore::new();
        let zone = store.insert_zone("example.com.").await.unwrap();
        let pol1 = store.insert_policy("pol1", RoutingMode::Weighted).await.unwrap();
        let pol2 = store.insert_policy("pol2", RoutingMode::Weighted).await.unwrap();
        store.insert_ip(Ip::new(addr(1))).await.unwrap();
        store.insert_ip(Ip::new(addr(2))).await.unwrap();
        let member = store
            .insert_member(pol1.id, addr(1), "us-east-1", 10)
            .await
            .unwrap();
        store.insert_member(pol2.id, addr(2), "us-east-1", 10).await.unwrap();

        for (name, policy) in [("www", pol1.id), ("api", pol1.id), ("cdn", pol2.id)] {
            let mut record = store.insert_policy_record(zone.id, name, policy).await.unwrap();
            record.dirty = false;
            store.save_policy_record(&record).await.unwrap();
        }

        Fixture {
            store,
            zone: zone.id,
            pol1: pol1.id,
            pol2: pol2.id,
            member,
        }
    }

    async fn dirty_names(f: &Fixture) -> Vec<String> {
        let mut names: Vec<String> = f
            .store
            .policy_records(f.zone)
            .await
            .unwrap()
            .into_iter()
            .filter(|r| r.dirty)
            .map(|r| r.name)
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_member_weight_marks_only_its_policy() {
        let f = fixture().await;
        let marked = set_member_weight(&f.store, f.member.id, 0).await.unwrap();

        assert_eq!(marked.len(), 2);
        assert_eq!(dirty_names(&f).await, vec!["api", "www"]);
        assert_eq!(f.store.member(f.member.id).await.unwrap().weight, 0);
    }

    #[tokio::test]
    async fn test_member_enabled_and_region() {
        let f = fixture().await;
        set_member_enabled(&f.store, f.member.id, false).await.unwrap();
        set_member_region(&f.store, f.member.id, "eu-west-1").await.unwrap();

        let member = f.store.member(f.member.id).await.unwrap();
        assert!(!member.enabled);
        assert_eq!(member.region, "eu-west-1");
        assert_eq!(dirty_names(&f).await, vec!["api", "www"]);
    }

    #[tokio::test]
    async fn test_ip_changes_mark_referencing_records() {
        let f = fixture().await;
        set_ip_enabled(&f.store, addr(2), false).await.unwrap();
        assert_eq!(dirty_names(&f).await, vec!["cdn"]);

        soft_delete_ip(&f.store, addr(1)).await.unwrap();
        assert!(f.store.ip(addr(1)).await.unwrap().deleted);
        assert_eq!(dirty_names(&f).await, vec!["api", "cdn", "www"]);
    }

    #[tokio::test]
    async fn test_unreferenced_ip_marks_nothing() {
        let f = fixture().await;
        f.store.insert_ip(Ip::new(addr(3))).await.unwrap();
        assert!(set_ip_enabled(&f.store, addr(3), false).await.unwrap().is_empty());
        assert!(dirty_names(&f).await.is_empty());
    }

    #[tokio::test]
    async fn test_policy_record_mutations() {
        let f = fixture().await;
        let www = f.store.policy_records(f.zone).await.unwrap()[0].clone();

        set_policy_record_policy(&f.store, www.id, f.pol2).await.unwrap();
        let moved = f.store.policy_record(www.id).await.unwrap();
        assert_eq!(moved.policy_id, f.pol2);
        assert!(moved.dirty);

        assert!(set_policy_record_policy(&f.store, www.id, PolicyId(999)).await.is_err());

        soft_delete_policy_record(&f.store, www.id).await.unwrap();
        let deleted = f.store.policy_record(www.id).await.unwrap();
        assert!(deleted.deleted && deleted.dirty);
        assert_ne!(f.pol1, f.pol2);
    }

    #[tokio::test]
    async fn test_soft_delete_zone() {
        let f = fixture().await;
        soft_delete_zone(&f.store, f.zone).await.unwrap();
        assert!(f.store.zone(f.zone).await.unwrap().deleted);
    }
}
