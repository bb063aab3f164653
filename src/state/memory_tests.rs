// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `memory.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(192, 0, 2, last)
    }

    fn state_error(err: &anyhow::Error) -> &StateError {
        err.downcast_ref::<StateError>().expect("state error")
    }

    #[tokio::test]
    async fn test_zone_roots_are_unique() {
        let store = MemoryStateStore::new();
        let zone = store.insert_zone("example.com.").await.unwrap();
        assert!(zone.route53_id.is_none());
        assert!(!zone.deleted);

        let err = store.insert_zone("example.com.").await.unwrap_err();
        assert!(matches!(state_error(&err), StateError::Duplicate { kind: "Zone", .. }));
        assert_eq!(
            store.zone_by_root("example.com.").await.unwrap().map(|z| z.id),
            Some(zone.id)
        );
    }

    #[tokio::test]
    async fn test_route53_ids_are_unique() {
        let store = MemoryStateStore::new();
        let mut first = store.insert_zone("a.example.").await.unwrap();
        let mut second = store.insert_zone("b.example.").await.unwrap();

        first.route53_id = Some("Z1".into());
        store.save_zone(&first).await.unwrap();

        second.route53_id = Some("Z1".into());
        assert!(store.save_zone(&second).await.is_err());

        first.caller_reference = Some("ref".into());
        store.save_zone(&first).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_zone_cascades_policy_records() {
        let store = MemoryStateStore::new();
        let zone = store.insert_zone("example.com.").await.unwrap();
        let policy = store.insert_policy("pol1", RoutingMode::Weighted).await.unwrap();
        store.insert_policy_record(zone.id, "www", policy.id).await.unwrap();

        store.delete_zone(zone.id).await.unwrap();

        assert!(store.policy_records(zone.id).await.unwrap().is_empty());
        let err = store.zone(zone.id).await.unwrap_err();
        assert!(matches!(state_error(&err), StateError::NotFound { kind: "Zone", .. }));
    }

    #[tokio::test]
    async fn test_policy_record_names_unique_per_zone() {
        let store = MemoryStateStore::new();
        let zone = store.insert_zone("example.com.").await.unwrap();
        let other = store.insert_zone("example.org.").await.unwrap();
        let policy = store.insert_policy("pol1", RoutingMode::Weighted).await.unwrap();

        let record = store.insert_policy_record(zone.id, "www", policy.id).await.unwrap();
        assert!(record.dirty, "new policy records need a first reconcile");
        assert!(store.insert_policy_record(zone.id, "www", policy.id).await.is_err());
        store.insert_policy_record(other.id, "www", policy.id).await.unwrap();

        assert_eq!(store.policy_records_for_policy(policy.id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_settle_only_acts_on_unchanged_rows() {
        let store = MemoryStateStore::new();
        let zone = store.insert_zone("example.com.").await.unwrap();
        let policy = store.insert_policy("pol1", RoutingMode::Weighted).await.unwrap();
        let www = store.insert_policy_record(zone.id, "www", policy.id).await.unwrap();
        let api = store.insert_policy_record(zone.id, "api", policy.id).await.unwrap();

        let mut rewritten = www.clone();
        rewritten.dirty = true;
        store.save_policy_record(&rewritten).await.unwrap();
        assert!(!store.settle_policy_record(www.id, www.revision).await.unwrap());
        assert!(store.policy_record(www.id).await.unwrap().dirty);

        let current = store.policy_record(www.id).await.unwrap();
        assert!(store.settle_policy_record(www.id, current.revision).await.unwrap());
        assert!(!store.policy_record(www.id).await.unwrap().dirty);

        let mut deleted = api.clone();
        deleted.deleted = true;
        store.save_policy_record(&deleted).await.unwrap();
        let current = store.policy_record(api.id).await.unwrap();
        assert!(store.settle_policy_record(api.id, current.revision).await.unwrap());
        assert!(store.policy_record(api.id).await.is_err());
        assert!(!store.settle_policy_record(api.id, current.revision).await.unwrap());
    }

    #[tokio::test]
    async fn test_members_require_existing_ip() {
        let store = MemoryStateStore::new();
        let policy = store.insert_policy("pol1", RoutingMode::Latency).await.unwrap();

        assert!(store.insert_member(policy.id, addr(1), "us-east-1", 10).await.is_err());

        store.insert_ip(Ip::new(addr(1))).await.unwrap();
        let member = store
            .insert_member(policy.id, addr(1), "us-east-1", 10)
            .await
            .unwrap();
        assert!(member.enabled);
        assert_eq!(store.members(policy.id).await.unwrap(), vec![member]);
    }

    #[tokio::test]
    async fn test_delete_ip_cascades_members() {
        let store = MemoryStateStore::new();
        let policy = store.insert_policy("pol1", RoutingMode::Weighted).await.unwrap();
        store.insert_ip(Ip::new(addr(1))).await.unwrap();
        store.insert_ip(Ip::new(addr(2))).await.unwrap();
        store.insert_member(policy.id, addr(1), "us-east-1", 10).await.unwrap();
        store.insert_member(policy.id, addr(2), "us-east-1", 10).await.unwrap();

        store.delete_ip(addr(1)).await.unwrap();

        let members = store.members(policy.id).await.unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].ip, addr(2));
        assert!(store.members_for_ip(addr(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_ip_rejected() {
        let store = MemoryStateStore::new();
        store.insert_ip(Ip::new(addr(1))).await.unwrap();
        let err = store.insert_ip(Ip::new(addr(1))).await.unwrap_err();
        assert!(matches!(state_error(&err), StateError::Duplicate { kind: "Ip", .. }));
    }

    #[tokio::test]
    async fn test_save_missing_rows_fails() {
        let store = MemoryStateStore::new();
        assert!(store.save_ip(&Ip::new(addr(9))).await.is_err());
        assert!(store.delete_policy_record(PolicyRecordId(42)).await.is_err());
    }
}
