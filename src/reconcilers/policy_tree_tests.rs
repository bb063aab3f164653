// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `policy_tree.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::state::{MemberId, PolicyId};
    use std::net::Ipv4Addr;

    const ROOT: &str = "example.com.";
    const ZONE: &str = "Z000000000001";

    fn policy(routing: RoutingMode) -> Policy {
        Policy {
            id: PolicyId(1),
            name: "pol1".into(),
            routing,
        }
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

    fn names(records: &[Record]) -> Vec<&str> {
        records.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn test_namespace_membership() {
        assert_eq!(policy_namespace("_zn", "pol1"), "_zn_pol1");
        assert!(in_policy_namespace("_zn_pol1", "_zn_pol1"));
        assert!(in_policy_namespace("_zn_pol1_us-east-1", "_zn_pol1"));
        assert!(!in_policy_namespace("_zn_pol10", "_zn_pol1"));
        assert!(!in_policy_namespace("www", "_zn_pol1"));
    }

    #[test]
    fn test_owning_policy() {
        assert_eq!(owning_policy("_zn_pol1", "_zn"), Some("pol1"));
        assert_eq!(owning_policy("_zn_pol1_eu-west-1", "_zn"), Some("pol1"));
        assert_eq!(owning_policy("www", "_zn"), None);
        assert_eq!(owning_policy("_zn_", "_zn"), None);
        assert_eq!(owning_policy("_znx_pol1", "_zn"), None);
    }

    #[test]
    fn test_single_region_weighted_is_flat() {
        let members = [member(1, 1, "us-east-1", 10), member(2, 2, "us-east-1", 20)];
        let records =
            build_policy_tree(&policy(RoutingMode::Weighted), &members, "_zn", ZONE, ROOT).unwrap();

        assert_eq!(names(&records), vec!["_zn_pol1", "_zn_pol1"]);
        let first = &records[0];
        assert_eq!(first.record_type, RecordType::A);
        assert_eq!(first.ttl(), Some(POLICY_RECORD_TTL_SECS));
        assert_eq!(first.values(), vec!["192.0.2.1".to_string()]);
        assert_eq!(first.set_identifier.as_deref(), Some("1-us-east-1"));
        assert_eq!(first.weight, Some(10));
        assert!(first.region.is_none());
    }

    #[test]
    fn test_latency_with_two_regions() {
        let members = [
            member(1, 1, "us-east-2", 10),
            member(2, 2, "us-east-1", 10),
        ];
        let records =
            build_policy_tree(&policy(RoutingMode::Latency), &members, "_zn", ZONE, ROOT).unwrap();

        assert_eq!(
            names(&records),
            vec![
                "_zn_pol1_us-east-1",
                "_zn_pol1",
                "_zn_pol1_us-east-2",
                "_zn_pol1"
            ],
            "regions are processed in sorted order"
        );

        let alias = &records[1];
        let target = alias.alias_target().unwrap();
        assert_eq!(target.dns_name, "_zn_pol1_us-east-1.example.com.");
        assert_eq!(target.hosted_zone_id, ZONE);
        assert!(target.evaluate_target_health);
        assert_eq!(alias.region.as_deref(), Some("us-east-1"));
        assert_eq!(alias.set_identifier.as_deref(), Some("us-east-1"));
        assert!(alias.weight.is_none());
    }

    #[test]
    fn test_latency_with_one_region_keeps_alias_layer() {
        let members = [member(1, 1, "us-east-1", 10)];
        let records =
            build_policy_tree(&policy(RoutingMode::Latency), &members, "_zn", ZONE, ROOT).unwrap();
        assert_eq!(names(&records), vec!["_zn_pol1_us-east-1", "_zn_pol1"]);
    }

    #[test]
    fn test_weighted_with_two_regions_uses_alias_layer() {
        let members = [member(1, 1, "us-east-1", 10), member(2, 2, "eu-west-1", 10)];
        let records =
            build_policy_tree(&policy(RoutingMode::Weighted), &members, "_zn", ZONE, ROOT).unwrap();
        assert_eq!(records.iter().filter(|r| r.is_alias()).count(), 2);
    }

    #[test]
    fn test_ineligible_members_are_skipped() {
        let mut disabled_member = member(2, 2, "us-east-2", 10);
        disabled_member.member.enabled = false;
        let mut disabled_ip = member(3, 3, "us-east-2", 10);
        disabled_ip.ip.enabled = false;
        let mut deleted_ip = member(4, 4, "us-east-2", 10);
        deleted_ip.ip.deleted = true;
        let members = [
            member(1, 1, "us-east-1", 10),
            member(5, 5, "us-east-2", 0),
            disabled_member,
            disabled_ip,
            deleted_ip,
        ];

        let records =
            build_policy_tree(&policy(RoutingMode::Weighted), &members, "_zn", ZONE, ROOT).unwrap();

        assert_eq!(records.len(), 1, "only one region is left, so the tree is flat");
        assert_eq!(records[0].values(), vec!["192.0.2.1".to_string()]);
    }

    #[test]
    fn test_no_eligible_members_fails() {
        let members = [member(1, 1, "us-east-1", 0)];
        let err = build_policy_tree(&policy(RoutingMode::Latency), &members, "_zn", ZONE, ROOT)
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<PolicyError>(),
            Some(&PolicyError::NoEligibleRegions {
                policy: "pol1".into()
            })
        );
    }

    #[test]
    fn test_leaves_carry_health_checks() {
        let mut checked = member(1, 1, "us-east-1", 10);
        checked.ip.health_check_id = Some("hc-1".into());
        let records =
            build_policy_tree(&policy(RoutingMode::Weighted), &[checked], "_zn", ZONE, ROOT)
                .unwrap();
        assert_eq!(records[0].health_check_id.as_deref(), Some("hc-1"));
    }
}
