// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `aws.rs`

#[cfg(test)]
mod tests {
    use super::super::*;

    #[test]
    fn test_weighted_record_set_conversion() {
        let set = RecordSet {
            name: "_zn_pol1.example.com.".into(),
            record_type: "A".into(),
            ttl: Some(30),
            resource_records: vec![ResourceRecordValue::new("192.0.2.1")],
            set_identifier: Some("3-us-east-1".into()),
            weight: Some(10),
            health_check_id: Some("hc-1".into()),
            ..RecordSet::default()
        };

        let converted = to_sdk_record_set(&set).unwrap();
        assert_eq!(converted.name(), "_zn_pol1.example.com.");
        assert_eq!(converted.weight(), Some(10));
        assert_eq!(from_sdk_record_set(&converted), set);
    }

    #[test]
    fn test_latency_alias_conversion() {
        let set = RecordSet {
            name: "_zn_pol1.example.com.".into(),
            record_type: "A".into(),
            alias_target: Some(AliasTargetSet {
                hosted_zone_id: "Z123".into(),
                dns_name: "_zn_pol1_us-east-1.example.com.".into(),
                evaluate_target_health: true,
            }),
            set_identifier: Some("us-east-1".into()),
            region: Some("us-east-1".into()),
            ..RecordSet::default()
        };

        let converted = to_sdk_record_set(&set).unwrap();
        assert!(converted.ttl().is_none());
        assert_eq!(from_sdk_record_set(&converted), set);
    }

    #[test]
    fn test_health_check_config_conversion() {
        let config = HealthCheckConfig {
            ip_address: "192.0.2.1".into(),
            port: 80,
            check_type: "HTTP".into(),
            resource_path: Some("/status".into()),
            fully_qualified_domain_name: Some("www.example.com".into()),
            request_interval: 30,
            failure_threshold: 3,
        };

        let converted = to_sdk_health_check_config(&config).unwrap();
        assert_eq!(converted.ip_address(), Some("192.0.2.1"));
        assert_eq!(converted.port(), Some(80));
        assert_eq!(converted.r#type().as_str(), "HTTP");
        assert_eq!(converted.request_interval(), Some(30));
    }

    #[test]
    fn test_change_conversion_keeps_action() {
        let change = Change {
            action: ChangeAction::Delete,
            record_set: RecordSet {
                name: "www.example.com.".into(),
                record_type: "TXT".into(),
                ttl: Some(300),
                resource_records: vec![ResourceRecordValue::new("\"hello\"")],
                ..RecordSet::default()
            },
        };

        let converted = to_sdk_change(&change).unwrap();
        assert_eq!(converted.action(), &sdk::ChangeAction::Delete);
    }
}
