// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `client.rs`

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::route53::memory::MemoryRoute53;
    use crate::route53::types::{ChangeAction, ResourceRecordValue};

    fn client(provider: &Arc<MemoryRoute53>) -> Route53Client {
        Route53Client::new(provider.clone(), RetryPolicy::immediate(3))
    }

    fn a_record(name: &str) -> RecordSet {
        RecordSet {
            name: name.into(),
            record_type: "A".into(),
            ttl: Some(300),
            resource_records: vec![ResourceRecordValue::new("192.0.2.1")],
            ..RecordSet::default()
        }
    }

    #[tokio::test]
    async fn test_list_follows_pagination() {
        let provider = Arc::new(MemoryRoute53::with_page_size(2));
        let client = client(&provider);
        let zone = client
            .create_hosted_zone("example.com.", "ref-1")
            .await
            .unwrap();
        for n in 0..5 {
            provider.put_record_set(&zone.id, a_record(&format!("h{n}.example.com.")));
        }

        let sets = client.list_all_record_sets(&zone.id).await.unwrap().unwrap();
        assert_eq!(sets.len(), 7);
        assert_eq!(provider.call_count(ops::LIST_RESOURCE_RECORD_SETS), 4);
    }

    #[tokio::test]
    async fn test_missing_zone_lists_as_none() {
        let provider = Arc::new(MemoryRoute53::new());
        let client = client(&provider);

        assert!(client.list_all_record_sets("ZMISSING").await.unwrap().is_none());
        assert!(!client.hosted_zone_exists("ZMISSING").await.unwrap());
        assert!(!client.delete_hosted_zone("ZMISSING").await.unwrap());
    }

    #[tokio::test]
    async fn test_throttled_commit_is_retried() {
        let provider = Arc::new(MemoryRoute53::new());
        let client = client(&provider);
        let zone = client
            .create_hosted_zone("example.com.", "ref-1")
            .await
            .unwrap();
        provider.throttle_next(ops::CHANGE_RESOURCE_RECORD_SETS, 2);

        client
            .change_record_sets(
                &zone.id,
                "example.com.",
                &[Change {
                    action: ChangeAction::Create,
                    record_set: a_record("www.example.com."),
                }],
            )
            .await
            .unwrap();

        assert_eq!(provider.call_count(ops::CHANGE_RESOURCE_RECORD_SETS), 3);
        assert_eq!(provider.change_batch_count(), 1);
    }

    #[tokio::test]
    async fn test_throttling_beyond_budget_surfaces() {
        let provider = Arc::new(MemoryRoute53::new());
        let client = client(&provider);
        provider.throttle_next(ops::GET_HOSTED_ZONE, 5);

        let err = client.hosted_zone_exists("Z1").await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(provider.call_count(ops::GET_HOSTED_ZONE), 3);
    }

    #[tokio::test]
    async fn test_missing_health_check_is_none() {
        let provider = Arc::new(MemoryRoute53::new());
        let client = client(&provider);

        assert!(client.get_health_check("hc-missing").await.unwrap().is_none());
        assert!(!client.delete_health_check("hc-missing").await.unwrap());
    }
}
