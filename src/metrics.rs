// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Prometheus metrics for the Zinc reconciler.
//!
//! All metrics carry the namespace prefix `zinc`.
//!
//! # Metrics Categories
//!
//! - **Reconciliation Metrics** - Passes over zones, policy records and health checks
//! - **Provider Metrics** - Route53 calls, retries and submitted change batches
//! - **Resource Lifecycle Metrics** - Hosted zones and health checks created or deleted
//! - **Lease Metrics** - Outcomes of the global policy-record lease
//! - **Error Metrics** - Failures by kind and category
//!
//! # Example
//!
//! ```rust,no_run
//! use zinc::metrics::record_reconciliation_success;
//!
//! record_reconciliation_success("Zone", std::time::Duration::from_secs(1));
//! ```

use crate::route53::types::{Change, ChangeAction};
use prometheus::{Counter, CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::LazyLock;
use std::time::Duration;

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Namespace prefix for all Zinc metrics
const METRICS_NAMESPACE: &str = "zinc";

// ============================================================================
// Global Metrics Registry
// ============================================================================

/// Global Prometheus metrics registry
///
/// All metrics are registered in this registry and exposed via `/metrics` endpoint.
pub static METRICS_REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// ============================================================================
// Reconciliation Metrics
// ============================================================================

/// Total number of reconciliations by kind and status
///
/// Labels:
/// - `kind`: What was reconciled (`Zone`, `PolicyRecords`, `HealthCheck`)
/// - `status`: Outcome (`success`, `error`, `skipped`)
pub static RECONCILIATION_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_reconciliations_total"),
        "Total number of reconciliations by kind and status",
    );
    let counter = CounterVec::new(opts, &["kind", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of reconciliations in seconds
///
/// Labels:
/// - `kind`: What was reconciled
pub static RECONCILIATION_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_reconciliation_duration_seconds"),
        "Duration of reconciliations in seconds by kind",
    )
    .buckets(vec![0.01, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 120.0]);
    let histogram = HistogramVec::new(opts, &["kind"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

// ============================================================================
// Provider Metrics
// ============================================================================

/// Total number of provider calls by operation and status
///
/// Labels:
/// - `operation`: Provider operation (e.g., `ChangeResourceRecordSets`)
/// - `status`: Outcome (`success`, `error`)
pub static PROVIDER_CALLS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_calls_total"),
        "Total number of Route53 calls by operation and status",
    );
    let counter = CounterVec::new(opts, &["operation", "status"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Duration of provider calls in seconds, retries included
///
/// Labels:
/// - `operation`: Provider operation
pub static PROVIDER_CALL_DURATION_SECONDS: LazyLock<HistogramVec> = LazyLock::new(|| {
    let opts = HistogramOpts::new(
        format!("{METRICS_NAMESPACE}_provider_call_duration_seconds"),
        "Duration of Route53 calls in seconds by operation",
    )
    .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]);
    let histogram = HistogramVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(histogram.clone()))
        .unwrap();
    histogram
});

/// Total number of provider call retries
///
/// Labels:
/// - `operation`: Provider operation
pub static PROVIDER_RETRIES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_provider_retries_total"),
        "Total number of retried Route53 calls by operation",
    );
    let counter = CounterVec::new(opts, &["operation"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of change batches submitted
pub static CHANGE_BATCHES_TOTAL: LazyLock<Counter> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_change_batches_total"),
        "Total number of change batches submitted",
    );
    let counter = Counter::with_opts(opts).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of record changes submitted
///
/// Labels:
/// - `action`: Change action (`CREATE`, `UPSERT`, `DELETE`)
pub static RECORD_CHANGES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_record_changes_total"),
        "Total number of record changes submitted by action",
    );
    let counter = CounterVec::new(opts, &["action"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Resource Lifecycle Metrics
// ============================================================================

/// Total number of provider resources created
///
/// Labels:
/// - `resource_type`: `HostedZone` or `HealthCheck`
pub static RESOURCES_CREATED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_created_total"),
        "Total number of provider resources created by type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

/// Total number of provider resources deleted
///
/// Labels:
/// - `resource_type`: `HostedZone` or `HealthCheck`
pub static RESOURCES_DELETED_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_resources_deleted_total"),
        "Total number of provider resources deleted by type",
    );
    let counter = CounterVec::new(opts, &["resource_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Lease Metrics
// ============================================================================

/// Total number of lease outcomes
///
/// Labels:
/// - `outcome`: `acquired`, `busy`, `extended`, `released`
pub static LEASE_OUTCOMES_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_lease_outcomes_total"),
        "Total number of lease outcomes",
    );
    let counter = CounterVec::new(opts, &["outcome"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Error Metrics
// ============================================================================

/// Total number of errors by kind and category
///
/// Labels:
/// - `kind`: What was being reconciled
/// - `error_type`: Category from [`crate::errors::error_category`]
pub static ERRORS_TOTAL: LazyLock<CounterVec> = LazyLock::new(|| {
    let opts = Opts::new(
        format!("{METRICS_NAMESPACE}_errors_total"),
        "Total number of errors by kind and error category",
    );
    let counter = CounterVec::new(opts, &["kind", "error_type"]).unwrap();
    METRICS_REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap();
    counter
});

// ============================================================================
// Helper Functions
// ============================================================================

/// Record a successful reconciliation
///
/// # Arguments
/// * `kind` - What was reconciled (e.g., `Zone`)
/// * `duration` - Duration of the reconciliation
pub fn record_reconciliation_success(kind: &str, duration: Duration) {
    RECONCILIATION_TOTAL
        .with_label_values(&[kind, "success"])
        .inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a failed reconciliation
///
/// # Arguments
/// * `kind` - What was reconciled
/// * `duration` - Duration of the reconciliation before failure
pub fn record_reconciliation_error(kind: &str, duration: Duration) {
    RECONCILIATION_TOTAL.with_label_values(&[kind, "error"]).inc();
    RECONCILIATION_DURATION_SECONDS
        .with_label_values(&[kind])
        .observe(duration.as_secs_f64());
}

/// Record a reconciliation that did not run (lease held elsewhere)
pub fn record_reconciliation_skipped(kind: &str) {
    RECONCILIATION_TOTAL
        .with_label_values(&[kind, "skipped"])
        .inc();
}

/// Record the outcome of one provider call
///
/// # Arguments
/// * `operation` - Provider operation
/// * `success` - Whether the call eventually succeeded
/// * `duration` - Time spent, retries included
pub fn record_provider_call(operation: &str, success: bool, duration: Duration) {
    let status = if success { "success" } else { "error" };
    PROVIDER_CALLS_TOTAL
        .with_label_values(&[operation, status])
        .inc();
    PROVIDER_CALL_DURATION_SECONDS
        .with_label_values(&[operation])
        .observe(duration.as_secs_f64());
}

/// Record one retry of a provider call
pub fn record_provider_retry(operation: &str) {
    PROVIDER_RETRIES_TOTAL.with_label_values(&[operation]).inc();
}

/// Record a submitted change batch and its changes by action
///
/// # Arguments
/// * `changes` - The submitted changes
pub fn record_change_batch(changes: &[Change]) {
    CHANGE_BATCHES_TOTAL.inc();
    for action in [ChangeAction::Create, ChangeAction::Upsert, ChangeAction::Delete] {
        let count = changes.iter().filter(|c| c.action == action).count();
        if count > 0 {
            #[allow(clippy::cast_precision_loss)]
            let count = count as f64;
            RECORD_CHANGES_TOTAL
                .with_label_values(&[action.as_str()])
                .inc_by(count);
        }
    }
}

/// Record provider resource creation
///
/// # Arguments
/// * `resource_type` - `HostedZone` or `HealthCheck`
pub fn record_resource_created(resource_type: &str) {
    RESOURCES_CREATED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record provider resource deletion
///
/// # Arguments
/// * `resource_type` - `HostedZone` or `HealthCheck`
pub fn record_resource_deleted(resource_type: &str) {
    RESOURCES_DELETED_TOTAL
        .with_label_values(&[resource_type])
        .inc();
}

/// Record a lease outcome (`acquired`, `busy`, `extended`, `released`)
pub fn record_lease_outcome(outcome: &str) {
    LEASE_OUTCOMES_TOTAL.with_label_values(&[outcome]).inc();
}

/// Record an error
///
/// # Arguments
/// * `kind` - What was being reconciled
/// * `error_type` - Category of error (e.g., `throttled`, `policy_error`)
pub fn record_error(kind: &str, error_type: &str) {
    ERRORS_TOTAL.with_label_values(&[kind, error_type]).inc();
}

/// Gather and encode all metrics in Prometheus text format
///
/// # Returns
/// Prometheus-formatted metrics as a String
///
/// # Errors
/// Returns error if encoding fails
pub fn gather_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = METRICS_REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(format!("UTF-8 error: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route53::types::RecordSet;

    #[test]
    fn test_record_reconciliation_success() {
        let kind = "TestKind";
        record_reconciliation_success(kind, Duration::from_millis(500));

        let counter = RECONCILIATION_TOTAL.with_label_values(&[kind, "success"]);
        assert!(counter.get() > 0.0);

        let histogram = RECONCILIATION_DURATION_SECONDS.with_label_values(&[kind]);
        assert!(histogram.get_sample_count() > 0);
    }

    #[test]
    fn test_record_change_batch_counts_actions() {
        let change = |action| Change {
            action,
            record_set: RecordSet::default(),
        };
        let before = RECORD_CHANGES_TOTAL
            .with_label_values(&["DELETE"])
            .get();

        let batches = CHANGE_BATCHES_TOTAL.get();

        record_change_batch(&[
            change(ChangeAction::Delete),
            change(ChangeAction::Delete),
            change(ChangeAction::Upsert),
        ]);

        let after = RECORD_CHANGES_TOTAL
            .with_label_values(&["DELETE"])
            .get();
        assert!(after - before >= 2.0);
        assert!(CHANGE_BATCHES_TOTAL.get() - batches >= 1.0);
    }

    #[test]
    fn test_gather_metrics() {
        record_reconciliation_success("GatherTest", Duration::from_millis(100));

        let metrics_text = gather_metrics().expect("gathering metrics should succeed");
        assert!(metrics_text.contains("zinc_"));
        assert!(metrics_text.contains("reconciliations_total"));
    }
}
