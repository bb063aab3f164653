// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Zinc reconciler.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Record Naming Constants
// ============================================================================

/// Default prefix for every record generated from a traffic policy
///
/// Policy trees live under `{prefix}_{policy}` and `{prefix}_{policy}_{region}`.
pub const DEFAULT_POLICY_PREFIX: &str = "_zn";

/// Name used for the zone apex
pub const APEX_NAME: &str = "@";

/// TTL for the weighted leaves of a policy tree (30 seconds)
pub const POLICY_RECORD_TTL_SECS: u32 = 30;

/// Maximum TTL accepted by the provider
pub const MAX_RECORD_TTL_SECS: u32 = 2_147_483_647;

/// Maximum length of one TXT character-string, in bytes
pub const TXT_CHUNK_LEN: usize = 255;

/// Maximum length of a fully qualified domain name
pub const MAX_FQDN_LEN: usize = 253;

/// Maximum length of a single DNS label
pub const MAX_LABEL_LEN: usize = 63;

// ============================================================================
// Record Identity Constants
// ============================================================================

/// Separator used when joining hash inputs
pub const HASH_INPUT_SEPARATOR: &str = ":";

/// Number of hex characters of the SHA-256 digest kept for an identity hash
pub const HASH_HEX_PREFIX_LEN: usize = 16;

/// Default minimum length of an encoded identity hash
pub const DEFAULT_HASH_MIN_LENGTH: usize = 8;

// ============================================================================
// Provider Constants
// ============================================================================

/// Prefix the provider puts in front of hosted zone ids
pub const HOSTED_ZONE_ID_PREFIX: &str = "/hostedzone/";

/// Page size used when listing record sets
pub const RECORD_SET_PAGE_SIZE: usize = 300;

/// Provider error code returned when a hosted zone does not exist
pub const CODE_NO_SUCH_HOSTED_ZONE: &str = "NoSuchHostedZone";

/// Provider error code returned when a health check does not exist
pub const CODE_NO_SUCH_HEALTH_CHECK: &str = "NoSuchHealthCheck";

/// Provider error code for a reused zone caller reference
pub const CODE_HOSTED_ZONE_ALREADY_EXISTS: &str = "HostedZoneAlreadyExists";

/// Provider error code for a reused health check caller reference
pub const CODE_HEALTH_CHECK_ALREADY_EXISTS: &str = "HealthCheckAlreadyExists";

/// Provider error code for a rejected change batch
pub const CODE_INVALID_CHANGE_BATCH: &str = "InvalidChangeBatch";

/// Provider error codes that indicate throttling or a temporary condition
pub const RETRYABLE_ERROR_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "PriorRequestNotComplete",
    "RequestLimitExceeded",
    "ServiceUnavailable",
    "InternalFailure",
];

// ============================================================================
// Retry Constants
// ============================================================================

/// Lower bound of the randomized base backoff (200ms)
pub const RETRY_BASE_MIN_MILLIS: u64 = 200;

/// Upper bound (exclusive) of the randomized base backoff (800ms)
pub const RETRY_BASE_MAX_MILLIS: u64 = 800;

/// Backoff multiplier (each attempt doubles the delay)
pub const RETRY_MULTIPLIER: u32 = 2;

/// Maximum number of attempts for one provider call
pub const DEFAULT_RETRY_MAX_ATTEMPTS: u32 = 5;

// ============================================================================
// Health Check Constants
// ============================================================================

/// Default port probed by health checks
pub const DEFAULT_HEALTH_CHECK_PORT: u16 = 80;

/// Default path probed by health checks
pub const DEFAULT_HEALTH_CHECK_PATH: &str = "/status";

/// Default health check protocol
pub const DEFAULT_HEALTH_CHECK_TYPE: &str = "HTTP";

/// Default health check request interval (seconds)
pub const DEFAULT_HEALTH_CHECK_INTERVAL_SECS: u32 = 30;

/// Default number of failed probes before an endpoint is unhealthy
pub const DEFAULT_HEALTH_CHECK_FAILURE_THRESHOLD: u32 = 3;

// ============================================================================
// Lease Constants
// ============================================================================

/// Lease key guarding the global policy-record pass
pub const POLICY_RECORD_LEASE_KEY: &str = "zinc-policy-record-reconcile";

/// Default lease TTL (60 seconds)
pub const DEFAULT_LEASE_TTL_SECS: u64 = 60;

// ============================================================================
// Scheduling Constants
// ============================================================================

/// Default zone reconcile interval (5 minutes)
pub const DEFAULT_ZONE_INTERVAL_SECS: u64 = 300;

/// Default policy-record reconcile interval (10 seconds)
pub const DEFAULT_POLICY_RECORD_INTERVAL_SECS: u64 = 10;

/// Default health check reconcile interval (5 minutes)
pub const DEFAULT_HEALTH_CHECK_INTERVAL_JOB_SECS: u64 = 300;

/// Default number of zones reconciled concurrently
pub const DEFAULT_ZONE_CONCURRENCY: usize = 4;

/// Default time a cached NS propagation result stays fresh (10 minutes)
pub const DEFAULT_NS_CHECK_TTL_SECS: i64 = 600;

/// Default resolver used for NS propagation checks
pub const DEFAULT_NS_RESOLVER: &str = "8.8.8.8:53";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";

/// Default bind address for metrics HTTP server
pub const DEFAULT_METRICS_BIND_ADDRESS: &str = "0.0.0.0:8080";
