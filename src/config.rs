// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Command line and environment configuration.
//!
//! Every setting can be given as a flag or through its `ZINC_*` environment
//! variable. The deployment secret has no default.

use crate::constants::{
    DEFAULT_HASH_MIN_LENGTH, DEFAULT_HEALTH_CHECK_FAILURE_THRESHOLD,
    DEFAULT_HEALTH_CHECK_INTERVAL_JOB_SECS, DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
    DEFAULT_HEALTH_CHECK_PATH, DEFAULT_HEALTH_CHECK_PORT, DEFAULT_HEALTH_CHECK_TYPE,
    DEFAULT_LEASE_TTL_SECS, DEFAULT_METRICS_BIND_ADDRESS, DEFAULT_NS_CHECK_TTL_SECS,
    DEFAULT_NS_RESOLVER, DEFAULT_POLICY_PREFIX, DEFAULT_POLICY_RECORD_INTERVAL_SECS,
    DEFAULT_RETRY_MAX_ATTEMPTS, DEFAULT_ZONE_CONCURRENCY, DEFAULT_ZONE_INTERVAL_SECS,
};
use crate::route53::types::HealthCheckConfig;
use crate::route53::RetryPolicy;
use crate::state::Ip;
use clap::{Args, Parser, Subcommand};
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

/// Route53 zone and traffic-policy reconciler.
#[derive(Parser, Debug, Clone)]
#[command(name = "zinc-reconciler", version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run every periodic job and serve metrics
    Run,
    /// Run one reconciliation pass and exit
    Reconcile {
        #[command(subcommand)]
        target: ReconcileTarget,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileTarget {
    /// Create, repair or remove hosted zones
    Zones,
    /// Rebuild dirty policy records
    PolicyRecords,
    /// Create, repair or remove IP health checks
    HealthChecks,
}

/// Runtime settings shared by every job.
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Deployment secret, salts record identities
    #[arg(long, env = "ZINC_SECRET", hide_env_values = true)]
    pub secret: String,

    /// Minimum length of each encoded identity segment
    #[arg(long, env = "ZINC_HASH_MIN_LENGTH", default_value_t = DEFAULT_HASH_MIN_LENGTH)]
    pub hash_min_length: usize,

    /// Name prefix of the records that make up policy trees
    #[arg(long, env = "ZINC_POLICY_PREFIX", default_value = DEFAULT_POLICY_PREFIX)]
    pub policy_prefix: String,

    /// Lifetime of the policy-record pass lease
    #[arg(long, env = "ZINC_LEASE_TTL_SECS", default_value_t = DEFAULT_LEASE_TTL_SECS)]
    pub lease_ttl_secs: u64,

    /// Seconds between zone passes
    #[arg(long, env = "ZINC_ZONE_INTERVAL_SECS", default_value_t = DEFAULT_ZONE_INTERVAL_SECS)]
    pub zone_interval_secs: u64,

    /// Seconds between policy-record passes
    #[arg(
        long,
        env = "ZINC_POLICY_RECORD_INTERVAL_SECS",
        default_value_t = DEFAULT_POLICY_RECORD_INTERVAL_SECS
    )]
    pub policy_record_interval_secs: u64,

    /// Seconds between health-check passes
    #[arg(
        long,
        env = "ZINC_HEALTH_CHECK_JOB_INTERVAL_SECS",
        default_value_t = DEFAULT_HEALTH_CHECK_INTERVAL_JOB_SECS
    )]
    pub health_check_job_interval_secs: u64,

    /// Zones reconciled concurrently in one policy-record pass
    #[arg(long, env = "ZINC_ZONE_CONCURRENCY", default_value_t = DEFAULT_ZONE_CONCURRENCY)]
    pub zone_concurrency: usize,

    /// Attempts per provider call before giving up
    #[arg(long, env = "ZINC_RETRY_ATTEMPTS", default_value_t = DEFAULT_RETRY_MAX_ATTEMPTS)]
    pub retry_attempts: u32,

    /// Port probed by IP health checks
    #[arg(long, env = "ZINC_HEALTH_CHECK_PORT", default_value_t = DEFAULT_HEALTH_CHECK_PORT)]
    pub health_check_port: u16,

    /// Path probed by IP health checks
    #[arg(long, env = "ZINC_HEALTH_CHECK_PATH", default_value = DEFAULT_HEALTH_CHECK_PATH)]
    pub health_check_path: String,

    /// Host header for IP health checks; defaults to the IP's hostname
    #[arg(long, env = "ZINC_HEALTH_CHECK_FQDN")]
    pub health_check_fqdn: Option<String>,

    /// Probe protocol
    #[arg(long, env = "ZINC_HEALTH_CHECK_TYPE", default_value = DEFAULT_HEALTH_CHECK_TYPE)]
    pub health_check_type: String,

    /// Seconds between probes (10 or 30)
    #[arg(
        long,
        env = "ZINC_HEALTH_CHECK_REQUEST_INTERVAL",
        default_value_t = DEFAULT_HEALTH_CHECK_INTERVAL_SECS
    )]
    pub health_check_request_interval: u32,

    /// Failed probes before an endpoint is unhealthy
    #[arg(
        long,
        env = "ZINC_HEALTH_CHECK_FAILURE_THRESHOLD",
        default_value_t = DEFAULT_HEALTH_CHECK_FAILURE_THRESHOLD
    )]
    pub health_check_failure_threshold: u32,

    /// Resolver queried for NS propagation
    #[arg(long, env = "ZINC_NS_RESOLVER", default_value = DEFAULT_NS_RESOLVER)]
    pub ns_resolver: SocketAddr,

    /// Seconds an NS propagation result stays fresh
    #[arg(long, env = "ZINC_NS_CHECK_TTL_SECS", default_value_t = DEFAULT_NS_CHECK_TTL_SECS)]
    pub ns_check_ttl_secs: i64,

    /// Address the metrics server listens on
    #[arg(long, env = "ZINC_METRICS_BIND_ADDRESS", default_value = DEFAULT_METRICS_BIND_ADDRESS)]
    pub metrics_bind_address: SocketAddr,

    /// YAML file with the desired state to load at startup
    #[arg(long, env = "ZINC_STATE_FILE")]
    pub state_file: Option<PathBuf>,
}

impl Settings {
    /// Defaults for everything except the secret.
    ///
    /// Built without consulting the command line or `ZINC_*` variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a default socket address fails to parse.
    pub fn with_secret(secret: &str) -> Result<Self, AddrParseError> {
        Ok(Self {
            secret: secret.to_string(),
            hash_min_length: DEFAULT_HASH_MIN_LENGTH,
            policy_prefix: DEFAULT_POLICY_PREFIX.to_string(),
            lease_ttl_secs: DEFAULT_LEASE_TTL_SECS,
            zone_interval_secs: DEFAULT_ZONE_INTERVAL_SECS,
            policy_record_interval_secs: DEFAULT_POLICY_RECORD_INTERVAL_SECS,
            health_check_job_interval_secs: DEFAULT_HEALTH_CHECK_INTERVAL_JOB_SECS,
            zone_concurrency: DEFAULT_ZONE_CONCURRENCY,
            retry_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            health_check_port: DEFAULT_HEALTH_CHECK_PORT,
            health_check_path: DEFAULT_HEALTH_CHECK_PATH.to_string(),
            health_check_fqdn: None,
            health_check_type: DEFAULT_HEALTH_CHECK_TYPE.to_string(),
            health_check_request_interval: DEFAULT_HEALTH_CHECK_INTERVAL_SECS,
            health_check_failure_threshold: DEFAULT_HEALTH_CHECK_FAILURE_THRESHOLD,
            ns_resolver: DEFAULT_NS_RESOLVER.parse()?,
            ns_check_ttl_secs: DEFAULT_NS_CHECK_TTL_SECS,
            metrics_bind_address: DEFAULT_METRICS_BIND_ADDRESS.parse()?,
            state_file: None,
        })
    }

    /// Lease lifetime as a [`Duration`].
    #[must_use]
    pub fn lease_ttl(&self) -> Duration {
        Duration::from_secs(self.lease_ttl_secs)
    }

    /// Retry policy for provider calls.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.retry_attempts)
    }

    /// Desired health check for an IP.
    ///
    /// The host header is the configured override, else the IP's hostname.
    #[must_use]
    pub fn health_check_config(&self, ip: &Ip) -> HealthCheckConfig {
        HealthCheckConfig {
            ip_address: ip.ip.to_string(),
            port: self.health_check_port,
            check_type: self.health_check_type.clone(),
            resource_path: Some(self.health_check_path.clone()),
            fully_qualified_domain_name: self
                .health_check_fqdn
                .clone()
                .or_else(|| ip.hostname.clone()),
            request_interval: self.health_check_request_interval,
            failure_threshold: self.health_check_failure_threshold,
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
