// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for Zinc.
//!
//! This module provides specialized error types for:
//! - Route53 provider calls (throttling, conflicts, missing resources)
//! - Record validation and wire decoding
//! - Traffic policies that cannot be turned into a record tree
//! - Zone validation and lifecycle guards
//! - Lookups against the persisted state
//!
//! Reconcilers propagate these through `anyhow::Error`; callers that need to branch
//! on a specific failure recover the typed error with `downcast_ref`.

use crate::constants::{
    CODE_HEALTH_CHECK_ALREADY_EXISTS, CODE_HOSTED_ZONE_ALREADY_EXISTS,
    CODE_NO_SUCH_HEALTH_CHECK, CODE_NO_SUCH_HOSTED_ZONE, RETRYABLE_ERROR_CODES,
};
use thiserror::Error;

/// Errors returned by the Route53 provider boundary.
///
/// Every variant carries the provider operation that failed so log lines and metrics
/// can be attributed without extra context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Request rate exceeded or a previous change is still propagating
    ///
    /// Always retryable.
    #[error("{operation} throttled by provider ({code}): {message}")]
    Throttled {
        /// Provider operation name (e.g., `ChangeResourceRecordSets`)
        operation: String,
        /// Provider error code
        code: String,
        /// Provider error message
        message: String,
    },

    /// Network failure, timeout, or a 5xx response
    ///
    /// Always retryable.
    #[error("{operation} failed with transient error: {message}")]
    Transient {
        /// Provider operation name
        operation: String,
        /// Description of the failure
        message: String,
    },

    /// The provider rejected the request (validation, conflict, missing resource)
    ///
    /// Never retried by the client. Conflicts on caller references and missing
    /// resources are interpreted by the reconcilers.
    #[error("{operation} rejected by provider ({code}): {message}")]
    Api {
        /// Provider operation name
        operation: String,
        /// Provider error code (e.g., `InvalidChangeBatch`)
        code: String,
        /// Provider error message
        message: String,
    },

    /// The request could not be built locally
    #[error("{operation} request could not be built: {message}")]
    InvalidRequest {
        /// Provider operation name
        operation: String,
        /// What was wrong with the request
        message: String,
    },
}

impl ProviderError {
    /// Build an error from a provider error code, classifying throttling codes.
    #[must_use]
    pub fn from_code(operation: &str, code: &str, message: impl Into<String>) -> Self {
        if RETRYABLE_ERROR_CODES.contains(&code) {
            Self::Throttled {
                operation: operation.to_string(),
                code: code.to_string(),
                message: message.into(),
            }
        } else {
            Self::Api {
                operation: operation.to_string(),
                code: code.to_string(),
                message: message.into(),
            }
        }
    }

    /// Whether the call should be retried with backoff.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Throttled { .. } | Self::Transient { .. })
    }

    /// The provider error code, when the provider returned one.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            Self::Throttled { code, .. } | Self::Api { code, .. } => Some(code),
            Self::Transient { .. } | Self::InvalidRequest { .. } => None,
        }
    }

    /// Whether the provider returned exactly this error code.
    #[must_use]
    pub fn is_code(&self, expected: &str) -> bool {
        self.code() == Some(expected)
    }

    /// The hosted zone does not exist (drift or already deleted).
    #[must_use]
    pub fn is_no_such_hosted_zone(&self) -> bool {
        self.is_code(CODE_NO_SUCH_HOSTED_ZONE)
    }

    /// The health check does not exist.
    #[must_use]
    pub fn is_no_such_health_check(&self) -> bool {
        self.is_code(CODE_NO_SUCH_HEALTH_CHECK)
    }

    /// A caller reference was reused for a different creation request.
    #[must_use]
    pub fn is_caller_reference_conflict(&self) -> bool {
        self.is_code(CODE_HOSTED_ZONE_ALREADY_EXISTS)
            || self.is_code(CODE_HEALTH_CHECK_ALREADY_EXISTS)
    }
}

/// Errors raised while constructing, validating or decoding a [`crate::record::Record`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Record name is not `@` or a valid relative DNS name
    #[error("Invalid record name '{name}': {reason}")]
    InvalidName {
        /// The offending name
        name: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// TTL outside the range the provider accepts
    #[error("Invalid TTL {ttl} for record '{name}'")]
    InvalidTtl {
        /// The record name
        name: String,
        /// The rejected TTL
        ttl: u64,
    },

    /// A value does not match the shape required by the record type
    #[error("Invalid {record_type} value for record '{name}': {reason}")]
    InvalidValue {
        /// The record name
        name: String,
        /// The record type (e.g., `A`, `MX`)
        record_type: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The record type requires a specific number of values
    #[error("{record_type} record '{name}' needs {expected} value(s), got {actual}")]
    WrongValueCount {
        /// The record name
        name: String,
        /// The record type
        record_type: String,
        /// Number of values the type requires
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// The record type cannot be used in this position
    #[error("Record type {record_type} is not valid here: {reason}")]
    InvalidType {
        /// The record type
        record_type: String,
        /// Explanation of why the type is rejected
        reason: String,
    },

    /// Managed records (alias, set identifier, apex NS/SOA) are not user-editable
    #[error("Record '{name}' ({record_type}) is managed and cannot be edited")]
    ManagedRecord {
        /// The record name
        name: String,
        /// The record type
        record_type: String,
    },

    /// A provider record set could not be turned into a record
    #[error("Cannot decode record set '{name}': {reason}")]
    Decode {
        /// Fully qualified name reported by the provider
        name: String,
        /// Explanation of the decoding failure
        reason: String,
    },
}

/// Errors raised when a traffic policy cannot be applied.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    /// Every member has weight 0, is disabled, or points at a disabled IP
    #[error("Policy '{policy}' cannot be applied: no eligible regions")]
    NoEligibleRegions {
        /// The policy name
        policy: String,
    },

    /// A POLICY_ROUTED record references a policy that does not exist
    #[error("Unknown policy '{name}'")]
    UnknownPolicy {
        /// The referenced policy name
        name: String,
    },

    /// Policy names are lowercase alphanumerics and hyphens
    #[error("Invalid policy name '{name}': only lowercase letters, digits and '-' are allowed")]
    InvalidName {
        /// The rejected name
        name: String,
    },
}

/// Errors raised by zone validation and lifecycle guards.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ZoneError {
    /// Zone root is not a valid fully qualified domain name
    #[error("Invalid zone root '{root}': {reason}")]
    InvalidRoot {
        /// The rejected root
        root: String,
        /// Explanation of what is invalid
        reason: String,
    },

    /// The zone is marked deleted and only moves toward deletion
    #[error("Zone '{root}' is marked deleted")]
    ZoneDeleted {
        /// The zone root
        root: String,
    },

    /// The hosted zone has not been created at the provider yet
    #[error("Zone '{root}' has no hosted zone yet")]
    NotCreated {
        /// The zone root
        root: String,
    },
}

/// Errors raised by the persisted-state boundary.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    /// Entity lookup failed
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Entity kind (e.g., `Zone`, `PolicyRecord`)
        kind: &'static str,
        /// Entity id or key
        id: String,
    },

    /// A uniqueness constraint would be violated
    #[error("{kind} '{key}' already exists")]
    Duplicate {
        /// Entity kind
        kind: &'static str,
        /// The duplicated key
        key: String,
    },
}

/// Map an error to the category label used by the error metrics.
///
/// | Error | Category |
/// |-------|----------|
/// | `ProviderError::Throttled` | `throttled` |
/// | `ProviderError::Transient` | `transient` |
/// | `ProviderError::Api` | `api_error` |
/// | `ProviderError::InvalidRequest` | `invalid_request` |
/// | `RecordError`, `ZoneError` | `validation_error` |
/// | `PolicyError` | `policy_error` |
/// | `StateError` | `state_error` |
/// | anything else | `internal` |
#[must_use]
pub fn error_category(err: &anyhow::Error) -> &'static str {
    for cause in err.chain() {
        if let Some(provider) = cause.downcast_ref::<ProviderError>() {
            return match provider {
                ProviderError::Throttled { .. } => "throttled",
                ProviderError::Transient { .. } => "transient",
                ProviderError::Api { .. } => "api_error",
                ProviderError::InvalidRequest { .. } => "invalid_request",
            };
        }
        if cause.downcast_ref::<RecordError>().is_some()
            || cause.downcast_ref::<ZoneError>().is_some()
        {
            return "validation_error";
        }
        if cause.downcast_ref::<PolicyError>().is_some() {
            return "policy_error";
        }
        if cause.downcast_ref::<StateError>().is_some() {
            return "state_error";
        }
    }
    "internal"
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
