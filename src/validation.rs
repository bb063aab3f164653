// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation of zone roots, policy names and record contents.
//!
//! These checks run before anything is sent to the provider so that bad input is
//! reported synchronously instead of surfacing as a rejected change batch.

use crate::constants::{APEX_NAME, MAX_FQDN_LEN, MAX_LABEL_LEN, MAX_RECORD_TTL_SECS};
use crate::errors::{PolicyError, RecordError, ZoneError};
use crate::record::RecordType;
use std::net::{Ipv4Addr, Ipv6Addr};

/// Validate a zone root and normalize it to lowercase with a trailing dot.
///
/// # Arguments
///
/// * `root` - Zone root as entered (e.g., `Example.com` or `example.com.`)
///
/// # Returns
///
/// The normalized root (e.g., `example.com.`)
///
/// # Errors
///
/// Returns [`ZoneError::InvalidRoot`] if the root is empty, too long, has a single
/// label, or contains an invalid label.
pub fn normalize_zone_root(root: &str) -> Result<String, ZoneError> {
    let invalid = |reason: &str| ZoneError::InvalidRoot {
        root: root.to_string(),
        reason: reason.to_string(),
    };

    let trimmed = root.trim().trim_end_matches('.').to_ascii_lowercase();
    if trimmed.is_empty() {
        return Err(invalid("root is empty"));
    }
    if trimmed.len() > MAX_FQDN_LEN {
        return Err(invalid("root is longer than 253 characters"));
    }

    let labels: Vec<&str> = trimmed.split('.').collect();
    if labels.len() < 2 {
        return Err(invalid("root must contain at least two labels"));
    }
    for label in labels {
        check_hostname_label(label).map_err(|reason| invalid(&reason))?;
    }

    Ok(format!("{trimmed}."))
}

fn check_hostname_label(label: &str) -> Result<(), String> {
    if label.is_empty() {
        return Err("empty label".into());
    }
    if label.len() > MAX_LABEL_LEN {
        return Err(format!("label '{label}' is longer than 63 characters"));
    }
    if label.starts_with('-') || label.ends_with('-') {
        return Err(format!("label '{label}' starts or ends with '-'"));
    }
    if !label
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-')
    {
        return Err(format!("label '{label}' contains invalid characters"));
    }
    Ok(())
}

/// Validate a policy name: lowercase letters, digits and hyphens only.
///
/// # Errors
///
/// Returns [`PolicyError::InvalidName`] for anything else, including the empty string.
pub fn validate_policy_name(name: &str) -> Result<(), PolicyError> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(PolicyError::InvalidName {
            name: name.to_string(),
        })
    }
}

/// Validate a relative record name.
///
/// Accepts `@` for the apex, otherwise dot-separated labels made of letters, digits,
/// `-` and `_`. A leading `*` label is allowed for wildcards.
///
/// # Errors
///
/// Returns [`RecordError::InvalidName`] describing the first problem found.
pub fn validate_record_name(name: &str) -> Result<(), RecordError> {
    if name == APEX_NAME {
        return Ok(());
    }
    let invalid = |reason: String| RecordError::InvalidName {
        name: name.to_string(),
        reason,
    };

    if name.is_empty() {
        return Err(invalid("name is empty".into()));
    }
    if name.ends_with('.') {
        return Err(invalid("name must be relative to the zone root".into()));
    }
    if name.len() > MAX_FQDN_LEN {
        return Err(invalid("name is longer than 253 characters".into()));
    }

    for (index, label) in name.split('.').enumerate() {
        if index == 0 && label == "*" {
            continue;
        }
        if label.is_empty() {
            return Err(invalid("empty label".into()));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(invalid(format!("label '{label}' is longer than 63 characters")));
        }
        if !label
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(invalid(format!("label '{label}' contains invalid characters")));
        }
    }
    Ok(())
}

/// Validate a TTL against the provider's accepted range.
///
/// # Errors
///
/// Returns [`RecordError::InvalidTtl`] when `ttl` exceeds the provider maximum.
pub fn validate_ttl(name: &str, ttl: u64) -> Result<(), RecordError> {
    if ttl > u64::from(MAX_RECORD_TTL_SECS) {
        return Err(RecordError::InvalidTtl {
            name: name.to_string(),
            ttl,
        });
    }
    Ok(())
}

/// Validate the values of a plain record for its type.
///
/// # Rules
///
/// | Type | Rule |
/// |------|------|
/// | `A` | every value parses as IPv4 |
/// | `AAAA` | every value parses as IPv6 |
/// | `CNAME` | exactly one value |
/// | `MX` | `<priority> <host>` |
/// | `SRV` | `<priority> <weight> <port> <target>` |
/// | other | at least one non-empty value |
///
/// # Errors
///
/// Returns [`RecordError::WrongValueCount`] or [`RecordError::InvalidValue`].
pub fn validate_values(
    name: &str,
    record_type: RecordType,
    values: &[String],
) -> Result<(), RecordError> {
    let invalid = |reason: String| RecordError::InvalidValue {
        name: name.to_string(),
        record_type: record_type.to_string(),
        reason,
    };

    if record_type.single_value() && values.len() != 1 {
        return Err(RecordError::WrongValueCount {
            name: name.to_string(),
            record_type: record_type.to_string(),
            expected: 1,
            actual: values.len(),
        });
    }
    if values.is_empty() {
        return Err(RecordError::WrongValueCount {
            name: name.to_string(),
            record_type: record_type.to_string(),
            expected: 1,
            actual: 0,
        });
    }

    for value in values {
        if value.trim().is_empty() {
            return Err(invalid("empty value".into()));
        }
        match record_type {
            RecordType::A => {
                value
                    .parse::<Ipv4Addr>()
                    .map_err(|_| invalid(format!("'{value}' is not an IPv4 address")))?;
            }
            RecordType::Aaaa => {
                value
                    .parse::<Ipv6Addr>()
                    .map_err(|_| invalid(format!("'{value}' is not an IPv6 address")))?;
            }
            RecordType::Mx => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                if parts.len() != 2 || parts[0].parse::<u16>().is_err() {
                    return Err(invalid(format!("'{value}' is not '<priority> <host>'")));
                }
            }
            RecordType::Srv => {
                let parts: Vec<&str> = value.split_whitespace().collect();
                if parts.len() != 4 || parts[..3].iter().any(|p| p.parse::<u16>().is_err()) {
                    return Err(invalid(format!(
                        "'{value}' is not '<priority> <weight> <port> <target>'"
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validation_tests.rs"]
mod validation_tests;
