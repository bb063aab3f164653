// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Encoding records to and from the provider's record set representation.
//!
//! # Encoding rules
//!
//! - `@` becomes the bare zone root, other names get `.{root}` appended
//! - alias records carry an `AliasTarget` and never a TTL or values
//! - TXT/SPF values are JSON-quoted and split into 255-character strings
//! - weight, region, set identifier, health check and traffic policy instance are
//!   only emitted when present, since the provider rejects unexpected fields on some
//!   record types
//!
//! Decoding is the mirror image. Decoded records are not re-validated: the provider
//! may hold content that Zinc would refuse as input, and it still has to be listed
//! and diffed.

use super::{ttl_from_wire, AliasTarget, Record, RecordData, RecordType};
use crate::constants::{APEX_NAME, TXT_CHUNK_LEN};
use crate::errors::RecordError;
use crate::route53::types::{AliasTargetSet, RecordSet, ResourceRecordValue};
use serde_json::Value;
use std::str::FromStr;

/// Fully qualified name of `name` within `root`.
///
/// # Example
///
/// ```rust
/// use zinc::record::wire::fqdn;
///
/// assert_eq!(fqdn("@", "example.com."), "example.com.");
/// assert_eq!(fqdn("www", "example.com."), "www.example.com.");
/// ```
#[must_use]
pub fn fqdn(name: &str, root: &str) -> String {
    if name == APEX_NAME {
        root.to_string()
    } else {
        format!("{name}.{root}")
    }
}

/// Name relative to `root`, `@` for the root itself.
///
/// The provider escapes `*` as `\052`; the escape is undone here.
///
/// # Errors
///
/// Returns [`RecordError::Decode`] if `fqdn` is not inside `root`.
pub fn relative_name(fqdn: &str, root: &str) -> Result<String, RecordError> {
    let fqdn = fqdn.replace("\\052", "*");
    let normalized = if fqdn.ends_with('.') {
        fqdn.to_ascii_lowercase()
    } else {
        format!("{}.", fqdn.to_ascii_lowercase())
    };
    let root = root.to_ascii_lowercase();

    if normalized == root {
        return Ok(APEX_NAME.to_string());
    }
    normalized
        .strip_suffix(&format!(".{root}"))
        .map(str::to_string)
        .ok_or_else(|| RecordError::Decode {
            name: fqdn.clone(),
            reason: format!("name is not inside zone {root}"),
        })
}

/// Quote a TXT value as one or more JSON character-strings.
///
/// Values longer than 255 bytes are split on character boundaries; the chunks are
/// separated by a space, which is how the provider expects multi-string TXT data.
#[must_use]
pub fn encode_txt_value(value: &str) -> String {
    if value.is_empty() {
        return quote("");
    }
    let mut chunks = Vec::new();
    let mut start = 0;
    for (index, c) in value.char_indices() {
        if index + c.len_utf8() - start > TXT_CHUNK_LEN {
            chunks.push(quote(&value[start..index]));
            start = index;
        }
    }
    chunks.push(quote(&value[start..]));
    chunks.join(" ")
}

fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Undo [`encode_txt_value`].
///
/// Unquoted input is returned unchanged. Quoted input is parsed as a sequence of
/// JSON strings and concatenated.
#[must_use]
pub fn decode_txt_value(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with('"') {
        return raw.to_string();
    }
    let mut decoded = String::new();
    for chunk in serde_json::Deserializer::from_str(trimmed).into_iter::<String>() {
        match chunk {
            Ok(part) => decoded.push_str(&part),
            Err(_) => return raw.to_string(),
        }
    }
    decoded
}

/// Recursive subset test on encoded values.
///
/// Objects: every key of `desired` exists in `live` with a subset value. Anything
/// else must be equal. Used to decide whether a live record set (or health check)
/// already satisfies the desired one, since the provider may report extra implicit
/// fields.
#[must_use]
pub fn is_subset(desired: &Value, live: &Value) -> bool {
    match (desired, live) {
        (Value::Object(desired), Value::Object(live)) => desired
            .iter()
            .all(|(key, value)| live.get(key).is_some_and(|other| is_subset(value, other))),
        _ => desired == live,
    }
}

/// Whether the live record set already satisfies the desired one.
#[must_use]
pub fn record_set_satisfies(desired: &RecordSet, live: &RecordSet) -> bool {
    match (serde_json::to_value(desired), serde_json::to_value(live)) {
        (Ok(desired), Ok(live)) => is_subset(&desired, &live),
        _ => false,
    }
}

impl Record {
    /// Encode into the provider's record set representation.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::InvalidType`] for POLICY_ROUTED records, which only
    /// exist locally.
    pub fn encode(&self, root: &str) -> Result<RecordSet, RecordError> {
        let mut set = RecordSet {
            name: fqdn(&self.name, root),
            record_type: self.record_type.to_string(),
            set_identifier: self.set_identifier.clone(),
            weight: self.weight.map(i64::from),
            region: self.region.clone(),
            health_check_id: self.health_check_id.clone(),
            traffic_policy_instance_id: self.traffic_policy_instance_id.clone(),
            ..RecordSet::default()
        };

        match &self.data {
            RecordData::Plain { ttl, values } => {
                set.ttl = Some(i64::from(*ttl));
                set.resource_records = values
                    .iter()
                    .map(|value| {
                        if self.record_type.is_text() {
                            ResourceRecordValue::new(encode_txt_value(value))
                        } else {
                            ResourceRecordValue::new(value.clone())
                        }
                    })
                    .collect();
            }
            RecordData::Alias(target) => {
                set.alias_target = Some(AliasTargetSet {
                    hosted_zone_id: target.hosted_zone_id.clone(),
                    dns_name: target.dns_name.clone(),
                    evaluate_target_health: target.evaluate_target_health,
                });
            }
            RecordData::PolicyRouted { .. } => {
                return Err(RecordError::InvalidType {
                    record_type: self.record_type.to_string(),
                    reason: "POLICY_ROUTED records are not sent to the provider".into(),
                });
            }
        }

        Ok(set)
    }

    /// Decode a provider record set.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Decode`] for names outside `root` and for record types
    /// Zinc does not model.
    pub fn decode(set: &RecordSet, root: &str) -> Result<Self, RecordError> {
        let name = relative_name(&set.name, root)?;
        let record_type = RecordType::from_str(&set.record_type)
            .ok()
            .filter(|t| t.is_wire())
            .ok_or_else(|| RecordError::Decode {
                name: set.name.clone(),
                reason: format!("unsupported record type {}", set.record_type),
            })?;

        let data = if let Some(alias) = &set.alias_target {
            RecordData::Alias(AliasTarget {
                dns_name: alias.dns_name.clone(),
                hosted_zone_id: alias.hosted_zone_id.clone(),
                evaluate_target_health: alias.evaluate_target_health,
            })
        } else {
            let values = set
                .resource_records
                .iter()
                .map(|rr| {
                    if record_type.is_text() {
                        decode_txt_value(&rr.value)
                    } else {
                        rr.value.clone()
                    }
                })
                .collect();
            RecordData::Plain {
                ttl: ttl_from_wire(set.ttl.unwrap_or_default()),
                values,
            }
        };

        Ok(Self {
            name,
            record_type,
            data,
            set_identifier: set.set_identifier.clone(),
            weight: set.weight.and_then(|w| u32::try_from(w).ok()),
            region: set.region.clone(),
            health_check_id: set.health_check_id.clone(),
            traffic_policy_instance_id: set.traffic_policy_instance_id.clone(),
            deleted: false,
            dirty: false,
        })
    }
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod wire_tests;
