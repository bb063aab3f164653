// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Content-derived record identities.
//!
//! An identity has the shape `Z{zone}Z{type}Z{key}`:
//!
//! - `zone` hashes the hosted zone id
//! - `type` is [`RecordType::code`]
//! - `key` hashes the name, type and set identifier
//!
//! Each hash joins its inputs with `:`, takes SHA-256, keeps the first 16 hex
//! characters as a `u64` and encodes that with salted hashids. Two records of one
//! zone share an identity exactly when name, type and set identifier match, which
//! makes the identity the upsert key of the record store.

use super::RecordType;
use crate::constants::{HASH_HEX_PREFIX_LEN, HASH_INPUT_SEPARATOR};
use anyhow::{anyhow, Result};
use harsh::{Harsh, HarshBuilder};
use sha2::{Digest, Sha256};
use std::fmt;

/// Computes record identities with the deployment secret as salt.
pub struct RecordHasher {
    harsh: Harsh,
}

impl RecordHasher {
    /// Create a hasher.
    ///
    /// # Arguments
    ///
    /// * `secret` - Deployment secret used as the hashids salt
    /// * `min_length` - Minimum length of each encoded hash
    ///
    /// # Errors
    ///
    /// Returns an error if the hashids encoder cannot be built.
    pub fn new(secret: &str, min_length: usize) -> Result<Self> {
        let harsh = HarshBuilder::new()
            .salt(secret)
            .length(min_length)
            .build()
            .map_err(|e| anyhow!("Failed to build record id encoder: {e:?}"))?;
        Ok(Self { harsh })
    }

    /// Hash a list of inputs into a short alphanumeric string.
    #[must_use]
    pub fn hash(&self, parts: &[&str]) -> String {
        let joined = parts.join(HASH_INPUT_SEPARATOR);
        let digest = Sha256::digest(joined.as_bytes());
        let hex = format!("{digest:x}");
        // 16 hex characters always fit in a u64
        let number = u64::from_str_radix(&hex[..HASH_HEX_PREFIX_LEN], 16).unwrap_or_default();
        self.harsh.encode(&[number])
    }

    /// Identity of a record set within a zone.
    #[must_use]
    pub fn record_id(
        &self,
        zone_id: &str,
        name: &str,
        record_type: RecordType,
        set_identifier: Option<&str>,
    ) -> String {
        let zone_hash = self.hash(&[zone_id]);
        let key_hash = self.hash(&[name, record_type.as_str(), set_identifier.unwrap_or("")]);
        format!("Z{zone_hash}Z{}Z{key_hash}", record_type.code())
    }
}

impl fmt::Debug for RecordHasher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordHasher").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
