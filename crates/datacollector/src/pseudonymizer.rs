// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Keyed, one-way replacement of player display names.
//!
//! Tokens are lowercase hex HMAC-SHA512 digests of the UTF-8 display name. The same name
//! always maps to the same token under one key, so a player can be followed across events
//! without the raw name ever reaching storage. Rotating the key breaks that correlation.

use hmac::{Hmac, Mac};
use sha2::Sha512;

use crate::errors::PseudonymizeError;

type HmacSha512 = Hmac<Sha512>;

/// Maps an identity to the opaque token stored in its place.
pub trait IdentityTokenizer: Send + Sync + std::fmt::Debug {
    fn tokenize(&self, identity: &str) -> Result<String, PseudonymizeError>;
}

pub struct Pseudonymizer {
    key: Vec<u8>,
}

impl Pseudonymizer {
    pub fn new(secret: &str) -> Result<Self, PseudonymizeError> {
        if secret.is_empty() {
            return Err(PseudonymizeError::MissingKey);
        }
        Ok(Pseudonymizer {
            key: secret.as_bytes().to_vec(),
        })
    }

    /// Returns the opaque token for `identity`.
    ///
    /// An error here must drop the whole event; the identity is never passed through.
    pub fn pseudonymize(&self, identity: &str) -> Result<String, PseudonymizeError> {
        let mut mac = HmacSha512::new_from_slice(&self.key)
            .map_err(|e| PseudonymizeError::InvalidKey(e.to_string()))?;
        mac.update(identity.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl IdentityTokenizer for Pseudonymizer {
    fn tokenize(&self, identity: &str) -> Result<String, PseudonymizeError> {
        self.pseudonymize(identity)
    }
}

impl Drop for Pseudonymizer {
    fn drop(&mut self) {
        self.key.iter_mut().for_each(|b| *b = 0);
    }
}

impl std::fmt::Debug for Pseudonymizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Pseudonymizer")
    }
}
