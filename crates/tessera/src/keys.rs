// Copyright 2019-2026 Maravilla Labs, operated by SOLUTAS GmbH, Switzerland
// SPDX-License-Identifier: Apache-2.0
// SPDX-License-Identifier: MIT

//! Rotating signing keys for cookies.
//!
//! The first key signs; every key verifies, so a new key can be prepended
//! without invalidating cookies signed with an older one.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::ConfigError;

type HmacSha256 = Hmac<Sha256>;

/// Ordered list of HMAC-SHA256 keys.
#[derive(Clone)]
pub struct Keys {
    keys: Vec<Vec<u8>>,
}

impl std::fmt::Debug for Keys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keys").field("count", &self.keys.len()).finish()
    }
}

impl Keys {
    /// Creates the key list. At least one non-empty key is required.
    pub fn new<I, S>(keys: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let keys: Vec<Vec<u8>> = keys
            .into_iter()
            .map(|k| k.as_ref().as_bytes().to_vec())
            .filter(|k| !k.is_empty())
            .collect();
        if keys.is_empty() {
            return Err(ConfigError::Invalid(
                "server.secret_keys must contain at least one key".to_string(),
            ));
        }
        Ok(Self { keys })
    }

    /// Signs `data` with the first key.
    pub fn sign(&self, data: &str) -> String {
        URL_SAFE_NO_PAD.encode(digest(&self.keys[0], data))
    }

    /// True if `signature` was produced by any key.
    pub fn verify(&self, data: &str, signature: &str) -> bool {
        let Ok(signature) = URL_SAFE_NO_PAD.decode(signature) else {
            return false;
        };
        self.keys.iter().any(|key| {
            HmacSha256::new_from_slice(key)
                .map(|mut mac| {
                    mac.update(data.as_bytes());
                    mac.verify_slice(&signature).is_ok()
                })
                .unwrap_or(false)
        })
    }
}

fn digest(key: &[u8], data: &str) -> Vec<u8> {
    // HMAC accepts keys of any length
    let mut mac = match HmacSha256::new_from_slice(key) {
        Ok(mac) => mac,
        Err(_) => return Vec::new(),
    };
    mac.update(data.as_bytes());
    mac.finalize().into_bytes().to_vec()
}
