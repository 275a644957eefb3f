//! Stream key registry
//!
//! Issues, validates and revokes the opaque credentials publishers use to
//! push a live stream. Keys live in memory only; a restart invalidates every
//! key that was handed out.

use base64::Engine;
use chrono::Utc;
use parking_lot::RwLock;
use rand::rngs::OsRng;
use rand::RngCore;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::models::{redact, StreamKey};
use crate::{Error, Result};

/// Key length in bytes (128 bits of entropy)
pub const STREAM_KEY_BYTES: usize = 16;
/// Length of an encoded key: unpadded URL-safe base64 of [`STREAM_KEY_BYTES`].
pub const STREAM_KEY_LEN: usize = 22;

const MAX_ISSUE_ATTEMPTS: usize = 4;

/// In-memory registry of publisher stream keys.
///
/// Reads take a shared lock, so concurrent validations never block each
/// other and always observe a consistent map.
#[derive(Default)]
pub struct StreamKeyRegistry {
    keys: RwLock<HashMap<String, StreamKey>>,
}

impl std::fmt::Debug for StreamKeyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamKeyRegistry")
            .field("keys", &self.keys.read().len())
            .finish()
    }
}

impl StreamKeyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a fresh key for `owner_id`.
    ///
    /// Fails only when the operating system's entropy source fails.
    pub fn issue(&self, owner_id: &str) -> Result<String> {
        for _ in 0..MAX_ISSUE_ATTEMPTS {
            let value = generate_key()?;

            let mut keys = self.keys.write();
            if keys.contains_key(&value) {
                continue;
            }
            keys.insert(
                value.clone(),
                StreamKey {
                    value: value.clone(),
                    owner_id: owner_id.to_string(),
                    issued_at: Utc::now(),
                    revoked: false,
                },
            );
            drop(keys);

            info!(owner_id = %owner_id, stream_key = %redact(&value), "Stream key issued");
            return Ok(value);
        }

        Err(Error::Entropy(format!(
            "generated {MAX_ISSUE_ATTEMPTS} colliding stream keys in a row"
        )))
    }

    /// Whether `key` was issued and has not been revoked.
    #[must_use]
    pub fn validate(&self, key: &str) -> bool {
        self.keys.read().get(key).is_some_and(|k| !k.revoked)
    }

    /// Revoke `key`. Revoking an unknown or already revoked key is a no-op.
    ///
    /// Returns the revoked entry when one was present.
    pub fn revoke(&self, key: &str) -> Option<StreamKey> {
        let removed = self.keys.write().remove(key).map(|mut entry| {
            entry.revoked = true;
            entry
        });

        if let Some(entry) = &removed {
            info!(owner_id = %entry.owner_id, stream_key = %redact(key), "Stream key revoked");
        } else {
            debug!(stream_key = %redact(key), "Revoke of unknown stream key ignored");
        }
        removed
    }

    #[must_use]
    pub fn lookup_owner(&self, key: &str) -> Option<String> {
        self.keys
            .read()
            .get(key)
            .filter(|k| !k.revoked)
            .map(|k| k.owner_id.clone())
    }

    /// Find the most recently issued valid key held by `owner_id`.
    ///
    /// Linear in the number of keys.
    #[must_use]
    pub fn lookup_key_for_owner(&self, owner_id: &str) -> Option<String> {
        self.keys
            .read()
            .values()
            .filter(|k| !k.revoked && k.owner_id == owner_id)
            .max_by_key(|k| k.issued_at)
            .map(|k| k.value.clone())
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<StreamKey> {
        self.keys.read().get(key).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Whether `key` has the shape of an issued key: [`STREAM_KEY_LEN`]
/// characters of the URL-safe base64 alphabet.
#[must_use]
pub fn is_well_formed_key(key: &str) -> bool {
    key.len() == STREAM_KEY_LEN && key.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

fn generate_key() -> Result<String> {
    let mut bytes = [0u8; STREAM_KEY_BYTES];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| Error::Entropy(e.to_string()))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes))
}
