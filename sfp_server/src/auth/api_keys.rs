use sfp_common::{
    hmac::{constant_time_eq, sha256_digest},
    Secret,
};

use crate::config::ApiKeyRecord;

#[derive(Clone)]
struct KeyEntry {
    label: String,
    digest: [u8; 32],
    secret: Secret<String>,
}

/// The configured API keys.
///
/// Keys are held as SHA-256 digests, so a lookup always compares 32-byte values regardless of what the caller sent.
#[derive(Clone, Default)]
pub struct ApiKeyRing {
    entries: Vec<KeyEntry>,
}

/// The key a request was matched against.
pub struct MatchedKey<'a> {
    pub label: &'a str,
    pub secret: &'a Secret<String>,
}

impl ApiKeyRing {
    pub fn new(records: &[ApiKeyRecord]) -> Self {
        let entries = records
            .iter()
            .map(|r| KeyEntry {
                label: r.label.clone(),
                digest: sha256_digest(r.key.reveal().as_bytes()),
                secret: r.secret.clone(),
            })
            .collect();
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Finds the entry for `key`. Every entry is compared, whether or not an earlier one already matched.
    pub fn find(&self, key: &str) -> Option<MatchedKey<'_>> {
        let supplied = sha256_digest(key.as_bytes());
        let mut matched = None;
        for entry in &self.entries {
            let equal = constant_time_eq(&entry.digest, &supplied);
            if equal && matched.is_none() {
                matched = Some(entry);
            }
        }
        matched.map(|e| MatchedKey { label: e.label.as_str(), secret: &e.secret })
    }
}
