use std::{collections::HashMap, sync::Mutex, time::Duration};

use chrono::{DateTime, Utc};
use log::*;

/// Remembers which nonces each API client has already used.
///
/// An entry must outlive every moment at which its request could still pass the freshness check. A request stamped
/// `request_time` is fresh until `request_time + window`, which for a future-dated request is later than
/// `now + window`. Entries are therefore kept for one window past the later of the two.
pub trait NonceLedger: Send + Sync {
    /// True if `nonce` has been recorded for `label` and has not yet expired.
    fn has(&self, label: &str, nonce: &str, now: DateTime<Utc>) -> bool;

    /// Records `nonce` for `label`, as carried by a request stamped `request_time`. Returns `false`, and changes
    /// nothing, if the nonce was already recorded.
    fn mark(&self, label: &str, nonce: &str, now: DateTime<Utc>, request_time: DateTime<Utc>) -> bool;
}

/// A per-process [`NonceLedger`]. Expired entries are purged lazily on every call.
///
/// Replicas do not share this ledger, so a request replayed against a different instance within the window is not
/// detected.
#[derive(Debug)]
pub struct MemoryNonceLedger {
    window: Duration,
    seen: Mutex<HashMap<(String, String), DateTime<Utc>>>,
}

impl MemoryNonceLedger {
    pub fn new(window: Duration) -> Self {
        Self { window, seen: Mutex::new(HashMap::new()) }
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<(String, String), DateTime<Utc>>> {
        // The map is never left half-updated, so poisoning is ignored.
        self.seen.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn purge(&self, seen: &mut HashMap<(String, String), DateTime<Utc>>, now: DateTime<Utc>) {
        let before = seen.len();
        // Entries stamped in the future (to_std fails on negative durations) are kept.
        seen.retain(|_, at| (now - *at).to_std().map(|age| age <= self.window).unwrap_or(true));
        let purged = before - seen.len();
        if purged > 0 {
            trace!("🔐️ Purged {purged} expired nonces");
        }
    }
}

impl NonceLedger for MemoryNonceLedger {
    fn has(&self, label: &str, nonce: &str, now: DateTime<Utc>) -> bool {
        let mut seen = self.entries();
        self.purge(&mut seen, now);
        seen.contains_key(&(label.to_string(), nonce.to_string()))
    }

    fn mark(&self, label: &str, nonce: &str, now: DateTime<Utc>, request_time: DateTime<Utc>) -> bool {
        let mut seen = self.entries();
        self.purge(&mut seen, now);
        let key = (label.to_string(), nonce.to_string());
        if seen.contains_key(&key) {
            return false;
        }
        seen.insert(key, now.max(request_time));
        true
    }
}
