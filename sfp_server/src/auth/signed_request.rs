//! Signed-request authentication for the storefront API.
//!
//! Every request carries four headers:
//! * `x-api-key`: the client's API key, sent verbatim.
//! * `x-timestamp`: when the request was signed, as an RFC 3339 timestamp.
//! * `x-nonce`: a value the client never reuses.
//! * `x-signature`: the hex HMAC-SHA256 of the canonical message (see [`canonical_message`]) keyed with the client's
//!   secret.
//!
//! A request is admitted if its timestamp is within the freshness window, its key is known, its nonce has not been
//! seen, and its signature matches. Nonces are only recorded for admitted requests.
use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use log::*;
use sfp_common::hmac::{calculate_hmac, verify_hmac};

use crate::{
    auth::{api_keys::ApiKeyRing, nonce_ledger::NonceLedger},
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

pub const API_KEY_HEADER: &str = "x-api-key";
pub const TIMESTAMP_HEADER: &str = "x-timestamp";
pub const NONCE_HEADER: &str = "x-nonce";
pub const SIGNATURE_HEADER: &str = "x-signature";

/// The API client an admitted request belongs to. Stored in the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiClient {
    pub label: String,
}

/// The parts of an incoming request that take part in authentication.
#[derive(Debug, Clone, Default)]
pub struct SignedRequest<'a> {
    pub method: &'a str,
    pub path: &'a str,
    pub api_key: Option<&'a str>,
    pub timestamp: Option<&'a str>,
    pub nonce: Option<&'a str>,
    pub signature: Option<&'a str>,
    pub body: &'a [u8],
}

/// `METHOD \n PATH \n timestamp \n nonce \n body`, with the timestamp exactly as the client sent it.
pub fn canonical_message(method: &str, path: &str, timestamp: &str, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(method.len() + path.len() + timestamp.len() + nonce.len() + body.len() + 4);
    for part in [method, path, timestamp, nonce] {
        message.extend_from_slice(part.as_bytes());
        message.push(b'\n');
    }
    message.extend_from_slice(body);
    message
}

/// Produces the `x-signature` value a client would send.
pub fn sign_request(secret: &str, method: &str, path: &str, timestamp: &str, nonce: &str, body: &[u8]) -> String {
    calculate_hmac(secret, &canonical_message(method, path, timestamp, nonce, body))
}

#[derive(Clone)]
pub struct SignedRequestAuthenticator {
    keys: ApiKeyRing,
    window: Duration,
    ledger: Arc<dyn NonceLedger>,
}

impl SignedRequestAuthenticator {
    pub fn new(config: &AuthConfig, ledger: Arc<dyn NonceLedger>) -> Self {
        Self { keys: ApiKeyRing::new(&config.api_keys), window: config.window, ledger }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn has_keys(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Runs the authentication checks in order, stopping at the first failure.
    ///
    /// Rejections are [`ServerError::AuthenticationError`], except for replays which are
    /// [`ServerError::ReplayDetected`].
    pub fn authenticate(&self, req: &SignedRequest<'_>, now: DateTime<Utc>) -> Result<ApiClient, ServerError> {
        if self.keys.is_empty() {
            error!("🔐️ A signed request arrived, but no API keys are configured. Set SFP_API_KEYS.");
            return Err(AuthError::NoKeysConfigured.into());
        }
        let (Some(api_key), Some(timestamp), Some(nonce), Some(signature)) =
            (req.api_key, req.timestamp, req.nonce, req.signature)
        else {
            debug!("🔐️ {} {} is missing one or more authentication headers", req.method, req.path);
            return Err(AuthError::MissingCredentials.into());
        };
        let Some(request_time) = self.fresh_timestamp(timestamp, now) else {
            debug!("🔐️ {} {} has a stale, future or malformed timestamp: {timestamp}", req.method, req.path);
            return Err(AuthError::StaleOrFutureTimestamp.into());
        };
        let key = self.keys.find(api_key).ok_or_else(|| {
            warn!("🔐️ {} {} was signed with an unknown API key", req.method, req.path);
            AuthError::UnknownKey
        })?;
        if self.ledger.has(key.label, nonce, now) {
            warn!("🔐️ Replayed request from {}: nonce {nonce} has already been used", key.label);
            return Err(ServerError::ReplayDetected);
        }
        let message = canonical_message(req.method, req.path, timestamp, nonce, req.body);
        if !verify_hmac(key.secret.reveal(), &message, signature) {
            warn!("🔐️ Invalid signature on {} {} from {}", req.method, req.path, key.label);
            return Err(AuthError::SignatureMismatch.into());
        }
        if !self.ledger.mark(key.label, nonce, now, request_time) {
            warn!("🔐️ Nonce {nonce} from {} was used by a concurrent request", key.label);
            return Err(ServerError::ReplayDetected);
        }
        trace!("🔐️ {} {} from {} ✅️", req.method, req.path, key.label);
        Ok(ApiClient { label: key.label.to_string() })
    }

    /// The parsed timestamp, if `|now - timestamp| <= window`. Both ends of the window are accepted.
    fn fresh_timestamp(&self, timestamp: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let ts = DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc);
        let skew = if ts > now { ts - now } else { now - ts };
        skew.to_std().is_ok_and(|s| s <= self.window).then_some(ts)
    }
}
