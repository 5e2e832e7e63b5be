//! The gateway's webhook envelope and its signature scheme.
//!
//! The gateway signs each delivery with a header of the form `t=<unix seconds>,v1=<hex hmac>[,v1=...]`. The HMAC is
//! SHA-256 over `"{t}.{raw body}"`, keyed with the webhook secret. Multiple `v1` entries appear while the secret is
//! being rotated; any one of them matching is enough.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sfp_common::hmac::{calculate_hmac, verify_hmac};
use thiserror::Error;

use crate::data_objects::{GatewayCharge, GatewayPaymentIntent};

pub const SIGNATURE_HEADER: &str = "Stripe-Signature";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookSignatureError {
    #[error("The webhook signature header is missing")]
    MissingHeader,
    #[error("The webhook signature header is malformed. {0}")]
    Malformed(String),
    #[error("The webhook signature is {0}s outside the tolerance window")]
    OutsideTolerance(i64),
    #[error("The webhook signature does not match the payload")]
    Mismatch,
}

/// A parsed signature header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub timestamp: i64,
    pub signatures: Vec<String>,
}

impl SignatureHeader {
    pub fn parse(header: &str) -> Result<Self, WebhookSignatureError> {
        if header.trim().is_empty() {
            return Err(WebhookSignatureError::MissingHeader);
        }
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let Some((key, value)) = part.trim().split_once('=') else {
                return Err(WebhookSignatureError::Malformed(format!("'{part}' is not a key=value pair")));
            };
            match key {
                "t" => {
                    let t = value
                        .parse::<i64>()
                        .map_err(|e| WebhookSignatureError::Malformed(format!("Invalid timestamp. {e}")))?;
                    timestamp = Some(t);
                },
                "v1" => signatures.push(value.to_string()),
                // Legacy and future schemes are ignored
                _ => {},
            }
        }
        let timestamp = timestamp.ok_or_else(|| WebhookSignatureError::Malformed("No timestamp".into()))?;
        if signatures.is_empty() {
            return Err(WebhookSignatureError::Malformed("No v1 signature".into()));
        }
        Ok(Self { timestamp, signatures })
    }
}

fn signed_payload(timestamp: i64, payload: &[u8]) -> Vec<u8> {
    let mut data = Vec::with_capacity(payload.len() + 12);
    data.extend_from_slice(timestamp.to_string().as_bytes());
    data.push(b'.');
    data.extend_from_slice(payload);
    data
}

/// Checks the signature header against the raw request body. The timestamp check runs first and is symmetric: a
/// timestamp more than `tolerance_secs` in the future is rejected just like a stale one.
pub fn verify_signature(
    secret: &str,
    header: &str,
    payload: &[u8],
    tolerance_secs: i64,
    now: DateTime<Utc>,
) -> Result<SignatureHeader, WebhookSignatureError> {
    let parsed = SignatureHeader::parse(header)?;
    match now.timestamp().checked_sub(parsed.timestamp) {
        Some(skew) if skew.unsigned_abs() <= tolerance_secs.unsigned_abs() => {},
        Some(skew) => return Err(WebhookSignatureError::OutsideTolerance(skew)),
        None if parsed.timestamp < 0 => return Err(WebhookSignatureError::OutsideTolerance(i64::MAX)),
        None => return Err(WebhookSignatureError::OutsideTolerance(i64::MIN)),
    }
    let data = signed_payload(parsed.timestamp, payload);
    if parsed.signatures.iter().any(|sig| verify_hmac(secret, &data, sig)) {
        Ok(parsed)
    } else {
        Err(WebhookSignatureError::Mismatch)
    }
}

/// Produces a signature header for `payload`, as the gateway would. Used by tooling and tests that play the gateway.
pub fn sign_payload(secret: &str, timestamp: i64, payload: &[u8]) -> String {
    let sig = calculate_hmac(secret, &signed_payload(timestamp, payload));
    format!("t={timestamp},v1={sig}")
}

//--------------------------------------     Event envelope     --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub created: i64,
    pub data: EventData,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub object: serde_json::Value,
}

/// The event kinds the storefront acts on.
#[derive(Debug, Clone)]
pub enum EventPayload {
    PaymentSucceeded(GatewayPaymentIntent),
    PaymentFailed(GatewayPaymentIntent),
    PaymentCanceled(GatewayPaymentIntent),
    ChargeRefunded(GatewayCharge),
    /// Any other kind. Carried so it can be logged.
    Other(String),
}

impl GatewayEvent {
    /// Decodes the event's object for the kinds the storefront acts on.
    pub fn payload(&self) -> Result<EventPayload, serde_json::Error> {
        let intent = || serde_json::from_value::<GatewayPaymentIntent>(self.data.object.clone());
        let payload = match self.kind.as_str() {
            "payment_intent.succeeded" => EventPayload::PaymentSucceeded(intent()?),
            "payment_intent.payment_failed" => EventPayload::PaymentFailed(intent()?),
            "payment_intent.canceled" => EventPayload::PaymentCanceled(intent()?),
            "charge.refunded" => EventPayload::ChargeRefunded(serde_json::from_value(self.data.object.clone())?),
            other => EventPayload::Other(other.to_string()),
        };
        Ok(payload)
    }
}
