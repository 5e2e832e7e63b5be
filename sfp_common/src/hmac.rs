//! HMAC-SHA256 signature helpers.
//!
//! Signatures travel as lowercase hex. Verification decodes the supplied signature and compares the raw MAC bytes in
//! constant time, so a mismatch takes the same time no matter which byte differs.
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Calculates the HMAC-SHA256 of `data` keyed with `secret` and returns it as lowercase hex.
pub fn calculate_hmac(secret: &str, data: &[u8]) -> String {
    hex::encode(hmac_bytes(secret, data))
}

/// Returns true if `signature` is the lowercase (or uppercase) hex encoding of the HMAC-SHA256 of `data`.
///
/// Malformed hex is treated as a mismatch.
pub fn verify_hmac(secret: &str, data: &[u8], signature: &str) -> bool {
    let Ok(supplied) = hex::decode(signature) else {
        return false;
    };
    let expected = hmac_bytes(secret, data);
    constant_time_eq(&expected, &supplied)
}

/// SHA-256 digest of `value`. Used to compare API keys without leaking their length or prefix through timing.
pub fn sha256_digest(value: &[u8]) -> [u8; 32] {
    Sha256::digest(value).into()
}

/// Length-checked constant time comparison.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

fn hmac_bytes(secret: &str, data: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().to_vec()
}
