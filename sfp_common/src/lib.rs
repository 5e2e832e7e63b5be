//! Shared building blocks for the storefront payment crates.
//!
//! * [`Secret`] wraps configuration values that must never end up in logs.
//! * [`hmac`] is the stateless signature verifier used by both the signed-request gate and the gateway webhook check.
pub mod hmac;
mod secret;

pub use secret::Secret;
