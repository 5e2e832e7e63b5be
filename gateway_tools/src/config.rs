use std::time::Duration;

use log::*;
use sfp_common::Secret;

const DEFAULT_GATEWAY_URL: &str = "https://api.stripe.com";
const DEFAULT_TIMEOUT_SECS: u64 = 15;
const DEFAULT_WEBHOOK_TOLERANCE_SECS: u64 = 300;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Base URL of the gateway's REST API, without a trailing slash
    pub base_url: String,
    pub secret_key: Secret<String>,
    /// Shared secret for verifying the gateway's webhook signatures. Unrelated to the storefront's API keys.
    pub webhook_secret: Secret<String>,
    /// Applied to every request made by [`crate::GatewayApi`]
    pub timeout: Duration,
    /// Maximum age (and future skew) of a webhook signature timestamp
    pub webhook_tolerance: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GATEWAY_URL.to_string(),
            secret_key: Secret::default(),
            webhook_secret: Secret::default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            webhook_tolerance: Duration::from_secs(DEFAULT_WEBHOOK_TOLERANCE_SECS),
        }
    }
}

impl GatewayConfig {
    pub fn new_from_env_or_default() -> Self {
        let base_url = std::env::var("SFP_GATEWAY_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                info!("🪛️ SFP_GATEWAY_URL not set, using {DEFAULT_GATEWAY_URL}");
                DEFAULT_GATEWAY_URL.to_string()
            });
        let secret_key = Secret::new(std::env::var("SFP_GATEWAY_SECRET_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SFP_GATEWAY_SECRET_KEY not set. Every call to the payment gateway will be rejected.");
            String::default()
        }));
        let webhook_secret = Secret::new(std::env::var("SFP_GATEWAY_WEBHOOK_SECRET").unwrap_or_else(|_| {
            warn!("🪛️ SFP_GATEWAY_WEBHOOK_SECRET not set. Every gateway webhook will be rejected.");
            String::default()
        }));
        let timeout = Duration::from_secs(secs_from_env("SFP_GATEWAY_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS));
        let webhook_tolerance =
            Duration::from_secs(secs_from_env("SFP_WEBHOOK_TOLERANCE_SECS", DEFAULT_WEBHOOK_TOLERANCE_SECS));
        Self { base_url, secret_key, webhook_secret, timeout, webhook_tolerance }
    }
}

fn secs_from_env(var: &str, default: u64) -> u64 {
    match std::env::var(var).map(|s| s.parse::<u64>()) {
        Ok(Ok(secs)) => secs,
        Ok(Err(e)) => {
            error!("🪛️ {var} is not a valid number of seconds ({e}). Using the default, {default}s.");
            default
        },
        Err(_) => {
            info!("🪛️ {var} not set, using the default, {default}s.");
            default
        },
    }
}
