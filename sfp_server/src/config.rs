use std::{env, time::Duration};

use gateway_tools::GatewayConfig;
use log::*;
use serde::Deserialize;
use sfp_common::Secret;
use sfp_engine::{DEFAULT_GATEWAY_TIMEOUT, DEFAULT_MIN_RETRY_GAP};

use crate::errors::ServerError;

const DEFAULT_SFP_HOST: &str = "127.0.0.1";
const DEFAULT_SFP_PORT: u16 = 8360;
const DEFAULT_AUTH_WINDOW: Duration = Duration::from_secs(300);
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(300);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    pub identity: IdentityConfig,
    pub gateway: GatewayConfig,
    pub sweep: SweepSchedule,
    /// If true, the X-Forwarded-For header will be used to determine the client's IP address, rather than the
    /// connection's remote address.
    pub use_x_forwarded_for: bool,
    /// If true, the Forwarded header will be used to determine the client's IP address, rather than the connection's
    /// remote address.
    pub use_forwarded: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_SFP_HOST.to_string(),
            port: DEFAULT_SFP_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            identity: IdentityConfig::default(),
            gateway: GatewayConfig::default(),
            sweep: SweepSchedule::default(),
            use_x_forwarded_for: false,
            use_forwarded: false,
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("SFP_HOST").ok().unwrap_or_else(|| DEFAULT_SFP_HOST.into());
        let port = env::var("SFP_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for SFP_PORT. {e} Using the default, {DEFAULT_SFP_PORT}, instead."
                    );
                    DEFAULT_SFP_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_SFP_PORT);
        let database_url = env::var("SFP_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ SFP_DATABASE_URL is not set. Please set it to the URL for the storefront database.");
            String::default()
        });
        let auth = AuthConfig::try_from_env().unwrap_or_else(|e| {
            error!(
                "🪛️ Could not load the API keys from SFP_API_KEYS. {e}. No keys are configured, so every signed \
                 request will be refused."
            );
            AuthConfig::default()
        });
        let identity = IdentityConfig::from_env_or_default();
        let gateway = GatewayConfig::new_from_env_or_default();
        let sweep = SweepSchedule::from_env_or_default(gateway.timeout);
        let use_x_forwarded_for = env_flag("SFP_USE_X_FORWARDED_FOR");
        let use_forwarded = env_flag("SFP_USE_FORWARDED");
        Self { host, port, database_url, auth, identity, gateway, sweep, use_x_forwarded_for, use_forwarded }
    }
}

fn env_flag(var: &str) -> bool {
    env::var(var).map(|s| &s == "1" || &s == "true").unwrap_or(false)
}

fn duration_from_env(var: &str, default: Duration) -> Duration {
    env::var(var)
        .map_err(|_| info!("🪛️ {var} is not set. Using the default value of {}s.", default.as_secs()))
        .and_then(|s| {
            s.parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| warn!("🪛️ Invalid configuration value for {var}. {e}. Using {}s.", default.as_secs()))
        })
        .ok()
        .unwrap_or(default)
}

//-------------------------------------------------  AuthConfig  -------------------------------------------------------
/// One client of the signed-request API, e.g. the storefront's backend.
#[derive(Clone, Debug, Deserialize)]
pub struct ApiKeyRecord {
    /// Names the client in logs and in the nonce ledger
    pub label: String,
    /// Sent verbatim by the client in the `x-api-key` header
    pub key: Secret<String>,
    /// Signs requests. Never sent over the wire.
    pub secret: Secret<String>,
}

#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub api_keys: Vec<ApiKeyRecord>,
    /// How far a request timestamp may be from the server clock, in either direction. Nonces are remembered for the
    /// same period.
    pub window: Duration,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self { api_keys: Vec::new(), window: DEFAULT_AUTH_WINDOW }
    }
}

impl AuthConfig {
    /// Reads `SFP_API_KEYS`, a JSON array of `{"label": .., "key": .., "secret": ..}` objects, and
    /// `SFP_AUTH_WINDOW_SECS`.
    pub fn try_from_env() -> Result<Self, ServerError> {
        let window = duration_from_env("SFP_AUTH_WINDOW_SECS", DEFAULT_AUTH_WINDOW);
        let json =
            env::var("SFP_API_KEYS").map_err(|e| ServerError::ConfigurationError(format!("{e} [SFP_API_KEYS]")))?;
        let api_keys = parse_api_keys(&json)?;
        info!("🪛️ {} API keys loaded: {}", api_keys.len(), labels(&api_keys));
        Ok(Self { api_keys, window })
    }
}

pub fn parse_api_keys(json: &str) -> Result<Vec<ApiKeyRecord>, ServerError> {
    let keys: Vec<ApiKeyRecord> = serde_json::from_str(json)
        .map_err(|e| ServerError::ConfigurationError(format!("SFP_API_KEYS is not a valid key list. {e}")))?;
    if let Some(k) = keys.iter().find(|k| k.key.reveal().is_empty() || k.secret.reveal().is_empty()) {
        return Err(ServerError::ConfigurationError(format!("API key '{}' has an empty key or secret", k.label)));
    }
    let mut seen = std::collections::HashSet::new();
    if let Some(k) = keys.iter().find(|k| !seen.insert(k.label.as_str())) {
        return Err(ServerError::ConfigurationError(format!("API key label '{}' is used more than once", k.label)));
    }
    Ok(keys)
}

fn labels(keys: &[ApiKeyRecord]) -> String {
    keys.iter().map(|k| k.label.as_str()).collect::<Vec<_>>().join(", ")
}

//-----------------------------------------------  IdentityConfig  -----------------------------------------------------
#[derive(Clone, Debug, Default)]
pub struct IdentityConfig {
    /// Base URL of the identity provider that verifies admin bearer tokens
    pub url: String,
    pub api_key: Secret<String>,
}

impl IdentityConfig {
    pub fn from_env_or_default() -> Self {
        let url = env::var("SFP_IDENTITY_URL").map(|s| s.trim_end_matches('/').to_string()).unwrap_or_else(|_| {
            warn!("🪛️ SFP_IDENTITY_URL is not set. Admin endpoints will refuse every request.");
            String::default()
        });
        let api_key = Secret::new(env::var("SFP_IDENTITY_API_KEY").unwrap_or_else(|_| {
            warn!("🪛️ SFP_IDENTITY_API_KEY is not set.");
            String::default()
        }));
        Self { url, api_key }
    }
}

//-----------------------------------------------  SweepSchedule  ------------------------------------------------------
#[derive(Clone, Copy, Debug)]
pub struct SweepSchedule {
    pub interval: Duration,
    pub min_retry_gap: Duration,
    pub gateway_timeout: Duration,
}

impl Default for SweepSchedule {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SWEEP_INTERVAL,
            min_retry_gap: DEFAULT_MIN_RETRY_GAP,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
        }
    }
}

impl SweepSchedule {
    pub fn from_env_or_default(gateway_timeout: Duration) -> Self {
        let mut interval = duration_from_env("SFP_SWEEP_INTERVAL_SECS", DEFAULT_SWEEP_INTERVAL);
        if interval.is_zero() {
            warn!("🪛️ SFP_SWEEP_INTERVAL_SECS cannot be zero. Using the default.");
            interval = DEFAULT_SWEEP_INTERVAL;
        }
        let min_retry_gap = duration_from_env("SFP_SWEEP_MIN_RETRY_GAP_SECS", DEFAULT_MIN_RETRY_GAP);
        Self { interval, min_retry_gap, gateway_timeout }
    }
}
