use std::time::Duration;

use log::*;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use sfp_engine::db_types::Role;
use thiserror::Error;

use crate::config::IdentityConfig;

const IDENTITY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum IdentityError {
    #[error("The bearer token was not accepted. {0}")]
    InvalidToken(String),
    #[error("The identity provider has no user {0}")]
    UnknownUser(String),
    #[error("The identity provider could not be reached. {0}")]
    Unavailable(String),
}

/// The external service that issues operator bearer tokens and knows each user's role.
#[allow(async_fn_in_trait)]
pub trait IdentityProvider {
    /// Resolves a bearer token to the id of the user it was issued to.
    async fn verify_token(&self, token: &str) -> Result<String, IdentityError>;

    async fn fetch_role(&self, user_id: &str) -> Result<Role, IdentityError>;
}

/// Talks to a hosted auth service over REST.
///
/// * `GET {url}/auth/v1/user` with the bearer token returns the user the token belongs to.
/// * `GET {url}/rest/v1/users?id=eq.{id}&select=role` returns that user's role.
///
/// Both calls send the service API key in the `apikey` header.
#[derive(Clone)]
pub struct HttpIdentityProvider {
    config: IdentityConfig,
    client: Client,
}

#[derive(Deserialize)]
struct UserRecord {
    id: String,
}

#[derive(Deserialize)]
struct RoleRecord {
    role: Option<String>,
}

impl HttpIdentityProvider {
    pub fn new(config: IdentityConfig) -> Result<Self, IdentityError> {
        let client = Client::builder()
            .timeout(IDENTITY_TIMEOUT)
            .build()
            .map_err(|e| IdentityError::Unavailable(format!("Could not create HTTP client. {e}")))?;
        Ok(Self { config, client })
    }

    fn url(&self, path: &str) -> Result<String, IdentityError> {
        if self.config.url.is_empty() {
            return Err(IdentityError::Unavailable("No identity provider is configured".into()));
        }
        Ok(format!("{}{path}", self.config.url))
    }
}

impl IdentityProvider for HttpIdentityProvider {
    async fn verify_token(&self, token: &str) -> Result<String, IdentityError> {
        let url = self.url("/auth/v1/user")?;
        let response = self
            .client
            .get(url)
            .header("apikey", self.config.api_key.reveal())
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        match response.status() {
            s if s.is_success() => {
                let user = response.json::<UserRecord>().await.map_err(|e| IdentityError::Unavailable(e.to_string()))?;
                trace!("🔐️ Bearer token belongs to {}", user.id);
                Ok(user.id)
            },
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(IdentityError::InvalidToken("The identity provider rejected the token".into()))
            },
            s => Err(IdentityError::Unavailable(format!("The identity provider answered with {s}"))),
        }
    }

    async fn fetch_role(&self, user_id: &str) -> Result<Role, IdentityError> {
        let url = self.url("/rest/v1/users")?;
        let response = self
            .client
            .get(url)
            .query(&[("id", format!("eq.{user_id}")), ("select", "role".to_string())])
            .header("apikey", self.config.api_key.reveal())
            .bearer_auth(self.config.api_key.reveal())
            .send()
            .await
            .map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            return Err(IdentityError::Unavailable(format!("The identity provider answered with {status}")));
        }
        let rows = response.json::<Vec<RoleRecord>>().await.map_err(|e| IdentityError::Unavailable(e.to_string()))?;
        let record = rows.into_iter().next().ok_or_else(|| IdentityError::UnknownUser(user_id.to_string()))?;
        let role = record.role.as_deref().and_then(|r| r.parse::<Role>().ok()).unwrap_or_else(|| {
            debug!("🔐️ User {user_id} has no recognised role ({:?}). Treating them as a customer.", record.role);
            Role::Customer
        });
        Ok(role)
    }
}
