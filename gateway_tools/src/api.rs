use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
    Method,
    StatusCode,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::{config::GatewayConfig, data_objects::GatewayPaymentIntent, GatewayApiError};

/// A thin REST client for the payment gateway. Every request is bounded by [`GatewayConfig::timeout`].
#[derive(Clone)]
pub struct GatewayApi {
    config: GatewayConfig,
    client: Arc<Client>,
}

impl GatewayApi {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let mut val = HeaderValue::from_str(&format!("Bearer {}", config.secret_key.reveal()))
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        val.set_sensitive(true);
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/v1{path}", self.config.base_url)
    }

    /// Sends a request to the gateway. Request bodies are form-encoded, as the gateway expects; responses are JSON.
    pub async fn rest_query<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        form: Option<&B>,
    ) -> Result<T, GatewayApiError> {
        let url = self.url(path);
        trace!("Sending REST query: {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(form) = form {
            req = req.form(form);
        }
        let response = req.send().await?;
        let status = response.status();
        if status.is_success() {
            trace!("REST query successful. {status}");
            return response.json::<T>().await.map_err(|e| GatewayApiError::JsonError(e.to_string()));
        }
        if status == StatusCode::NOT_FOUND {
            return Err(GatewayApiError::NotFound(path.to_string()));
        }
        let message = response.text().await?;
        Err(GatewayApiError::QueryError { status: status.as_u16(), message })
    }

    /// Creates a payment intent. `metadata` is attached to the intent so that the gateway's record of the payment
    /// carries enough to rebuild the order.
    pub async fn create_payment_intent(
        &self,
        amount: i64,
        currency: &str,
        metadata: &[(String, String)],
    ) -> Result<GatewayPaymentIntent, GatewayApiError> {
        let mut form = vec![
            ("amount".to_string(), amount.to_string()),
            ("currency".to_string(), currency.to_lowercase()),
            ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
        ];
        form.extend(metadata.iter().map(|(k, v)| (format!("metadata[{k}]"), v.clone())));
        debug!("Creating payment intent for {amount} {currency}");
        let intent = self.rest_query::<GatewayPaymentIntent, _>(Method::POST, "/payment_intents", Some(&form)).await?;
        info!("Created payment intent {} for {amount} {currency}", intent.id);
        Ok(intent)
    }

    pub async fn get_payment_intent(&self, id: &str) -> Result<GatewayPaymentIntent, GatewayApiError> {
        let path = format!("/payment_intents/{id}");
        debug!("Fetching payment intent {id}");
        let intent = self.rest_query::<GatewayPaymentIntent, ()>(Method::GET, &path, None).await?;
        trace!("Payment intent {id} is {:?}", intent.status);
        Ok(intent)
    }
}
