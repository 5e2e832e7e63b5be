use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use sfp_common::Secret;
use thiserror::Error;

use crate::db_types::CustomerDetails;

/// The operations the engine needs from the external payment gateway.
///
/// Implementations are expected to bound every call with a timeout. The sweeper adds its own timeout on top, so a
/// misbehaving implementation cannot stall a sweep indefinitely.
#[allow(async_fn_in_trait)]
pub trait PaymentGateway {
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, GatewayError>;

    async fn retrieve_payment_intent(&self, payment_reference: &str) -> Result<PaymentIntent, GatewayError>;
}

/// The gateway's view of whether money has moved, reduced to what the order lifecycle cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GatewayPaymentStatus {
    Succeeded,
    /// Still in flight (processing, awaiting customer action, awaiting capture, ...)
    Pending,
    /// Declined, cancelled, or abandoned after a failed attempt
    Failed,
}

#[derive(Debug, Clone)]
pub struct NewPaymentIntent {
    pub amount: i64,
    pub currency: String,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Clone)]
pub struct PaymentIntent {
    pub id: String,
    pub status: GatewayPaymentStatus,
    pub amount: i64,
    pub currency: String,
    pub client_secret: Option<Secret<String>>,
    pub metadata: PaymentMetadata,
}

/// Order facts carried on the payment attempt itself, so that an order can be rebuilt from the gateway's records if
/// the storefront never managed to write its provisional order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMetadata {
    pub product_id: Option<i64>,
    pub quantity: Option<i64>,
    pub customer: CustomerDetails,
}

const PRODUCT_ID: &str = "productId";
const QUANTITY: &str = "quantity";
const CUSTOMER_EMAIL: &str = "customerEmail";
const CUSTOMER_NAME: &str = "customerName";
const CUSTOMER_PHONE: &str = "customerPhone";

impl PaymentMetadata {
    pub fn new(product_id: i64, quantity: i64, customer: CustomerDetails) -> Self {
        Self { product_id: Some(product_id), quantity: Some(quantity), customer }
    }

    /// Gateways store metadata as flat string maps. Unparseable numbers are dropped rather than rejected, so that a
    /// caller can decide whether the remaining facts are enough.
    pub fn from_pairs(pairs: &HashMap<String, String>) -> Self {
        let text = |k: &str| pairs.get(k).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let number = |k: &str| text(k).and_then(|v| v.parse::<i64>().ok());
        Self {
            product_id: number(PRODUCT_ID),
            quantity: number(QUANTITY),
            customer: CustomerDetails {
                email: text(CUSTOMER_EMAIL),
                name: text(CUSTOMER_NAME),
                phone: text(CUSTOMER_PHONE),
            },
        }
    }

    pub fn to_pairs(&self) -> HashMap<String, String> {
        let mut pairs = HashMap::with_capacity(5);
        if let Some(id) = self.product_id {
            pairs.insert(PRODUCT_ID.to_string(), id.to_string());
        }
        if let Some(q) = self.quantity {
            pairs.insert(QUANTITY.to_string(), q.to_string());
        }
        if let Some(email) = &self.customer.email {
            pairs.insert(CUSTOMER_EMAIL.to_string(), email.clone());
        }
        if let Some(name) = &self.customer.name {
            pairs.insert(CUSTOMER_NAME.to_string(), name.clone());
        }
        if let Some(phone) = &self.customer.phone {
            pairs.insert(CUSTOMER_PHONE.to_string(), phone.clone());
        }
        pairs
    }
}

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("The payment gateway did not answer in time")]
    Timeout,
    #[error("The payment gateway has no record of {0}")]
    NotFound(String),
    #[error("The payment gateway could not be reached. {0}")]
    Unavailable(String),
    #[error("The payment gateway rejected the request. {0}")]
    Rejected(String),
    #[error("The payment gateway sent a response we could not understand. {0}")]
    InvalidResponse(String),
}
