use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::Duration,
};

use sfp_common::Secret;

use crate::{
    db_types::CustomerDetails,
    traits::{GatewayError, GatewayPaymentStatus, NewPaymentIntent, PaymentGateway, PaymentIntent, PaymentMetadata},
};

/// An in-memory payment gateway. Clones share state, so a test can keep a handle and change the gateway's answers
/// while the code under test holds another.
#[derive(Debug, Clone, Default)]
pub struct FakeGateway {
    intents: Arc<Mutex<HashMap<String, PaymentIntent>>>,
    unavailable: Arc<Mutex<HashSet<String>>>,
    delay: Option<Duration>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every retrieval sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Adds (or replaces) a payment intent with the given status and order metadata.
    pub fn set_payment(
        &self,
        reference: &str,
        status: GatewayPaymentStatus,
        product_id: i64,
        quantity: i64,
        amount: i64,
    ) {
        let metadata = PaymentMetadata::new(product_id, quantity, CustomerDetails::default());
        let intent = PaymentIntent {
            id: reference.to_string(),
            status,
            amount,
            currency: "usd".to_string(),
            client_secret: None,
            metadata,
        };
        self.intents.lock().unwrap().insert(reference.to_string(), intent);
    }

    pub fn set_status(&self, reference: &str, status: GatewayPaymentStatus) {
        if let Some(intent) = self.intents.lock().unwrap().get_mut(reference) {
            intent.status = status;
        }
    }

    /// Retrievals for this reference fail with [`GatewayError::Unavailable`].
    pub fn make_unavailable(&self, reference: &str) {
        self.unavailable.lock().unwrap().insert(reference.to_string());
    }
}

impl PaymentGateway for FakeGateway {
    async fn create_payment_intent(&self, intent: NewPaymentIntent) -> Result<PaymentIntent, GatewayError> {
        let mut intents = self.intents.lock().unwrap();
        let id = format!("pi_fake_{}", intents.len() + 1);
        let intent = PaymentIntent {
            id: id.clone(),
            status: GatewayPaymentStatus::Pending,
            amount: intent.amount,
            currency: intent.currency,
            client_secret: Some(Secret::new(format!("{id}_secret"))),
            metadata: intent.metadata,
        };
        intents.insert(id, intent.clone());
        Ok(intent)
    }

    async fn retrieve_payment_intent(&self, payment_reference: &str) -> Result<PaymentIntent, GatewayError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.lock().unwrap().contains(payment_reference) {
            return Err(GatewayError::Unavailable("connection refused".to_string()));
        }
        self.intents
            .lock()
            .unwrap()
            .get(payment_reference)
            .cloned()
            .ok_or_else(|| GatewayError::NotFound(payment_reference.to_string()))
    }
}
