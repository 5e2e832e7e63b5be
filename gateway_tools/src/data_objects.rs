use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// The gateway's payment intent statuses. Statuses this version does not know about deserialize as `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentStatus {
    RequiresPaymentMethod,
    RequiresConfirmation,
    RequiresAction,
    Processing,
    RequiresCapture,
    Canceled,
    Succeeded,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastPaymentError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayPaymentIntent {
    pub id: String,
    pub status: IntentStatus,
    /// Minor currency units
    pub amount: i64,
    pub currency: String,
    #[serde(default)]
    pub client_secret: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub last_payment_error: Option<LastPaymentError>,
    #[serde(default)]
    pub created: i64,
}

impl GatewayPaymentIntent {
    /// A payment method was tried and declined. The intent falls back to `requires_payment_method` in that case, which
    /// is also the status of an intent nobody has tried to pay yet. The error record tells them apart.
    pub fn attempt_failed(&self) -> bool {
        self.status == IntentStatus::Canceled
            || (self.status == IntentStatus::RequiresPaymentMethod && self.last_payment_error.is_some())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayCharge {
    pub id: String,
    #[serde(default)]
    pub payment_intent: Option<String>,
    pub amount: i64,
    #[serde(default)]
    pub amount_refunded: i64,
    #[serde(default)]
    pub refunded: bool,
    pub currency: String,
}

impl GatewayCharge {
    pub fn fully_refunded(&self) -> bool {
        self.refunded || (self.amount > 0 && self.amount_refunded >= self.amount)
    }
}
