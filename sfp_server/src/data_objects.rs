use serde::{Deserialize, Serialize};
use sfp_engine::{
    db_types::{CustomerDetails, Order},
    traits::PaymentIntent,
};

/// Customer fields as the storefront sends them. All optional; orders without an email are not linked to a user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerParams {
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    #[serde(default)]
    pub customer_phone: Option<String>,
}

impl From<CustomerParams> for CustomerDetails {
    fn from(c: CustomerParams) -> Self {
        CustomerDetails { email: c.customer_email, name: c.customer_name, phone: c.customer_phone }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalOrderRequest {
    /// The gateway's payment intent id. Older storefront builds send it as `paymentIntentId`.
    #[serde(alias = "paymentIntentId")]
    pub payment_reference: String,
    pub product_id: i64,
    pub quantity: i64,
    #[serde(flatten)]
    pub customer: CustomerParams,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProvisionalOrderResponse {
    pub success: bool,
    pub order_id: i64,
    pub is_provisional: bool,
    /// False if an order for the payment already existed
    pub created: bool,
}

impl ProvisionalOrderResponse {
    pub fn new(order: &Order, created: bool) -> Self {
        Self { success: true, order_id: order.id, is_provisional: order.is_provisional, created }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentRequest {
    pub product_id: i64,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
    #[serde(flatten)]
    pub customer: CustomerParams,
}

fn default_quantity() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentIntentResponse {
    pub client_secret: Option<String>,
    pub payment_intent_id: String,
    pub amount: i64,
    pub currency: String,
}

impl From<PaymentIntent> for PaymentIntentResponse {
    fn from(intent: PaymentIntent) -> Self {
        Self {
            client_secret: intent.client_secret.map(|s| s.reveal().clone()),
            payment_intent_id: intent.id,
            amount: intent.amount,
            currency: intent.currency,
        }
    }
}

/// Body of a 202 response to an order lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingOrderResponse {
    pub status: String,
    pub message: String,
    pub order: Order,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookReceipt {
    pub received: bool,
}
