use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatusType {
    /// Payment has been submitted, but the gateway has not confirmed it yet. Provisional orders are always
    /// `Processing`.
    Processing,
    /// The gateway confirmed the payment.
    Completed,
    /// The gateway rejected the payment, or the payment attempt was abandoned.
    Failed,
    /// The gateway reported that the payment was returned to the buyer.
    Refunded,
}

impl OrderStatusType {
    pub fn is_final(&self) -> bool {
        !matches!(self, Self::Processing)
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Processing => write!(f, "processing"),
            OrderStatusType::Completed => write!(f, "completed"),
            OrderStatusType::Failed => write!(f, "failed"),
            OrderStatusType::Refunded => write!(f, "refunded"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------        Order        -----------------------------------------------------------
/// A single purchase, keyed externally by the gateway's payment reference.
///
/// Only `status`, `is_provisional`, `sync_attempts`, `last_sync_attempt` and `updated_at` change after the row is
/// written. The database enforces this with triggers.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: i64,
    pub payment_reference: String,
    pub product_id: i64,
    pub quantity: i64,
    /// Total price in minor currency units (e.g. cents)
    pub amount: i64,
    pub currency: String,
    pub user_id: Option<i64>,
    pub customer_email: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub status: OrderStatusType,
    pub is_provisional: bool,
    pub provisional_created_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub sync_attempts: i64,
    #[serde(skip)]
    pub last_sync_attempt: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let provisional = if self.is_provisional { " (provisional)" } else { "" };
        write!(f, "Order #{} [{}] {}{provisional}", self.id, self.payment_reference, self.status)
    }
}

//--------------------------------------       NewOrder       ----------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub payment_reference: String,
    pub product_id: i64,
    pub quantity: i64,
    pub amount: i64,
    pub currency: String,
    pub user_id: Option<i64>,
    pub customer: CustomerDetails,
    pub status: OrderStatusType,
    pub is_provisional: bool,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// An order written by the storefront straight after the buyer confirmed payment on the client side.
    ///
    /// Returns `None` if the total does not fit in an `i64`.
    pub fn provisional(
        payment_reference: &str,
        product: &Product,
        quantity: i64,
        customer: CustomerDetails,
    ) -> Option<Self> {
        let amount = product.price_for(quantity)?;
        Some(Self {
            payment_reference: payment_reference.to_string(),
            product_id: product.id,
            quantity,
            amount,
            currency: product.currency.to_lowercase(),
            user_id: None,
            customer,
            status: OrderStatusType::Processing,
            is_provisional: true,
            created_at: Utc::now(),
        })
    }

    /// An order written from a gateway confirmation when no provisional order exists. The gateway's amount is
    /// authoritative since that is what was actually charged.
    pub fn confirmed(
        payment_reference: &str,
        product_id: i64,
        quantity: i64,
        amount: i64,
        currency: &str,
        customer: CustomerDetails,
    ) -> Self {
        Self {
            payment_reference: payment_reference.to_string(),
            product_id,
            quantity,
            amount,
            currency: currency.to_lowercase(),
            user_id: None,
            customer,
            status: OrderStatusType::Completed,
            is_provisional: false,
            created_at: Utc::now(),
        }
    }

    pub fn with_user_id(mut self, user_id: Option<i64>) -> Self {
        self.user_id = user_id;
        self
    }
}

impl Display for NewOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] product {} x{} for {} {} ({})",
            self.payment_reference, self.product_id, self.quantity, self.amount, self.currency, self.status
        )
    }
}

//--------------------------------------   CustomerDetails    ----------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub email: Option<String>,
    pub name: Option<String>,
    pub phone: Option<String>,
}

impl CustomerDetails {
    /// The email address used as the customer identity: trimmed and lowercased. Blank addresses are treated as absent.
    pub fn normalized_email(&self) -> Option<String> {
        self.email.as_ref().map(|e| e.trim().to_lowercase()).filter(|e| !e.is_empty())
    }
}

//--------------------------------------         Role         ----------------------------------------------------------
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Customer,
    Admin,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::Customer => write!(f, "customer"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" | "user" => Ok(Self::Customer),
            "admin" => Ok(Self::Admin),
            s => Err(ConversionError(format!("Invalid role: {s}"))),
        }
    }
}

//--------------------------------------         User         ----------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    /// Unit price in minor currency units
    pub price: i64,
    pub currency: String,
    pub active: bool,
}

impl Product {
    /// Total price of `quantity` units, or `None` on overflow.
    pub fn price_for(&self, quantity: i64) -> Option<i64> {
        self.price.checked_mul(quantity)
    }
}

//--------------------------------------   SyncStatusCount    ----------------------------------------------------------
/// One row of the order statistics, grouped by status and provisional flag.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatusCount {
    pub status: OrderStatusType,
    pub is_provisional: bool,
    pub count: i64,
}
