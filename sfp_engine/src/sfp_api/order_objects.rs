use serde::{Deserialize, Serialize};

use crate::db_types::Order;

/// What a lifecycle operation did to the order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// No order existed; this call created it.
    Created(Order),
    /// The order moved to a new status.
    Transitioned(Order),
    /// The order exists but was not in a state the operation applies to. Duplicate deliveries land here.
    Unchanged(Order),
    /// There is no order for the payment reference and the operation does not create one.
    NoOrder,
}

impl TransitionOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::Created(o) | Self::Transitioned(o) | Self::Unchanged(o) => Some(o),
            Self::NoOrder => None,
        }
    }

    pub fn into_order(self) -> Option<Order> {
        match self {
            Self::Created(o) | Self::Transitioned(o) | Self::Unchanged(o) => Some(o),
            Self::NoOrder => None,
        }
    }

    pub fn is_change(&self) -> bool {
        matches!(self, Self::Created(_) | Self::Transitioned(_))
    }
}

/// The answer to "what happened to my order?", as seen by a buyer polling for their order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderQueryResult {
    /// The payment went through. Refunded orders are also reported here; they were paid at some point.
    Confirmed(Order),
    /// The order exists, but the gateway has not settled the payment yet.
    Pending(Order),
    /// The gateway reports that the payment never completed.
    NeverCompleted(Order),
    NotFound,
}

/// Result of reconciling a single order with the gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "order", rename_all = "camelCase")]
pub enum ReconcileOutcome {
    /// The order is now in a final state.
    Synced(Order),
    /// The gateway is still processing the payment.
    Pending(Order),
    /// Neither the store nor the gateway's answer produced an order.
    NoOrder,
}

/// Aggregate counters for one reconciliation sweep. Every candidate is counted exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepResult {
    /// Orders that were driven to (or found in) a final state.
    pub synced: u64,
    /// Orders that could not be reconciled because the gateway or the store returned an error.
    pub failed: u64,
    /// Orders that are still pending at the gateway.
    pub skipped: u64,
}

impl SweepResult {
    pub fn total(&self) -> u64 {
        self.synced + self.failed + self.skipped
    }
}
