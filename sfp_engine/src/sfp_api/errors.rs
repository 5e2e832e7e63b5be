use thiserror::Error;

use crate::traits::{GatewayError, OrderStoreError};

#[derive(Debug, Clone, Error)]
pub enum LifecycleError {
    #[error("Quantity must be a positive integer, but was {0}")]
    InvalidQuantity(i64),
    #[error("Product {0} does not exist or is not for sale")]
    ProductNotFound(i64),
    #[error("Payment [{0}] does not carry enough metadata to reconstruct the order")]
    MalformedMetadata(String),
    #[error("{0}")]
    Store(#[from] OrderStoreError),
    #[error("{0}")]
    Gateway(#[from] GatewayError),
}

impl LifecycleError {
    /// Errors caused by the content of a request or event rather than by infrastructure. Retrying the same input
    /// will fail the same way.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::InvalidQuantity(_) | Self::ProductNotFound(_) | Self::MalformedMetadata(_))
    }
}

#[derive(Debug, Clone, Error)]
pub enum SweepError {
    #[error("A reconciliation sweep is already in progress")]
    AlreadyRunning,
    #[error("Could not fetch sweep candidates. {0}")]
    Store(#[from] OrderStoreError),
}
