//! # Backend contracts
//!
//! This module defines the interfaces that the order lifecycle engine expects from its collaborators. The engine never
//! talks to a database or the payment gateway directly; it is handed implementations of these traits instead.
//!
//! * [`OrderManagement`] is the order store: create-or-get, lookups, and the atomic state transitions.
//! * [`CustomerManagement`] resolves buyers to user records by email.
//! * [`ProductCatalog`] provides read-only product lookups for pricing.
//! * [`StorefrontDatabase`] bundles the three so a single backend (e.g. [`crate::SqliteDatabase`]) can be handed to
//!   the APIs.
//! * [`PaymentGateway`] is the narrow view of the external gateway that the engine needs.
mod customer_management;
mod order_management;
mod payment_gateway;
mod product_catalog;

pub use customer_management::CustomerManagement;
pub use order_management::{OrderManagement, OrderStoreError};
pub use payment_gateway::{
    GatewayError,
    GatewayPaymentStatus,
    NewPaymentIntent,
    PaymentGateway,
    PaymentIntent,
    PaymentMetadata,
};
pub use product_catalog::ProductCatalog;

/// Everything the lifecycle engine and the sweeper need from a storage backend.
pub trait StorefrontDatabase: Clone + OrderManagement + CustomerManagement + ProductCatalog {
    /// The URL of the database
    fn url(&self) -> &str;
}
