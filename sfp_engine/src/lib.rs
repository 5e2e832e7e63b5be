//! Storefront Payment Engine
//!
//! The engine owns the life of an order from the moment a buyer pays until the payment gateway settles it. It is
//! gateway-agnostic and never makes network calls of its own; it is handed a store and a gateway instead.
//!
//! The library is divided into three main sections:
//! 1. The data types ([`mod@db_types`]) and backend contracts ([`mod@traits`]). Backends implement the traits in
//!    [`traits`] in order to act as the store for the server. SQLite is the supported backend.
//! 2. The order lifecycle API ([`OrderLifecycleApi`]). This is the state machine that reconciles provisional orders
//!    written by the storefront with the gateway's asynchronous confirmations and failures.
//! 3. The reconciliation sweeper ([`ReconciliationSweeper`]), which repairs orders whose webhook never arrived.
pub mod db_types;
mod sfp_api;
#[cfg(feature = "sqlite")]
mod sqlite;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use sfp_api::{
    errors::{LifecycleError, SweepError},
    lifecycle_api::OrderLifecycleApi,
    order_objects,
    reconciliation_api::{ReconciliationSweeper, SweepConfig, DEFAULT_GATEWAY_TIMEOUT, DEFAULT_MIN_RETRY_GAP},
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use traits::{OrderManagement, StorefrontDatabase};
