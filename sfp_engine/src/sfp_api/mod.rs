//! # Storefront payment engine public API
//!
//! * [`lifecycle_api`] owns the order state machine. It reconciles the storefront's optimistic (provisional) orders
//!   with the gateway's asynchronous confirmations and failures, and guarantees at most one order per payment
//!   reference no matter which writer gets there first.
//! * [`reconciliation_api`] repairs orders whose webhook was lost or delayed by asking the gateway for the truth and
//!   feeding the answer back through the lifecycle API.
//!
//! # API usage
//!
//! The APIs are handed their collaborators explicitly. There are no global clients.
//!
//! ```rust,ignore
//! use sfp_engine::{OrderLifecycleApi, ReconciliationSweeper, SqliteDatabase, SweepConfig};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let lifecycle = OrderLifecycleApi::new(db.clone());
//! let (order, created) = lifecycle.create_provisional("pi_123", 7, 1, customer).await?;
//! let sweeper = ReconciliationSweeper::new(db, gateway_client, SweepConfig::default());
//! let result = sweeper.sweep().await?;
//! ```
pub mod errors;
pub mod lifecycle_api;
pub mod order_objects;
pub mod reconciliation_api;
