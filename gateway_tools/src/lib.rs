//! Client-side tooling for the payment gateway: a REST client for payment intents, the gateway's object types, and
//! verification of the gateway's webhook signatures.
mod api;
mod config;
mod data_objects;
mod error;
pub mod webhook;

pub use api::GatewayApi;
pub use config::GatewayConfig;
pub use data_objects::{GatewayCharge, GatewayPaymentIntent, IntentStatus, LastPaymentError};
pub use error::GatewayApiError;
