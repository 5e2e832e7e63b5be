//! # Storefront payments server
//! This crate hosts the HTTP server that sits between a storefront and its payment gateway. It is responsible for:
//! * Recording provisional orders as soon as a buyer pays, and opening payments with the gateway.
//! * Receiving the gateway's webhooks and applying them to orders.
//! * Running the reconciliation sweeper, which repairs orders whose webhook never arrived.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `/api/*`: Storefront endpoints. Every request must be signed (see [`auth`]).
//! * `POST /webhook/gateway`: Payment gateway events, verified with the gateway's own signature scheme.
//! * `/admin/*`: Reconciliation controls, for operators holding the admin role.

pub mod admin_routes;
pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod gateway_routes;
pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod sweep_worker;
