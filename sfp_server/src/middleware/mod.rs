mod admin;
mod signed_request;

pub use admin::{AdminMiddlewareFactory, AdminMiddlewareService};
pub use signed_request::{SignedRequestMiddlewareFactory, SignedRequestMiddlewareService};
