//! Helpers for tests that need a real database or a scriptable payment gateway.
pub mod fake_gateway;
pub mod prepare_env;
