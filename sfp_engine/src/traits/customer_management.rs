use crate::{
    db_types::{CustomerDetails, User},
    traits::OrderStoreError,
};

/// Resolves buyers to user records. Users are keyed by their (normalized) email address.
#[allow(async_fn_in_trait)]
pub trait CustomerManagement {
    /// Returns the user for the customer's email, creating it if this is the first purchase with that address.
    /// Returns `None` if the customer did not supply an email address.
    async fn fetch_or_create_user(&self, customer: &CustomerDetails) -> Result<Option<User>, OrderStoreError>;

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, OrderStoreError>;
}
