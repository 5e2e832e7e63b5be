use crate::{db_types::Product, traits::OrderStoreError};

/// Read-only access to the product catalogue.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    /// Fetches a product that is currently on sale. Inactive products are not returned.
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderStoreError>;

    /// Fetches a product whether or not it is still on sale. A payment that already cleared must still produce an
    /// order after the product is withdrawn.
    async fn fetch_product_including_inactive(&self, product_id: i64) -> Result<Option<Product>, OrderStoreError>;
}
