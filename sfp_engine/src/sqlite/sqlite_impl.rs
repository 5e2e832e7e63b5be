//! `SqliteDatabase` is a concrete implementation of a storefront payment engine backend.
//!
//! Unsurprisingly, it uses SQLite as the backend and implements all the traits defined in the [`crate::traits`]
//! module.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, products, users};
use crate::{
    db_types::{CustomerDetails, NewOrder, Order, OrderStatusType, Product, SyncStatusCount, User},
    traits::{CustomerManagement, OrderManagement, OrderStoreError, ProductCatalog, StorefrontDatabase},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in the `SFP_DATABASE_URL` environment variable.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool to {url}");
        let pool = new_pool(url, max_connections).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations are up to date");
        Ok(())
    }

    /// Products are managed outside this system. This is provided for seeding and tests.
    pub async fn insert_product(&self, name: &str, price: i64, currency: &str) -> Result<Product, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::insert_product(name, price, currency, &mut conn).await?;
        Ok(product)
    }

    /// Puts a product on sale or withdraws it. Returns `None` if there is no such product.
    pub async fn set_product_active(&self, product_id: i64, active: bool) -> Result<Option<Product>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::set_product_active(product_id, active, &mut conn).await?;
        Ok(product)
    }

    async fn transition(
        &self,
        payment_reference: &str,
        from: &[OrderStatusType],
        to: OrderStatusType,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::transition_order(payment_reference, from, to, &mut conn).await?;
        Ok(order)
    }
}

impl StorefrontDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }
}

impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<(Order, bool), OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::idempotent_insert(order, &mut conn).await
    }

    async fn fetch_order_by_payment_reference(
        &self,
        payment_reference: &str,
    ) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_payment_reference(payment_reference, &mut conn).await?;
        Ok(order)
    }

    async fn fetch_order_by_id(&self, id: i64) -> Result<Option<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_order_by_id(id, &mut conn).await?;
        Ok(order)
    }

    async fn complete_order(&self, payment_reference: &str) -> Result<Option<Order>, OrderStoreError> {
        self.transition(payment_reference, &[OrderStatusType::Processing], OrderStatusType::Completed).await
    }

    async fn fail_order(&self, payment_reference: &str) -> Result<Option<Order>, OrderStoreError> {
        self.transition(payment_reference, &[OrderStatusType::Processing], OrderStatusType::Failed).await
    }

    async fn refund_order(&self, payment_reference: &str) -> Result<Option<Order>, OrderStoreError> {
        self.transition(
            payment_reference,
            &[OrderStatusType::Completed, OrderStatusType::Failed],
            OrderStatusType::Refunded,
        )
        .await
    }

    async fn record_sync_attempt(&self, id: i64, at: DateTime<Utc>) -> Result<Order, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::record_sync_attempt(id, at, &mut conn).await?.ok_or(OrderStoreError::OrderIdNotFound(id))
    }

    async fn fetch_sweep_candidates(&self, cutoff: DateTime<Utc>) -> Result<Vec<Order>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let candidates = orders::fetch_sweep_candidates(cutoff, &mut conn).await?;
        Ok(candidates)
    }

    async fn sync_statistics(&self) -> Result<Vec<SyncStatusCount>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let stats = orders::sync_statistics(&mut conn).await?;
        Ok(stats)
    }

    async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }
}

impl CustomerManagement for SqliteDatabase {
    async fn fetch_or_create_user(&self, customer: &CustomerDetails) -> Result<Option<User>, OrderStoreError> {
        let Some(email) = customer.normalized_email() else {
            trace!("🗃️ No email address supplied. The order will not be linked to a user.");
            return Ok(None);
        };
        let mut conn = self.pool.acquire().await?;
        let user = users::fetch_or_create_user(&email, customer, &mut conn)
            .await
            .map_err(|e| OrderStoreError::UserResolutionError(format!("{email}. {e}")))?;
        Ok(Some(user))
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let email = email.trim().to_lowercase();
        let user = users::fetch_user_by_email(&email, &mut conn).await?;
        Ok(user)
    }
}

impl ProductCatalog for SqliteDatabase {
    async fn fetch_product(&self, product_id: i64) -> Result<Option<Product>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_active_product(product_id, &mut conn).await?;
        Ok(product)
    }

    async fn fetch_product_including_inactive(&self, product_id: i64) -> Result<Option<Product>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let product = products::fetch_product(product_id, &mut conn).await?;
        Ok(product)
    }
}
