use log::debug;
use sqlx::SqliteConnection;

use crate::db_types::Product;

pub async fn fetch_active_product(
    product_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1 AND active = 1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_product(product_id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, sqlx::Error> {
    let product = sqlx::query_as("SELECT * FROM products WHERE id = $1").bind(product_id).fetch_optional(conn).await?;
    Ok(product)
}

pub async fn set_product_active(
    product_id: i64,
    active: bool,
    conn: &mut SqliteConnection,
) -> Result<Option<Product>, sqlx::Error> {
    let product: Option<Product> = sqlx::query_as("UPDATE products SET active = $1 WHERE id = $2 RETURNING *")
        .bind(active)
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    if product.is_some() {
        debug!("🗃️ Product #{product_id} is now {}", if active { "on sale" } else { "withdrawn" });
    }
    Ok(product)
}

/// Adds a product to the catalogue. The catalogue is managed by the storefront; this is used to seed databases.
pub async fn insert_product(
    name: &str,
    price: i64,
    currency: &str,
    conn: &mut SqliteConnection,
) -> Result<Product, sqlx::Error> {
    let product: Product =
        sqlx::query_as("INSERT INTO products (name, price, currency, active) VALUES ($1, $2, $3, 1) RETURNING *")
            .bind(name)
            .bind(price)
            .bind(currency.to_lowercase())
            .fetch_one(conn)
            .await?;
    debug!("🗃️ Product #{} ({}) added to the catalogue", product.id, product.name);
    Ok(product)
}
