use chrono::{DateTime, Utc};
use log::{debug, trace, warn};
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, SyncStatusCount},
    traits::OrderStoreError,
};

/// Inserts the order into the database, returning `false` in the second parameter if the order already exists.
///
/// The existence check up front handles the common case. The payment reference's `UNIQUE` constraint handles the
/// race where another writer inserts between the check and the insert: the constraint violation is caught and the
/// winner's row is returned instead.
pub async fn idempotent_insert(order: NewOrder, conn: &mut SqliteConnection) -> Result<(Order, bool), OrderStoreError> {
    if let Some(existing) = fetch_order_by_payment_reference(&order.payment_reference, conn).await? {
        trace!("🗃️ Order [{}] already exists with id {}", existing.payment_reference, existing.id);
        return Ok((existing, false));
    }
    let reference = order.payment_reference.clone();
    match insert_order(order, conn).await {
        Ok(order) => {
            debug!("🗃️ Order [{}] inserted with id {}", order.payment_reference, order.id);
            Ok((order, true))
        },
        Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
            debug!("🗃️ Order [{reference}] was inserted by a concurrent writer. Using the existing record.");
            let winner = fetch_order_by_payment_reference(&reference, conn)
                .await?
                .ok_or_else(|| OrderStoreError::ConflictingInsert(reference.clone()))?;
            Ok((winner, false))
        },
        Err(e) => Err(e.into()),
    }
}

/// Inserts a new order into the database using the given connection. This is not atomic. You can embed this call
/// inside a transaction if you need to ensure atomicity, and pass `&mut *tx` as the connection argument.
async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, sqlx::Error> {
    let provisional_created_at = order.is_provisional.then_some(order.created_at);
    sqlx::query_as(
        r#"
            INSERT INTO orders (
                payment_reference,
                product_id,
                quantity,
                amount,
                currency,
                user_id,
                customer_email,
                customer_name,
                customer_phone,
                status,
                is_provisional,
                provisional_created_at,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $13)
            RETURNING *;
        "#,
    )
    .bind(order.payment_reference)
    .bind(order.product_id)
    .bind(order.quantity)
    .bind(order.amount)
    .bind(order.currency)
    .bind(order.user_id)
    .bind(order.customer.normalized_email())
    .bind(order.customer.name)
    .bind(order.customer.phone)
    .bind(order.status)
    .bind(order.is_provisional)
    .bind(provisional_created_at)
    .bind(order.created_at)
    .fetch_one(conn)
    .await
}

pub async fn fetch_order_by_payment_reference(
    payment_reference: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE payment_reference = $1")
        .bind(payment_reference)
        .fetch_optional(conn)
        .await
}

pub async fn fetch_order_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await
}

/// Moves an order to `new_status` if, and only if, its current status is one of `from`. The provisional flag is
/// always cleared.
///
/// This is a single conditional `UPDATE`, so two writers racing on the same order cannot both perform the
/// transition. The loser gets `None`.
pub async fn transition_order(
    payment_reference: &str,
    from: &[OrderStatusType],
    new_status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    let placeholders = (0..from.len()).map(|i| format!("${}", i + 4)).collect::<Vec<_>>().join(", ");
    let sql = format!(
        "UPDATE orders SET status = $1, is_provisional = 0, updated_at = $2 WHERE payment_reference = $3 AND status \
         IN ({placeholders}) RETURNING *"
    );
    trace!("🗃️ Executing query: {sql}");
    let mut query = sqlx::query_as::<_, Order>(&sql).bind(new_status).bind(Utc::now()).bind(payment_reference);
    for status in from {
        query = query.bind(*status);
    }
    let order: Option<Order> = query.fetch_optional(conn).await?;
    match &order {
        Some(o) => debug!("🗃️ Order [{payment_reference}] is now {}", o.status),
        None => trace!("🗃️ Order [{payment_reference}] was not in {from:?}. {new_status} transition skipped."),
    }
    Ok(order)
}

pub async fn record_sync_attempt(
    id: i64,
    at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as(
        r#"
        UPDATE orders SET
            sync_attempts = sync_attempts + 1,
            last_sync_attempt = $1,
            updated_at = $1
        WHERE id = $2
        RETURNING *
        "#,
    )
    .bind(at)
    .bind(id)
    .fetch_optional(conn)
    .await
}

/// Fetches the orders the reconciliation sweep should look at. Resulting orders are ordered by `created_at` in
/// ascending order.
pub async fn fetch_sweep_candidates(
    cutoff: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders: Vec<Order> = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE is_provisional = 1
           OR (status = 'processing'
               AND (last_sync_attempt IS NULL OR julianday(last_sync_attempt) < julianday($1)))
        ORDER BY julianday(created_at) ASC, id ASC
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    if orders.iter().any(|o| o.is_provisional && o.status != OrderStatusType::Processing) {
        warn!("🗃️ Provisional orders that are not processing were found. Table constraints were bypassed.");
    }
    trace!("🗃️ {} sweep candidates found", orders.len());
    Ok(orders)
}

pub async fn sync_statistics(conn: &mut SqliteConnection) -> Result<Vec<SyncStatusCount>, sqlx::Error> {
    sqlx::query_as(
        r#"
        SELECT status, is_provisional, COUNT(*) AS count
        FROM orders
        GROUP BY status, is_provisional
        ORDER BY status, is_provisional
        "#,
    )
    .fetch_all(conn)
    .await
}
