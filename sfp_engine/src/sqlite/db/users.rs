use chrono::Utc;
use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{CustomerDetails, Role, User};

/// Fetches the user with the given (already normalized) email, or creates one with the `Customer` role.
///
/// Two buyers racing on the same new email both end up with the same row: the losing insert is discarded by the
/// `ON CONFLICT` clause and the subsequent select returns the winner.
pub async fn fetch_or_create_user(
    email: &str,
    customer: &CustomerDetails,
    conn: &mut SqliteConnection,
) -> Result<User, sqlx::Error> {
    let now = Utc::now();
    let result = sqlx::query(
        r#"
        INSERT INTO users (email, name, phone, role, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5, $5)
        ON CONFLICT (email) DO NOTHING
        "#,
    )
    .bind(email)
    .bind(customer.name.as_deref())
    .bind(customer.phone.as_deref())
    .bind(Role::Customer)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() > 0 {
        trace!("🧑️ Created new user for {email}");
    }
    sqlx::query_as("SELECT * FROM users WHERE email = $1").bind(email).fetch_one(conn).await
}

pub async fn fetch_user_by_email(email: &str, conn: &mut SqliteConnection) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM users WHERE email = $1").bind(email).fetch_optional(conn).await
}
