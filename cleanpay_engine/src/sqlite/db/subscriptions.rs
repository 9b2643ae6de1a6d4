use chrono::{DateTime, Utc};
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{NewSubscription, Subscription},
    traits::ReconciliationError,
};

pub async fn fetch_by_token(token: &str, conn: &mut SqliteConnection) -> Result<Option<Subscription>, sqlx::Error> {
    let sub = sqlx::query_as("SELECT * FROM subscriptions WHERE subscription_token = $1")
        .bind(token)
        .fetch_optional(conn)
        .await?;
    Ok(sub)
}

/// Records a successful charge: the first one activates a `Pending` subscription, and every one
/// stores the next charge date.
pub async fn mark_charged(
    subscription_id: i64,
    next_charge_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<(), ReconciliationError> {
    sqlx::query(
        r#"
            UPDATE subscriptions
            SET status = CASE WHEN status = 'Pending' THEN 'Active' ELSE status END,
                next_charge_at = $1
            WHERE id = $2;
        "#,
    )
    .bind(next_charge_at)
    .bind(subscription_id)
    .execute(conn)
    .await?;
    debug!("🗃️ Subscription {subscription_id} charged. Next charge at {next_charge_at}");
    Ok(())
}

/// Registers a new subscription agreement.
pub async fn insert_subscription(
    sub: NewSubscription,
    conn: &mut SqliteConnection,
) -> Result<Subscription, ReconciliationError> {
    let sub = sqlx::query_as(
        r#"
            INSERT INTO subscriptions (
                subscription_token,
                customer_id,
                customer_email,
                service,
                latitude,
                longitude,
                amount,
                frequency,
                preferred_day,
                preferred_hour,
                next_charge_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *;
        "#,
    )
    .bind(sub.subscription_token)
    .bind(sub.customer_id)
    .bind(sub.customer_email)
    .bind(sub.service)
    .bind(sub.latitude)
    .bind(sub.longitude)
    .bind(sub.amount)
    .bind(sub.frequency)
    .bind(sub.preferred_day)
    .bind(sub.preferred_hour)
    .bind(sub.next_charge_at)
    .fetch_one(conn)
    .await?;
    Ok(sub)
}
