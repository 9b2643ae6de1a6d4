use cleanpay_common::Cents;
use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{BookingId, NewPayment, Payment, PaymentStatus},
    traits::ReconciliationError,
};

/// Inserts a pending payment, returning `false` in the second element if a payment for the
/// booking already exists.
pub async fn idempotent_insert(
    payment: NewPayment,
    conn: &mut SqliteConnection,
) -> Result<(Payment, bool), ReconciliationError> {
    let inserted = match fetch_payment(&payment.booking_id, conn).await? {
        Some(existing) => (existing, false),
        None => {
            let payment = insert_payment(payment, conn).await?;
            debug!("🗃️ Payment for booking {} inserted with id {}", payment.booking_id, payment.id);
            (payment, true)
        },
    };
    Ok(inserted)
}

async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, ReconciliationError> {
    let payment = sqlx::query_as(
        r#"
            INSERT INTO payments (booking_id, amount, gateway_ref)
            VALUES ($1, $2, $3)
            RETURNING *;
        "#,
    )
    .bind(payment.booking_id)
    .bind(payment.amount)
    .bind(payment.gateway_ref)
    .fetch_one(conn)
    .await?;
    Ok(payment)
}

pub async fn fetch_payment(id: &BookingId, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE booking_id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(payment)
}

pub async fn fetch_payment_by_gateway_ref(
    gateway_ref: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Payment>, sqlx::Error> {
    let payment =
        sqlx::query_as("SELECT * FROM payments WHERE gateway_ref = $1").bind(gateway_ref).fetch_optional(conn).await?;
    Ok(payment)
}

/// Completes the payment, computing the commission split. Statuses move forward only.
pub async fn complete_payment(
    id: &BookingId,
    gateway_ref: Option<&str>,
    commission_pct: i64,
    conn: &mut SqliteConnection,
) -> Result<Payment, ReconciliationError> {
    let payment =
        fetch_payment(id, conn).await?.ok_or_else(|| ReconciliationError::PaymentNotFound(id.clone()))?;
    match payment.status {
        PaymentStatus::Completed => Ok(payment),
        PaymentStatus::Failed => Err(ReconciliationError::PaymentStatusConflict(format!(
            "payment for booking {id} is Failed and cannot be completed"
        ))),
        PaymentStatus::Pending => {
            let commission = payment.amount.percent(commission_pct);
            let net_payout = payment.amount - commission;
            let payment = set_completed(id, gateway_ref, commission, net_payout, conn).await?;
            debug!("🗃️ Payment for booking {id} completed. Commission {commission}, net payout {net_payout}");
            Ok(payment)
        },
    }
}

async fn set_completed(
    id: &BookingId,
    gateway_ref: Option<&str>,
    commission: Cents,
    net_payout: Cents,
    conn: &mut SqliteConnection,
) -> Result<Payment, ReconciliationError> {
    let payment = sqlx::query_as(
        r#"
            UPDATE payments
            SET status = 'Completed',
                gateway_ref = COALESCE($1, gateway_ref),
                commission = $2,
                net_payout = $3
            WHERE booking_id = $4 AND status = 'Pending'
            RETURNING *;
        "#,
    )
    .bind(gateway_ref)
    .bind(commission)
    .bind(net_payout)
    .bind(id.as_str())
    .fetch_optional(&mut *conn)
    .await?;
    match payment {
        Some(p) => Ok(p),
        // Lost a race; the winner already moved the status forward.
        None => {
            let p =
                fetch_payment(id, conn).await?.ok_or_else(|| ReconciliationError::PaymentNotFound(id.clone()))?;
            Ok(p)
        },
    }
}

/// Fails the payment. Forward-only, same rules as [`complete_payment`].
pub async fn fail_payment(
    id: &BookingId,
    gateway_ref: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Payment, ReconciliationError> {
    let payment =
        fetch_payment(id, conn).await?.ok_or_else(|| ReconciliationError::PaymentNotFound(id.clone()))?;
    match payment.status {
        PaymentStatus::Failed => Ok(payment),
        PaymentStatus::Completed => Err(ReconciliationError::PaymentStatusConflict(format!(
            "payment for booking {id} is Completed and cannot be failed"
        ))),
        PaymentStatus::Pending => {
            let payment = sqlx::query_as(
                r#"
                    UPDATE payments
                    SET status = 'Failed', gateway_ref = COALESCE($1, gateway_ref)
                    WHERE booking_id = $2 AND status = 'Pending'
                    RETURNING *;
                "#,
            )
            .bind(gateway_ref)
            .bind(id.as_str())
            .fetch_optional(conn)
            .await?
            .unwrap_or(payment);
            debug!("🗃️ Payment for booking {id} marked as failed");
            Ok(payment)
        },
    }
}

/// Bookings whose payment completed before `cutoff` but whose ledger holds no successful
/// confirmation send. Cancelled bookings are excluded.
pub async fn unconfirmed_fulfillments(
    cutoff: chrono::DateTime<chrono::Utc>,
    conn: &mut SqliteConnection,
) -> Result<Vec<BookingId>, ReconciliationError> {
    let ids: Vec<BookingId> = sqlx::query_scalar(
        r#"
            SELECT p.booking_id
            FROM payments p
            JOIN bookings b ON b.booking_id = p.booking_id
            WHERE p.status = 'Completed'
              AND p.updated_at <= $1
              AND b.status <> 'Cancelled'
              AND NOT EXISTS (
                  SELECT 1 FROM fulfillment_events f
                  WHERE f.booking_id = p.booking_id
                    AND f.effect = 'ConfirmationSent'
                    AND f.succeeded
              )
            ORDER BY p.updated_at;
        "#,
    )
    .bind(cutoff)
    .fetch_all(conn)
    .await?;
    Ok(ids)
}
