use log::debug;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Booking, BookingId, BookingStatus, NewBooking},
    traits::ReconciliationError,
};

/// Inserts the booking, returning `false` in the second element if a booking with the same
/// `booking_id` already exists.
pub async fn idempotent_insert(
    booking: NewBooking,
    conn: &mut SqliteConnection,
) -> Result<(Booking, bool), ReconciliationError> {
    let inserted = match fetch_booking(&booking.booking_id, conn).await? {
        Some(existing) => (existing, false),
        None => {
            let booking = insert_booking(booking, conn).await?;
            debug!("🗃️ Booking {} inserted with id {}", booking.booking_id, booking.id);
            (booking, true)
        },
    };
    Ok(inserted)
}

async fn insert_booking(booking: NewBooking, conn: &mut SqliteConnection) -> Result<Booking, ReconciliationError> {
    let booking = sqlx::query_as(
        r#"
            INSERT INTO bookings (
                booking_id,
                customer_id,
                customer_email,
                service,
                latitude,
                longitude,
                scheduled_at,
                amount
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *;
        "#,
    )
    .bind(booking.booking_id)
    .bind(booking.customer_id)
    .bind(booking.customer_email)
    .bind(booking.service)
    .bind(booking.latitude)
    .bind(booking.longitude)
    .bind(booking.scheduled_at)
    .bind(booking.amount)
    .fetch_one(conn)
    .await?;
    Ok(booking)
}

pub async fn fetch_booking(id: &BookingId, conn: &mut SqliteConnection) -> Result<Option<Booking>, sqlx::Error> {
    let booking =
        sqlx::query_as("SELECT * FROM bookings WHERE booking_id = $1").bind(id.as_str()).fetch_optional(conn).await?;
    Ok(booking)
}

/// Moves the booking to `Confirmed`. Fixed-target: already-confirmed (or further along) bookings
/// come back unchanged, and cancelled bookings are never touched. The status guard in the UPDATE
/// holds even against a cancel landing between this call's read and write.
pub async fn confirm_booking(id: &BookingId, conn: &mut SqliteConnection) -> Result<Booking, ReconciliationError> {
    let confirmed: Option<Booking> =
        sqlx::query_as("UPDATE bookings SET status = 'Confirmed' WHERE booking_id = $1 AND status = 'Pending' RETURNING *")
            .bind(id.as_str())
            .fetch_optional(&mut *conn)
            .await?;
    match confirmed {
        Some(booking) => {
            debug!("🗃️ Booking {id} confirmed");
            Ok(booking)
        },
        // Already past Pending (or cancelled); report the state as it stands.
        None => fetch_booking(id, conn).await?.ok_or_else(|| ReconciliationError::BookingNotFound(id.clone())),
    }
}

/// Cancels the booking. Only `Pending` and `Confirmed` bookings are eligible.
pub async fn cancel_booking(id: &BookingId, conn: &mut SqliteConnection) -> Result<Booking, ReconciliationError> {
    let booking =
        fetch_booking(id, conn).await?.ok_or_else(|| ReconciliationError::BookingNotFound(id.clone()))?;
    if !booking.status.is_cancellable() {
        return Err(ReconciliationError::BookingStateConflict(format!(
            "booking {id} is {} and cannot be cancelled",
            booking.status
        )));
    }
    let booking = set_status(id, BookingStatus::Cancelled, conn).await?;
    debug!("🗃️ Booking {id} cancelled");
    Ok(booking)
}

async fn set_status(
    id: &BookingId,
    status: BookingStatus,
    conn: &mut SqliteConnection,
) -> Result<Booking, ReconciliationError> {
    let booking = sqlx::query_as("UPDATE bookings SET status = $1 WHERE booking_id = $2 RETURNING *")
        .bind(status)
        .bind(id.as_str())
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| ReconciliationError::BookingNotFound(id.clone()))?;
    Ok(booking)
}

/// Atomic test-and-set of the assigned cleaner. Returns `false` when the booking already has one.
pub async fn assign_cleaner(
    id: &BookingId,
    cleaner_id: i64,
    conn: &mut SqliteConnection,
) -> Result<bool, ReconciliationError> {
    let result = sqlx::query("UPDATE bookings SET cleaner_id = $1 WHERE booking_id = $2 AND cleaner_id IS NULL")
        .bind(cleaner_id)
        .bind(id.as_str())
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}
