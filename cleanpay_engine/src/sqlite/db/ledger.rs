use log::trace;
use sqlx::SqliteConnection;

use crate::{
    db_types::{BookingId, Channel, EffectKind, EffectOutcome, FulfillmentEvent},
    traits::ReconciliationError,
};

/// True when a succeeded entry exists for `(booking, effect)`.
pub async fn effect_has_run(
    id: &BookingId,
    effect: EffectKind,
    conn: &mut SqliteConnection,
) -> Result<bool, ReconciliationError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM fulfillment_events WHERE booking_id = $1 AND effect = $2 AND succeeded",
    )
    .bind(id.as_str())
    .bind(effect)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

/// Appends a ledger entry.
///
/// A succeeded entry rides the partial unique index: `INSERT OR IGNORE` makes "record success at
/// most once" atomic, and the return value says whether this call was the one that recorded it.
/// Failure entries always append.
pub async fn record_effect(
    id: &BookingId,
    effect: EffectKind,
    channel: Channel,
    outcome: EffectOutcome,
    conn: &mut SqliteConnection,
) -> Result<bool, ReconciliationError> {
    let result = sqlx::query(
        r#"
            INSERT OR IGNORE INTO fulfillment_events (booking_id, effect, channel, succeeded, detail)
            VALUES ($1, $2, $3, $4, $5);
        "#,
    )
    .bind(id.as_str())
    .bind(effect)
    .bind(channel)
    .bind(outcome.succeeded)
    .bind(outcome.detail)
    .execute(conn)
    .await?;
    let recorded = result.rows_affected() > 0;
    trace!("🗃️ Ledger entry ({id}, {effect}) via {channel}: recorded={recorded}");
    Ok(recorded)
}

/// The full audit trail for a booking, oldest first.
pub async fn ledger_for(
    id: &BookingId,
    conn: &mut SqliteConnection,
) -> Result<Vec<FulfillmentEvent>, ReconciliationError> {
    let events = sqlx::query_as("SELECT * FROM fulfillment_events WHERE booking_id = $1 ORDER BY id")
        .bind(id.as_str())
        .fetch_all(conn)
        .await?;
    Ok(events)
}
