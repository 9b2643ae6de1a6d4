use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::db_types::{
    Booking,
    BookingId,
    Channel,
    Cleaner,
    EffectKind,
    EffectOutcome,
    FulfillmentEvent,
    NewBooking,
    NewPayment,
    Payment,
    Subscription,
};

/// The storage contract for the reconciliation pipeline.
///
/// The contract is deliberately narrow: the pipeline never needs arbitrary
/// queries, only the handful of idempotent reads and conditional writes
/// described here. Backends must make the calls marked *atomic* genuinely
/// atomic; everything else tolerates concurrent execution by construction
/// (fixed-target status writes, insert-or-ignore ledger records).
#[allow(async_fn_in_trait)]
pub trait ReconciliationDatabase: Clone {
    /// The URL of the underlying database.
    fn url(&self) -> &str;

    /// Stores a new booking. Idempotent on `booking_id`; the second element is
    /// `false` when the booking already existed.
    async fn insert_booking(&self, booking: NewBooking) -> Result<(Booking, bool), ReconciliationError>;

    async fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, ReconciliationError>;

    async fn fetch_payment(&self, id: &BookingId) -> Result<Option<Payment>, ReconciliationError>;

    async fn fetch_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>, ReconciliationError>;

    /// Stores a pending payment for a booking. Idempotent on `booking_id`.
    async fn insert_pending_payment(&self, payment: NewPayment) -> Result<(Payment, bool), ReconciliationError>;

    /// Moves the booking's payment to `Completed` and fills in the payout
    /// bookkeeping fields (commission at `commission_pct`, net payout).
    ///
    /// Statuses only move forward: completing an already-`Completed` payment is
    /// a no-op that returns the existing record; completing a `Failed` payment
    /// is a [`ReconciliationError::PaymentStatusConflict`].
    async fn complete_payment(
        &self,
        id: &BookingId,
        gateway_ref: Option<&str>,
        commission_pct: i64,
    ) -> Result<Payment, ReconciliationError>;

    /// Moves the booking's payment to `Failed`. Forward-only, same rules as
    /// [`Self::complete_payment`].
    async fn fail_payment(&self, id: &BookingId, gateway_ref: Option<&str>) -> Result<Payment, ReconciliationError>;

    /// Sets the booking status to `Confirmed`. This is a fixed-target write:
    /// already-`Confirmed` (or further along) bookings are left untouched and
    /// returned as-is. `Cancelled` bookings are never transitioned.
    async fn confirm_booking(&self, id: &BookingId) -> Result<Booking, ReconciliationError>;

    /// Cancels a booking. Only `Pending` and `Confirmed` bookings are eligible.
    async fn cancel_booking(&self, id: &BookingId) -> Result<Booking, ReconciliationError>;

    /// True when a *succeeded* ledger entry exists for `(id, effect)`.
    async fn effect_has_run(&self, id: &BookingId, effect: EffectKind) -> Result<bool, ReconciliationError>;

    /// Appends a ledger entry. For successes this is an *atomic*
    /// insert-or-ignore against the `(booking, effect)` uniqueness constraint;
    /// returns `false` when a success was already recorded. Failure entries
    /// always append.
    async fn record_effect(
        &self,
        id: &BookingId,
        effect: EffectKind,
        channel: Channel,
        outcome: EffectOutcome,
    ) -> Result<bool, ReconciliationError>;

    /// The full audit trail for a booking, oldest first.
    async fn ledger_for(&self, id: &BookingId) -> Result<Vec<FulfillmentEvent>, ReconciliationError>;

    /// All active, available cleaners offering the given service. Radius and
    /// distance filtering happen in the matcher, not here.
    async fn eligible_cleaners(&self, service: &str) -> Result<Vec<Cleaner>, ReconciliationError>;

    async fn fetch_cleaner(&self, cleaner_id: i64) -> Result<Option<Cleaner>, ReconciliationError>;

    /// *Atomic* test-and-set: assigns the cleaner only if the booking has no
    /// cleaner yet. Returns `false` when another writer got there first.
    async fn assign_cleaner(&self, id: &BookingId, cleaner_id: i64) -> Result<bool, ReconciliationError>;

    /// Bookings whose payment completed before `cutoff` but whose ledger shows
    /// no successful confirmation send. This is the recovery scanner's feed.
    async fn unconfirmed_fulfillments(&self, cutoff: DateTime<Utc>) -> Result<Vec<BookingId>, ReconciliationError>;

    async fn fetch_subscription_by_token(&self, token: &str) -> Result<Option<Subscription>, ReconciliationError>;

    /// Marks the subscription `Active` (first successful charge moves it out of
    /// `Pending`) and stores the next charge date.
    async fn mark_subscription_charged(
        &self,
        subscription_id: i64,
        next_charge_at: DateTime<Utc>,
    ) -> Result<(), ReconciliationError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), ReconciliationError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The booking {0} does not exist")]
    BookingNotFound(BookingId),
    #[error("No payment record exists for booking {0}")]
    PaymentNotFound(BookingId),
    #[error("Illegal payment status change. {0}")]
    PaymentStatusConflict(String),
    #[error("Illegal booking status change. {0}")]
    BookingStateConflict(String),
    #[error("No subscription exists for token {0}")]
    SubscriptionNotFound(String),
    #[error("The subscription cannot be charged. {0}")]
    SubscriptionNotChargeable(String),
}

impl From<sqlx::Error> for ReconciliationError {
    fn from(e: sqlx::Error) -> Self {
        ReconciliationError::DatabaseError(e.to_string())
    }
}

/// Convenience for the recovery scanner: "anything completed longer ago than this".
pub fn stale_cutoff(older_than: Duration) -> DateTime<Utc> {
    Utc::now() - older_than
}
