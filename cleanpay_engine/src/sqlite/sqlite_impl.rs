//! `SqliteDatabase` is the concrete SQLite implementation of the reconciliation store.
use std::fmt::Debug;

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::db::{bookings, cleaners, ledger, new_pool, payments, subscriptions};
use crate::{
    db_types::{
        Booking,
        BookingId,
        Channel,
        Cleaner,
        EffectKind,
        EffectOutcome,
        FulfillmentEvent,
        NewBooking,
        NewCleaner,
        NewPayment,
        NewSubscription,
        Payment,
        Subscription,
    },
    traits::{ReconciliationDatabase, ReconciliationError},
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
    pub async fn new_with_url(url: &str) -> Result<Self, sqlx::Error> {
        let pool = new_pool(url).await?;
        Ok(Self { url: url.to_string(), pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Registers a cleaner with their service specializations, atomically.
    pub async fn register_cleaner(&self, cleaner: NewCleaner) -> Result<Cleaner, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let cleaner = cleaners::insert_cleaner(cleaner, &mut tx).await?;
        tx.commit().await?;
        Ok(cleaner)
    }

    pub async fn set_cleaner_availability(&self, cleaner_id: i64, available: bool) -> Result<(), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        cleaners::set_availability(cleaner_id, available, &mut conn).await
    }

    pub async fn register_subscription(&self, sub: NewSubscription) -> Result<Subscription, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::insert_subscription(sub, &mut conn).await
    }
}

impl ReconciliationDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_booking(&self, booking: NewBooking) -> Result<(Booking, bool), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        bookings::idempotent_insert(booking, &mut conn).await
    }

    async fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let booking = bookings::fetch_booking(id, &mut conn).await?;
        Ok(booking)
    }

    async fn fetch_payment(&self, id: &BookingId) -> Result<Option<Payment>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(id, &mut conn).await?;
        Ok(payment)
    }

    async fn fetch_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment_by_gateway_ref(gateway_ref, &mut conn).await?;
        Ok(payment)
    }

    async fn insert_pending_payment(&self, payment: NewPayment) -> Result<(Payment, bool), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        payments::idempotent_insert(payment, &mut conn).await
    }

    async fn complete_payment(
        &self,
        id: &BookingId,
        gateway_ref: Option<&str>,
        commission_pct: i64,
    ) -> Result<Payment, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::complete_payment(id, gateway_ref, commission_pct, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn fail_payment(&self, id: &BookingId, gateway_ref: Option<&str>) -> Result<Payment, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::fail_payment(id, gateway_ref, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn confirm_booking(&self, id: &BookingId) -> Result<Booking, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let booking = bookings::confirm_booking(id, &mut tx).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn cancel_booking(&self, id: &BookingId) -> Result<Booking, ReconciliationError> {
        let mut tx = self.pool.begin().await?;
        let booking = bookings::cancel_booking(id, &mut tx).await?;
        tx.commit().await?;
        Ok(booking)
    }

    async fn effect_has_run(&self, id: &BookingId, effect: EffectKind) -> Result<bool, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        ledger::effect_has_run(id, effect, &mut conn).await
    }

    async fn record_effect(
        &self,
        id: &BookingId,
        effect: EffectKind,
        channel: Channel,
        outcome: EffectOutcome,
    ) -> Result<bool, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        ledger::record_effect(id, effect, channel, outcome, &mut conn).await
    }

    async fn ledger_for(&self, id: &BookingId) -> Result<Vec<FulfillmentEvent>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        ledger::ledger_for(id, &mut conn).await
    }

    async fn eligible_cleaners(&self, service: &str) -> Result<Vec<Cleaner>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        cleaners::eligible_cleaners(service, &mut conn).await
    }

    async fn fetch_cleaner(&self, cleaner_id: i64) -> Result<Option<Cleaner>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let cleaner = cleaners::fetch_cleaner(cleaner_id, &mut conn).await?;
        Ok(cleaner)
    }

    async fn assign_cleaner(&self, id: &BookingId, cleaner_id: i64) -> Result<bool, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        bookings::assign_cleaner(id, cleaner_id, &mut conn).await
    }

    async fn unconfirmed_fulfillments(&self, cutoff: DateTime<Utc>) -> Result<Vec<BookingId>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        payments::unconfirmed_fulfillments(cutoff, &mut conn).await
    }

    async fn fetch_subscription_by_token(&self, token: &str) -> Result<Option<Subscription>, ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        let sub = subscriptions::fetch_by_token(token, &mut conn).await?;
        Ok(sub)
    }

    async fn mark_subscription_charged(
        &self,
        subscription_id: i64,
        next_charge_at: DateTime<Utc>,
    ) -> Result<(), ReconciliationError> {
        let mut conn = self.pool.acquire().await?;
        subscriptions::mark_charged(subscription_id, next_charge_at, &mut conn).await
    }

    async fn close(&mut self) -> Result<(), ReconciliationError> {
        self.pool.close().await;
        Ok(())
    }
}
