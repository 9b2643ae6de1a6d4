use chrono::{DateTime, Utc};
use cleanpay_engine::{
    db_types::{
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
    },
    traits::{MessageError, MessageProvider, ReconciliationDatabase, ReconciliationError},
};
use mockall::mock;

mock! {
    pub ReconDb {}

    impl Clone for ReconDb {
        fn clone(&self) -> Self;
    }

    impl ReconciliationDatabase for ReconDb {
        fn url(&self) -> &str;
        async fn insert_booking(&self, booking: NewBooking) -> Result<(Booking, bool), ReconciliationError>;
        async fn fetch_booking(&self, id: &BookingId) -> Result<Option<Booking>, ReconciliationError>;
        async fn fetch_payment(&self, id: &BookingId) -> Result<Option<Payment>, ReconciliationError>;
        async fn fetch_payment_by_gateway_ref(&self, gateway_ref: &str) -> Result<Option<Payment>, ReconciliationError>;
        async fn insert_pending_payment(&self, payment: NewPayment) -> Result<(Payment, bool), ReconciliationError>;
        async fn complete_payment<'a>(&self, id: &BookingId, gateway_ref: Option<&'a str>, commission_pct: i64) -> Result<Payment, ReconciliationError>;
        async fn fail_payment<'a>(&self, id: &BookingId, gateway_ref: Option<&'a str>) -> Result<Payment, ReconciliationError>;
        async fn confirm_booking(&self, id: &BookingId) -> Result<Booking, ReconciliationError>;
        async fn cancel_booking(&self, id: &BookingId) -> Result<Booking, ReconciliationError>;
        async fn effect_has_run(&self, id: &BookingId, effect: EffectKind) -> Result<bool, ReconciliationError>;
        async fn record_effect(&self, id: &BookingId, effect: EffectKind, channel: Channel, outcome: EffectOutcome) -> Result<bool, ReconciliationError>;
        async fn ledger_for(&self, id: &BookingId) -> Result<Vec<FulfillmentEvent>, ReconciliationError>;
        async fn eligible_cleaners(&self, service: &str) -> Result<Vec<Cleaner>, ReconciliationError>;
        async fn fetch_cleaner(&self, cleaner_id: i64) -> Result<Option<Cleaner>, ReconciliationError>;
        async fn assign_cleaner(&self, id: &BookingId, cleaner_id: i64) -> Result<bool, ReconciliationError>;
        async fn unconfirmed_fulfillments(&self, cutoff: DateTime<Utc>) -> Result<Vec<BookingId>, ReconciliationError>;
        async fn fetch_subscription_by_token(&self, token: &str) -> Result<Option<Subscription>, ReconciliationError>;
        async fn mark_subscription_charged(&self, subscription_id: i64, next_charge_at: DateTime<Utc>) -> Result<(), ReconciliationError>;
    }
}

mock! {
    pub Messenger {}

    impl Clone for Messenger {
        fn clone(&self) -> Self;
    }

    impl MessageProvider for Messenger {
        async fn send_confirmation(&self, booking: &Booking) -> Result<(), MessageError>;
        async fn send_receipt(&self, booking: &Booking, payment: &Payment) -> Result<(), MessageError>;
        async fn send_assignment_notice(&self, booking: &Booking, cleaner: &Cleaner) -> Result<(), MessageError>;
    }
}
