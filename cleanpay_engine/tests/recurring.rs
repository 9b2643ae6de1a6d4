mod support;

use chrono::{DateTime, Utc};
use cleanpay_engine::{
    db_types::{BillingFrequency, BookingStatus, NewSubscription, PaymentStatus, RecurringCharge, SubscriptionStatus},
    traits::ReconciliationDatabase,
    ReconcileApi,
    SqliteDatabase,
    StepStatus,
};
use support::{booking_amount, nearby_cleaner, prepare_test_env, random_db_path, TestMessenger};
use tokio::runtime::Runtime;

fn ts(s: &str) -> DateTime<Utc> {
    s.parse().unwrap()
}

fn weekly_subscription(token: &str) -> NewSubscription {
    NewSubscription {
        subscription_token: token.to_string(),
        customer_id: "cust-77".to_string(),
        customer_email: "jo@example.com".to_string(),
        service: "standard".to_string(),
        latitude: -33.9290,
        longitude: 18.4300,
        amount: booking_amount(),
        frequency: BillingFrequency::Weekly,
        preferred_day: 2,
        preferred_hour: 9,
        next_charge_at: ts("2024-03-06T09:00:00Z"),
    }
}

fn charge(token: &str, gateway_ref: &str) -> RecurringCharge {
    RecurringCharge {
        subscription_token: token.to_string(),
        gateway_ref: gateway_ref.to_string(),
        amount: booking_amount(),
        // 2024-03-06 is a Wednesday (preferred day 2), so the next charge lands a week later.
        charged_at: ts("2024-03-06T09:00:00Z"),
    }
}

async fn setup(url: &str) -> (ReconcileApi<SqliteDatabase, TestMessenger>, TestMessenger) {
    prepare_test_env(url).await;
    let db = SqliteDatabase::new_with_url(url).await.expect("Error creating database");
    let messenger = TestMessenger::default();
    (ReconcileApi::new(db, messenger.clone()), messenger)
}

#[test]
fn first_charge_creates_a_booking_and_activates_the_subscription() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = random_db_path();
        let (api, messenger) = setup(&url).await;
        api.db().register_cleaner(nearby_cleaner("thandi", 4.7)).await.unwrap();
        api.db().register_subscription(weekly_subscription("tok-abc")).await.unwrap();

        let (booking, report) = api.process_recurring_charge(charge("tok-abc", "pf-9001")).await.unwrap();

        assert_eq!(booking.status, BookingStatus::Pending, "snapshot taken before reconciliation");
        assert_eq!(report.booking_status, BookingStatus::Confirmed);
        assert_eq!(report.payment, StepStatus::Done);
        let payment = api.db().fetch_payment_by_gateway_ref("pf-9001").await.unwrap().unwrap();
        assert_eq!(payment.status, PaymentStatus::Completed);

        let sub = api.db().fetch_subscription_by_token("tok-abc").await.unwrap().unwrap();
        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.next_charge_at, ts("2024-03-13T09:00:00Z"));
        assert_eq!(messenger.confirmation_count(), 1);
    });
}

#[test]
fn redelivered_charge_notifications_do_not_duplicate_bookings() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = random_db_path();
        let (api, messenger) = setup(&url).await;
        api.db().register_cleaner(nearby_cleaner("sipho", 4.3)).await.unwrap();
        api.db().register_subscription(weekly_subscription("tok-def")).await.unwrap();

        let (first, _) = api.process_recurring_charge(charge("tok-def", "pf-9002")).await.unwrap();
        let (second, report) = api.process_recurring_charge(charge("tok-def", "pf-9002")).await.unwrap();

        assert_eq!(first.booking_id, second.booking_id);
        assert_eq!(report.confirmation, StepStatus::AlreadyDone);
        assert_eq!(messenger.confirmation_count(), 1);
        assert_eq!(messenger.receipt_count(), 1);
    });
}

#[test]
fn distinct_charges_each_get_their_own_booking() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = random_db_path();
        let (api, _messenger) = setup(&url).await;
        api.db().register_cleaner(nearby_cleaner("lerato", 4.9)).await.unwrap();
        api.db().register_subscription(weekly_subscription("tok-ghi")).await.unwrap();

        let (a, _) = api.process_recurring_charge(charge("tok-ghi", "pf-9003")).await.unwrap();
        let (b, _) = api.process_recurring_charge(charge("tok-ghi", "pf-9004")).await.unwrap();
        assert_ne!(a.booking_id, b.booking_id);
    });
}

#[test]
fn paused_subscriptions_reject_charges() {
    let sys = Runtime::new().unwrap();
    sys.block_on(async {
        let url = random_db_path();
        let (api, _messenger) = setup(&url).await;
        let sub = api.db().register_subscription(weekly_subscription("tok-jkl")).await.unwrap();
        sqlx::query("UPDATE subscriptions SET status = 'Paused' WHERE id = $1")
            .bind(sub.id)
            .execute(api.db().pool())
            .await
            .unwrap();

        let err = api.process_recurring_charge(charge("tok-jkl", "pf-9005")).await;
        assert!(matches!(
            err,
            Err(cleanpay_engine::traits::ReconciliationError::SubscriptionNotChargeable(_))
        ));
    });
}
