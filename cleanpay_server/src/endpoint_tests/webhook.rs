use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use cleanpay_engine::{
    db_types::{BookingStatus, PaymentStatus},
    ReconcileApi,
};

use super::{
    helpers::{gateway_config, sample_booking, sample_payment, send, signed_body},
    mocks::{MockMessenger, MockReconDb},
};
use crate::{
    data_objects::WebhookAck,
    gateway_routes::{gateway_return, gateway_webhook},
};

fn webhook_fields<'a>(status: &'a str) -> Vec<(&'a str, &'a str)> {
    vec![
        ("booking_id", "bk-1001"),
        ("payment_status", status),
        ("payment_ref", "pf-88211"),
        ("amount_gross", "450.00"),
    ]
}

async fn post_webhook(api: ReconcileApi<MockReconDb, MockMessenger>, body: String) -> (StatusCode, WebhookAck) {
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .app_data(web::Data::new(gateway_config()))
            .route("/gateway/webhook", web::post().to(gateway_webhook::<MockReconDb, MockMessenger>)),
    )
    .await;
    let req = TestRequest::post()
        .uri("/gateway/webhook")
        .insert_header(("Content-Type", "application/x-www-form-urlencoded"))
        .set_payload(body)
        .to_request();
    let (status, body) = send(&app, req).await;
    let ack: WebhookAck = serde_json::from_str(&body).expect("ack was not valid JSON");
    (status, ack)
}

#[actix_web::test]
async fn valid_webhook_settles_payment_and_acks() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_booking().returning(|_| Ok(Some(sample_booking("bk-1001", BookingStatus::Pending))));
    db.expect_insert_pending_payment()
        .returning(|_| Ok((sample_payment("bk-1001", PaymentStatus::Pending), true)));
    db.expect_fetch_payment().returning(|_| Ok(Some(sample_payment("bk-1001", PaymentStatus::Completed))));
    db.expect_complete_payment()
        .times(1)
        .returning(|_, _, _| Ok(sample_payment("bk-1001", PaymentStatus::Completed)));
    db.expect_confirm_booking().returning(|_| Ok(sample_booking("bk-1001", BookingStatus::Confirmed)));
    // The fulfillment side effects already ran on a previous delivery.
    db.expect_effect_has_run().returning(|_, _| Ok(true));
    let messenger = MockMessenger::new();
    let api = ReconcileApi::new(db, messenger);

    let body = signed_body(&webhook_fields("COMPLETE"));
    let (status, ack) = post_webhook(api, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack.status, "ok");
}

#[actix_web::test]
async fn tampered_webhook_is_acked_but_touches_nothing() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_booking().never();
    db.expect_insert_pending_payment().never();
    db.expect_complete_payment().never();
    let messenger = MockMessenger::new();
    let api = ReconcileApi::new(db, messenger);

    // Sign the real fields, then inflate the amount afterwards.
    let body = signed_body(&webhook_fields("COMPLETE")).replace("450.00", "1.00");
    let (status, ack) = post_webhook(api, body).await;

    assert_eq!(status, StatusCode::OK, "the gateway always gets a 200");
    assert_eq!(ack.status, "rejected");
    assert!(ack.reason.unwrap().contains("signature"));
}

#[actix_web::test]
async fn unsigned_webhook_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_complete_payment().never();
    let api = ReconcileApi::new(db, MockMessenger::new());

    let body = serde_urlencoded::to_string(webhook_fields("COMPLETE")).unwrap();
    let (status, ack) = post_webhook(api, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack.status, "rejected");
}

#[actix_web::test]
async fn unknown_payment_status_is_rejected() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_complete_payment().never();
    db.expect_fail_payment().never();
    let api = ReconcileApi::new(db, MockMessenger::new());

    let body = signed_body(&webhook_fields("MAYBE_LATER"));
    let (status, ack) = post_webhook(api, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack.status, "rejected");
    assert!(ack.reason.unwrap().contains("payment status"));
}

#[actix_web::test]
async fn failed_payment_webhook_settles_without_fulfillment() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_booking().returning(|_| Ok(Some(sample_booking("bk-1001", BookingStatus::Pending))));
    db.expect_insert_pending_payment()
        .returning(|_| Ok((sample_payment("bk-1001", PaymentStatus::Pending), true)));
    db.expect_fail_payment()
        .times(1..=2)
        .returning(|_, _| Ok(sample_payment("bk-1001", PaymentStatus::Failed)));
    db.expect_complete_payment().never();
    db.expect_confirm_booking().never();
    let messenger = MockMessenger::new();
    let api = ReconcileApi::new(db, messenger);

    let body = signed_body(&webhook_fields("FAILED"));
    let (status, ack) = post_webhook(api, body).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack.status, "ok");
}

#[actix_web::test]
async fn redirect_back_reports_pending_without_mutating() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_booking().returning(|_| Ok(Some(sample_booking("bk-1001", BookingStatus::Pending))));
    db.expect_fetch_payment().returning(|_| Ok(Some(sample_payment("bk-1001", PaymentStatus::Pending))));
    // Whatever the query string claims, a pending payment must not be completed here.
    db.expect_complete_payment().never();
    db.expect_confirm_booking().never();
    let api = ReconcileApi::new(db, MockMessenger::new());

    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(api))
            .route("/payment/return", web::get().to(gateway_return::<MockReconDb, MockMessenger>)),
    )
    .await;
    let req = TestRequest::get().uri("/payment/return?booking_id=bk-1001&ref=pf-88211").to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let body: crate::data_objects::RedirectResult = serde_json::from_str(&body).unwrap();
    assert_eq!(body.payment_state, "pending");
    assert!(body.report.is_none());
}
