use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use cleanpay_common::Secret;
use cleanpay_engine::{
    db_types::{BookingStatus, PaymentStatus},
    ReconcileApi,
    ReconcileReport,
    StepStatus,
};

use super::{
    helpers::{sample_booking, sample_payment, send},
    mocks::{MockMessenger, MockReconDb},
};
use crate::{
    middleware::OperatorMiddlewareFactory,
    routes::{cancel_booking, fulfillment_ledger, reconcile_booking},
};

const OPERATOR_TOKEN: &str = "op-secret-token";

macro_rules! operator_app {
    ($api:expr) => {
        test::init_service(
            App::new().app_data(web::Data::new($api)).service(
                web::scope("/api")
                    .wrap(OperatorMiddlewareFactory::new(Secret::new(OPERATOR_TOKEN.to_string())))
                    .route("/reconcile/{booking_id}", web::post().to(reconcile_booking::<MockReconDb, MockMessenger>))
                    .route(
                        "/fulfillment/{booking_id}",
                        web::get().to(fulfillment_ledger::<MockReconDb, MockMessenger>),
                    )
                    .route("/cancel/{booking_id}", web::post().to(cancel_booking::<MockReconDb, MockMessenger>)),
            ),
        )
        .await
    };
}

fn authed(req: TestRequest) -> TestRequest {
    req.insert_header(("Authorization", format!("Bearer {OPERATOR_TOKEN}")))
}

#[actix_web::test]
async fn operator_routes_reject_missing_token() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_payment().never();
    let api = ReconcileApi::new(db, MockMessenger::new());
    let app = operator_app!(api);

    let req = TestRequest::post().uri("/api/reconcile/bk-1001").to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn operator_routes_reject_wrong_token() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_payment().never();
    let api = ReconcileApi::new(db, MockMessenger::new());
    let app = operator_app!(api);

    let req = TestRequest::post()
        .uri("/api/reconcile/bk-1001")
        .insert_header(("Authorization", "Bearer nope"))
        .to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn manual_reconcile_returns_a_step_report() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_payment().returning(|_| Ok(Some(sample_payment("bk-1001", PaymentStatus::Completed))));
    db.expect_fetch_booking().returning(|_| {
        let mut b = sample_booking("bk-1001", BookingStatus::Confirmed);
        b.cleaner_id = Some(7);
        Ok(Some(b))
    });
    db.expect_confirm_booking().returning(|_| {
        let mut b = sample_booking("bk-1001", BookingStatus::Confirmed);
        b.cleaner_id = Some(7);
        Ok(b)
    });
    db.expect_effect_has_run().returning(|_, _| Ok(true));
    let api = ReconcileApi::new(db, MockMessenger::new());
    let app = operator_app!(api);

    let req = authed(TestRequest::post().uri("/api/reconcile/bk-1001")).to_request();
    let (status, body) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let report: ReconcileReport = serde_json::from_str(&body).unwrap();
    assert_eq!(report.booking_status, BookingStatus::Confirmed);
    assert_eq!(report.payment, StepStatus::AlreadyDone);
    assert_eq!(report.assignment, StepStatus::AlreadyDone);
    assert_eq!(report.confirmation, StepStatus::AlreadyDone);
    assert_eq!(report.receipt, StepStatus::AlreadyDone);
}

#[actix_web::test]
async fn manual_reconcile_of_pending_payment_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_payment().returning(|_| Ok(Some(sample_payment("bk-1001", PaymentStatus::Pending))));
    db.expect_confirm_booking().never();
    let api = ReconcileApi::new(db, MockMessenger::new());
    let app = operator_app!(api);

    let req = authed(TestRequest::post().uri("/api/reconcile/bk-1001")).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn fulfillment_ledger_of_unknown_booking_is_404() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_fetch_booking().returning(|_| Ok(None));
    let api = ReconcileApi::new(db, MockMessenger::new());
    let app = operator_app!(api);

    let req = authed(TestRequest::get().uri("/api/fulfillment/bk-nope")).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn cancelling_an_in_progress_booking_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut db = MockReconDb::new();
    db.expect_cancel_booking().returning(|id| {
        Err(cleanpay_engine::traits::ReconciliationError::BookingStateConflict(format!(
            "booking {id} is InProgress and cannot be cancelled"
        )))
    });
    let api = ReconcileApi::new(db, MockMessenger::new());
    let app = operator_app!(api);

    let req = authed(TestRequest::post().uri("/api/cancel/bk-1001")).to_request();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::CONFLICT);
}
