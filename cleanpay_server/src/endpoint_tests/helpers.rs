use actix_http::Request;
use actix_web::{
    body::MessageBody,
    dev::{Service, ServiceResponse},
    http::StatusCode,
    test,
    Error,
};
use chrono::Utc;
use cleanpay_common::{Cents, Secret};
use cleanpay_engine::{
    db_types::{Booking, BookingId, BookingStatus, Payment, PaymentStatus},
    signature::sign_fields,
};

use crate::config::GatewayConfig;

pub const TEST_PASSPHRASE: &str = "test-passphrase";

/// Drives a request through the test service. Errors raised by middleware surface as `Err` from
/// the service call rather than as responses, so both paths are folded into a (status, body)
/// pair here.
pub async fn send<S, B>(app: &S, req: Request) -> (StatusCode, String)
where
    S: Service<Request, Response = ServiceResponse<B>, Error = Error>,
    B: MessageBody,
{
    match test::try_call_service(app, req).await {
        Ok(res) => {
            let status = res.status();
            let body = test::read_body(res).await;
            (status, String::from_utf8_lossy(&body).into_owned())
        },
        Err(e) => {
            let res = e.as_response_error().error_response();
            (res.status(), String::new())
        },
    }
}

pub fn gateway_config() -> GatewayConfig {
    GatewayConfig { passphrase: Secret::new(TEST_PASSPHRASE.to_string()), signature_checks: true }
}

/// Builds a signed, form-encoded webhook body from the given fields.
pub fn signed_body(fields: &[(&str, &str)]) -> String {
    let mut fields: Vec<(String, String)> =
        fields.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
    let secret = Secret::new(TEST_PASSPHRASE.to_string());
    let sig = sign_fields(&fields, Some(&secret)).expect("could not sign test fields");
    fields.push(("signature".to_string(), sig));
    serde_urlencoded::to_string(&fields).expect("could not encode test body")
}

pub fn sample_booking(id: &str, status: BookingStatus) -> Booking {
    Booking {
        id: 1,
        booking_id: BookingId::from(id.to_string()),
        customer_id: Some("cust-42".to_string()),
        customer_email: "jo@example.com".to_string(),
        cleaner_id: None,
        service: "standard".to_string(),
        latitude: -33.9249,
        longitude: 18.4241,
        scheduled_at: Utc::now(),
        amount: Cents::from(45_000),
        status,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

pub fn sample_payment(id: &str, status: PaymentStatus) -> Payment {
    Payment {
        id: 1,
        booking_id: BookingId::from(id.to_string()),
        amount: Cents::from(45_000),
        status,
        gateway_ref: Some("pf-88211".to_string()),
        commission: Cents::from(6_750),
        net_payout: Cents::from(38_250),
        payout_paid: false,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}
