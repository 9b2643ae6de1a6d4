//! Entry points for the payment gateway: the server-to-server webhook, the customer's redirect
//! back from the payment page, and recurring-charge notifications.
//!
//! Webhook bodies are form-encoded field lists signed by the gateway. Verification happens
//! against the raw field pairs before anything else; a notification that fails the check is
//! logged and acknowledged without touching any state. Notifications are *always* answered with
//! HTTP 200; the gateway's redelivery machinery cannot fix a bad signature or an unknown
//! booking, and reconciliation is idempotent, so there is nothing a retry storm would gain us.

use actix_web::{web, HttpResponse};
use cleanpay_engine::{
    db_types::{BookingId, Channel, PaymentOutcome, PaymentStatus, RecurringCharge},
    signature::verify_signature,
    MessageProvider,
    ReconcileApi,
    ReconciliationDatabase,
};
use chrono::Utc;
use cleanpay_common::Cents;
use log::*;

use crate::{
    config::GatewayConfig,
    data_objects::{outcome_from_gateway_status, RedirectResult, WebhookAck},
    errors::ServerError,
};

/// The form fields every gateway notification must carry.
const FIELD_BOOKING_ID: &str = "booking_id";
const FIELD_PAYMENT_STATUS: &str = "payment_status";
const FIELD_PAYMENT_REF: &str = "payment_ref";
const FIELD_AMOUNT_GROSS: &str = "amount_gross";
const FIELD_SIGNATURE: &str = "signature";
const FIELD_SUBSCRIPTION_TOKEN: &str = "subscription_token";

/// Parses an amount like "450.00" into cents. Thousands separators are not accepted.
pub fn parse_gateway_amount(s: &str) -> Option<Cents> {
    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, "0"),
    };
    if frac.len() > 2 || frac.is_empty() {
        return None;
    }
    let whole = whole.parse::<i64>().ok()?;
    let mut frac = frac.parse::<i64>().ok()?;
    if s.split_once('.').map(|(_, f)| f.len()) == Some(1) {
        frac *= 10;
    }
    if whole < 0 || frac < 0 {
        return None;
    }
    // The gateway should never send amounts anywhere near i64 cents; treat overflow as invalid.
    let cents = whole.checked_mul(100)?.checked_add(frac)?;
    Some(Cents::from(cents))
}

struct Notification {
    fields: Vec<(String, String)>,
}

impl Notification {
    /// Parses the raw body and, if checks are enabled, verifies the gateway signature over the
    /// field pairs. Returns the reason for rejection, if any.
    fn from_body(body: &[u8], config: &GatewayConfig) -> Result<Self, String> {
        let fields: Vec<(String, String)> =
            serde_urlencoded::from_bytes(body).map_err(|e| format!("malformed form body: {e}"))?;
        if config.signature_checks {
            let claimed = fields
                .iter()
                .find(|(k, _)| k == FIELD_SIGNATURE)
                .map(|(_, v)| v.as_str())
                .ok_or_else(|| "notification carries no signature".to_string())?;
            let passphrase = (!config.passphrase.reveal().is_empty()).then_some(&config.passphrase);
            let valid = verify_signature(&fields, claimed, passphrase)
                .map_err(|e| format!("signature could not be checked: {e}"))?;
            if !valid {
                return Err("signature mismatch".to_string());
            }
        }
        Ok(Self { fields })
    }

    fn field(&self, name: &str) -> Option<&str> {
        self.fields.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }

    fn require(&self, name: &str) -> Result<&str, String> {
        self.field(name).ok_or_else(|| format!("missing field '{name}'"))
    }
}

/// Route handler for gateway payment notifications.
///
/// `POST /gateway/webhook`
pub async fn gateway_webhook<B: ReconciliationDatabase, M: MessageProvider>(
    body: web::Bytes,
    config: web::Data<GatewayConfig>,
    api: web::Data<ReconcileApi<B, M>>,
) -> HttpResponse {
    let ack = match handle_payment_notification(&body, &config, &api).await {
        Ok(()) => WebhookAck::ok(),
        Err(reason) => {
            warn!("🔔️ Gateway notification rejected: {reason}");
            WebhookAck::rejected(reason)
        },
    };
    HttpResponse::Ok().json(ack)
}

async fn handle_payment_notification<B: ReconciliationDatabase, M: MessageProvider>(
    body: &[u8],
    config: &GatewayConfig,
    api: &ReconcileApi<B, M>,
) -> Result<(), String> {
    let notification = Notification::from_body(body, config)?;
    let id = BookingId::from(notification.require(FIELD_BOOKING_ID)?.to_string());
    let status = notification.require(FIELD_PAYMENT_STATUS)?;
    let outcome =
        outcome_from_gateway_status(status).ok_or_else(|| format!("unknown payment status '{status}'"))?;
    let gateway_ref = notification.require(FIELD_PAYMENT_REF)?;
    let amount = notification
        .require(FIELD_AMOUNT_GROSS)
        .and_then(|s| parse_gateway_amount(s).ok_or_else(|| format!("invalid amount '{s}'")))?;
    info!("🔔️ Gateway reports {status} for booking {id} (ref {gateway_ref})");
    let report = api
        .process_payment_notification(&id, outcome, gateway_ref, amount, Channel::Webhook)
        .await
        .map_err(|e| e.to_string())?;
    debug!("🔔️ Webhook reconciliation of {id} complete: {report:?}");
    Ok(())
}

#[derive(Debug, serde::Deserialize)]
pub struct ReturnParams {
    pub booking_id: String,
    /// The gateway's correlation id, when the gateway includes it in the return URL. Logged only;
    /// never treated as proof of anything.
    #[serde(rename = "ref")]
    pub gateway_ref: Option<String>,
}

/// Route handler for the customer's redirect back from the gateway's payment page.
///
/// `GET /payment/return?booking_id=...&ref=...`
///
/// The redirect is driven by the customer's browser and proves nothing about the payment, so the
/// query string is trusted for routing only. The stored payment state is the single source of
/// truth: a payment the webhook already settled gets reconciliation re-run (making this entry
/// point a backstop for a lost webhook); anything else is reported back as-is.
pub async fn gateway_return<B: ReconciliationDatabase, M: MessageProvider>(
    params: web::Query<ReturnParams>,
    api: web::Data<ReconcileApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let params = params.into_inner();
    let id = BookingId::from(params.booking_id);
    debug!("💻️ Customer returned from the gateway for booking {id} (ref {:?})", params.gateway_ref);
    let booking =
        api.db().fetch_booking(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("booking {id}")))?;
    let payment = api.db().fetch_payment(&id).await?;
    let result = match payment.map(|p| p.status) {
        Some(PaymentStatus::Completed) => {
            let report = api.reconcile(&id, PaymentOutcome::Completed, Channel::Redirect).await?;
            RedirectResult {
                booking_id: booking.booking_id.as_str().to_string(),
                payment_state: "confirmed".to_string(),
                report: Some(report),
            }
        },
        Some(PaymentStatus::Failed) => RedirectResult {
            booking_id: booking.booking_id.as_str().to_string(),
            payment_state: "failed".to_string(),
            report: None,
        },
        // No payment record, or still pending: the webhook may simply not have landed yet.
        _ => RedirectResult {
            booking_id: booking.booking_id.as_str().to_string(),
            payment_state: "pending".to_string(),
            report: None,
        },
    };
    Ok(HttpResponse::Ok().json(result))
}

/// Route handler for recurring-charge notifications.
///
/// `POST /gateway/subscription`
///
/// A successful charge against a subscription token creates exactly one booking (idempotent on
/// the gateway's payment ref) and runs it through the same pipeline as any other payment. Failed
/// recurring charges are acknowledged and logged; no booking is created for them.
pub async fn gateway_subscription<B: ReconciliationDatabase, M: MessageProvider>(
    body: web::Bytes,
    config: web::Data<GatewayConfig>,
    api: web::Data<ReconcileApi<B, M>>,
) -> HttpResponse {
    let ack = match handle_subscription_notification(&body, &config, &api).await {
        Ok(()) => WebhookAck::ok(),
        Err(reason) => {
            warn!("🔔️ Recurring-charge notification rejected: {reason}");
            WebhookAck::rejected(reason)
        },
    };
    HttpResponse::Ok().json(ack)
}

async fn handle_subscription_notification<B: ReconciliationDatabase, M: MessageProvider>(
    body: &[u8],
    config: &GatewayConfig,
    api: &ReconcileApi<B, M>,
) -> Result<(), String> {
    let notification = Notification::from_body(body, config)?;
    let token = notification.require(FIELD_SUBSCRIPTION_TOKEN)?;
    let status = notification.require(FIELD_PAYMENT_STATUS)?;
    let outcome =
        outcome_from_gateway_status(status).ok_or_else(|| format!("unknown payment status '{status}'"))?;
    if outcome == PaymentOutcome::Failed {
        info!("🔔️ Recurring charge against subscription {token} failed. No booking created.");
        return Ok(());
    }
    let gateway_ref = notification.require(FIELD_PAYMENT_REF)?;
    let amount = notification
        .require(FIELD_AMOUNT_GROSS)
        .and_then(|s| parse_gateway_amount(s).ok_or_else(|| format!("invalid amount '{s}'")))?;
    let charge = RecurringCharge {
        subscription_token: token.to_string(),
        gateway_ref: gateway_ref.to_string(),
        amount,
        charged_at: Utc::now(),
    };
    let (booking, report) = api.process_recurring_charge(charge).await.map_err(|e| e.to_string())?;
    info!("🔔️ Recurring charge {gateway_ref} reconciled as booking {}", booking.booking_id);
    debug!("🔔️ Recurring-charge reconciliation report: {report:?}");
    Ok(())
}
