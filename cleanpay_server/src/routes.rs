//! Request handler definitions for the operator-facing and public routes.
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go
//! into a separate module. Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the storage backend and message provider so the endpoint tests can
//! substitute mocks; [`crate::server`] registers them against the concrete types.

use actix_web::{get, web, HttpResponse, Responder};
use cleanpay_engine::{
    db_types::{BookingId, Channel, PaymentOutcome, PaymentStatus},
    MessageProvider,
    ReconcileApi,
    ReconciliationDatabase,
};
use log::*;
use serde_json::json;

use crate::errors::ServerError;

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

/// Route handler for the operator's manual reconciliation command.
///
/// `POST /api/reconcile/{booking_id}`
///
/// The payment outcome is derived from stored state, never from the request: a payment that
/// completed gets the full fulfillment pipeline re-run (idempotently), a failed payment gets the
/// failure path, and a payment still pending is a conflict since there is nothing to reconcile
/// yet.
pub async fn reconcile_booking<B: ReconciliationDatabase, M: MessageProvider>(
    path: web::Path<String>,
    api: web::Data<ReconcileApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let id = BookingId::from(path.into_inner());
    debug!("💻️ Operator requested reconciliation of booking {id}");
    let payment = api
        .db()
        .fetch_payment(&id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("payment for booking {id}")))?;
    let outcome = match payment.status {
        PaymentStatus::Completed => PaymentOutcome::Completed,
        PaymentStatus::Failed => PaymentOutcome::Failed,
        PaymentStatus::Pending => {
            return Err(ServerError::StateConflict(format!(
                "payment for booking {id} is still pending; nothing to reconcile"
            )));
        },
    };
    let report = api.reconcile(&id, outcome, Channel::Manual).await?;
    Ok(HttpResponse::Ok().json(report))
}

/// Route handler for the fulfillment ledger view.
///
/// `GET /api/fulfillment/{booking_id}`
///
/// Returns the booking's full audit trail, oldest entry first, so operators can see which side
/// effects ran, when, via which entry point, and why any of them failed.
pub async fn fulfillment_ledger<B: ReconciliationDatabase, M: MessageProvider>(
    path: web::Path<String>,
    api: web::Data<ReconcileApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let id = BookingId::from(path.into_inner());
    let booking =
        api.db().fetch_booking(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("booking {id}")))?;
    let ledger = api.db().ledger_for(&id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "booking_id": booking.booking_id,
        "status": booking.status,
        "ledger": ledger,
    })))
}

/// Route handler for the booking detail view.
///
/// `GET /api/booking/{booking_id}`
pub async fn booking_view<B: ReconciliationDatabase, M: MessageProvider>(
    path: web::Path<String>,
    api: web::Data<ReconcileApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let id = BookingId::from(path.into_inner());
    let booking =
        api.db().fetch_booking(&id).await?.ok_or_else(|| ServerError::NoRecordFound(format!("booking {id}")))?;
    let payment = api.db().fetch_payment(&id).await?;
    Ok(HttpResponse::Ok().json(json!({ "booking": booking, "payment": payment })))
}

/// Route handler for booking cancellation.
///
/// `POST /api/cancel/{booking_id}`
///
/// Cancellation is terminal: once a booking is cancelled, no reconciliation attempt will ever
/// transition it again, no matter what the gateway later reports.
pub async fn cancel_booking<B: ReconciliationDatabase, M: MessageProvider>(
    path: web::Path<String>,
    api: web::Data<ReconcileApi<B, M>>,
) -> Result<HttpResponse, ServerError> {
    let id = BookingId::from(path.into_inner());
    let booking = api.cancel_booking(&id).await?;
    info!("💻️ Booking {id} cancelled by an operator");
    Ok(HttpResponse::Ok().json(json!({ "booking_id": booking.booking_id, "status": booking.status })))
}
