//! Wire types for the HTTP entry points.

use cleanpay_engine::{db_types::PaymentOutcome, ReconcileReport};
use serde::{Deserialize, Serialize};

/// The payment-status values the gateway sends in its notifications.
pub const STATUS_COMPLETE: &str = "COMPLETE";
pub const STATUS_FAILED: &str = "FAILED";
pub const STATUS_CANCELLED: &str = "CANCELLED";

/// Maps a gateway payment-status string onto a [`PaymentOutcome`]. Unknown values are `None` and
/// must be rejected by the caller.
pub fn outcome_from_gateway_status(status: &str) -> Option<PaymentOutcome> {
    match status {
        STATUS_COMPLETE => Some(PaymentOutcome::Completed),
        STATUS_FAILED | STATUS_CANCELLED => Some(PaymentOutcome::Failed),
        _ => None,
    }
}

/// The acknowledgement body returned to the gateway. Notifications are always acknowledged with
/// HTTP 200 so the gateway does not hammer us with redeliveries; a rejected notification carries
/// the reason here and is otherwise a no-op.
#[derive(Debug, Serialize, Deserialize)]
pub struct WebhookAck {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self { status: "ok".to_string(), reason: None }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { status: "rejected".to_string(), reason: Some(reason.into()) }
    }
}

/// Response for the customer's redirect back from the gateway's payment page.
#[derive(Debug, Serialize, Deserialize)]
pub struct RedirectResult {
    pub booking_id: String,
    /// "confirmed", "pending" or "failed", derived from stored state only.
    pub payment_state: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ReconcileReport>,
}
