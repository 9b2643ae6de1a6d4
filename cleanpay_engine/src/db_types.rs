//! The record types shared between the reconciliation pipeline and its storage backends.

use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use cleanpay_common::Cents;
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

//--------------------------------------      BookingId      ---------------------------------------------------------
/// The public identifier of a booking, as handed out to customers and the payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct BookingId(pub String);

impl FromStr for BookingId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for BookingId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for BookingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl BookingId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------    BookingStatus    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BookingStatus {
    /// The booking has been created, but payment has not been confirmed.
    Pending,
    /// Payment is confirmed and the booking is scheduled for fulfillment.
    Confirmed,
    /// The cleaner has started the job.
    InProgress,
    /// The job is done.
    Completed,
    /// The booking was cancelled. Terminal; blocks all future fulfillment.
    Cancelled,
}

impl BookingStatus {
    /// Only pending or confirmed bookings may be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }
}

impl Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BookingStatus::Pending => write!(f, "Pending"),
            BookingStatus::Confirmed => write!(f, "Confirmed"),
            BookingStatus::InProgress => write!(f, "InProgress"),
            BookingStatus::Completed => write!(f, "Completed"),
            BookingStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl FromStr for BookingStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Confirmed" => Ok(Self::Confirmed),
            "InProgress" => Ok(Self::InProgress),
            "Completed" => Ok(Self::Completed),
            "Cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid booking status: {s}"))),
        }
    }
}

impl From<String> for BookingStatus {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid booking status in storage: {value}. Defaulting to Pending");
            BookingStatus::Pending
        })
    }
}

//--------------------------------------       Booking       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Booking {
    pub id: i64,
    pub booking_id: BookingId,
    /// The owning customer. `None` for bookings created by a guest before authentication.
    pub customer_id: Option<String>,
    pub customer_email: String,
    /// The assigned cleaner, if any. Mutable until the job starts.
    pub cleaner_id: Option<i64>,
    /// The required specialization, e.g. "standard", "deep", "windows".
    pub service: String,
    pub latitude: f64,
    pub longitude: f64,
    pub scheduled_at: DateTime<Utc>,
    pub amount: Cents,
    pub status: BookingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewBooking {
    pub booking_id: BookingId,
    pub customer_id: Option<String>,
    pub customer_email: String,
    pub service: String,
    pub latitude: f64,
    pub longitude: f64,
    pub scheduled_at: DateTime<Utc>,
    pub amount: Cents,
}

impl NewBooking {
    pub fn new(booking_id: BookingId, customer_email: &str, service: &str, amount: Cents) -> Self {
        Self {
            booking_id,
            customer_id: None,
            customer_email: customer_email.to_string(),
            service: service.to_string(),
            latitude: 0.0,
            longitude: 0.0,
            scheduled_at: Utc::now(),
            amount,
        }
    }

    pub fn with_customer(mut self, customer_id: &str) -> Self {
        self.customer_id = Some(customer_id.to_string());
        self
    }

    pub fn with_location(mut self, latitude: f64, longitude: f64) -> Self {
        self.latitude = latitude;
        self.longitude = longitude;
        self
    }

    pub fn scheduled_at(mut self, when: DateTime<Utc>) -> Self {
        self.scheduled_at = when;
        self
    }
}

//--------------------------------------    PaymentStatus    ---------------------------------------------------------
/// Payment statuses move forward only: `Pending → Completed` or `Pending → Failed`.
/// A `Completed` payment is immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "Pending"),
            PaymentStatus::Completed => write!(f, "Completed"),
            PaymentStatus::Failed => write!(f, "Failed"),
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Pending" => Ok(Self::Pending),
            "Completed" => Ok(Self::Completed),
            "Failed" => Ok(Self::Failed),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------       Payment       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Payment {
    pub id: i64,
    pub booking_id: BookingId,
    pub amount: Cents,
    pub status: PaymentStatus,
    /// The gateway's correlation id for this payment, once known.
    pub gateway_ref: Option<String>,
    /// Platform commission, computed when the payment completes.
    pub commission: Cents,
    /// What the cleaner is owed. Consumed by the (out-of-scope) payout process.
    pub net_payout: Cents,
    pub payout_paid: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewPayment {
    pub booking_id: BookingId,
    pub amount: Cents,
    pub gateway_ref: Option<String>,
}

impl NewPayment {
    pub fn new(booking_id: BookingId, amount: Cents) -> Self {
        Self { booking_id, amount, gateway_ref: None }
    }

    pub fn with_gateway_ref(mut self, gateway_ref: &str) -> Self {
        self.gateway_ref = Some(gateway_ref.to_string());
        self
    }
}

//--------------------------------------   PaymentOutcome    ---------------------------------------------------------
/// The outcome signal delivered by an entry point. This is what the pipeline reconciles against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome {
    Completed,
    Failed,
}

//--------------------------------------      EffectKind     ---------------------------------------------------------
/// The fulfillment side effects tracked by the idempotency ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum EffectKind {
    CleanerAssignment,
    AssignmentNotice,
    ConfirmationSent,
    ReceiptSent,
}

impl Display for EffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EffectKind::CleanerAssignment => write!(f, "CleanerAssignment"),
            EffectKind::AssignmentNotice => write!(f, "AssignmentNotice"),
            EffectKind::ConfirmationSent => write!(f, "ConfirmationSent"),
            EffectKind::ReceiptSent => write!(f, "ReceiptSent"),
        }
    }
}

//--------------------------------------       Channel       ---------------------------------------------------------
/// Which entry point drove a reconciliation attempt. Recorded alongside every ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum Channel {
    Webhook,
    Redirect,
    Manual,
    Recovery,
    Subscription,
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Webhook => write!(f, "Webhook"),
            Channel::Redirect => write!(f, "Redirect"),
            Channel::Manual => write!(f, "Manual"),
            Channel::Recovery => write!(f, "Recovery"),
            Channel::Subscription => write!(f, "Subscription"),
        }
    }
}

//--------------------------------------  FulfillmentEvent   ---------------------------------------------------------
/// One idempotency ledger entry. Append-only.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FulfillmentEvent {
    pub id: i64,
    pub booking_id: BookingId,
    pub effect: EffectKind,
    pub channel: Channel,
    pub succeeded: bool,
    pub detail: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// The outcome to record for a side effect attempt.
#[derive(Debug, Clone)]
pub struct EffectOutcome {
    pub succeeded: bool,
    pub detail: Option<String>,
}

impl EffectOutcome {
    pub fn success() -> Self {
        Self { succeeded: true, detail: None }
    }

    pub fn success_with(detail: impl Into<String>) -> Self {
        Self { succeeded: true, detail: Some(detail.into()) }
    }

    pub fn failure(detail: impl Into<String>) -> Self {
        Self { succeeded: false, detail: Some(detail.into()) }
    }
}

//--------------------------------------       Cleaner       ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Cleaner {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub is_active: bool,
    pub is_available: bool,
    /// Historical rating, 0.0 - 5.0.
    pub rating: f64,
    /// Declared work location.
    pub latitude: f64,
    pub longitude: f64,
    /// How far from the declared location this cleaner will travel.
    pub radius_km: f64,
}

#[derive(Debug, Clone)]
pub struct NewCleaner {
    pub name: String,
    pub email: String,
    pub rating: f64,
    pub latitude: f64,
    pub longitude: f64,
    pub radius_km: f64,
    pub specializations: Vec<String>,
}

//--------------------------------------   Subscriptions     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Paused,
    Cancelled,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Pending => write!(f, "Pending"),
            SubscriptionStatus::Active => write!(f, "Active"),
            SubscriptionStatus::Paused => write!(f, "Paused"),
            SubscriptionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum BillingFrequency {
    Weekly,
    Monthly,
}

impl Display for BillingFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BillingFrequency::Weekly => write!(f, "Weekly"),
            BillingFrequency::Monthly => write!(f, "Monthly"),
        }
    }
}

/// A recurring-cleaning subscription. Each successful gateway charge against the
/// subscription token produces exactly one new booking plus its payment record.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: i64,
    /// The gateway-issued token identifying the recurring billing agreement.
    pub subscription_token: String,
    pub customer_id: String,
    pub customer_email: String,
    pub service: String,
    pub latitude: f64,
    pub longitude: f64,
    pub amount: Cents,
    pub frequency: BillingFrequency,
    /// Weekly: days from Monday (0-6). Monthly: day of month (1-31), clamped to month length.
    pub preferred_day: i64,
    /// Hour of day (UTC) the cleaning is scheduled for.
    pub preferred_hour: i64,
    pub status: SubscriptionStatus,
    pub next_charge_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscription {
    /// A subscription accepts charges while `Pending` (first charge) or `Active`.
    pub fn is_chargeable(&self) -> bool {
        matches!(self.status, SubscriptionStatus::Pending | SubscriptionStatus::Active)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewSubscription {
    pub subscription_token: String,
    pub customer_id: String,
    pub customer_email: String,
    pub service: String,
    pub latitude: f64,
    pub longitude: f64,
    pub amount: Cents,
    pub frequency: BillingFrequency,
    pub preferred_day: i64,
    pub preferred_hour: i64,
    pub next_charge_at: DateTime<Utc>,
}

/// A recurring-charge notification from the gateway, already authenticated.
#[derive(Debug, Clone)]
pub struct RecurringCharge {
    pub subscription_token: String,
    pub gateway_ref: String,
    pub amount: Cents,
    pub charged_at: DateTime<Utc>,
}
