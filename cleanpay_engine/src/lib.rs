//! CleanPay Engine
//!
//! The reconciliation core of the CleanPay booking platform. Once the payment gateway reports an
//! outcome for a booking, this library drives the booking to its fully-fulfilled state: payment
//! settlement, cleaner assignment, customer confirmation and receipt. The library is
//! transport-agnostic; the CleanPay server wraps it in HTTP entry points.
//!
//! The library is divided into three main sections:
//! 1. Storage ([`mod@sqlite`]). SQLite is the supported backend. You should never need to query
//!    the database directly; use the API instead. The exception is the record types, which are
//!    defined in [`mod@db_types`] and are public.
//! 2. The reconciliation API ([`ReconcileApi`]). A single `reconcile` command shared by every
//!    entry point (gateway webhook, customer redirect, operator retry, recovery sweep, recurring
//!    billing), built so that repeated invocation is always safe.
//! 3. Pure domain logic: gateway signature verification ([`mod@signature`]), cleaner matching
//!    ([`mod@matcher`]) and recurring-billing schedule rules ([`mod@subscriptions`]).

pub mod db_types;
pub mod matcher;
pub mod signature;
pub mod subscriptions;
pub mod traits;

mod reconcile_api;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use reconcile_api::{ReconcileApi, ReconcileReport, StepStatus, DEFAULT_COMMISSION_PCT};
#[cfg(feature = "sqlite")]
pub use sqlite::{db_url, SqliteDatabase};
pub use traits::{MessageError, MessageProvider, ReconciliationDatabase, ReconciliationError};
