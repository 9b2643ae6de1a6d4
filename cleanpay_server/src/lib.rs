//! # CleanPay server
//! This crate hosts the HTTP entry points for the CleanPay reconciliation engine. It is
//! responsible for:
//! * Listening for payment notifications from the payment gateway (webhooks and recurring-charge
//!   notifications) and verifying their signatures.
//! * Handling the customer's redirect back from the gateway's payment page.
//! * Offering operators a manual reconciliation command plus read access to the fulfillment
//!   ledger.
//! * Running the recovery worker that periodically finishes interrupted fulfillments.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more
//! information.

pub mod config;
pub mod data_objects;
pub mod errors;
pub mod gateway_routes;
pub mod messenger;
pub mod middleware;
pub mod recovery_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
