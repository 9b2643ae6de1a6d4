//! HTTP implementation of the engine's [`MessageProvider`].
//!
//! Sends confirmations, receipts and assignment notices through the platform's messaging
//! service. Every send carries a hard timeout; a hung messaging service must surface as a
//! soft failure in the pipeline, not a stalled reconciliation.

use std::{sync::Arc, time::Duration};

use cleanpay_engine::{
    db_types::{Booking, Cleaner, Payment},
    traits::{MessageError, MessageProvider},
};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue},
    Client,
};
use serde::Serialize;

use crate::config::MessagingConfig;

#[derive(Clone)]
pub struct HttpMessenger {
    base_url: String,
    client: Arc<Client>,
}

#[derive(Debug, Serialize)]
struct OutboundMessage<'a> {
    to: &'a str,
    template: &'a str,
    booking_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    amount: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scheduled_at: Option<String>,
}

impl HttpMessenger {
    pub fn new(config: &MessagingConfig) -> Result<Self, MessageError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(config.api_key.reveal().as_str())
            .map_err(|e| MessageError::SendFailure(e.to_string()))?;
        headers.insert("X-Api-Key", val);
        headers.insert("Content-Type", HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MessageError::SendFailure(e.to_string()))?;
        Ok(Self { base_url: config.base_url.clone(), client: Arc::new(client) })
    }

    async fn post_message(&self, msg: OutboundMessage<'_>) -> Result<(), MessageError> {
        let url = format!("{}/v1/messages", self.base_url);
        trace!("📨️ Sending {} message for booking {}", msg.template, msg.booking_id);
        let response = self.client.post(&url).json(&msg).send().await.map_err(|e| {
            if e.is_timeout() {
                MessageError::Timeout(e.to_string())
            } else {
                MessageError::SendFailure(e.to_string())
            }
        })?;
        if response.status().is_success() {
            debug!("📨️ {} message for booking {} accepted", msg.template, msg.booking_id);
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(MessageError::SendFailure(format!("messaging service returned {status}: {body}")))
        }
    }
}

impl MessageProvider for HttpMessenger {
    async fn send_confirmation(&self, booking: &Booking) -> Result<(), MessageError> {
        self.post_message(OutboundMessage {
            to: &booking.customer_email,
            template: "booking_confirmation",
            booking_id: booking.booking_id.as_str(),
            amount: None,
            scheduled_at: Some(booking.scheduled_at.to_rfc3339()),
        })
        .await
    }

    async fn send_receipt(&self, booking: &Booking, payment: &Payment) -> Result<(), MessageError> {
        self.post_message(OutboundMessage {
            to: &booking.customer_email,
            template: "payment_receipt",
            booking_id: booking.booking_id.as_str(),
            amount: Some(payment.amount.to_string()),
            scheduled_at: None,
        })
        .await
    }

    async fn send_assignment_notice(&self, booking: &Booking, cleaner: &Cleaner) -> Result<(), MessageError> {
        self.post_message(OutboundMessage {
            to: &cleaner.email,
            template: "job_assignment",
            booking_id: booking.booking_id.as_str(),
            amount: None,
            scheduled_at: Some(booking.scheduled_at.to_rfc3339()),
        })
        .await
    }
}
