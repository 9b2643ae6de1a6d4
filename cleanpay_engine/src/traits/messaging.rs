use thiserror::Error;

use crate::db_types::{Booking, Cleaner, Payment};

/// The outbound messaging collaborator.
///
/// The pipeline treats every send as a fallible, retryable black box: a failure
/// is recorded in the ledger and picked up again by the recovery scanner, never
/// surfaced on the payment-confirmation path. Implementations must carry their
/// own timeouts; a send that hangs forever would stall the pipeline.
#[allow(async_fn_in_trait)]
pub trait MessageProvider: Clone {
    /// Tell the customer their booking is confirmed.
    async fn send_confirmation(&self, booking: &Booking) -> Result<(), MessageError>;

    /// Send the customer a payment receipt.
    async fn send_receipt(&self, booking: &Booking, payment: &Payment) -> Result<(), MessageError>;

    /// Tell the cleaner they have been assigned to a job.
    async fn send_assignment_notice(&self, booking: &Booking, cleaner: &Cleaner) -> Result<(), MessageError>;
}

#[derive(Debug, Clone, Error)]
pub enum MessageError {
    #[error("The message provider rejected the send. {0}")]
    SendFailure(String),
    #[error("The message provider did not respond in time. {0}")]
    Timeout(String),
}
