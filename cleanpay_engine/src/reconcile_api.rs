//! The fulfillment orchestrator.
//!
//! Every entry point (webhook, redirect-back, manual retry, recovery scanner,
//! recurring billing) funnels into [`ReconcileApi::reconcile`]. The pipeline
//! is a fixed chain of side effects, each independently idempotency-checked and
//! independently failure-isolated:
//!
//! 1. Payment → `Completed`, booking → `Confirmed` (fixed-target writes).
//! 2. Cleaner auto-assignment (atomic test-and-set) plus the assignment notice.
//! 3. Customer confirmation message (ledger-guarded).
//! 4. Payment receipt (ledger-guarded).
//!
//! Ledger writes happen only after the step's externally-visible action has
//! returned: record after act. A crash between the two costs at most one
//! duplicate message, never a silently skipped step.

use chrono::Duration;
use cleanpay_common::Cents;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{
    db_types::{
        Booking,
        BookingId,
        BookingStatus,
        Channel,
        EffectKind,
        EffectOutcome,
        NewBooking,
        NewPayment,
        Payment,
        PaymentOutcome,
        PaymentStatus,
        RecurringCharge,
    },
    matcher::rank_candidates,
    subscriptions::next_charge_after,
    traits::{stale_cutoff, MessageProvider, ReconciliationDatabase, ReconciliationError},
};

pub const DEFAULT_COMMISSION_PCT: i64 = 15;

/// What happened to one step of the pipeline during a reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// The step ran and its action took effect.
    Done,
    /// The ledger (or the state itself) showed the step had already run.
    AlreadyDone,
    /// The step failed but the pipeline continued. Eligible for recovery retry.
    SoftFailed(String),
    /// The step did not apply (e.g. failed payment, cancelled booking).
    Skipped,
}

/// The synchronous result of a reconciliation run, reported to operators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub booking_id: BookingId,
    pub booking_status: BookingStatus,
    pub payment: StepStatus,
    pub assignment: StepStatus,
    pub confirmation: StepStatus,
    pub receipt: StepStatus,
}

impl ReconcileReport {
    fn skipped(booking: &Booking) -> Self {
        Self {
            booking_id: booking.booking_id.clone(),
            booking_status: booking.status,
            payment: StepStatus::Skipped,
            assignment: StepStatus::Skipped,
            confirmation: StepStatus::Skipped,
            receipt: StepStatus::Skipped,
        }
    }
}

/// The single reconciliation command all entry points call.
#[derive(Debug, Clone)]
pub struct ReconcileApi<B, M> {
    db: B,
    messenger: M,
    commission_pct: i64,
}

impl<B, M> ReconcileApi<B, M> {
    pub fn new(db: B, messenger: M) -> Self {
        Self { db, messenger, commission_pct: DEFAULT_COMMISSION_PCT }
    }

    pub fn with_commission_pct(mut self, pct: i64) -> Self {
        self.commission_pct = pct;
        self
    }

    pub fn db(&self) -> &B {
        &self.db
    }

    pub fn db_mut(&mut self) -> &mut B {
        &mut self.db
    }
}

impl<B, M> ReconcileApi<B, M>
where
    B: ReconciliationDatabase,
    M: MessageProvider,
{
    /// Drives the booking through the fulfillment side effects for the given
    /// payment outcome. Safe to call any number of times, from any entry point.
    pub async fn reconcile(
        &self,
        id: &BookingId,
        outcome: PaymentOutcome,
        channel: Channel,
    ) -> Result<ReconcileReport, ReconciliationError> {
        let booking =
            self.db.fetch_booking(id).await?.ok_or_else(|| ReconciliationError::BookingNotFound(id.clone()))?;
        if booking.status == BookingStatus::Cancelled {
            info!("🔄️ Booking {id} is cancelled. Reconciliation via {channel} short-circuits.");
            return Ok(ReconcileReport::skipped(&booking));
        }
        if outcome == PaymentOutcome::Failed {
            let payment = self.db.fail_payment(id, None).await?;
            info!("🔄️ Payment for booking {id} marked as {}. No fulfillment runs.", payment.status);
            return Ok(ReconcileReport::skipped(&booking));
        }

        let (booking, payment, payment_step) = self.settle_payment(booking, channel).await?;
        let assignment = self.assign_cleaner(&booking, channel).await?;
        let confirmation = self.send_confirmation(&booking, channel).await?;
        let receipt = self.send_receipt(&booking, &payment, channel).await?;

        let report = ReconcileReport {
            booking_id: booking.booking_id.clone(),
            booking_status: booking.status,
            payment: payment_step,
            assignment,
            confirmation,
            receipt,
        };
        debug!("🔄️ Reconciliation of {id} via {channel} complete: {report:?}");
        Ok(report)
    }

    /// Step 1: payment → `Completed`, booking → `Confirmed`.
    ///
    /// A missing payment record on an already-confirmed booking is treated as
    /// equivalent to a completed payment. That is the inherited default; it is
    /// logged loudly because it can also be a data-integrity gap.
    async fn settle_payment(
        &self,
        booking: Booking,
        channel: Channel,
    ) -> Result<(Booking, Payment, StepStatus), ReconciliationError> {
        let id = &booking.booking_id;
        let existing = self.db.fetch_payment(id).await?;
        let (payment, step) = match existing {
            Some(p) if p.status == PaymentStatus::Completed => (p, StepStatus::AlreadyDone),
            Some(p) if p.status == PaymentStatus::Failed => {
                return Err(ReconciliationError::PaymentStatusConflict(format!(
                    "Completed outcome received via {channel} for booking {id}, but its payment is already Failed"
                )));
            },
            Some(_) => {
                let p = self.db.complete_payment(id, None, self.commission_pct).await?;
                info!("🔄️ Payment for booking {id} completed. Net payout {}", p.net_payout);
                (p, StepStatus::Done)
            },
            None if booking.status != BookingStatus::Pending => {
                warn!(
                    "🔄️ Booking {id} is {} but has no payment record. Treating it as paid; this may indicate a \
                     data-integrity gap worth investigating.",
                    booking.status
                );
                let (p, _) = self
                    .db
                    .insert_pending_payment(NewPayment::new(id.clone(), booking.amount))
                    .await?;
                let p = if p.status == PaymentStatus::Pending {
                    self.db.complete_payment(id, None, self.commission_pct).await?
                } else {
                    p
                };
                (p, StepStatus::AlreadyDone)
            },
            None => {
                let (_, _) = self.db.insert_pending_payment(NewPayment::new(id.clone(), booking.amount)).await?;
                let p = self.db.complete_payment(id, None, self.commission_pct).await?;
                info!("🔄️ Payment for booking {id} recorded and completed via {channel}.");
                (p, StepStatus::Done)
            },
        };
        let booking = self.db.confirm_booking(id).await?;
        Ok((booking, payment, step))
    }

    /// Step 2: cleaner auto-assignment. A missing candidate is a soft failure,
    /// surfaced to operators through the ledger, never fatal to the pipeline.
    async fn assign_cleaner(&self, booking: &Booking, channel: Channel) -> Result<StepStatus, ReconciliationError> {
        let id = &booking.booking_id;
        if booking.cleaner_id.is_some() || self.db.effect_has_run(id, EffectKind::CleanerAssignment).await? {
            trace!("🔄️ Booking {id} already has a cleaner. Skipping assignment.");
            return Ok(StepStatus::AlreadyDone);
        }
        let roster = self.db.eligible_cleaners(&booking.service).await?;
        let candidates = rank_candidates(booking, &roster);
        let Some(top) = candidates.first() else {
            let reason = format!("no eligible cleaner for service '{}'", booking.service);
            warn!("🔄️ Booking {id}: {reason}");
            self.db.record_effect(id, EffectKind::CleanerAssignment, channel, EffectOutcome::failure(&reason)).await?;
            return Ok(StepStatus::SoftFailed(reason));
        };
        let cleaner = top.cleaner.clone();
        if !self.db.assign_cleaner(id, cleaner.id).await? {
            // Lost the race against a concurrent run that assigned first.
            debug!("🔄️ Booking {id} was assigned concurrently. Leaving the existing assignment.");
            return Ok(StepStatus::AlreadyDone);
        }
        info!(
            "🔄️ Cleaner {} ({:.1}★, {:.1} km) assigned to booking {id}",
            cleaner.name, cleaner.rating, top.distance_km
        );
        self.db
            .record_effect(
                id,
                EffectKind::CleanerAssignment,
                channel,
                EffectOutcome::success_with(format!("cleaner {}", cleaner.id)),
            )
            .await?;
        self.notify_cleaner(booking, cleaner.id, channel).await?;
        Ok(StepStatus::Done)
    }

    async fn notify_cleaner(
        &self,
        booking: &Booking,
        cleaner_id: i64,
        channel: Channel,
    ) -> Result<(), ReconciliationError> {
        let id = &booking.booking_id;
        if self.db.effect_has_run(id, EffectKind::AssignmentNotice).await? {
            return Ok(());
        }
        let Some(cleaner) = self.db.fetch_cleaner(cleaner_id).await? else {
            warn!("🔄️ Cleaner {cleaner_id} vanished before the assignment notice for {id} could be sent.");
            return Ok(());
        };
        match self.messenger.send_assignment_notice(booking, &cleaner).await {
            Ok(()) => {
                self.db.record_effect(id, EffectKind::AssignmentNotice, channel, EffectOutcome::success()).await?;
            },
            Err(e) => {
                warn!("🔄️ Assignment notice for booking {id} failed. {e}");
                self.db
                    .record_effect(id, EffectKind::AssignmentNotice, channel, EffectOutcome::failure(e.to_string()))
                    .await?;
            },
        }
        Ok(())
    }

    /// Step 3: the customer confirmation, guarded by the ledger.
    async fn send_confirmation(&self, booking: &Booking, channel: Channel) -> Result<StepStatus, ReconciliationError> {
        let id = &booking.booking_id;
        if self.db.effect_has_run(id, EffectKind::ConfirmationSent).await? {
            trace!("🔄️ Confirmation for booking {id} already sent.");
            return Ok(StepStatus::AlreadyDone);
        }
        match self.messenger.send_confirmation(booking).await {
            Ok(()) => {
                self.db.record_effect(id, EffectKind::ConfirmationSent, channel, EffectOutcome::success()).await?;
                info!("🔄️ Confirmation sent for booking {id}");
                Ok(StepStatus::Done)
            },
            Err(e) => {
                warn!("🔄️ Confirmation send failed for booking {id}. {e}");
                self.db
                    .record_effect(id, EffectKind::ConfirmationSent, channel, EffectOutcome::failure(e.to_string()))
                    .await?;
                Ok(StepStatus::SoftFailed(e.to_string()))
            },
        }
    }

    /// Step 4: the payment receipt, guarded the same way.
    async fn send_receipt(
        &self,
        booking: &Booking,
        payment: &Payment,
        channel: Channel,
    ) -> Result<StepStatus, ReconciliationError> {
        let id = &booking.booking_id;
        if self.db.effect_has_run(id, EffectKind::ReceiptSent).await? {
            trace!("🔄️ Receipt for booking {id} already sent.");
            return Ok(StepStatus::AlreadyDone);
        }
        match self.messenger.send_receipt(booking, payment).await {
            Ok(()) => {
                self.db.record_effect(id, EffectKind::ReceiptSent, channel, EffectOutcome::success()).await?;
                info!("🔄️ Receipt sent for booking {id}");
                Ok(StepStatus::Done)
            },
            Err(e) => {
                warn!("🔄️ Receipt send failed for booking {id}. {e}");
                self.db
                    .record_effect(id, EffectKind::ReceiptSent, channel, EffectOutcome::failure(e.to_string()))
                    .await?;
                Ok(StepStatus::SoftFailed(e.to_string()))
            },
        }
    }

    /// Handles an authenticated gateway notification: records the payment (with the gateway's
    /// correlation id) if the checkout never did, settles it according to the reported outcome,
    /// then runs the shared reconciliation pipeline.
    pub async fn process_payment_notification(
        &self,
        id: &BookingId,
        outcome: PaymentOutcome,
        gateway_ref: &str,
        amount: Cents,
        channel: Channel,
    ) -> Result<ReconcileReport, ReconciliationError> {
        let booking =
            self.db.fetch_booking(id).await?.ok_or_else(|| ReconciliationError::BookingNotFound(id.clone()))?;
        if booking.status == BookingStatus::Cancelled {
            return self.reconcile(id, outcome, channel).await;
        }
        let (payment, _) = self
            .db
            .insert_pending_payment(NewPayment::new(id.clone(), amount).with_gateway_ref(gateway_ref))
            .await?;
        if payment.status == PaymentStatus::Pending {
            match outcome {
                PaymentOutcome::Completed => {
                    self.db.complete_payment(id, Some(gateway_ref), self.commission_pct).await?;
                },
                PaymentOutcome::Failed => {
                    self.db.fail_payment(id, Some(gateway_ref)).await?;
                },
            }
        }
        self.reconcile(id, outcome, channel).await
    }

    /// Cancels a booking. Only `Pending` and `Confirmed` bookings are eligible;
    /// cancellation is terminal and blocks all future reconciliation.
    pub async fn cancel_booking(&self, id: &BookingId) -> Result<Booking, ReconciliationError> {
        let booking = self.db.cancel_booking(id).await?;
        info!("🔄️ Booking {id} cancelled.");
        Ok(booking)
    }

    /// Processes a recurring charge against a subscription: creates exactly one
    /// booking (idempotent on the gateway correlation id), records its payment,
    /// runs the fulfillment pipeline and advances the next-charge date.
    pub async fn process_recurring_charge(
        &self,
        charge: RecurringCharge,
    ) -> Result<(Booking, ReconcileReport), ReconciliationError> {
        let sub = self
            .db
            .fetch_subscription_by_token(&charge.subscription_token)
            .await?
            .ok_or_else(|| ReconciliationError::SubscriptionNotFound(charge.subscription_token.clone()))?;
        if !sub.is_chargeable() {
            return Err(ReconciliationError::SubscriptionNotChargeable(format!(
                "subscription {} is {}",
                sub.subscription_token, sub.status
            )));
        }
        // Redelivered charge notifications must not spawn a second booking.
        if let Some(existing) = self.db.fetch_payment_by_gateway_ref(&charge.gateway_ref).await? {
            info!(
                "🔄️ Recurring charge {} was already processed as booking {}. Re-running reconciliation only.",
                charge.gateway_ref, existing.booking_id
            );
            let booking = self
                .db
                .fetch_booking(&existing.booking_id)
                .await?
                .ok_or_else(|| ReconciliationError::BookingNotFound(existing.booking_id.clone()))?;
            let report = self.reconcile(&existing.booking_id, PaymentOutcome::Completed, Channel::Subscription).await?;
            return Ok((booking, report));
        }

        let booking_id = BookingId(format!("sub-{}-{}", sub.id, charge.gateway_ref));
        let scheduled_at = next_charge_after(sub.frequency, sub.preferred_day, sub.preferred_hour, charge.charged_at);
        let new_booking = NewBooking::new(booking_id.clone(), &sub.customer_email, &sub.service, charge.amount)
            .with_customer(&sub.customer_id)
            .with_location(sub.latitude, sub.longitude)
            .scheduled_at(scheduled_at);
        let (booking, inserted) = self.db.insert_booking(new_booking).await?;
        if inserted {
            info!("🔄️ Recurring charge {} created booking {booking_id}", charge.gateway_ref);
        }
        let payment = NewPayment::new(booking_id.clone(), charge.amount).with_gateway_ref(&charge.gateway_ref);
        let _ = self.db.insert_pending_payment(payment).await?;
        let report = self.reconcile(&booking_id, PaymentOutcome::Completed, Channel::Subscription).await?;

        let next = next_charge_after(sub.frequency, sub.preferred_day, sub.preferred_hour, charge.charged_at);
        self.db.mark_subscription_charged(sub.id, next).await?;
        debug!("🔄️ Subscription {} next charge at {next}", sub.subscription_token);
        Ok((booking, report))
    }

    /// The recovery scanner's sweep: re-reconcile every booking whose payment
    /// completed before the cutoff but whose confirmation never went out.
    pub async fn run_recovery_sweep(
        &self,
        older_than: Duration,
    ) -> Result<Vec<(BookingId, ReconcileReport)>, ReconciliationError> {
        let cutoff = stale_cutoff(older_than);
        let stale = self.db.unconfirmed_fulfillments(cutoff).await?;
        let mut results = Vec::with_capacity(stale.len());
        for id in stale {
            match self.reconcile(&id, PaymentOutcome::Completed, Channel::Recovery).await {
                Ok(report) => results.push((id, report)),
                Err(e) => {
                    // One stuck booking must not starve the rest of the sweep.
                    error!("🔄️ Recovery reconciliation of {id} failed. {e}");
                },
            }
        }
        Ok(results)
    }
}
