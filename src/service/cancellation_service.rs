use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::domain::cancellation::{
    BookingCancellation, CancelBookingRequest, CancellationStatus,
};
use crate::domain::event::{event_types, DomainEvent};
use crate::domain::order::OrderStatus;
use crate::domain::payment::PaymentStatus;
use crate::domain::refund::{Refund, RefundReason, RefundStatus, MAX_REFUND_RETRIES};
use crate::error::CoreError;
use crate::gateways::{CanonicalEvent, GatewayRegistry, TransferRequest};
use crate::policy::cancellation::calculate_refund_policy;
use crate::repo::bank_accounts_repo::BankAccountsRepo;
use crate::repo::cancellations_repo::CancellationsRepo;
use crate::repo::orders_repo::OrdersRepo;
use crate::repo::payments_repo::PaymentsRepo;
use crate::repo::refunds_repo::RefundsRepo;
use crate::transitions::refund::RefundEvent;
use crate::transitions::{refund, Step};

/// Booking cancellation and the refund it may owe. The policy split is
/// frozen when the cancellation is recorded; approval creates the refund
/// and pays it out as a gateway transfer to the customer's default bank
/// account. Transfer webhooks close the loop.
pub struct CancellationService {
    pub pool: PgPool,
    pub orders: OrdersRepo,
    pub payments: PaymentsRepo,
    pub refunds: RefundsRepo,
    pub cancellations: CancellationsRepo,
    pub bank_accounts: BankAccountsRepo,
    pub registry: GatewayRegistry,
    pub payout_provider: String,
    pub bus: EventBus,
}

fn refund_reference() -> String {
    format!("rfd_{}", Uuid::new_v4().simple())
}

impl CancellationService {
    /// Records the cancellation with the policy outcome frozen at call time.
    /// A repeated call returns the existing record unchanged.
    pub async fn cancel_booking(
        &self,
        booking_id: Uuid,
        req: CancelBookingRequest,
    ) -> Result<BookingCancellation, CoreError> {
        if let Some(existing) = self.cancellations.find_by_booking(booking_id).await? {
            return Ok(existing);
        }

        let booking = self
            .orders
            .find_booking(booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {booking_id}")))?;
        let order = self
            .orders
            .find_order(booking.order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", booking.order_id)))?;

        if !matches!(order.status, OrderStatus::Paid | OrderStatus::Completed) {
            return Err(CoreError::business(
                "ORDER_NOT_PAID",
                format!("order is {}, nothing to refund", order.status.as_str()),
            ));
        }

        let now = Utc::now();
        if booking.checkout_at <= now {
            return Err(CoreError::business(
                "BOOKING_ALREADY_OVER",
                "cannot cancel a booking after checkout",
            ));
        }

        let hours_until_checkin =
            ((booking.checkin_at - now).num_minutes() as f64 / 60.0).max(0.0);
        let policy = calculate_refund_policy(hours_until_checkin, booking.amount);

        let cancellation = BookingCancellation {
            id: Uuid::new_v4(),
            booking_id,
            reason: req.reason,
            feedback: req.feedback,
            would_rebook: req.would_rebook,
            hours_until_checkin,
            refund_percentage: policy.percentage,
            refund_amount: policy.refund_amount,
            penalty_amount: policy.penalty_amount,
            status: CancellationStatus::Pending,
            refund_status: RefundStatus::Pending,
            refund_id: None,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        let inserted = CancellationsRepo::insert_tx(&mut tx, &cancellation).await?;
        if !inserted {
            tx.rollback().await?;
            return self
                .cancellations
                .find_by_booking(booking_id)
                .await?
                .ok_or_else(|| CoreError::NotFound(format!("cancellation for {booking_id}")));
        }
        OrdersRepo::mark_booking_cancelled_tx(&mut tx, booking_id).await?;
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::BOOKING_CANCELLED,
                "cancellation",
                json!({
                    "cancellation_id": cancellation.id,
                    "booking_id": booking_id,
                    "user_id": booking.user_id,
                    "refund_amount": cancellation.refund_amount.to_string(),
                    "penalty_amount": cancellation.penalty_amount.to_string(),
                }),
            ))
            .await;

        Ok(cancellation)
    }

    /// Approves the cancellation. A positive refund amount creates the
    /// refund record and starts the payout transfer; a zero amount closes
    /// the refund immediately. Re-approving retries a failed payout within
    /// the retry bound.
    pub async fn approve(
        &self,
        cancellation_id: Uuid,
        _actor: Uuid,
    ) -> Result<BookingCancellation, CoreError> {
        let mut tx = self.pool.begin().await?;
        let cancellation = CancellationsRepo::find_for_update_tx(&mut tx, cancellation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("cancellation {cancellation_id}")))?;

        match cancellation.status {
            CancellationStatus::Pending => {}
            CancellationStatus::Approved => {
                tx.commit().await?;
                self.retry_failed_payout(&cancellation).await?;
                return self.reload(cancellation_id).await;
            }
            CancellationStatus::Rejected | CancellationStatus::Refunded => {
                return Err(CoreError::business(
                    "CANCELLATION_SETTLED",
                    format!("cancellation is {}", cancellation.status.as_str()),
                ));
            }
        }

        CancellationsRepo::update_status_tx(&mut tx, cancellation_id, CancellationStatus::Approved)
            .await?;

        if cancellation.refund_amount <= Decimal::ZERO {
            CancellationsRepo::update_refund_status_tx(
                &mut tx,
                cancellation_id,
                RefundStatus::Completed,
            )
            .await?;
            CancellationsRepo::update_status_tx(
                &mut tx,
                cancellation_id,
                CancellationStatus::Refunded,
            )
            .await?;
            tx.commit().await?;
            return self.reload(cancellation_id).await;
        }

        let booking = self
            .orders
            .find_booking(cancellation.booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", cancellation.booking_id)))?;
        let payment = self
            .payments
            .latest_for_order(booking.order_id)
            .await?
            .filter(|p| p.status == PaymentStatus::Completed)
            .ok_or_else(|| {
                CoreError::business("NO_COMPLETED_PAYMENT", "order has no completed payment")
            })?;

        let now = Utc::now();
        let refund_row = Refund {
            id: Uuid::new_v4(),
            order_id: booking.order_id,
            payment_id: payment.id,
            amount: cancellation.refund_amount,
            currency: payment.currency.clone(),
            reason: RefundReason::BookingCancelled,
            reference: refund_reference(),
            gateway_refund_id: None,
            status: RefundStatus::Pending,
            retry_count: 0,
            created_at: now,
            updated_at: now,
        };
        RefundsRepo::insert_tx(&mut tx, &refund_row).await?;
        CancellationsRepo::set_refund_tx(&mut tx, cancellation_id, refund_row.id).await?;
        tx.commit().await?;

        self.start_payout(&refund_row.id, booking.user_id).await?;
        self.reload(cancellation_id).await
    }

    pub async fn reject(
        &self,
        cancellation_id: Uuid,
        _actor: Uuid,
    ) -> Result<BookingCancellation, CoreError> {
        let mut tx = self.pool.begin().await?;
        let cancellation = CancellationsRepo::find_for_update_tx(&mut tx, cancellation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("cancellation {cancellation_id}")))?;

        match cancellation.status {
            CancellationStatus::Pending => {}
            CancellationStatus::Rejected => {
                tx.commit().await?;
                return Ok(cancellation);
            }
            other => {
                return Err(CoreError::business(
                    "CANCELLATION_SETTLED",
                    format!("cancellation is {}", other.as_str()),
                ));
            }
        }

        CancellationsRepo::update_status_tx(&mut tx, cancellation_id, CancellationStatus::Rejected)
            .await?;
        tx.commit().await?;
        self.reload(cancellation_id).await
    }

    /// Applies a transfer_completed webhook whose reference matches one of
    /// our refunds. NotFound tells the ingestor this reference belongs to
    /// something else.
    pub async fn complete_refund(&self, event: &CanonicalEvent) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let refund_row = RefundsRepo::find_by_reference_for_update_tx(&mut tx, &event.reference)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("refund {}", event.reference)))?;

        match refund::apply(refund_row.status, RefundEvent::Complete)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(());
            }
            Step::Changed(next) => {
                RefundsRepo::update_status_tx(
                    &mut tx,
                    refund_row.id,
                    next,
                    event.gateway_transaction_id.as_deref(),
                )
                .await?;
            }
        }

        if let Some(cancellation) =
            CancellationsRepo::find_by_refund_for_update_tx(&mut tx, refund_row.id).await?
        {
            CancellationsRepo::update_refund_status_tx(
                &mut tx,
                cancellation.id,
                RefundStatus::Completed,
            )
            .await?;
            CancellationsRepo::update_status_tx(
                &mut tx,
                cancellation.id,
                CancellationStatus::Refunded,
            )
            .await?;
        }
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::REFUND_COMPLETED,
                "cancellation",
                json!({
                    "refund_id": refund_row.id,
                    "order_id": refund_row.order_id,
                    "reference": refund_row.reference,
                    "amount": refund_row.amount.to_string(),
                }),
            ))
            .await;
        Ok(())
    }

    pub async fn fail_refund(&self, event: &CanonicalEvent) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let refund_row = RefundsRepo::find_by_reference_for_update_tx(&mut tx, &event.reference)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("refund {}", event.reference)))?;

        match refund::apply(refund_row.status, RefundEvent::Fail)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(());
            }
            Step::Changed(next) => {
                RefundsRepo::update_status_tx(&mut tx, refund_row.id, next, None).await?;
                let retries = RefundsRepo::increment_retry_tx(&mut tx, refund_row.id).await?;
                if retries >= MAX_REFUND_RETRIES {
                    tracing::error!(
                        refund_id = %refund_row.id,
                        retries,
                        "refund payout exhausted its retries, needs manual settlement"
                    );
                }
            }
        }

        if let Some(cancellation) =
            CancellationsRepo::find_by_refund_for_update_tx(&mut tx, refund_row.id).await?
        {
            CancellationsRepo::update_refund_status_tx(
                &mut tx,
                cancellation.id,
                RefundStatus::Failed,
            )
            .await?;
        }
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::REFUND_FAILED,
                "cancellation",
                json!({
                    "refund_id": refund_row.id,
                    "order_id": refund_row.order_id,
                    "reference": refund_row.reference,
                }),
            ))
            .await;
        Ok(())
    }

    async fn reload(&self, cancellation_id: Uuid) -> Result<BookingCancellation, CoreError> {
        self.cancellations
            .find(cancellation_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("cancellation {cancellation_id}")))
    }

    async fn retry_failed_payout(
        &self,
        cancellation: &BookingCancellation,
    ) -> Result<(), CoreError> {
        let Some(refund_id) = cancellation.refund_id else {
            return Ok(());
        };
        let Some(refund_row) = self.refunds.find(refund_id).await? else {
            return Ok(());
        };
        if refund_row.status != RefundStatus::Failed {
            return Ok(());
        }
        if refund_row.retry_count >= MAX_REFUND_RETRIES {
            return Err(CoreError::business(
                "REFUND_RETRIES_EXHAUSTED",
                "refund payout needs manual settlement",
            ));
        }
        let booking = self
            .orders
            .find_booking(cancellation.booking_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("booking {}", cancellation.booking_id)))?;
        self.start_payout(&refund_id, booking.user_id).await
    }

    /// Moves the refund into processing and fires the gateway transfer. A
    /// gateway failure puts it back to failed with one more retry consumed.
    async fn start_payout(&self, refund_id: &Uuid, customer_id: Uuid) -> Result<(), CoreError> {
        let account = self
            .bank_accounts
            .list_for_owner(customer_id)
            .await?
            .into_iter()
            .find(|a| a.is_default)
            .ok_or_else(|| {
                CoreError::business("NO_BANK_ACCOUNT", "customer has no default bank account")
            })?;

        let mut tx = self.pool.begin().await?;
        let refund_row = RefundsRepo::find_for_update_tx(&mut tx, *refund_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("refund {refund_id}")))?;
        match refund::apply(refund_row.status, RefundEvent::StartProcessing)? {
            Step::Changed(next) => {
                RefundsRepo::update_status_tx(&mut tx, refund_row.id, next, None).await?;
            }
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(());
            }
        }
        tx.commit().await?;

        let adapter = self.registry.require(&self.payout_provider)?;
        let failure = match adapter
            .initiate_transfer(&TransferRequest {
                reference: refund_row.reference.clone(),
                amount: refund_row.amount,
                currency: refund_row.currency.clone(),
                account_number: account.account_number.clone(),
                bank_code: account.bank_code.clone(),
                narration: format!("Refund for order {}", refund_row.order_id),
            })
            .await
        {
            Ok(response) if response.success => None,
            Ok(_) => Some(CoreError::GatewayUnavailable(format!(
                "{} declined transfer {}",
                self.payout_provider, refund_row.reference
            ))),
            Err(err) => Some(err),
        };

        if let Some(err) = failure {
            let mut tx = self.pool.begin().await?;
            RefundsRepo::update_status_tx(&mut tx, refund_row.id, RefundStatus::Failed, None)
                .await?;
            RefundsRepo::increment_retry_tx(&mut tx, refund_row.id).await?;
            tx.commit().await?;
            return Err(err);
        }
        Ok(())
    }
}
