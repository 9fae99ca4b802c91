use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::bus::EventBus;
use crate::domain::event::{event_types, DomainEvent};
use crate::domain::order::{
    Booking, CheckoutRequest, CheckoutResponse, Order, OrderStatus,
};
use crate::domain::payment::{Payment, PaymentStatus, MAX_PAYMENT_ATTEMPTS};
use crate::error::CoreError;
use crate::gateways::{CanonicalEvent, ChargeRequest, GatewayRegistry};
use crate::repo::balances_repo::BalancesRepo;
use crate::repo::orders_repo::OrdersRepo;
use crate::repo::payments_repo::PaymentsRepo;
use crate::transitions::order::OrderEvent;
use crate::transitions::payment::PaymentEvent;
use crate::transitions::{order, payment, Step};

/// Checkout, charge collection and the order lifecycle. Webhook-driven
/// transitions run on a row locked for the whole transaction; the event
/// publish happens only after commit.
pub struct PaymentFlowService {
    pub pool: PgPool,
    pub orders: OrdersRepo,
    pub payments: PaymentsRepo,
    pub balances: BalancesRepo,
    pub registry: GatewayRegistry,
    pub bus: EventBus,
}

fn payment_reference() -> String {
    format!("pay_{}", Uuid::new_v4().simple())
}

impl PaymentFlowService {
    pub async fn checkout(&self, req: CheckoutRequest) -> Result<CheckoutResponse, CoreError> {
        if req.bookings.is_empty() {
            return Err(CoreError::MalformedInput("at least one booking required".to_string()));
        }
        if req.total != req.subtotal - req.discount + req.tax {
            return Err(CoreError::business(
                "TOTAL_MISMATCH",
                "total must equal subtotal - discount + tax",
            ));
        }
        let booked: Decimal = req.bookings.iter().map(|b| b.amount).sum();
        if booked != req.subtotal {
            return Err(CoreError::business(
                "SUBTOTAL_MISMATCH",
                "booking amounts must sum to subtotal",
            ));
        }
        if req.total <= Decimal::ZERO {
            return Err(CoreError::business("NON_POSITIVE_TOTAL", "total must be positive"));
        }

        let adapter = self.registry.require(&req.payment_provider)?;
        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_id: req.user_id,
            workspace_id: req.workspace_id,
            subtotal: req.subtotal,
            discount: req.discount,
            tax: req.tax,
            total: req.total,
            status: OrderStatus::Pending,
            payment_provider: req.payment_provider.clone(),
            created_at: now,
            paid_at: None,
            completed_at: None,
        };
        let pay = Payment {
            id: Uuid::new_v4(),
            order_id: order.id,
            amount: req.total,
            currency: req.currency.clone(),
            provider: req.payment_provider.clone(),
            reference: payment_reference(),
            gateway_transaction_id: None,
            status: PaymentStatus::Pending,
            attempt: 1,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        OrdersRepo::insert_order_tx(&mut tx, &order).await?;
        for b in &req.bookings {
            let booking = Booking {
                id: Uuid::new_v4(),
                order_id: order.id,
                user_id: req.user_id,
                space_id: b.space_id,
                checkin_at: b.checkin_at,
                checkout_at: b.checkout_at,
                amount: b.amount,
                cancelled: false,
                qr_token: None,
            };
            OrdersRepo::insert_booking_tx(&mut tx, &booking).await?;
        }
        PaymentsRepo::insert_tx(&mut tx, &pay).await?;
        tx.commit().await?;

        let response = adapter
            .initiate_charge(&ChargeRequest {
                reference: pay.reference.clone(),
                amount: pay.amount,
                currency: pay.currency.clone(),
                customer_email: req.user_email.clone(),
            })
            .await?;

        tracing::info!(order_id = %order.id, reference = %pay.reference, "checkout created");

        Ok(CheckoutResponse {
            order_id: order.id,
            payment_id: pay.id,
            reference: pay.reference,
            status: order.status,
            authorization: response.raw,
        })
    }

    /// Opens one more collection attempt on a still-pending order. Past the
    /// attempt cap the order fails instead.
    pub async fn retry_payment(
        &self,
        order_id: Uuid,
        customer_email: &str,
    ) -> Result<CheckoutResponse, CoreError> {
        let order = self
            .orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;

        if order.status != OrderStatus::Pending {
            return Err(CoreError::business(
                "ORDER_NOT_PENDING",
                format!("order is {}", order.status.as_str()),
            ));
        }

        let attempts = self.payments.count_attempts(order_id).await?;
        if attempts >= MAX_PAYMENT_ATTEMPTS as i64 {
            self.exhaust_order(&order).await?;
            return Err(CoreError::business(
                "ATTEMPTS_EXHAUSTED",
                format!("order already used {attempts} payment attempts"),
            ));
        }

        let adapter = self.registry.require(&order.payment_provider)?;
        let currency = self
            .payments
            .latest_for_order(order_id)
            .await?
            .map(|p| p.currency)
            .unwrap_or_else(|| "NGN".to_string());
        let now = Utc::now();
        let pay = Payment {
            id: Uuid::new_v4(),
            order_id,
            amount: order.total,
            currency,
            provider: order.payment_provider.clone(),
            reference: payment_reference(),
            gateway_transaction_id: None,
            status: PaymentStatus::Pending,
            attempt: attempts as i32 + 1,
            created_at: now,
            updated_at: now,
        };

        let mut tx = self.pool.begin().await?;
        PaymentsRepo::insert_tx(&mut tx, &pay).await?;
        tx.commit().await?;

        let response = adapter
            .initiate_charge(&ChargeRequest {
                reference: pay.reference.clone(),
                amount: pay.amount,
                currency: pay.currency.clone(),
                customer_email: customer_email.to_string(),
            })
            .await?;

        Ok(CheckoutResponse {
            order_id,
            payment_id: pay.id,
            reference: pay.reference,
            status: order.status,
            authorization: response.raw,
        })
    }

    /// Applies a charge_completed webhook. Idempotent: a replay finds the
    /// payment already completed and does nothing. The workspace balance is
    /// credited exactly once, inside the same transaction as the payment
    /// and order updates.
    pub async fn complete_charge(&self, event: &CanonicalEvent) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let pay = PaymentsRepo::find_by_reference_for_update_tx(&mut tx, &event.reference)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("payment {}", event.reference)))?;

        match payment::apply(pay.status, PaymentEvent::Complete)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(());
            }
            Step::Changed(next) => {
                // Another attempt already collected this order. Acknowledge
                // the delivery without completing a second payment; the
                // at-most-one-completed invariant stays intact.
                if PaymentsRepo::has_completed_for_order_tx(&mut tx, pay.order_id, pay.id).await? {
                    tracing::info!(
                        payment_id = %pay.id,
                        order_id = %pay.order_id,
                        "order already collected by another attempt, ignoring completion"
                    );
                    tx.commit().await?;
                    return Ok(());
                }
                if let Some(amount) = event.amount {
                    if amount != pay.amount {
                        return Err(CoreError::business(
                            "AMOUNT_MISMATCH",
                            format!("gateway reported {amount}, expected {}", pay.amount),
                        ));
                    }
                }
                PaymentsRepo::update_status_tx(
                    &mut tx,
                    pay.id,
                    next,
                    event.gateway_transaction_id.as_deref(),
                )
                .await?;
            }
        }

        let order = OrdersRepo::find_order_for_update_tx(&mut tx, pay.order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", pay.order_id)))?;

        let order_paid = match order::apply(order.status, OrderEvent::PaymentSucceeded)? {
            Step::Changed(next) => {
                OrdersRepo::update_status_tx(&mut tx, order.id, next).await?;
                BalancesRepo::credit_available_tx(&mut tx, order.workspace_id, order.total).await?;
                true
            }
            Step::AlreadyApplied => false,
        };

        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::PAYMENT_COMPLETED,
                "payment_flow",
                json!({
                    "payment_id": pay.id,
                    "order_id": order.id,
                    "reference": pay.reference,
                    "amount": pay.amount.to_string(),
                }),
            ))
            .await;
        if order_paid {
            self.bus
                .publish(DomainEvent::new(
                    event_types::ORDER_PAID,
                    "payment_flow",
                    json!({
                        "order_id": order.id,
                        "user_id": order.user_id,
                        "workspace_id": order.workspace_id,
                        "total": order.total.to_string(),
                    }),
                ))
                .await;
        }
        Ok(())
    }

    /// Applies a charge_failed webhook. Failing an already-completed payment
    /// is a contradiction and is rejected so the receipt records it.
    pub async fn fail_charge(&self, event: &CanonicalEvent) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let pay = PaymentsRepo::find_by_reference_for_update_tx(&mut tx, &event.reference)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("payment {}", event.reference)))?;

        match payment::apply(pay.status, PaymentEvent::Fail)? {
            Step::AlreadyApplied => {
                tx.commit().await?;
                return Ok(());
            }
            Step::Changed(next) => {
                PaymentsRepo::update_status_tx(
                    &mut tx,
                    pay.id,
                    next,
                    event.gateway_transaction_id.as_deref(),
                )
                .await?;
            }
        }
        tx.commit().await?;

        self.bus
            .publish(DomainEvent::new(
                event_types::PAYMENT_FAILED,
                "payment_flow",
                json!({
                    "payment_id": pay.id,
                    "order_id": pay.order_id,
                    "reference": pay.reference,
                }),
            ))
            .await;

        let attempts = self.payments.count_attempts(pay.order_id).await?;
        if attempts >= MAX_PAYMENT_ATTEMPTS as i64 {
            if let Some(order) = self.orders.find_order(pay.order_id).await? {
                if order.status == OrderStatus::Pending {
                    self.exhaust_order(&order).await?;
                }
            }
        }
        Ok(())
    }

    /// Marks a paid order fulfilled after checkout day has passed.
    pub async fn complete_order(&self, order_id: Uuid) -> Result<Order, CoreError> {
        let mut tx = self.pool.begin().await?;
        let order = OrdersRepo::find_order_for_update_tx(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))?;

        let changed = match order::apply(order.status, OrderEvent::FulfilmentDone)? {
            Step::Changed(next) => {
                OrdersRepo::update_status_tx(&mut tx, order.id, next).await?;
                true
            }
            Step::AlreadyApplied => false,
        };
        tx.commit().await?;

        if changed {
            self.bus
                .publish(DomainEvent::new(
                    event_types::ORDER_COMPLETED,
                    "payment_flow",
                    json!({"order_id": order.id, "user_id": order.user_id}),
                ))
                .await;
        }
        self.orders
            .find_order(order_id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {order_id}")))
    }

    async fn exhaust_order(&self, order: &Order) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await?;
        let current = OrdersRepo::find_order_for_update_tx(&mut tx, order.id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("order {}", order.id)))?;
        let changed = match order::apply(current.status, OrderEvent::PaymentsExhausted) {
            Ok(Step::Changed(next)) => {
                OrdersRepo::update_status_tx(&mut tx, order.id, next).await?;
                true
            }
            Ok(Step::AlreadyApplied) | Err(_) => false,
        };
        tx.commit().await?;

        if changed {
            self.bus
                .publish(DomainEvent::new(
                    event_types::ORDER_FAILED,
                    "payment_flow",
                    json!({"order_id": order.id, "user_id": order.user_id}),
                ))
                .await;
        }
        Ok(())
    }
}
