use uuid::Uuid;

use crate::bus::Subscriber;
use crate::domain::event::{event_types, DomainEvent};
use crate::repo::orders_repo::OrdersRepo;

/// Issues check-in tokens for every booking on a freshly paid order. The
/// conditional update makes re-delivery harmless: an existing token is
/// never overwritten.
pub struct QrSubscriber {
    pub orders: OrdersRepo,
}

#[async_trait::async_trait]
impl Subscriber for QrSubscriber {
    fn name(&self) -> &'static str {
        "qr"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        if event.event_type != event_types::ORDER_PAID {
            return Ok(());
        }
        let Some(order_id) = event.str_field("order_id").and_then(|v| v.parse().ok()) else {
            anyhow::bail!("order.paid event without order_id");
        };

        for booking in self.orders.bookings_for_order(order_id).await? {
            let token = format!("qr_{}", Uuid::new_v4().simple());
            if self.orders.set_booking_qr_if_absent(booking.id, &token).await? {
                tracing::info!(booking_id = %booking.id, "check-in token issued");
            }
        }
        Ok(())
    }
}
