use std::sync::Arc;

use serde_json::json;
use uuid::Uuid;

use crate::bus::task_queue::{Job, TaskQueue};
use crate::bus::Subscriber;
use crate::domain::event::{event_types, DomainEvent};
use crate::repo::notifications_repo::NotificationsRepo;

struct PushJob {
    client: reqwest::Client,
    relay_url: String,
    token: String,
    body: serde_json::Value,
    event_type: String,
}

#[async_trait::async_trait]
impl Job for PushJob {
    fn describe(&self) -> String {
        format!("push: {}", self.event_type)
    }

    async fn run(&self) -> anyhow::Result<()> {
        let response = self
            .client
            .post(&self.relay_url)
            .bearer_auth(&self.token)
            .json(&self.body)
            .send()
            .await?;
        if !response.status().is_success() {
            anyhow::bail!("push relay returned {}", response.status());
        }
        Ok(())
    }
}

/// Forwards user-facing events to the push relay, which owns device token
/// resolution. One push per (user, event, entity) thanks to the dedupe
/// record written before enqueueing.
pub struct PushSubscriber {
    pub client: reqwest::Client,
    pub relay_url: String,
    pub token: String,
    pub queue: TaskQueue,
    pub notifications: NotificationsRepo,
}

fn recipient(event: &DomainEvent) -> Option<Uuid> {
    event
        .str_field("user_id")
        .or_else(|| event.str_field("owner_id"))
        .and_then(|v| v.parse().ok())
}

fn dedupe_key(event: &DomainEvent) -> Option<String> {
    for key in [
        "payment_id",
        "order_id",
        "booking_id",
        "cancellation_id",
        "refund_id",
        "withdrawal_id",
    ] {
        if let Some(value) = event.str_field(key) {
            return Some(format!("{key}:{value}"));
        }
    }
    None
}

fn wants_push(event_type: &str) -> bool {
    matches!(
        event_type,
        event_types::ORDER_PAID
            | event_types::ORDER_FAILED
            | event_types::BOOKING_CANCELLED
            | event_types::REFUND_COMPLETED
            | event_types::WITHDRAWAL_APPROVED
            | event_types::WITHDRAWAL_REJECTED
            | event_types::WITHDRAWAL_COMPLETED
    )
}

#[async_trait::async_trait]
impl Subscriber for PushSubscriber {
    fn name(&self) -> &'static str {
        "push"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        if !wants_push(&event.event_type) {
            return Ok(());
        }
        let Some(user_id) = recipient(event) else {
            tracing::debug!(event_type = %event.event_type, "no recipient, skipping push");
            return Ok(());
        };
        let Some(key) = dedupe_key(event) else {
            tracing::debug!(event_type = %event.event_type, "no entity key, skipping push");
            return Ok(());
        };

        let fresh = self
            .notifications
            .record(
                user_id,
                &event.event_type,
                &key,
                "push",
                serde_json::Value::Object(event.data.clone()),
            )
            .await?;
        if !fresh {
            return Ok(());
        }

        self.queue.enqueue(Arc::new(PushJob {
            client: self.client.clone(),
            relay_url: self.relay_url.clone(),
            token: self.token.clone(),
            body: json!({
                "user_id": user_id,
                "event_type": event.event_type,
                "data": event.data,
            }),
            event_type: event.event_type.clone(),
        }));
        Ok(())
    }
}
