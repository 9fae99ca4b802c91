use std::sync::Arc;

use lettre::message::Mailbox;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use uuid::Uuid;

use crate::bus::task_queue::{Job, TaskQueue};
use crate::bus::Subscriber;
use crate::domain::event::{event_types, DomainEvent};
use crate::repo::notifications_repo::NotificationsRepo;

struct SendEmailJob {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    message: Message,
    subject: String,
}

#[async_trait::async_trait]
impl Job for SendEmailJob {
    fn describe(&self) -> String {
        format!("email: {}", self.subject)
    }

    async fn run(&self) -> anyhow::Result<()> {
        self.mailer.send(self.message.clone()).await?;
        Ok(())
    }
}

/// Mails the operations inbox when a withdrawal or refund payout needs
/// human attention. Delivery runs on the task queue; the dedupe record is
/// written first so replayed events never mail twice.
pub struct EmailSubscriber {
    pub mailer: AsyncSmtpTransport<Tokio1Executor>,
    pub from: Mailbox,
    pub ops: Mailbox,
    pub queue: TaskQueue,
    pub notifications: NotificationsRepo,
}

fn subject_for(event_type: &str) -> Option<&'static str> {
    match event_type {
        event_types::WITHDRAWAL_REQUESTED => Some("Withdrawal awaiting approval"),
        event_types::WITHDRAWAL_FAILED => Some("Withdrawal payout failed"),
        event_types::REFUND_FAILED => Some("Refund payout failed"),
        _ => None,
    }
}

fn entity_key(event: &DomainEvent) -> Option<(Uuid, String)> {
    for key in ["withdrawal_id", "refund_id", "order_id"] {
        if let Some(value) = event.str_field(key) {
            if let Ok(id) = value.parse::<Uuid>() {
                return Some((id, format!("{key}:{value}")));
            }
        }
    }
    None
}

#[async_trait::async_trait]
impl Subscriber for EmailSubscriber {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        let Some(subject) = subject_for(&event.event_type) else {
            return Ok(());
        };
        let Some((entity_id, dedupe_key)) = entity_key(event) else {
            tracing::debug!(event_type = %event.event_type, "no entity key, skipping email");
            return Ok(());
        };

        let fresh = self
            .notifications
            .record(
                entity_id,
                &event.event_type,
                &dedupe_key,
                "email",
                serde_json::Value::Object(event.data.clone()),
            )
            .await?;
        if !fresh {
            return Ok(());
        }

        let body = format!(
            "{subject}\n\nevent: {}\n{}\n",
            event.event_type,
            serde_json::to_string_pretty(&event.data)?
        );
        let message = Message::builder()
            .from(self.from.clone())
            .to(self.ops.clone())
            .subject(subject)
            .body(body)?;

        self.queue.enqueue(Arc::new(SendEmailJob {
            mailer: self.mailer.clone(),
            message,
            subject: subject.to_string(),
        }));
        Ok(())
    }
}
