use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::event::DomainEvent;

pub mod task_queue;

#[async_trait::async_trait]
pub trait Subscriber: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()>;
}

/// Process-wide publish/subscribe hub. Subscriptions happen once at startup;
/// publishes fan out to every subscriber of the event type. A failing
/// subscriber is logged and isolated: it never stops the others and never
/// reaches the publisher, whose database transaction has already committed.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<HashMap<String, Vec<Arc<dyn Subscriber>>>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, event_type: &str, subscriber: Arc<dyn Subscriber>) {
        let mut map = self.subscribers.write().expect("subscriber map poisoned");
        map.entry(event_type.to_string())
            .or_default()
            .push(subscriber);
    }

    pub async fn publish(&self, event: DomainEvent) {
        let subscribers = {
            let map = self.subscribers.read().expect("subscriber map poisoned");
            map.get(&event.event_type).cloned().unwrap_or_default()
        };

        if subscribers.is_empty() {
            tracing::debug!(event_type = %event.event_type, "no subscribers");
            return;
        }

        for subscriber in subscribers {
            if let Err(err) = subscriber.handle(&event).await {
                tracing::error!(
                    subscriber = subscriber.name(),
                    event_type = %event.event_type,
                    "subscriber failed: {err:#}"
                );
            }
        }
    }
}
