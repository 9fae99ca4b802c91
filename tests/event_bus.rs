use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deskpay::bus::task_queue::{Job, TaskQueue};
use deskpay::bus::{EventBus, Subscriber};
use deskpay::domain::event::DomainEvent;
use serde_json::json;

struct Recorder {
    name: &'static str,
    seen: Mutex<Vec<String>>,
}

#[async_trait::async_trait]
impl Subscriber for Recorder {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, event: &DomainEvent) -> anyhow::Result<()> {
        self.seen.lock().unwrap().push(event.event_type.clone());
        Ok(())
    }
}

struct AlwaysFails;

#[async_trait::async_trait]
impl Subscriber for AlwaysFails {
    fn name(&self) -> &'static str {
        "always_fails"
    }

    async fn handle(&self, _event: &DomainEvent) -> anyhow::Result<()> {
        anyhow::bail!("boom")
    }
}

#[tokio::test]
async fn publish_fans_out_to_every_subscriber() {
    let bus = EventBus::new();
    let first = Arc::new(Recorder {
        name: "first",
        seen: Mutex::new(Vec::new()),
    });
    let second = Arc::new(Recorder {
        name: "second",
        seen: Mutex::new(Vec::new()),
    });
    bus.subscribe("order.paid", first.clone());
    bus.subscribe("order.paid", second.clone());

    bus.publish(DomainEvent::new("order.paid", "test", json!({"order_id": "x"})))
        .await;

    assert_eq!(first.seen.lock().unwrap().as_slice(), ["order.paid"]);
    assert_eq!(second.seen.lock().unwrap().as_slice(), ["order.paid"]);
}

#[tokio::test]
async fn subscribers_only_see_their_event_type() {
    let bus = EventBus::new();
    let recorder = Arc::new(Recorder {
        name: "orders_only",
        seen: Mutex::new(Vec::new()),
    });
    bus.subscribe("order.paid", recorder.clone());

    bus.publish(DomainEvent::new("refund.completed", "test", json!({})))
        .await;
    bus.publish(DomainEvent::new("order.paid", "test", json!({})))
        .await;

    assert_eq!(recorder.seen.lock().unwrap().as_slice(), ["order.paid"]);
}

#[tokio::test]
async fn failing_subscriber_does_not_block_the_rest() {
    let bus = EventBus::new();
    let survivor = Arc::new(Recorder {
        name: "survivor",
        seen: Mutex::new(Vec::new()),
    });
    bus.subscribe("withdrawal.failed", Arc::new(AlwaysFails));
    bus.subscribe("withdrawal.failed", survivor.clone());

    bus.publish(DomainEvent::new("withdrawal.failed", "test", json!({})))
        .await;

    assert_eq!(survivor.seen.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn publish_with_no_subscribers_is_a_noop() {
    let bus = EventBus::new();
    bus.publish(DomainEvent::new("order.paid", "test", json!({})))
        .await;
}

struct FlakyJob {
    runs: AtomicU32,
    fail_first: u32,
}

#[async_trait::async_trait]
impl Job for FlakyJob {
    fn describe(&self) -> String {
        "flaky".to_string()
    }

    async fn run(&self) -> anyhow::Result<()> {
        let run = self.runs.fetch_add(1, Ordering::SeqCst);
        if run < self.fail_first {
            anyhow::bail!("transient failure {run}");
        }
        Ok(())
    }
}

#[tokio::test]
async fn task_queue_retries_until_success() {
    let queue = TaskQueue::start(5, Duration::from_millis(5));
    let job = Arc::new(FlakyJob {
        runs: AtomicU32::new(0),
        fail_first: 2,
    });
    queue.enqueue(job.clone());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(job.runs.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn task_queue_drops_after_max_attempts() {
    let queue = TaskQueue::start(2, Duration::from_millis(5));
    let job = Arc::new(FlakyJob {
        runs: AtomicU32::new(0),
        fail_first: u32::MAX,
    });
    queue.enqueue(job.clone());

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(job.runs.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn domain_event_exposes_string_fields() {
    let event = DomainEvent::new(
        "order.paid",
        "payment_flow",
        json!({"order_id": "abc", "total": "120.00"}),
    );
    assert_eq!(event.str_field("order_id"), Some("abc"));
    assert_eq!(event.str_field("missing"), None);
    assert_eq!(event.source_module, "payment_flow");
}
