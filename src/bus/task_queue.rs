use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

#[async_trait::async_trait]
pub trait Job: Send + Sync {
    fn describe(&self) -> String;

    async fn run(&self) -> anyhow::Result<()>;
}

struct QueuedJob {
    job: Arc<dyn Job>,
    attempt: u32,
}

/// In-process queue for slow side effects (email, push delivery) so webhook
/// handling stays within its response bound. Failed jobs are re-enqueued
/// with base * 2^attempt backoff, capped at five minutes, up to
/// max_attempts runs.
#[derive(Clone)]
pub struct TaskQueue {
    tx: mpsc::UnboundedSender<QueuedJob>,
    max_attempts: u32,
}

impl TaskQueue {
    pub fn start(max_attempts: u32, base_delay: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<QueuedJob>();
        let queue = Self {
            tx: tx.clone(),
            max_attempts,
        };

        tokio::spawn(async move {
            while let Some(queued) = rx.recv().await {
                let tx = tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = queued.job.run().await {
                        let attempt = queued.attempt + 1;
                        if attempt >= max_attempts {
                            tracing::error!(
                                job = %queued.job.describe(),
                                attempts = attempt,
                                "side-effect job dropped after retries: {err:#}"
                            );
                            return;
                        }

                        let backoff = backoff_delay(base_delay, queued.attempt);
                        tracing::warn!(
                            job = %queued.job.describe(),
                            attempt,
                            delay_ms = backoff.as_millis() as u64,
                            "side-effect job failed, retrying: {err:#}"
                        );
                        tokio::time::sleep(backoff).await;
                        let _ = tx.send(QueuedJob {
                            job: queued.job,
                            attempt,
                        });
                    }
                });
            }
        });

        queue
    }

    pub fn enqueue(&self, job: Arc<dyn Job>) {
        if self
            .tx
            .send(QueuedJob { job, attempt: 0 })
            .is_err()
        {
            tracing::error!("task queue worker is gone, job dropped");
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

fn backoff_delay(base: Duration, attempt: u32) -> Duration {
    let factor = 2u32.saturating_pow(attempt.min(16));
    let delay = base.saturating_mul(factor);
    delay.min(Duration::from_secs(300))
}
