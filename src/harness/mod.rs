//! Load generator behind the `harness` subcommand.
//!
//! Synthesizes records with random bodies and enqueues them into the
//! configured queue at a fixed frequency, so an end-to-end deployment can
//! be smoke-tested without a real producer.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::queue::Queue;
use crate::types::{Receipt, Record, SourceId};

/// Generator tuning.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// How many records to enqueue; zero means until stopped.
    pub count: usize,

    /// Body size in bytes.
    pub body_size: usize,

    /// Pause between enqueues.
    pub frequency: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        HarnessConfig {
            count: 100,
            body_size: 256,
            frequency: Duration::from_millis(100),
        }
    }
}

/// A synthetic record with a random body.
fn generate(sequence: usize, body_size: usize) -> Record {
    let mut body = vec![0u8; body_size];
    rand::thread_rng().fill(&mut body[..]);
    Record::new(
        SourceId::new(format!("harness-{sequence}")),
        Receipt::new(format!("harness-receipt-{sequence}")),
        body,
    )
}

/// Enqueues synthetic records until the count is reached or the token is
/// cancelled. Returns how many records were enqueued.
pub async fn run(
    queue: Arc<dyn Queue>,
    config: HarnessConfig,
    stop: CancellationToken,
) -> usize {
    let mut enqueued = 0usize;
    let mut ticker = tokio::time::interval(config.frequency.max(Duration::from_millis(1)));

    info!(count = config.count, body_size = config.body_size, "harness started");
    loop {
        if config.count > 0 && enqueued >= config.count {
            break;
        }
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = ticker.tick() => {
                let record = generate(enqueued, config.body_size);
                match queue.enqueue(record).await {
                    Ok(()) => {
                        enqueued += 1;
                        if enqueued % 100 == 0 {
                            info!(enqueued, "harness progress");
                        }
                    }
                    Err(error) => warn!(%error, "harness enqueue failed"),
                }
            }
        }
    }
    info!(enqueued, "harness finished");
    enqueued
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::VirtualQueue;

    #[tokio::test]
    async fn enqueues_the_requested_count() {
        let queue = Arc::new(VirtualQueue::new());
        let config = HarnessConfig {
            count: 5,
            body_size: 16,
            frequency: Duration::from_millis(1),
        };

        let enqueued = run(queue.clone(), config, CancellationToken::new()).await;

        assert_eq!(enqueued, 5);
        assert_eq!(queue.depth(), 5);
        let batch = queue.dequeue().await.unwrap();
        assert_eq!(batch[0].body().len(), 16);
    }

    #[tokio::test]
    async fn cancellation_stops_an_unbounded_run() {
        let queue = Arc::new(VirtualQueue::new());
        let config = HarnessConfig {
            count: 0,
            body_size: 8,
            frequency: Duration::from_millis(1),
        };

        let stop = CancellationToken::new();
        let token = stop.clone();
        let handle = tokio::spawn(run(queue, config, token));

        tokio::time::sleep(Duration::from_millis(20)).await;
        stop.cancel();
        let enqueued = handle.await.unwrap();
        assert!(enqueued > 0);
    }
}
