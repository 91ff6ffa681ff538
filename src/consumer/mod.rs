//! The per-worker consumer state machine.
//!
//! A consumer owns an in-flight FIFO, a dedup store, and handles to its
//! three collaborators (queue, HTTP sender, audit log). It runs a single
//! cooperative loop: a ticker fires every ~10 ms and advances one state
//! step, and a cancellation token triggers clean shutdown between steps.
//!
//! # States
//!
//! - **Gather**: pull batches from the source, drop fingerprinted
//!   redeliveries, and buffer the rest until the batch is big enough or old
//!   enough to flush. Dequeue errors force a flush of whatever is buffered.
//! - **Replicate**: drain the FIFO head-first through the HTTP sender,
//!   stopping at the first failure. Whatever was sent is committed even
//!   when the drain stopped early: partial success is never resent.
//! - **Commit** (the success sub-step): append the drained batch to the
//!   audit log under a bounded retrier, acknowledge it at the source, then
//!   fingerprint the committed source ids so imminent redeliveries are
//!   dropped in Gather. The source acknowledgement is the only fatal path.
//! - **Failure**: declare everything still in the FIFO failed so the
//!   source redelivers it after visibility expiry, then purge.
//!
//! All failures invalidate the remainder of the batch; retries happen by
//! source redelivery, never by an in-process retry loop.

pub mod retry;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::audit::AuditLog;
use crate::dedup::DedupStore;
use crate::fifo::{EvictReason, Fifo};
use crate::metrics::ConsumerMetrics;
use crate::queue::{Queue, QueueError};
use crate::sender::Sender;
use crate::types::{Record, RecordId, Transaction};

use retry::{retry, RetryConfig};

/// How often the state machine advances.
const STEP_INTERVAL: Duration = Duration::from_millis(10);

/// Consumer tuning.
#[derive(Debug, Clone)]
pub struct ConsumerConfig {
    /// Buffered records beyond which the batch is flushed.
    pub target_size: usize,

    /// Age of the oldest buffered record beyond which the batch is flushed.
    pub target_age: Duration,

    /// Pause after an empty dequeue before polling again.
    pub wait_time: Duration,

    /// Dedup store capacity; zero disables suppression.
    pub dedup_capacity: usize,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        ConsumerConfig {
            target_size: 10,
            target_age: Duration::from_secs(30),
            wait_time: Duration::from_millis(100),
            dedup_capacity: 512,
        }
    }
}

/// The state the machine is in between steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Gather,
    Replicate,
    Failure,
}

/// A single consumer. See the module docs for the state machine.
pub struct Consumer {
    queue: Arc<dyn Queue>,
    audit: Arc<dyn AuditLog>,
    sender: Arc<dyn Sender>,
    fifo: Fifo,
    dedup: DedupStore,
    config: ConsumerConfig,
    metrics: ConsumerMetrics,
    audit_retry: RetryConfig,
    gather_errors: u32,
    active_since: Option<Instant>,
}

impl Consumer {
    pub fn new(
        queue: Arc<dyn Queue>,
        audit: Arc<dyn AuditLog>,
        sender: Arc<dyn Sender>,
        config: ConsumerConfig,
        metrics: ConsumerMetrics,
    ) -> Self {
        let fifo = Fifo::new(Box::new(|reason, id, record| {
            if reason != EvictReason::Dequeued {
                warn!(?reason, %id, source_id = %record.source_id(), "record evicted");
            }
        }));
        Consumer {
            queue,
            audit,
            sender,
            fifo,
            dedup: DedupStore::new(config.dedup_capacity),
            config,
            metrics,
            audit_retry: RetryConfig::AUDIT,
            gather_errors: 0,
            active_since: None,
        }
    }

    /// Runs the state machine until the token is cancelled.
    ///
    /// Cancellation is cooperative: the running step completes, then the
    /// loop observes the token, declares anything still buffered failed,
    /// and purges the FIFO.
    #[instrument(skip(self, stop))]
    pub async fn run(mut self, stop: CancellationToken) {
        let mut step = tokio::time::interval(STEP_INTERVAL);
        step.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut state = State::Gather;

        info!("consumer started");
        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = step.tick() => {
                    state = self.step(state).await;
                }
            }
        }
        self.shutdown().await;
        info!("consumer stopped");
    }

    /// Advances the machine by one state step.
    async fn step(&mut self, state: State) -> State {
        match state {
            State::Gather => self.gather().await,
            State::Replicate => self.replicate().await,
            State::Failure => self.failure().await,
        }
    }

    async fn gather(&mut self) -> State {
        // Dequeue errors force a flush of whatever we hold; with nothing
        // held there is nothing to do but reset and try again.
        if self.gather_errors > 0 {
            if self.fifo.is_empty() {
                self.gather_errors = 0;
                return State::Gather;
            }
            return State::Replicate;
        }

        let too_big = self.fifo.len() > self.config.target_size;
        let too_old = self
            .active_since
            .is_some_and(|since| since.elapsed() > self.config.target_age);
        if too_big || too_old {
            debug!(too_big, too_old, buffered = self.fifo.len(), "flushing batch");
            return State::Replicate;
        }

        match self.queue.dequeue().await {
            Err(error) => {
                self.gather_errors += 1;
                warn!(%error, consecutive = self.gather_errors, "dequeue failed");
                State::Gather
            }
            Ok(records) if records.is_empty() => {
                tokio::time::sleep(self.config.wait_time).await;
                State::Gather
            }
            Ok(records) => {
                self.metrics.consumed_segments.inc();
                self.metrics.consumed_records.inc_by(records.len() as u64);

                let (suppressed, absent) = self.dedup.intersect(records);
                if !suppressed.is_empty() {
                    debug!(suppressed = suppressed.len(), "dropped redeliveries");
                }
                if !absent.is_empty() && self.active_since.is_none() {
                    self.active_since = Some(Instant::now());
                }
                for record in absent {
                    self.fifo.add(record.id(), record);
                }
                State::Gather
            }
        }
    }

    async fn replicate(&mut self) -> State {
        if self.fifo.is_empty() {
            return State::Gather;
        }

        let sender = self.sender.clone();
        let (drained, send_err) = self
            .fifo
            .drain(|_, record| {
                let sender = sender.clone();
                async move { sender.send(record.body().clone()).await }
            })
            .await;

        // Whatever was sent is committed even when the drain stopped early:
        // resending it would duplicate deliveries downstream.
        if let Err(error) = self.commit(&drained).await {
            warn!(%error, records = drained.len(), "committing drained batch");
            return State::Failure;
        }
        self.metrics.replicated_records.inc_by(drained.len() as u64);

        if self.fifo.is_empty() {
            self.active_since = None;
        }

        if let Some(error) = send_err {
            debug!(%error, sent = drained.len(), remaining = self.fifo.len(), "send failed mid-drain");
            return State::Failure;
        }

        self.metrics.replicated_segments.inc();
        State::Gather
    }

    /// The commit sub-step: audit (best-effort), acknowledge (fatal on
    /// error), then fingerprint the committed ids.
    async fn commit(&mut self, drained: &[(RecordId, Arc<Record>)]) -> Result<(), QueueError> {
        if drained.is_empty() {
            return Ok(());
        }

        let mut txn = Transaction::new();
        for (id, record) in drained {
            txn.push(*id, record.clone());
        }

        // The audit trail must never block source acknowledgement: bounded
        // retries, then swallow.
        let audit = self.audit.clone();
        let txn_ref = &txn;
        if let Err(error) = retry(self.audit_retry, move || {
            let audit = audit.clone();
            async move { audit.append(txn_ref).await }
        })
        .await
        {
            warn!(%error, records = txn.len(), "audit append exhausted retries");
        }

        let outcome = self.queue.commit(&txn).await?;
        if outcome.failure > 0 {
            warn!(failures = outcome.failure, "commit partially failed");
        }
        txn.flush();

        // Fingerprint after the acknowledgement: a crash between the two
        // costs one extra redelivery, never a lost acknowledgement.
        for (_, record) in drained {
            self.dedup.add(record.source_id().clone());
        }

        Ok(())
    }

    async fn failure(&mut self) -> State {
        let txn = self.transaction_of_fifo();
        if !txn.is_empty() {
            match self.queue.failed(&txn).await {
                Ok(outcome) => {
                    self.metrics.failed_segments.inc();
                    self.metrics.failed_records.inc_by(txn.len() as u64);
                    if outcome.failure > 0 {
                        warn!(failures = outcome.failure, "failure declaration partially failed");
                    }
                }
                Err(error) => warn!(%error, "declaring batch failed"),
            }
        }

        self.fifo.purge();
        self.active_since = None;
        State::Gather
    }

    /// Graceful shutdown: declare everything still buffered failed so the
    /// source redelivers at visibility expiry, then purge.
    async fn shutdown(&mut self) {
        let txn = self.transaction_of_fifo();
        if !txn.is_empty() {
            match self.queue.failed(&txn).await {
                Ok(_) => {
                    self.metrics.failed_segments.inc();
                    self.metrics.failed_records.inc_by(txn.len() as u64);
                }
                Err(error) => warn!(%error, "declaring records failed at shutdown"),
            }
        }
        self.fifo.purge();
        self.active_since = None;
    }

    fn transaction_of_fifo(&self) -> Transaction {
        let mut txn = Transaction::new();
        for (id, record) in self.fifo.slice() {
            txn.push(id, record);
        }
        txn
    }
}
