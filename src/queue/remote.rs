//! SQS binding for the source queue.
//!
//! Construction resolves the queue URL from the configured queue name, so a
//! bad region, bad credentials, or an unknown queue fail before any consumer
//! starts. Dequeue long-polls and then batch-extends the visibility of
//! everything returned; extension failures are logged only, since the worst
//! case is an early redelivery the dedup store absorbs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_sqs::types::{
    ChangeMessageVisibilityBatchRequestEntry, DeleteMessageBatchRequestEntry,
};
use tracing::{debug, warn};

use crate::types::{Receipt, Record, SourceId, Transaction};

use super::{visibility_seconds, BatchOutcome, Queue, QueueError, Result};

/// The SQS batch-API entry limit.
const MAX_BATCH_ENTRIES: usize = 10;

/// Configuration for the SQS-backed queue.
#[derive(Debug, Clone)]
pub struct RemoteQueueConfig {
    /// Use the ambient provider chain (environment, instance role) instead
    /// of static credentials.
    pub ambient_credentials: bool,
    pub id: String,
    pub secret: String,
    pub token: String,
    pub region: String,
    /// Queue name, resolved to a URL at construction.
    pub queue: String,
    /// Upper bound per dequeue; the source caps this at 10.
    pub max_number_of_messages: usize,
    /// How long each dequeued record stays invisible to other consumers.
    pub visibility_timeout: Duration,
    /// Long-poll wait passed to the source.
    pub wait_time: Duration,
}

/// SQS-backed [`Queue`].
pub struct RemoteQueue {
    client: aws_sdk_sqs::Client,
    queue_url: String,
    max_number_of_messages: i32,
    visibility_timeout: Option<i32>,
    wait_time_seconds: i32,
}

impl RemoteQueue {
    /// Connects to the source, validating credentials and resolving the
    /// queue URL.
    pub async fn connect(config: RemoteQueueConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.ambient_credentials {
            if config.id.is_empty() || config.secret.is_empty() {
                return Err(QueueError::Credentials(
                    "static credentials selected but id/secret are empty".to_string(),
                ));
            }
            let token = (!config.token.is_empty()).then(|| config.token.clone());
            loader = loader.credentials_provider(Credentials::new(
                config.id.clone(),
                config.secret.clone(),
                token,
                None,
                "static",
            ));
        }
        let sdk_config = loader.load().await;
        let client = aws_sdk_sqs::Client::new(&sdk_config);

        let resolved = client
            .get_queue_url()
            .queue_name(&config.queue)
            .send()
            .await
            .map_err(|e| QueueError::Resolve {
                name: config.queue.clone(),
                reason: e.to_string(),
            })?;
        let queue_url = resolved.queue_url().ok_or_else(|| QueueError::Resolve {
            name: config.queue.clone(),
            reason: "empty queue url in response".to_string(),
        })?;

        debug!(queue = %config.queue, "resolved source queue");

        Ok(RemoteQueue {
            client,
            queue_url: queue_url.to_string(),
            max_number_of_messages: config
                .max_number_of_messages
                .clamp(1, MAX_BATCH_ENTRIES) as i32,
            visibility_timeout: visibility_seconds(config.visibility_timeout),
            wait_time_seconds: config.wait_time.as_secs().min(20) as i32,
        })
    }

    /// Best-effort batched visibility extension for a dequeued batch.
    async fn extend_visibility(&self, records: &[Arc<Record>]) {
        let Some(timeout) = self.visibility_timeout else {
            return;
        };
        if records.is_empty() {
            return;
        }

        let mut entries = Vec::with_capacity(records.len());
        for record in records {
            match ChangeMessageVisibilityBatchRequestEntry::builder()
                .id(record.id().to_string())
                .receipt_handle(record.receipt().expose())
                .visibility_timeout(timeout)
                .build()
            {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(error = %e, "skipping visibility entry"),
            }
        }

        match self
            .client
            .change_message_visibility_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
        {
            Ok(output) => {
                let failed = output.failed().len();
                if failed > 0 {
                    warn!(failed, "visibility extension partially failed");
                }
            }
            Err(e) => warn!(error = %e, "visibility extension failed"),
        }
    }

    /// Acknowledges a chunk of at most [`MAX_BATCH_ENTRIES`] receipts.
    async fn delete_chunk(&self, chunk: &[(String, Receipt)]) -> Result<BatchOutcome> {
        let mut entries = Vec::with_capacity(chunk.len());
        for (id, receipt) in chunk {
            let entry = DeleteMessageBatchRequestEntry::builder()
                .id(id)
                .receipt_handle(receipt.expose())
                .build()
                .map_err(|e| QueueError::Entry(e.to_string()))?;
            entries.push(entry);
        }

        let output = self
            .client
            .delete_message_batch()
            .queue_url(&self.queue_url)
            .set_entries(Some(entries))
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        Ok(BatchOutcome {
            success: output.successful().len(),
            failure: output.failed().len(),
        })
    }
}

#[async_trait]
impl Queue for RemoteQueue {
    async fn enqueue(&self, record: Record) -> Result<()> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(String::from_utf8_lossy(record.body()).into_owned())
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;
        Ok(())
    }

    async fn dequeue(&self) -> Result<Vec<Arc<Record>>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(self.max_number_of_messages)
            .wait_time_seconds(self.wait_time_seconds)
            .send()
            .await
            .map_err(|e| QueueError::Transport(e.to_string()))?;

        // Collapse duplicate source ids within the batch; cross-batch
        // duplicates are the dedup store's job.
        let mut seen = std::collections::HashSet::new();
        let mut records = Vec::new();
        for message in output.messages() {
            let (Some(message_id), Some(receipt), Some(body)) = (
                message.message_id(),
                message.receipt_handle(),
                message.body(),
            ) else {
                warn!("dropping malformed message from receive batch");
                continue;
            };
            if !seen.insert(message_id.to_string()) {
                continue;
            }
            records.push(
                Record::new(
                    SourceId::new(message_id),
                    Receipt::new(receipt),
                    body.as_bytes().to_vec(),
                )
                .shared(),
            );
        }

        self.extend_visibility(&records).await;

        Ok(records)
    }

    async fn commit(&self, txn: &Transaction) -> Result<BatchOutcome> {
        let receipts: Vec<(String, Receipt)> = txn
            .iter()
            .map(|(id, rec)| (id.to_string(), rec.receipt().clone()))
            .collect();

        let mut outcome = BatchOutcome::default();
        for chunk in receipts.chunks(MAX_BATCH_ENTRIES) {
            outcome = outcome.merge(self.delete_chunk(chunk).await?);
        }
        Ok(outcome)
    }

    async fn failed(&self, txn: &Transaction) -> Result<BatchOutcome> {
        // Deliberately acknowledges nothing: the source redelivers each
        // record once its visibility lapses.
        Ok(BatchOutcome {
            success: txn.len(),
            failure: 0,
        })
    }
}
