//! Firehose binding for the audit trail.
//!
//! All records in a transaction go out in a single batched publish.
//! Durability is the publish call returning; per-entry failures inside the
//! batch are counted and logged, never raised, because the audit trail is
//! best-effort by contract.

use std::sync::Mutex;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_firehose::primitives::Blob;
use aws_sdk_firehose::types::Record as StreamRecord;
use tracing::warn;

use crate::types::Transaction;

use super::{row, AuditError, AuditLog, ObservedIds, Result};

/// How many recently appended ids the log keeps for observation.
const OBSERVED_CAPACITY: usize = 1000;

/// Configuration for the Firehose-backed audit log.
#[derive(Debug, Clone)]
pub struct RemoteLogConfig {
    /// Use the ambient provider chain instead of static credentials.
    pub ambient_credentials: bool,
    pub id: String,
    pub secret: String,
    pub token: String,
    pub region: String,
    /// Delivery stream receiving the audit entries.
    pub stream: String,
}

/// Firehose-backed [`AuditLog`].
pub struct RemoteLog {
    client: aws_sdk_firehose::Client,
    stream: String,
    observed: Mutex<ObservedIds>,
}

impl RemoteLog {
    pub async fn connect(config: RemoteLogConfig) -> Result<Self> {
        let mut loader = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));
        if !config.ambient_credentials {
            if config.id.is_empty() || config.secret.is_empty() {
                return Err(AuditError::Credentials(
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

        Ok(RemoteLog {
            client: aws_sdk_firehose::Client::new(&sdk_config),
            stream: config.stream,
            observed: Mutex::new(ObservedIds::new(OBSERVED_CAPACITY)),
        })
    }
}

#[async_trait]
impl AuditLog for RemoteLog {
    async fn append(&self, txn: &Transaction) -> Result<()> {
        if txn.is_empty() {
            return Ok(());
        }

        let mut entries = Vec::with_capacity(txn.len());
        for (_, record) in txn.iter() {
            let entry = StreamRecord::builder()
                .data(Blob::new(row(record)))
                .build()
                .map_err(|e| AuditError::Transport(e.to_string()))?;
            entries.push(entry);
        }

        let output = self
            .client
            .put_record_batch()
            .delivery_stream_name(&self.stream)
            .set_records(Some(entries))
            .send()
            .await
            .map_err(|e| AuditError::Transport(e.to_string()))?;

        let failed = output.failed_put_count();
        if failed > 0 {
            warn!(failed, stream = %self.stream, "audit batch partially failed");
        }

        let mut observed = self.observed.lock().unwrap();
        for (id, _) in txn.iter() {
            observed.observe(id);
        }

        Ok(())
    }
}
