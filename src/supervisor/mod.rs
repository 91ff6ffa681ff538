//! Process supervision: build collaborators bottom-up, run N consumers and
//! the admin listener, stop everything in reverse order on a signal.
//!
//! Start order is adapters first (filesystem, queue, audit, sender), then
//! consumers, then the listener. [`Supervisor::stop`] unwinds that order:
//! the listener goes first, then each consumer, newest first, blocking on
//! each until its task has released everything it holds.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use prometheus::Registry;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::audit::{AuditConfig, AuditError, AuditKind, RemoteLogConfig};
use crate::consumer::{Consumer, ConsumerConfig};
use crate::fs::FilesystemKind;
use crate::metrics::{ConsumerMetrics, MetricsError};
use crate::queue::{QueueConfig, QueueError};
use crate::sender::{HttpSender, Sender, SenderConfig, SendError};
use crate::server::{build_router, AppState, Readiness};

/// Fatal startup failures; the process exits non-zero on any of these.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("queue setup: {0}")]
    Queue(#[from] QueueError),

    #[error("audit setup: {0}")]
    Audit(#[from] AuditError),

    #[error("sender setup: {0}")]
    Sender(#[from] SendError),

    #[error("metrics setup: {0}")]
    Metrics(#[from] MetricsError),

    #[error("listener setup: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything `ingest` needs to run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Listen address for the admin surface.
    pub api_addr: SocketAddr,

    /// How many consumers to run in parallel.
    pub num_consumers: usize,

    /// Queue variant and remote settings.
    pub queue: QueueConfig,

    /// Audit variant; the local variant writes under `auditlog_root`.
    pub audit_kind: AuditKind,
    pub audit_remote: Option<RemoteLogConfig>,
    pub auditlog_root: PathBuf,

    /// Filesystem backing for the local audit variant.
    pub filesystem: FilesystemKind,

    /// Recipient settings for the HTTP sender.
    pub sender: SenderConfig,

    /// Per-consumer state machine tuning.
    pub consumer: ConsumerConfig,

    /// Whether to register the counters into the served registry.
    pub metrics_registration: bool,
}

struct ConsumerHandle {
    index: usize,
    stop: CancellationToken,
    task: JoinHandle<()>,
}

struct ListenerHandle {
    stop: CancellationToken,
    task: JoinHandle<()>,
    addr: SocketAddr,
}

/// A running ingest process.
pub struct Supervisor {
    consumers: Vec<ConsumerHandle>,
    listener: ListenerHandle,
}

impl Supervisor {
    /// Builds every component and starts them bottom-up.
    pub async fn start(config: IngestConfig) -> Result<Self, SetupError> {
        let registry = Arc::new(Registry::new());
        let metrics = ConsumerMetrics::new()?;
        if config.metrics_registration {
            metrics.register(&registry)?;
        }

        // Adapters first.
        let fs = config.filesystem.build();
        let queue = config.queue.clone().build().await?;
        let sender: Arc<dyn Sender> = Arc::new(HttpSender::new(config.sender.clone())?);

        let readiness = Arc::new(Readiness::new(config.num_consumers));

        // Then the consumers, each with its own audit log and state.
        let mut consumers = Vec::with_capacity(config.num_consumers);
        for index in 0..config.num_consumers {
            let audit = AuditConfig {
                kind: config.audit_kind,
                local_root: Some(config.auditlog_root.join(format!("audit-{index:04}"))),
                remote: config.audit_remote.clone(),
            }
            .build(fs.clone())
            .await?;

            let consumer = Consumer::new(
                queue.clone(),
                audit,
                sender.clone(),
                config.consumer.clone(),
                metrics.clone(),
            );

            let stop = CancellationToken::new();
            let token = stop.clone();
            let flags = readiness.clone();
            let task = tokio::spawn(async move {
                flags.set_running(index, true);
                consumer.run(token).await;
                flags.set_running(index, false);
            });
            consumers.push(ConsumerHandle { index, stop, task });
        }

        // The listener last, so readiness only reports started consumers.
        let listener = tokio::net::TcpListener::bind(config.api_addr).await?;
        let addr = listener.local_addr()?;
        let router = build_router(AppState::new(readiness, registry));
        let stop = CancellationToken::new();
        let token = stop.clone();
        let task = tokio::spawn(async move {
            let shutdown = async move { token.cancelled().await };
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!(%error, "admin listener failed");
            }
        });

        info!(%addr, consumers = config.num_consumers, "ingest started");

        Ok(Supervisor {
            consumers,
            listener: ListenerHandle { stop, task, addr },
        })
    }

    /// Address the admin surface is actually bound to.
    pub fn api_addr(&self) -> SocketAddr {
        self.listener.addr
    }

    /// Stops every component in reverse start order, blocking on each.
    pub async fn stop(mut self) {
        self.listener.stop.cancel();
        if let Err(error) = self.listener.task.await {
            warn!(%error, "admin listener join failed");
        }

        while let Some(consumer) = self.consumers.pop() {
            consumer.stop.cancel();
            if let Err(error) = consumer.task.await {
                warn!(%error, index = consumer.index, "consumer join failed");
            }
            info!(index = consumer.index, "consumer stopped");
        }

        info!("ingest stopped");
    }
}

/// Runs `ingest` until a termination signal arrives.
pub async fn run(config: IngestConfig) -> Result<(), SetupError> {
    let supervisor = Supervisor::start(config).await?;
    tokio::signal::ctrl_c().await?;
    info!("termination signal received");
    supervisor.stop().await;
    Ok(())
}
