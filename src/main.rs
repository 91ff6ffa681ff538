//! Courier: main entry point.
//!
//! Two subcommands: `ingest` runs the consumers against the configured
//! source, and `harness` generates synthetic load into the same source.
//! Every flag carries an environment overlay named by upper-casing the flag
//! and replacing dots with underscores (`--aws.sqs.queue` ⇔ `AWS_SQS_QUEUE`).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use courier::audit::{AuditKind, RemoteLogConfig};
use courier::consumer::ConsumerConfig;
use courier::fs::FilesystemKind;
use courier::harness::{self, HarnessConfig};
use courier::queue::{QueueConfig, QueueKind, RemoteQueueConfig};
use courier::sender::{BreakerConfig, SenderConfig};
use courier::supervisor::{self, IngestConfig};

fn parse_duration(s: &str) -> Result<Duration, humantime::DurationError> {
    humantime::parse_duration(s)
}

#[derive(Parser, Debug)]
#[command(name = "courier", version, about = "Message-ingest pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the consumers.
    Ingest(IngestArgs),

    /// Generate synthetic load into the source queue.
    Harness(HarnessArgs),
}

/// Source-queue flags shared by both subcommands.
#[derive(Args, Debug)]
struct QueueArgs {
    /// Type of queue to use (remote, virtual, nop).
    #[arg(long = "queue", env = "QUEUE", default_value = "remote")]
    queue: QueueKind,

    /// Use ambient AWS credentials (environment or instance role).
    #[arg(long = "aws.ec2.role", env = "AWS_EC2_ROLE", default_value_t = true, action = clap::ArgAction::Set)]
    aws_ec2_role: bool,

    #[arg(long = "aws.id", env = "AWS_ID", default_value = "")]
    aws_id: String,

    #[arg(long = "aws.secret", env = "AWS_SECRET", default_value = "")]
    aws_secret: String,

    #[arg(long = "aws.token", env = "AWS_TOKEN", default_value = "")]
    aws_token: String,

    #[arg(long = "aws.region", env = "AWS_REGION", default_value = "eu-west-1")]
    aws_region: String,

    /// Source queue name.
    #[arg(long = "aws.sqs.queue", env = "AWS_SQS_QUEUE", default_value = "")]
    aws_sqs_queue: String,

    /// Max number of messages to dequeue at once.
    #[arg(long = "max.messages", env = "MAX_MESSAGES", default_value_t = 5)]
    max_messages: usize,

    /// How long each dequeued message stays invisible to other consumers.
    #[arg(long = "visibility.timeout", env = "VISIBILITY_TIMEOUT", default_value = "1s", value_parser = parse_duration)]
    visibility_timeout: Duration,

    /// Long-poll wait passed to the source on dequeue.
    #[arg(long = "queue.wait.time", env = "QUEUE_WAIT_TIME", default_value = "1s", value_parser = parse_duration)]
    queue_wait_time: Duration,
}

impl QueueArgs {
    fn to_config(&self) -> QueueConfig {
        QueueConfig {
            kind: self.queue,
            remote: Some(RemoteQueueConfig {
                ambient_credentials: self.aws_ec2_role,
                id: self.aws_id.clone(),
                secret: self.aws_secret.clone(),
                token: self.aws_token.clone(),
                region: self.aws_region.clone(),
                queue: self.aws_sqs_queue.clone(),
                max_number_of_messages: self.max_messages,
                visibility_timeout: self.visibility_timeout,
                wait_time: self.queue_wait_time,
            }),
        }
    }
}

#[derive(Args, Debug)]
struct IngestArgs {
    /// Verbose logging.
    #[arg(long = "debug", env = "DEBUG", action = clap::ArgAction::SetTrue)]
    debug: bool,

    /// Listen address for the admin surface.
    #[arg(long = "api", env = "API", default_value = "0.0.0.0:7650")]
    api: SocketAddr,

    #[command(flatten)]
    queue: QueueArgs,

    /// Type of audit log to use (remote, local, nop).
    #[arg(long = "auditlog", env = "AUDITLOG", default_value = "nop")]
    auditlog: AuditKind,

    /// Root directory for the local audit variant.
    #[arg(long = "auditlog.path", env = "AUDITLOG_PATH", default_value = "bin")]
    auditlog_path: PathBuf,

    /// Type of filesystem backing the local audit variant
    /// (local, virtual, nop).
    #[arg(long = "filesystem", env = "FILESYSTEM", default_value = "nop")]
    filesystem: FilesystemKind,

    /// Audit delivery stream name.
    #[arg(long = "aws.firehose.stream", env = "AWS_FIREHOSE_STREAM", default_value = "")]
    aws_firehose_stream: String,

    /// URL to hit with each record payload.
    #[arg(long = "recipient.url", env = "RECIPIENT_URL", default_value = "")]
    recipient_url: String,

    /// Amount of consumers to run at once.
    #[arg(long = "num.consumers", env = "NUM_CONSUMERS", default_value_t = 2)]
    num_consumers: usize,

    /// Target batch size before forwarding.
    #[arg(long = "target.batch.size", env = "TARGET_BATCH_SIZE", default_value_t = 10)]
    target_batch_size: usize,

    /// Target batch age before forwarding.
    #[arg(long = "target.batch.age", env = "TARGET_BATCH_AGE", default_value = "30s", value_parser = parse_duration)]
    target_batch_age: Duration,

    /// Pause after an empty dequeue before polling again.
    #[arg(long = "gather.wait.time", env = "GATHER_WAIT_TIME", default_value = "100ms", value_parser = parse_duration)]
    gather_wait_time: Duration,

    /// Dedup store capacity; zero disables redelivery suppression.
    #[arg(long = "dedup.capacity", env = "DEDUP_CAPACITY", default_value_t = 512)]
    dedup_capacity: usize,

    /// Enable the circuit breaker around the HTTP sender.
    #[arg(long = "breaker", env = "BREAKER", default_value_t = true, action = clap::ArgAction::Set)]
    breaker: bool,

    /// Consecutive send failures that open the circuit.
    #[arg(long = "breaker.threshold", env = "BREAKER_THRESHOLD", default_value_t = 10)]
    breaker_threshold: u32,

    /// How long the circuit stays open.
    #[arg(long = "breaker.cooldown", env = "BREAKER_COOLDOWN", default_value = "1m", value_parser = parse_duration)]
    breaker_cooldown: Duration,

    /// Registration of metrics on launch.
    #[arg(long = "metrics.registration", env = "METRICS_REGISTRATION", default_value_t = true, action = clap::ArgAction::Set)]
    metrics_registration: bool,
}

impl IngestArgs {
    fn to_config(&self) -> IngestConfig {
        let mut sender = SenderConfig::new(self.recipient_url.clone());
        if self.breaker {
            sender = sender.with_breaker(BreakerConfig {
                failure_threshold: self.breaker_threshold,
                cooldown: self.breaker_cooldown,
            });
        }

        IngestConfig {
            api_addr: self.api,
            num_consumers: self.num_consumers,
            queue: self.queue.to_config(),
            audit_kind: self.auditlog,
            audit_remote: Some(RemoteLogConfig {
                ambient_credentials: self.queue.aws_ec2_role,
                id: self.queue.aws_id.clone(),
                secret: self.queue.aws_secret.clone(),
                token: self.queue.aws_token.clone(),
                region: self.queue.aws_region.clone(),
                stream: self.aws_firehose_stream.clone(),
            }),
            auditlog_root: self.auditlog_path.clone(),
            filesystem: self.filesystem,
            sender,
            consumer: ConsumerConfig {
                target_size: self.target_batch_size,
                target_age: self.target_batch_age,
                wait_time: self.gather_wait_time,
                dedup_capacity: self.dedup_capacity,
            },
            metrics_registration: self.metrics_registration,
        }
    }
}

#[derive(Args, Debug)]
struct HarnessArgs {
    /// Verbose logging.
    #[arg(long = "debug", env = "DEBUG", action = clap::ArgAction::SetTrue)]
    debug: bool,

    #[command(flatten)]
    queue: QueueArgs,

    /// How many records to enqueue; zero means until interrupted.
    #[arg(long = "count", env = "COUNT", default_value_t = 100)]
    count: usize,

    /// Body size in bytes.
    #[arg(long = "body.size", env = "BODY_SIZE", default_value_t = 256)]
    body_size: usize,

    /// Pause between enqueues.
    #[arg(long = "frequency", env = "FREQUENCY", default_value = "100ms", value_parser = parse_duration)]
    frequency: Duration,
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "courier=debug" } else { "courier=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

async fn run_harness(args: HarnessArgs) -> Result<(), String> {
    let queue = args
        .queue
        .to_config()
        .build()
        .await
        .map_err(|e| e.to_string())?;

    let stop = CancellationToken::new();
    let token = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    });

    harness::run(
        queue,
        HarnessConfig {
            count: args.count,
            body_size: args.body_size,
            frequency: args.frequency,
        },
        stop,
    )
    .await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Command::Ingest(args) => {
            init_tracing(args.debug);
            let config = args.to_config();
            if let Err(error) = supervisor::run(config).await {
                tracing::error!(%error, "ingest failed");
                return ExitCode::FAILURE;
            }
        }
        Command::Harness(args) => {
            init_tracing(args.debug);
            if let Err(error) = run_harness(args).await {
                tracing::error!(%error, "harness failed");
                return ExitCode::FAILURE;
            }
        }
    }

    ExitCode::SUCCESS
}
