//! One-to-one HTTP forwarder for record payloads.
//!
//! A sender has a fixed recipient URL and a single operation: POST the
//! payload with `Content-Type: application/binary`. Success is HTTP 200
//! exactly; any other status, including other 2xx codes, is a failure. The
//! sender does not retry; the consumer owns retry policy through its
//! drain/failure path.

pub mod breaker;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;
use thiserror::Error;

pub use breaker::{BreakerConfig, CircuitBreaker};

/// Errors from a send attempt.
#[derive(Debug, Error)]
pub enum SendError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("send transport: {0}")]
    Transport(#[from] reqwest::Error),

    /// The recipient answered with a status other than 200.
    #[error("invalid status code: {0}")]
    Status(u16),

    /// The circuit breaker is open; the call was not attempted.
    #[error("circuit open")]
    CircuitOpen,

    /// The recipient URL did not parse at construction.
    #[error("invalid recipient url: {0}")]
    Url(String),
}

/// Result type for send operations.
pub type Result<T> = std::result::Result<T, SendError>;

/// Capability the consumer is written against: forward one payload.
#[async_trait]
pub trait Sender: Send + Sync {
    async fn send(&self, body: Bytes) -> Result<()>;
}

/// Sender tuning.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    pub recipient_url: String,

    /// Dial timeout for new connections.
    pub connect_timeout: Duration,

    /// Overall per-request deadline.
    pub request_timeout: Duration,

    /// Circuit breaker, if enabled.
    pub breaker: Option<BreakerConfig>,
}

impl SenderConfig {
    pub fn new(recipient_url: impl Into<String>) -> Self {
        SenderConfig {
            recipient_url: recipient_url.into(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            breaker: None,
        }
    }

    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = Some(breaker);
        self
    }
}

/// HTTP implementation of [`Sender`].
#[derive(Clone, Debug)]
pub struct HttpSender {
    client: reqwest::Client,
    url: reqwest::Url,
    breaker: Option<Arc<Mutex<CircuitBreaker>>>,
}

impl HttpSender {
    pub fn new(config: SenderConfig) -> Result<Self> {
        let url = reqwest::Url::parse(&config.recipient_url)
            .map_err(|e| SendError::Url(e.to_string()))?;
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;
        Ok(HttpSender {
            client,
            url,
            breaker: config
                .breaker
                .map(|b| Arc::new(Mutex::new(CircuitBreaker::new(b)))),
        })
    }

    async fn post(&self, body: Bytes) -> Result<()> {
        let response = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/binary")
            .body(body)
            .send()
            .await?;

        if response.status() != StatusCode::OK {
            return Err(SendError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Sender for HttpSender {
    async fn send(&self, body: Bytes) -> Result<()> {
        if let Some(breaker) = &self.breaker
            && !breaker.lock().unwrap().allow()
        {
            return Err(SendError::CircuitOpen);
        }

        let outcome = self.post(body).await;

        if let Some(breaker) = &self.breaker {
            let mut breaker = breaker.lock().unwrap();
            match &outcome {
                Ok(()) => breaker.record_success(),
                Err(_) => breaker.record_failure(),
            }
        }

        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::Router;
    use std::net::SocketAddr;

    /// Serves a recipient answering a fixed status, returning its address.
    async fn recipient(status: AxumStatus) -> SocketAddr {
        let app = Router::new().route("/", post(move || async move { status }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    fn sender_for(addr: SocketAddr) -> HttpSender {
        HttpSender::new(SenderConfig::new(format!("http://{addr}/"))).unwrap()
    }

    #[tokio::test]
    async fn send_succeeds_on_200() {
        let addr = recipient(AxumStatus::OK).await;
        let sender = sender_for(addr);
        sender.send(Bytes::from_static(b"payload")).await.unwrap();
    }

    #[tokio::test]
    async fn send_fails_on_500() {
        let addr = recipient(AxumStatus::INTERNAL_SERVER_ERROR).await;
        let sender = sender_for(addr);
        let err = sender.send(Bytes::from_static(b"payload")).await.unwrap_err();
        assert!(matches!(err, SendError::Status(500)));
    }

    #[tokio::test]
    async fn non_200_success_statuses_are_failures() {
        let addr = recipient(AxumStatus::ACCEPTED).await;
        let sender = sender_for(addr);
        let err = sender.send(Bytes::from_static(b"payload")).await.unwrap_err();
        assert!(matches!(err, SendError::Status(202)));
    }

    #[tokio::test]
    async fn open_breaker_short_circuits() {
        let addr = recipient(AxumStatus::INTERNAL_SERVER_ERROR).await;
        let config = SenderConfig::new(format!("http://{addr}/")).with_breaker(BreakerConfig {
            failure_threshold: 2,
            cooldown: Duration::from_secs(60),
        });
        let sender = HttpSender::new(config).unwrap();

        for _ in 0..2 {
            let err = sender.send(Bytes::from_static(b"p")).await.unwrap_err();
            assert!(matches!(err, SendError::Status(500)));
        }

        // Circuit is now open; the call never reaches the recipient.
        let err = sender.send(Bytes::from_static(b"p")).await.unwrap_err();
        assert!(matches!(err, SendError::CircuitOpen));
    }

    #[test]
    fn invalid_url_fails_construction() {
        let err = HttpSender::new(SenderConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, SendError::Url(_)));
    }
}
