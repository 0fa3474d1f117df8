//! Domain event publishing

use async_trait::async_trait;
use std::sync::Mutex;
use thiserror::Error;

use crate::domain::events::DomainEvent;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to publish event: {0}")]
    Transport(String),
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError>;
}

/// Publishes JSON-encoded events to NATS under `<prefix>.<event subject>`.
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }

    pub async fn connect(url: &str, prefix: impl Into<String>) -> Result<Self, PublishError> {
        let client = async_nats::connect(url).await.map_err(|e| PublishError::Transport(e.to_string()))?;
        Ok(Self::new(client, prefix))
    }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_vec(event)?;
        let subject = format!("{}.{}", self.prefix, event.subject());
        self.client.publish(subject, payload.into()).await.map_err(|e| PublishError::Transport(e.to_string()))
    }
}

#[derive(Debug, Default)]
pub struct NoopPublisher;

#[async_trait]
impl EventPublisher for NoopPublisher {
    async fn publish(&self, _event: &DomainEvent) -> Result<(), PublishError> { Ok(()) }
}

/// Keeps every published event in memory.
#[derive(Debug, Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<DomainEvent>>,
}

impl RecordingPublisher {
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<(), PublishError> {
        self.events
            .lock()
            .map_err(|e| PublishError::Transport(e.to_string()))?
            .push(event.clone());
        Ok(())
    }
}
