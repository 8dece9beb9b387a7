use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use rdkafka::{
    config::ClientConfig,
    producer::{FutureProducer, FutureRecord},
};

use crate::event_sourcing::{serialize_event, Event, EventBus};
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

/// Publishes events as JSON envelopes to a Kafka-compatible topic,
/// keyed by aggregate id so each stream stays ordered within a partition.
pub struct RedpandaEventBus {
    producer: FutureProducer,
    topic: String,
    circuit_breaker: CircuitBreaker,
}

impl RedpandaEventBus {
    pub fn new(brokers: &str, topic: &str) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()?;

        Ok(Self {
            producer,
            topic: topic.to_string(),
            circuit_breaker: CircuitBreaker::new("redpanda", CircuitBreakerConfig::default()),
        })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.circuit_breaker = self.circuit_breaker.with_metrics(metrics);
        self
    }
}

/// Wire message for one event: the persisted envelope as JSON.
pub fn message_for(event: &Event) -> Result<(String, String)> {
    Ok((event.aggregate_id().to_string(), serialize_event(event)?))
}

#[async_trait]
impl EventBus for RedpandaEventBus {
    async fn publish(&self, event: &Event) -> Result<()> {
        let (key, payload) = message_for(event)?;

        let result = self
            .circuit_breaker
            .call(async {
                let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

                self.producer
                    .send(record, Duration::from_secs(5))
                    .await
                    .map_err(|(e, _)| anyhow::anyhow!("Kafka send error: {}", e))?;

                Ok::<(), anyhow::Error>(())
            })
            .await;

        match result {
            Ok(()) => {
                tracing::debug!(
                    topic = %self.topic,
                    key = %key,
                    event_type = %event.event_type(),
                    version = event.version(),
                    "Published to Redpanda"
                );
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen) => {
                tracing::error!(topic = %self.topic, "Circuit breaker open - Redpanda unavailable");
                Err(anyhow::anyhow!("Circuit breaker open for Redpanda"))
            }
            Err(CircuitBreakerError::OperationFailed(e)) => {
                tracing::error!(
                    error = %e,
                    topic = %self.topic,
                    "Failed to publish to Redpanda"
                );
                Err(e)
            }
        }
    }
}
