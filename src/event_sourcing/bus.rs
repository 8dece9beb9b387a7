use std::sync::Arc;

use async_trait::async_trait;

use super::core::Event;

// ============================================================================
// Event Bus - Hand-off to the Read Side
// ============================================================================
//
// Consumers must be idempotent: replay re-publishes events that projections
// may already have seen, and nothing here deduplicates. Upsert by id.
//
// ============================================================================

#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, event: &Event) -> anyhow::Result<()>;
}

/// A read-model handler.
#[async_trait]
pub trait Projection: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this projection reacts to `event_type`.
    fn handles(&self, event_type: &str) -> bool;

    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// In-process bus fanning each event out to the interested projections.
///
/// The first failing projection fails the publish.
#[derive(Clone, Default)]
pub struct ProjectionBus {
    projections: Vec<Arc<dyn Projection>>,
}

impl ProjectionBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_projection(mut self, projection: Arc<dyn Projection>) -> Self {
        self.projections.push(projection);
        self
    }

    pub fn len(&self) -> usize {
        self.projections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.projections.is_empty()
    }
}

#[async_trait]
impl EventBus for ProjectionBus {
    async fn publish(&self, event: &Event) -> anyhow::Result<()> {
        for projection in &self.projections {
            if !projection.handles(event.event_type()) {
                continue;
            }
            projection.handle(event).await.map_err(|e| {
                tracing::error!(
                    projection = %projection.name(),
                    aggregate_id = %event.aggregate_id(),
                    event_type = %event.event_type(),
                    version = event.version(),
                    error = %e,
                    "Projection failed"
                );
                e.context(format!("projection {} failed", projection.name()))
            })?;
        }

        tracing::debug!(
            aggregate_id = %event.aggregate_id(),
            event_type = %event.event_type(),
            version = event.version(),
            "Published event"
        );
        Ok(())
    }
}
