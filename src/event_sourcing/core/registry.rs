use std::marker::PhantomData;
use std::sync::Arc;

use serde_json::Value;

use super::error::DecodeError;
use super::event::{decode_payload, DomainEvent, Event, EventKind, EventRecord, GenericEvent, TypedEvent};
use crate::metrics::Metrics;

// ============================================================================
// Event Type Registry
// ============================================================================
//
// One immutable registry per domain, built at startup and injected into the
// store that serves that domain. There is no global map.
//
// ============================================================================

/// Maps wire-level tags of one aggregate type to typed constructors.
pub trait EventTypeRegistry: Send + Sync {
    fn aggregate_type(&self) -> &'static str;

    fn known_event_types(&self) -> &'static [&'static str];

    /// Try to construct the typed event for `event_type`.
    ///
    /// `None` when the tag is not mapped; `Some(Err(_))` when the payload is malformed.
    fn construct(&self, event_type: &str, payload: &Value) -> Option<Result<TypedEvent, DecodeError>>;
}

/// Registry backed by a closed `DomainEvent` enum.
pub struct DomainRegistry<E> {
    _phantom: PhantomData<fn() -> E>,
}

impl<E: DomainEvent> DomainRegistry<E> {
    pub fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<E: DomainEvent> Default for DomainRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: DomainEvent + 'static> EventTypeRegistry for DomainRegistry<E> {
    fn aggregate_type(&self) -> &'static str {
        E::AGGREGATE_TYPE
    }

    fn known_event_types(&self) -> &'static [&'static str] {
        E::known_event_types()
    }

    fn construct(&self, event_type: &str, payload: &Value) -> Option<Result<TypedEvent, DecodeError>> {
        if !E::known_event_types().contains(&event_type) {
            return None;
        }
        Some(decode_payload::<E>(event_type, payload).map(TypedEvent::new))
    }
}

/// Registry that maps nothing; every record decodes to a fallback event.
///
/// Used by stores that serve several domains at once (admin replay).
pub struct EmptyRegistry;

impl EventTypeRegistry for EmptyRegistry {
    fn aggregate_type(&self) -> &'static str {
        "*"
    }

    fn known_event_types(&self) -> &'static [&'static str] {
        &[]
    }

    fn construct(&self, _event_type: &str, _payload: &Value) -> Option<Result<TypedEvent, DecodeError>> {
        None
    }
}

/// Several domain registries behind one lookup, dispatched on the record's
/// stored aggregate type.
pub struct CompositeRegistry {
    registries: Vec<Arc<dyn EventTypeRegistry>>,
}

impl CompositeRegistry {
    pub fn new(registries: Vec<Arc<dyn EventTypeRegistry>>) -> Self {
        Self { registries }
    }

    /// Registry for the stored aggregate type, else the first one that knows the tag.
    fn resolve(&self, aggregate_type: &str, event_type: &str) -> Option<&Arc<dyn EventTypeRegistry>> {
        self.registries
            .iter()
            .find(|registry| registry.aggregate_type() == aggregate_type)
            .or_else(|| {
                self.registries
                    .iter()
                    .find(|registry| registry.known_event_types().contains(&event_type))
            })
    }
}

// ============================================================================
// Event Decoder
// ============================================================================

/// Sole constructor of stored `Event` values.
///
/// Never fails: unknown tags and malformed payloads become `GenericEvent`
/// fallbacks that keep the original tag, id, payload and version.
#[derive(Clone)]
pub struct EventDecoder {
    registries: Arc<CompositeRegistry>,
    metrics: Option<Arc<Metrics>>,
}

impl EventDecoder {
    pub fn new(registry: Arc<dyn EventTypeRegistry>) -> Self {
        Self::composite(vec![registry])
    }

    pub fn composite(registries: Vec<Arc<dyn EventTypeRegistry>>) -> Self {
        Self {
            registries: Arc::new(CompositeRegistry::new(registries)),
            metrics: None,
        }
    }

    pub fn for_domain<E: DomainEvent + 'static>() -> Self {
        Self::new(Arc::new(DomainRegistry::<E>::new()))
    }

    /// Decoder that maps nothing.
    pub fn untyped() -> Self {
        Self::new(Arc::new(EmptyRegistry))
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn decode(&self, record: EventRecord) -> Event {
        let outcome = match self
            .registries
            .resolve(&record.aggregate_type, &record.event_type)
        {
            Some(registry) => registry.construct(&record.event_type, &record.event_data),
            None => None,
        };

        match outcome {
            Some(Ok(typed)) => Event::from_record(record, EventKind::Typed(typed)),
            Some(Err(err)) => {
                tracing::warn!(
                    aggregate_id = %record.aggregate_id,
                    aggregate_type = %record.aggregate_type,
                    event_type = %record.event_type,
                    version = record.version,
                    error = %err,
                    "Failed to construct event, using generic fallback"
                );
                self.fallback(record)
            }
            None => {
                tracing::warn!(
                    aggregate_id = %record.aggregate_id,
                    aggregate_type = %record.aggregate_type,
                    event_type = %record.event_type,
                    version = record.version,
                    "Unknown event type, using generic fallback"
                );
                self.fallback(record)
            }
        }
    }

    pub fn decode_all(&self, records: impl IntoIterator<Item = EventRecord>) -> Vec<Event> {
        records.into_iter().map(|record| self.decode(record)).collect()
    }

    fn fallback(&self, record: EventRecord) -> Event {
        if let Some(metrics) = &self.metrics {
            metrics
                .decode_fallbacks_total
                .with_label_values(&[record.aggregate_type.as_str()])
                .inc();
        }
        let generic = GenericEvent::new(record.event_type.clone());
        Event::from_record(record, EventKind::Generic(generic))
    }
}

// ============================================================================
// Tests
// ============================================================================
