use std::any::Any;
use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};
use chrono::{DateTime, Utc};
use anyhow::Result;

use super::error::{DecodeError, EventError};

// ============================================================================
// Event Record - Persisted Envelope
// ============================================================================
//
// One record per event in the append-only log. The stored aggregate_type is
// authoritative: decoding never recomputes it.
//
// ============================================================================

/// Wire/storage shape of a single event.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub event_type: String,
    pub aggregate_id: String,
    pub aggregate_type: String,
    pub event_data: Value,
    pub occurred_on: DateTime<Utc>,
    pub version: i64,
}

// ============================================================================
// Domain Event Trait
// ============================================================================

/// Field names used by the adjacently tagged domain event enums.
pub const EVENT_TYPE_FIELD: &str = "event_type";
pub const PAYLOAD_FIELD: &str = "payload";

/// Closed set of events for one aggregate type.
///
/// Implementors are enums tagged with `#[serde(tag = "event_type", content = "payload")]`,
/// so the variant tag is the wire-level `eventType` and the content is the payload.
pub trait DomainEvent: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Logical aggregate category ("User", "Family", "Task").
    const AGGREGATE_TYPE: &'static str;

    /// Tag of the event that starts every stream of this aggregate type.
    const CREATED_EVENT_TYPE: &'static str;

    /// Every tag this enum can decode.
    fn known_event_types() -> &'static [&'static str];

    /// Tag of this particular event.
    fn event_type(&self) -> &'static str;
}

/// Decode a `(tag, payload)` pair into the domain's event enum.
pub fn decode_payload<E: DomainEvent>(event_type: &str, payload: &Value) -> Result<E, DecodeError> {
    if !E::known_event_types().contains(&event_type) {
        return Err(DecodeError::UnknownEventType {
            aggregate_type: E::AGGREGATE_TYPE.to_string(),
            event_type: event_type.to_string(),
        });
    }

    let mut tagged = Map::new();
    tagged.insert(EVENT_TYPE_FIELD.to_string(), Value::String(event_type.to_string()));
    tagged.insert(PAYLOAD_FIELD.to_string(), payload.clone());

    serde_json::from_value(Value::Object(tagged)).map_err(|source| DecodeError::MalformedPayload {
        event_type: event_type.to_string(),
        source,
    })
}

/// Split a typed event into its payload object.
pub fn encode_payload<E: DomainEvent>(event: &E) -> Result<Value, serde_json::Error> {
    match serde_json::to_value(event)? {
        Value::Object(mut tagged) => Ok(tagged
            .remove(PAYLOAD_FIELD)
            .unwrap_or_else(|| Value::Object(Map::new()))),
        other => Ok(other),
    }
}

// ============================================================================
// Event - Immutable Decoded Value
// ============================================================================

/// Type name reported by events the registry could not map.
pub const GENERIC_EVENT_TYPE: &str = "GenericEvent";

/// Fallback representation for unmapped or malformed records.
#[derive(Clone, Debug, PartialEq)]
pub struct GenericEvent {
    original_event_type: String,
}

impl GenericEvent {
    pub fn new(original_event_type: impl Into<String>) -> Self {
        Self {
            original_event_type: original_event_type.into(),
        }
    }

    pub fn original_event_type(&self) -> &str {
        &self.original_event_type
    }
}

/// Typed domain event built when the event was constructed.
#[derive(Clone)]
pub struct TypedEvent(Arc<dyn Any + Send + Sync>);

impl TypedEvent {
    pub fn new<E: DomainEvent>(event: E) -> Self {
        Self(Arc::new(event))
    }

    pub fn downcast<E: DomainEvent>(&self) -> Option<&E> {
        self.0.downcast_ref::<E>()
    }
}

impl fmt::Debug for TypedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("TypedEvent")
    }
}

/// Equality of events is decided by tag and payload.
impl PartialEq for TypedEvent {
    fn eq(&self, _other: &Self) -> bool {
        true
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum EventKind {
    /// Tag recognised by the domain registry and payload decoded cleanly.
    Typed(TypedEvent),
    /// Decoder fallback; keeps the original tag.
    Generic(GenericEvent),
}

/// An immutable fact about one aggregate, at one version.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    event_type: String,
    aggregate_id: String,
    aggregate_type: String,
    payload: Value,
    occurred_on: DateTime<Utc>,
    version: i64,
    kind: EventKind,
}

impl Event {
    /// Build a fresh event from a typed domain event. `occurred_on` is now.
    pub fn new<E: DomainEvent>(
        aggregate_id: impl Into<String>,
        event: &E,
        version: i64,
    ) -> Result<Self, EventError> {
        Ok(Self {
            event_type: event.event_type().to_string(),
            aggregate_id: aggregate_id.into(),
            aggregate_type: E::AGGREGATE_TYPE.to_string(),
            payload: encode_payload(event)?,
            occurred_on: Utc::now(),
            version,
            kind: EventKind::Typed(TypedEvent::new(event.clone())),
        })
    }

    /// Only the decoder builds events from storage.
    pub(crate) fn from_record(record: EventRecord, kind: EventKind) -> Self {
        Self {
            event_type: record.event_type,
            aggregate_id: record.aggregate_id,
            aggregate_type: record.aggregate_type,
            payload: record.event_data,
            occurred_on: record.occurred_on,
            version: record.version,
            kind,
        }
    }

    /// Wire-level tag. For fallback events this is the preserved original tag.
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Identity of the constructed value: the tag for typed events,
    /// `GenericEvent` for fallbacks.
    pub fn type_name(&self) -> &str {
        match &self.kind {
            EventKind::Typed(_) => &self.event_type,
            EventKind::Generic(_) => GENERIC_EVENT_TYPE,
        }
    }

    pub fn original_event_type(&self) -> Option<&str> {
        match &self.kind {
            EventKind::Typed(_) => None,
            EventKind::Generic(generic) => Some(generic.original_event_type()),
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(self.kind, EventKind::Generic(_))
    }

    pub fn aggregate_id(&self) -> &str {
        &self.aggregate_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.aggregate_type
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn occurred_on(&self) -> DateTime<Utc> {
        self.occurred_on
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    /// True when this is the creation event of `E`'s aggregate type, matched
    /// by tag and stored aggregate type so fallback events qualify too.
    pub fn is_creation_of<E: DomainEvent>(&self) -> bool {
        self.event_type == E::CREATED_EVENT_TYPE && self.aggregate_type == E::AGGREGATE_TYPE
    }

    /// The typed value built at construction, if it is an `E`.
    pub fn as_typed<E: DomainEvent>(&self) -> Option<&E> {
        match &self.kind {
            EventKind::Typed(typed) => typed.downcast::<E>(),
            EventKind::Generic(_) => None,
        }
    }

    /// Typed view of this event. Works for fallback events whose tag `E` knows.
    pub fn decode<E: DomainEvent>(&self) -> Result<E, DecodeError> {
        match self.as_typed::<E>() {
            Some(event) => Ok(event.clone()),
            None => decode_payload(&self.event_type, &self.payload),
        }
    }

    pub fn to_record(&self) -> EventRecord {
        EventRecord {
            event_type: self.event_type.clone(),
            aggregate_id: self.aggregate_id.clone(),
            aggregate_type: self.aggregate_type.clone(),
            event_data: self.payload.clone(),
            occurred_on: self.occurred_on,
            version: self.version,
        }
    }
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

// ============================================================================
// Serialization Helpers
// ============================================================================

pub fn serialize_event<E: Serialize>(event: &E) -> Result<String> {
    Ok(serde_json::to_string(event)?)
}

pub fn deserialize_event<E: DeserializeOwned>(json: &str) -> Result<E> {
    Ok(serde_json::from_str(json)?)
}

// ============================================================================
// Tests
// ============================================================================
