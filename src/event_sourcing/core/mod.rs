// ============================================================================
// Event Sourcing Core - Generic Infrastructure Abstractions
// ============================================================================
//
// Key Principles:
// - No domain-specific code (no User, Family, Task)
// - Generic over aggregate and event types
// - Stored events are only ever built by the decoder
//
// ============================================================================

pub mod aggregate;
pub mod error;
pub mod event;
pub mod registry;

pub use aggregate::{new_aggregate_id, Aggregate, AggregateRoot};
pub use error::{DecodeError, EventError};
pub use event::{
    decode_payload, deserialize_event, encode_payload, serialize_event, DomainEvent, Event,
    EventKind, EventRecord, GenericEvent, TypedEvent, GENERIC_EVENT_TYPE,
};
pub use registry::{CompositeRegistry, DomainRegistry, EmptyRegistry, EventDecoder, EventTypeRegistry};
