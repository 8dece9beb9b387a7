// ============================================================================
// Event Sourcing Core - Errors
// ============================================================================

/// Failure to turn a stored payload back into a typed domain event.
///
/// Never escapes a bulk read: the decoder absorbs it into a fallback event.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("unknown event type `{event_type}` for aggregate type {aggregate_type}")]
    UnknownEventType {
        aggregate_type: String,
        event_type: String,
    },

    #[error("malformed payload for `{event_type}`: {source}")]
    MalformedPayload {
        event_type: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors raised while recording events or rebuilding an aggregate from history.
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("failed to serialize event: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("no events to load for aggregate {aggregate_id}")]
    EmptyHistory { aggregate_id: String },

    #[error("first event of aggregate {aggregate_id} is `{event_type}`, expected `{expected}`")]
    NotCreationEvent {
        aggregate_id: String,
        event_type: String,
        expected: &'static str,
    },
}
