use serde::{Deserialize, Serialize};
use chrono::{DateTime, Utc};

use uuid::Uuid;

use super::error::EventError;
use super::event::{DomainEvent, Event};

// ============================================================================
// Aggregate Root Pattern - Event Sourcing Core
// ============================================================================
//
// Key Principles:
// 1. Every state change is recorded as an event with the next version
// 2. Commands are validated before emitting events
// 3. Uncommitted events are cleared only after the log confirms the append
// 4. History replay sets the version from the stored event, not by counting
//
// ============================================================================

/// Bookkeeping shared by every aggregate: identity, version and the events
/// produced since the last persistence cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateRoot {
    id: String,
    version: i64,
    #[serde(skip)]
    uncommitted_events: Vec<Event>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AggregateRoot {
    /// Brand-new aggregate at version 0.
    pub fn new(id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            version: 0,
            uncommitted_events: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Reconstruction mode: prior timestamps are supplied, nothing is recorded.
    pub fn restored(
        id: impl Into<String>,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            version: 0,
            uncommitted_events: Vec::new(),
            created_at,
            updated_at,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn uncommitted_events(&self) -> &[Event] {
        &self.uncommitted_events
    }

    /// Append a new event in memory with version `version + 1`.
    pub fn record<E: DomainEvent>(&mut self, event: &E) -> Result<(), EventError> {
        let next_version = self.version + 1;
        let event = Event::new(self.id.clone(), event, next_version)?;
        self.updated_at = event.occurred_on();
        self.uncommitted_events.push(event);
        self.version = next_version;
        Ok(())
    }

    /// Called by the repository once the event log confirmed the append.
    pub fn mark_events_committed(&mut self) {
        self.uncommitted_events.clear();
    }

    /// Version as read back from a snapshot.
    pub fn restore_version(&mut self, version: i64) {
        self.version = version;
    }

    fn applied_from_history(&mut self, event: &Event) {
        self.version = event.version();
        self.updated_at = event.occurred_on();
    }
}

/// Fresh time-ordered aggregate id (UUIDv7).
pub fn new_aggregate_id() -> String {
    Uuid::now_v7().to_string()
}

/// Generic Aggregate trait - all event-sourced aggregates implement this
///
/// Type Parameters:
/// - `Event`: The domain event enum for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event: DomainEvent;
    type Command: Send + Sync;
    type Error: std::error::Error + From<EventError> + Send + Sync + 'static;

    fn root(&self) -> &AggregateRoot;

    fn root_mut(&mut self) -> &mut AggregateRoot;

    /// Build the aggregate from its creation event, without recording anything
    fn apply_first_event(
        aggregate_id: &str,
        event: &Self::Event,
        occurred_on: DateTime<Utc>,
    ) -> Result<Self, Self::Error>;

    /// Apply subsequent events to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_type() -> &'static str {
        <Self::Event as DomainEvent>::AGGREGATE_TYPE
    }

    fn aggregate_id(&self) -> &str {
        self.root().id()
    }

    fn version(&self) -> i64 {
        self.root().version()
    }

    /// Run a command: validate, apply and record every resulting event.
    /// Returns the number of new events.
    fn execute(&mut self, command: &Self::Command) -> Result<usize, Self::Error> {
        let events = self.handle_command(command)?;
        for event in &events {
            self.apply_event(event)?;
            self.root_mut().record(event)?;
        }
        Ok(events.len())
    }

    /// Apply already-stored events; the version follows each event's stored version.
    ///
    /// Fallback events this aggregate cannot read are not applied, but the
    /// version still moves past them.
    fn load_from_history<'a, I>(&mut self, events: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = &'a Event>,
    {
        for event in events {
            match event.decode::<Self::Event>() {
                Ok(typed) => self.apply_event(&typed)?,
                Err(err) if event.is_generic() => {
                    tracing::warn!(
                        aggregate_id = %event.aggregate_id(),
                        event_type = %event.event_type(),
                        version = event.version(),
                        error = %err,
                        "Skipping unreadable event in history"
                    );
                }
                Err(err) => return Err(EventError::from(err).into()),
            }
            self.root_mut().applied_from_history(event);
        }
        Ok(())
    }

    /// Reconstruct from event history (first event must be the creation event)
    fn rebuild_from_events(aggregate_id: &str, events: &[Event]) -> Result<Self, Self::Error> {
        let mut ordered: Vec<&Event> = events.iter().collect();
        ordered.sort_by_key(|event| event.version());

        let (first, rest) = ordered.split_first().ok_or_else(|| EventError::EmptyHistory {
            aggregate_id: aggregate_id.to_string(),
        })?;

        if !first.is_creation_of::<Self::Event>() {
            return Err(EventError::NotCreationEvent {
                aggregate_id: aggregate_id.to_string(),
                event_type: first.event_type().to_string(),
                expected: <Self::Event as DomainEvent>::CREATED_EVENT_TYPE,
            }
            .into());
        }

        let created: Self::Event = first.decode().map_err(EventError::from)?;
        let mut aggregate = Self::apply_first_event(aggregate_id, &created, first.occurred_on())?;
        aggregate.root_mut().applied_from_history(first);
        aggregate.load_from_history(rest.iter().copied())?;

        Ok(aggregate)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::event_sourcing::core::event::tests::{CounterCreated, CounterEvent, CounterIncremented};
    use crate::event_sourcing::core::{EventDecoder, EventRecord};

    #[derive(Debug, thiserror::Error)]
    pub(crate) enum CounterError {
        #[error("increment must be positive")]
        NonPositive,
        #[error(transparent)]
        Event(#[from] EventError),
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub(crate) struct Counter {
        root: AggregateRoot,
        pub label: String,
        pub total: i64,
    }

    impl Counter {
        pub(crate) fn create(id: &str, label: &str) -> Result<Self, CounterError> {
            let created = CounterEvent::Created(CounterCreated { label: label.to_string() });
            let mut counter = Self::apply_first_event(id, &created, Utc::now())?;
            counter.root.record(&created)?;
            Ok(counter)
        }
    }

    impl Aggregate for Counter {
        type Event = CounterEvent;
        type Command = i64;
        type Error = CounterError;

        fn root(&self) -> &AggregateRoot {
            &self.root
        }

        fn root_mut(&mut self) -> &mut AggregateRoot {
            &mut self.root
        }

        fn apply_first_event(
            aggregate_id: &str,
            event: &Self::Event,
            occurred_on: DateTime<Utc>,
        ) -> Result<Self, Self::Error> {
            match event {
                CounterEvent::Created(e) => Ok(Self {
                    root: AggregateRoot::restored(aggregate_id, occurred_on, occurred_on),
                    label: e.label.clone(),
                    total: 0,
                }),
                CounterEvent::Incremented(_) => Err(EventError::NotCreationEvent {
                    aggregate_id: aggregate_id.to_string(),
                    event_type: event.event_type().to_string(),
                    expected: CounterEvent::CREATED_EVENT_TYPE,
                }
                .into()),
            }
        }

        fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error> {
            if let CounterEvent::Incremented(e) = event {
                self.total += e.by;
            }
            Ok(())
        }

        fn handle_command(&self, by: &i64) -> Result<Vec<Self::Event>, Self::Error> {
            if *by <= 0 {
                return Err(CounterError::NonPositive);
            }
            Ok(vec![CounterEvent::Incremented(CounterIncremented { by: *by })])
        }
    }

    #[test]
    fn test_new_aggregate_ids_are_unique_v7() {
        let first = new_aggregate_id();
        let second = new_aggregate_id();

        assert_ne!(first, second);
        assert_eq!(Uuid::parse_str(&first).unwrap().get_version_num(), 7);
    }

    #[test]
    fn test_new_aggregate_records_created_event_at_version_one() {
        let counter = Counter::create("c-1", "laundry").unwrap();

        assert_eq!(counter.version(), 1);
        assert_eq!(counter.root().uncommitted_events().len(), 1);
        assert_eq!(counter.root().uncommitted_events()[0].version(), 1);
        assert_eq!(counter.root().uncommitted_events()[0].event_type(), "CounterCreatedEvent");
    }

    #[test]
    fn test_execute_increments_version_per_event() {
        let mut counter = Counter::create("c-1", "laundry").unwrap();
        counter.execute(&2).unwrap();
        counter.execute(&5).unwrap();

        assert_eq!(counter.version(), 3);
        assert_eq!(counter.total, 7);
        let versions: Vec<i64> = counter
            .root()
            .uncommitted_events()
            .iter()
            .map(|e| e.version())
            .collect();
        assert_eq!(versions, vec![1, 2, 3]);
    }

    #[test]
    fn test_rejected_command_records_nothing() {
        let mut counter = Counter::create("c-1", "laundry").unwrap();
        let result = counter.execute(&0);

        assert!(matches!(result, Err(CounterError::NonPositive)));
        assert_eq!(counter.version(), 1);
        assert_eq!(counter.root().uncommitted_events().len(), 1);
    }

    #[test]
    fn test_mark_events_committed_keeps_version() {
        let mut counter = Counter::create("c-1", "laundry").unwrap();
        counter.execute(&1).unwrap();
        counter.root_mut().mark_events_committed();

        assert!(counter.root().uncommitted_events().is_empty());
        assert_eq!(counter.version(), 2);
    }

    #[test]
    fn test_rebuild_matches_live_state() {
        let mut live = Counter::create("c-1", "laundry").unwrap();
        live.execute(&2).unwrap();
        live.execute(&3).unwrap();

        let history: Vec<Event> = live.root().uncommitted_events().to_vec();
        let rebuilt = Counter::rebuild_from_events("c-1", &history).unwrap();

        assert_eq!(rebuilt.version(), 3);
        assert_eq!(rebuilt.total, live.total);
        assert_eq!(rebuilt.label, live.label);
        assert!(rebuilt.root().uncommitted_events().is_empty());
    }

    #[test]
    fn test_rebuild_sorts_history_by_version() {
        let mut live = Counter::create("c-1", "laundry").unwrap();
        live.execute(&2).unwrap();
        live.execute(&3).unwrap();

        let mut history: Vec<Event> = live.root().uncommitted_events().to_vec();
        history.reverse();
        let rebuilt = Counter::rebuild_from_events("c-1", &history).unwrap();

        assert_eq!(rebuilt.version(), 3);
        assert_eq!(rebuilt.total, 5);
    }

    #[test]
    fn test_load_from_history_takes_stored_version() {
        let mut live = Counter::create("c-1", "laundry").unwrap();
        live.execute(&1).unwrap();
        let history: Vec<Event> = live.root().uncommitted_events().to_vec();

        let mut rebuilt = Counter::rebuild_from_events("c-1", &history[..1]).unwrap();
        rebuilt.root_mut().restore_version(40);
        rebuilt.load_from_history(&history[1..]).unwrap();

        assert_eq!(rebuilt.version(), 2);
    }

    #[test]
    fn test_rebuild_steps_over_fallback_events() {
        let mut live = Counter::create("c-1", "laundry").unwrap();
        live.execute(&2).unwrap();
        let mut history: Vec<Event> = live.root().uncommitted_events().to_vec();

        let decoder = EventDecoder::for_domain::<CounterEvent>();
        let legacy = decoder.decode(EventRecord {
            event_type: "LegacyThing".to_string(),
            aggregate_id: "c-1".to_string(),
            aggregate_type: "Counter".to_string(),
            event_data: serde_json::json!({ "legacy": true }),
            occurred_on: Utc::now(),
            version: 3,
        });
        assert!(legacy.is_generic());
        history.push(legacy);

        let rebuilt = Counter::rebuild_from_events("c-1", &history).unwrap();

        assert_eq!(rebuilt.version(), 3);
        assert_eq!(rebuilt.total, 2);
    }

    #[test]
    fn test_rebuild_requires_creation_event_first() {
        let mut live = Counter::create("c-1", "laundry").unwrap();
        live.execute(&1).unwrap();
        let history: Vec<Event> = live.root().uncommitted_events()[1..].to_vec();

        let result = Counter::rebuild_from_events("c-1", &history);
        assert!(matches!(
            result,
            Err(CounterError::Event(EventError::NotCreationEvent { .. }))
        ));
    }

    #[test]
    fn test_rebuild_from_empty_history_fails() {
        let result = Counter::rebuild_from_events("c-1", &[]);
        assert!(matches!(
            result,
            Err(CounterError::Event(EventError::EmptyHistory { .. }))
        ));
    }
}
