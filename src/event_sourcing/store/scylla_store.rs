use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use scylla::client::session::Session;
use scylla::statement::batch::{Batch, BatchType};
use scylla::value::{CqlValue, Row};

use super::event_store::{check_append, EventStore, EventStoreError};
use crate::event_sourcing::core::{Event, EventDecoder, EventRecord};
use crate::metrics::Metrics;

// ============================================================================
// ScyllaDB Event Store
// ============================================================================
//
// Table `events`, partition per aggregate, clustered by version:
//
//   PRIMARY KEY ((aggregate_id), version)
//
// Appends are a conditional single-partition batch (INSERT ... IF NOT EXISTS),
// so two writers racing for the same version cannot both be applied even if
// both passed the version read.
//
// ============================================================================

const CREATE_EVENTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS events (
    aggregate_id text,
    version bigint,
    event_type text,
    aggregate_type text,
    event_data text,
    occurred_on timestamp,
    PRIMARY KEY ((aggregate_id), version)
) WITH CLUSTERING ORDER BY (version ASC)";

const CREATE_INDEXES: [&str; 3] = [
    "CREATE INDEX IF NOT EXISTS events_event_type_idx ON events (event_type)",
    "CREATE INDEX IF NOT EXISTS events_aggregate_type_idx ON events (aggregate_type)",
    "CREATE INDEX IF NOT EXISTS events_occurred_on_idx ON events (occurred_on)",
];

const INSERT_EVENT: &str = "INSERT INTO events (
    aggregate_id, version, event_type, aggregate_type, event_data, occurred_on
) VALUES (?, ?, ?, ?, ?, ?) IF NOT EXISTS";

const SELECT_COLUMNS: &str =
    "SELECT aggregate_id, version, event_type, aggregate_type, event_data, occurred_on FROM events";

/// Column layout shared by inserts and selects.
type EventRow = (String, i64, String, String, String, DateTime<Utc>);

fn to_row(event: &Event) -> anyhow::Result<EventRow> {
    Ok((
        event.aggregate_id().to_string(),
        event.version(),
        event.event_type().to_string(),
        event.aggregate_type().to_string(),
        serde_json::to_string(event.payload())?,
        event.occurred_on(),
    ))
}

fn from_row(row: EventRow) -> anyhow::Result<EventRecord> {
    let (aggregate_id, version, event_type, aggregate_type, event_data, occurred_on) = row;
    let event_data = serde_json::from_str(&event_data)
        .with_context(|| format!("event data of {aggregate_id} v{version} is not JSON"))?;

    Ok(EventRecord {
        event_type,
        aggregate_id,
        aggregate_type,
        event_data,
        occurred_on,
        version,
    })
}

/// Cross-aggregate chronological order; ties by aggregate id, then version.
fn sort_chronologically(records: &mut [EventRecord]) {
    records.sort_by(|a, b| {
        a.occurred_on
            .cmp(&b.occurred_on)
            .then_with(|| a.aggregate_id.cmp(&b.aggregate_id))
            .then_with(|| a.version.cmp(&b.version))
    });
}

/// First column of an LWT result is `[applied]`.
fn was_applied(row: &Row) -> bool {
    matches!(row.columns.first(), Some(Some(CqlValue::Boolean(true))))
}

pub struct ScyllaEventStore {
    session: Arc<Session>,
    decoder: EventDecoder,
    metrics: Option<Arc<Metrics>>,
}

impl ScyllaEventStore {
    pub fn new(session: Arc<Session>, decoder: EventDecoder) -> Self {
        Self {
            session,
            decoder,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Create the keyspace, the `events` table and its secondary indexes.
    pub async fn ensure_schema(session: &Session, keyspace: &str) -> anyhow::Result<()> {
        session
            .query_unpaged(
                format!(
                    "CREATE KEYSPACE IF NOT EXISTS {keyspace} WITH REPLICATION = \
                     {{'class': 'SimpleStrategy', 'replication_factor': 1}}"
                ),
                &[],
            )
            .await?;
        session.use_keyspace(keyspace, false).await?;

        session.query_unpaged(CREATE_EVENTS_TABLE, &[]).await?;
        for index in CREATE_INDEXES {
            session.query_unpaged(index, &[]).await?;
        }

        tracing::info!(keyspace = %keyspace, "Event store schema ready");
        Ok(())
    }

    async fn load_records(&self, aggregate_id: &str) -> anyhow::Result<Vec<EventRecord>> {
        let rows: Vec<EventRow> = self
            .session
            .query_iter(
                format!("{SELECT_COLUMNS} WHERE aggregate_id = ? ORDER BY version ASC"),
                (aggregate_id,),
            )
            .await?
            .rows_stream::<EventRow>()?
            .try_collect()
            .await?;

        rows.into_iter().map(from_row).collect()
    }
}

/// Log and count a conflict; the error itself passes through unchanged.
fn note_conflict(metrics: Option<&Metrics>, err: EventStoreError) -> EventStoreError {
    if let EventStoreError::ConcurrentModification {
        aggregate_id,
        expected_version,
        actual_version,
    } = &err
    {
        tracing::warn!(
            aggregate_id = %aggregate_id,
            expected_version = expected_version,
            actual_version = actual_version,
            "Concurrent modification detected"
        );
        if let Some(metrics) = metrics {
            metrics.record_conflict();
        }
    }
    err
}

#[async_trait]
impl EventStore for ScyllaEventStore {
    async fn append(
        &self,
        aggregate_id: &str,
        events: &[Event],
        expected_version: i64,
    ) -> Result<(), EventStoreError> {
        if events.is_empty() {
            return Ok(());
        }

        let current_version = self.current_version(aggregate_id).await?;
        check_append(aggregate_id, events, expected_version, current_version)
            .map_err(|err| note_conflict(self.metrics.as_deref(), err))?;

        let mut batch = Batch::new(BatchType::Logged);
        let mut values: Vec<EventRow> = Vec::with_capacity(events.len());
        for event in events {
            batch.append_statement(INSERT_EVENT);
            values.push(to_row(event)?);
        }

        let result = self
            .session
            .batch(&batch, values)
            .await
            .context("event append batch failed")?;

        let rows_result = result
            .into_rows_result()
            .context("conditional append returned no result rows")?;
        let applied = rows_result
            .rows::<Row>()
            .context("unexpected conditional append result")?
            .next()
            .transpose()
            .context("unexpected conditional append row")?
            .map(|row| was_applied(&row))
            .unwrap_or(false);

        if !applied {
            let actual_version = self.current_version(aggregate_id).await?;
            return Err(note_conflict(
                self.metrics.as_deref(),
                EventStoreError::ConcurrentModification {
                    aggregate_id: aggregate_id.to_string(),
                    expected_version,
                    actual_version,
                },
            ));
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_append(events[0].aggregate_type(), events.len());
        }
        tracing::info!(
            aggregate_id = %aggregate_id,
            new_version = expected_version + events.len() as i64,
            event_count = events.len(),
            "Appended events to event store"
        );

        Ok(())
    }

    async fn get_events(&self, aggregate_id: &str) -> Result<Vec<Event>, EventStoreError> {
        let records = self.load_records(aggregate_id).await?;
        tracing::debug!(aggregate_id = %aggregate_id, count = records.len(), "Loaded events");

        Ok(self.decoder.decode_all(records))
    }

    async fn get_all_events(&self) -> Result<Vec<Event>, EventStoreError> {
        let rows: Vec<EventRow> = self
            .session
            .query_iter(SELECT_COLUMNS, &[])
            .await
            .context("event scan failed")?
            .rows_stream::<EventRow>()
            .context("unexpected event row layout")?
            .try_collect()
            .await
            .context("event scan page failed")?;

        let mut records = rows
            .into_iter()
            .map(from_row)
            .collect::<anyhow::Result<Vec<_>>>()?;
        sort_chronologically(&mut records);

        Ok(self.decoder.decode_all(records))
    }

    async fn current_version(&self, aggregate_id: &str) -> Result<i64, EventStoreError> {
        let result = self
            .session
            .query_unpaged(
                "SELECT version FROM events WHERE aggregate_id = ? ORDER BY version DESC LIMIT 1",
                (aggregate_id,),
            )
            .await
            .context("version lookup failed")?;

        let rows_result = match result.into_rows_result() {
            Ok(rows) => rows,
            Err(_) => return Ok(0),
        };

        match rows_result.maybe_first_row::<(i64,)>() {
            Ok(Some((version,))) => Ok(version),
            Ok(None) => Ok(0),
            Err(e) => Err(EventStoreError::Backend(e.into())),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
//
// Queries need a live cluster; only the row mapping is covered here.
//
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event_sourcing::core::event::tests::{CounterEvent, CounterIncremented};
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_row_mapping_keeps_envelope_fields() {
        let event = Event::new(
            "c-1",
            &CounterEvent::Incremented(CounterIncremented { by: 2 }),
            5,
        )
        .unwrap();

        let record = from_row(to_row(&event).unwrap()).unwrap();
        assert_eq!(record, event.to_record());
    }

    #[test]
    fn test_row_with_invalid_json_is_rejected() {
        let row: EventRow = (
            "c-1".to_string(),
            1,
            "CounterCreatedEvent".to_string(),
            "Counter".to_string(),
            "{not json".to_string(),
            Utc::now(),
        );
        assert!(from_row(row).is_err());
    }

    #[test]
    fn test_chronological_sort_breaks_ties() {
        let now = Utc::now();
        let record = |id: &str, version: i64, offset: i64| EventRecord {
            event_type: "X".to_string(),
            aggregate_id: id.to_string(),
            aggregate_type: "Counter".to_string(),
            event_data: json!({}),
            occurred_on: now + Duration::milliseconds(offset),
            version,
        };
        let mut records = vec![record("b", 1, 0), record("a", 2, 0), record("a", 1, 0), record("c", 1, -5)];
        sort_chronologically(&mut records);

        let order: Vec<(String, i64)> = records
            .iter()
            .map(|r| (r.aggregate_id.clone(), r.version))
            .collect();
        assert_eq!(
            order,
            vec![
                ("c".to_string(), 1),
                ("a".to_string(), 1),
                ("a".to_string(), 2),
                ("b".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_precheck_conflict_keeps_reported_version() {
        let metrics = Metrics::new().unwrap();
        let events = vec![Event::new(
            "c-1",
            &CounterEvent::Incremented(CounterIncremented { by: 1 }),
            3,
        )
        .unwrap()];

        let err = check_append("c-1", &events, 1, 1)
            .map_err(|err| note_conflict(Some(&metrics), err))
            .unwrap_err();

        assert!(matches!(
            err,
            EventStoreError::ConcurrentModification {
                expected_version: 1,
                actual_version: 2,
                ..
            }
        ));
        assert_eq!(metrics.concurrency_conflicts_total.get(), 1);
    }

    #[test]
    fn test_backend_errors_are_not_counted_as_conflicts() {
        let metrics = Metrics::new().unwrap();
        let err = note_conflict(Some(&metrics), EventStoreError::Backend(anyhow::anyhow!("timeout")));

        assert!(!err.is_conflict());
        assert_eq!(metrics.concurrency_conflicts_total.get(), 0);
    }

    #[test]
    fn test_lwt_applied_flag() {
        let applied = Row {
            columns: vec![Some(CqlValue::Boolean(true))],
        };
        let rejected = Row {
            columns: vec![Some(CqlValue::Boolean(false)), Some(CqlValue::BigInt(2))],
        };
        assert!(was_applied(&applied));
        assert!(!was_applied(&rejected));
    }
}
