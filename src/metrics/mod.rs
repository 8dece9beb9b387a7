// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::{health_handler, metrics_handler};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Provides metrics for:
// - Event log appends and optimistic concurrency conflicts
// - Decoder fallbacks
// - Replay and rehydration outcomes
// - Circuit breaker state transitions
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Central metrics registry for the entire application
pub struct Metrics {
    registry: Registry,

    // Event Store Metrics
    pub events_appended_total: IntCounterVec,
    pub concurrency_conflicts_total: IntCounter,
    pub decode_fallbacks_total: IntCounterVec,

    // Batch Operation Metrics
    pub replay_events_total: IntCounterVec,
    pub replay_duration_seconds: HistogramVec,
    pub rehydrated_aggregates_total: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,
    pub circuit_breaker_transitions: IntCounterVec,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        // Event Store Metrics
        let events_appended_total = IntCounterVec::new(
            Opts::new("events_appended_total", "Total events appended to the event log"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(events_appended_total.clone()))?;

        let concurrency_conflicts_total = IntCounter::new(
            "concurrency_conflicts_total",
            "Appends rejected by optimistic concurrency control",
        )?;
        registry.register(Box::new(concurrency_conflicts_total.clone()))?;

        let decode_fallbacks_total = IntCounterVec::new(
            Opts::new("decode_fallbacks_total", "Stored events decoded as generic fallbacks"),
            &["aggregate_type"],
        )?;
        registry.register(Box::new(decode_fallbacks_total.clone()))?;

        // Batch Operation Metrics
        let replay_events_total = IntCounterVec::new(
            Opts::new("replay_events_total", "Events re-published by the replayer"),
            &["outcome"],
        )?;
        registry.register(Box::new(replay_events_total.clone()))?;

        let replay_duration_seconds = HistogramVec::new(
            HistogramOpts::new("replay_duration_seconds", "Duration of replay runs")
                .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0, 120.0]),
            &["mode"],
        )?;
        registry.register(Box::new(replay_duration_seconds.clone()))?;

        let rehydrated_aggregates_total = IntCounterVec::new(
            Opts::new("rehydrated_aggregates_total", "Aggregates processed by rehydration"),
            &["aggregate_type", "outcome"],
        )?;
        registry.register(Box::new(rehydrated_aggregates_total.clone()))?;

        // Circuit Breaker Metrics
        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        let circuit_breaker_transitions = IntCounterVec::new(
            Opts::new("circuit_breaker_transitions_total", "Circuit breaker state transitions"),
            &["from_state", "to_state"],
        )?;
        registry.register(Box::new(circuit_breaker_transitions.clone()))?;

        Ok(Self {
            registry,
            events_appended_total,
            concurrency_conflicts_total,
            decode_fallbacks_total,
            replay_events_total,
            replay_duration_seconds,
            rehydrated_aggregates_total,
            circuit_breaker_state,
            circuit_breaker_transitions,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_append(&self, aggregate_type: &str, count: usize) {
        self.events_appended_total
            .with_label_values(&[aggregate_type])
            .inc_by(count as u64);
    }

    pub fn record_conflict(&self) {
        self.concurrency_conflicts_total.inc();
    }

    /// Helper to record one replayed event
    pub fn record_replay_event(&self, success: bool) {
        let outcome = if success { "published" } else { "failed" };
        self.replay_events_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_replay_duration(&self, mode: &str, duration_secs: f64) {
        self.replay_duration_seconds
            .with_label_values(&[mode])
            .observe(duration_secs);
    }

    /// Helper to record one rehydration outcome ("rehydrated", "skipped" or "failed")
    pub fn record_rehydration(&self, aggregate_type: &str, outcome: &str) {
        self.rehydrated_aggregates_total
            .with_label_values(&[aggregate_type, outcome])
            .inc();
    }

    /// Helper to update circuit breaker state
    pub fn update_circuit_breaker_state(&self, state: u8) {
        self.circuit_breaker_state.set(state as i64);
    }

    /// Helper to record circuit breaker transition
    pub fn record_circuit_breaker_transition(&self, from_state: &str, to_state: &str) {
        self.circuit_breaker_transitions
            .with_label_values(&[from_state, to_state])
            .inc();
    }
}
