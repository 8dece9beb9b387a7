use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::metrics::Metrics;

// ============================================================================
// Circuit Breaker Pattern Implementation
// ============================================================================
//
// Guards outbound publishing. When the broker keeps failing, publishes fail
// fast instead of waiting on timeouts; replay records them as failures.
//
// States:
// - Closed: Normal operation, requests pass through
// - Open: Too many failures, requests blocked immediately
// - HalfOpen: Testing if service recovered, limited requests allowed
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }

    fn gauge_value(self) -> u8 {
        match self {
            CircuitState::Closed => 0,
            CircuitState::Open => 1,
            CircuitState::HalfOpen => 2,
        }
    }
}

#[derive(Clone, Debug)]
pub struct CircuitBreakerConfig {
    /// Number of failures before opening circuit
    pub failure_threshold: u32,
    /// Time to wait before attempting recovery
    pub timeout: Duration,
    /// Number of successes needed to close circuit from half-open
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            timeout: Duration::from_secs(30),
            success_threshold: 3,
        }
    }
}

struct CircuitBreakerState {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<Instant>,
}

#[derive(Clone)]
pub struct CircuitBreaker {
    name: String,
    state: Arc<Mutex<CircuitBreakerState>>,
    config: CircuitBreakerConfig,
    metrics: Option<Arc<Metrics>>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(CircuitBreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
            })),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Execute an operation with circuit breaker protection
    pub async fn call<F, T, E>(&self, operation: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: std::future::Future<Output = Result<T, E>>,
    {
        {
            let mut state = self.state.lock().await;

            if state.state == CircuitState::Open {
                match state.last_failure_time {
                    Some(last_failure) if last_failure.elapsed() >= self.config.timeout => {
                        self.transition(&mut state, CircuitState::HalfOpen);
                        state.success_count = 0;
                    }
                    _ => return Err(CircuitBreakerError::CircuitOpen),
                }
            }
        }

        match operation.await {
            Ok(result) => {
                self.record_success().await;
                Ok(result)
            }
            Err(err) => {
                self.record_failure().await;
                Err(CircuitBreakerError::OperationFailed(err))
            }
        }
    }

    fn transition(&self, state: &mut CircuitBreakerState, to: CircuitState) {
        let from = state.state;
        state.state = to;

        tracing::info!(
            breaker = %self.name,
            from = from.as_str(),
            to = to.as_str(),
            failures = state.failure_count,
            "Circuit breaker state change"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_circuit_breaker_transition(from.as_str(), to.as_str());
            metrics.update_circuit_breaker_state(to.gauge_value());
        }
    }

    async fn record_success(&self) {
        let mut state = self.state.lock().await;

        match state.state {
            CircuitState::HalfOpen => {
                state.success_count += 1;
                if state.success_count >= self.config.success_threshold {
                    self.transition(&mut state, CircuitState::Closed);
                    state.failure_count = 0;
                    state.success_count = 0;
                    state.last_failure_time = None;
                }
            }
            CircuitState::Closed => {
                state.failure_count = 0;
            }
            CircuitState::Open => {
                tracing::warn!(breaker = %self.name, "Success recorded while circuit is open");
            }
        }
    }

    async fn record_failure(&self) {
        let mut state = self.state.lock().await;

        state.failure_count += 1;
        state.last_failure_time = Some(Instant::now());

        match state.state {
            CircuitState::Closed => {
                if state.failure_count >= self.config.failure_threshold {
                    self.transition(&mut state, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                self.transition(&mut state, CircuitState::Open);
                state.success_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    pub async fn get_state(&self) -> CircuitState {
        self.state.lock().await.state
    }

    /// Manually reset the circuit breaker
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        self.transition(&mut state, CircuitState::Closed);
        state.failure_count = 0;
        state.success_count = 0;
        state.last_failure_time = None;
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CircuitBreakerError<E> {
    #[error("circuit breaker is open")]
    CircuitOpen,
    #[error("operation failed: {0}")]
    OperationFailed(E),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(failure_threshold: u32, timeout: Duration, success_threshold: u32) -> CircuitBreaker {
        CircuitBreaker::new(
            "test",
            CircuitBreakerConfig {
                failure_threshold,
                timeout,
                success_threshold,
            },
        )
    }

    #[tokio::test]
    async fn test_circuit_breaker_opens_after_failures() {
        let cb = breaker(3, Duration::from_secs(1), 2);

        for _ in 0..3 {
            let result = cb.call(async { Err::<(), _>("error") }).await;
            assert!(result.is_err());
        }

        assert_eq!(cb.get_state().await, CircuitState::Open);

        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::CircuitOpen)));
    }

    #[tokio::test]
    async fn test_circuit_breaker_half_open_after_timeout() {
        let cb = breaker(2, Duration::from_millis(100), 1);

        for _ in 0..2 {
            let _ = cb.call(async { Err::<(), _>("error") }).await;
        }
        assert_eq!(cb.get_state().await, CircuitState::Open);

        tokio::time::sleep(Duration::from_millis(150)).await;

        let result = cb.call(async { Ok::<_, &str>(()) }).await;
        assert!(result.is_ok());
        assert_eq!(cb.get_state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_transitions_are_reported_to_metrics() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let cb = breaker(1, Duration::from_secs(60), 1).with_metrics(metrics.clone());

        let _ = cb.call(async { Err::<(), _>("error") }).await;

        assert_eq!(metrics.circuit_breaker_state.get(), 1);
        assert_eq!(
            metrics
                .circuit_breaker_transitions
                .with_label_values(&["Closed", "Open"])
                .get(),
            1
        );

        cb.reset().await;
        assert_eq!(metrics.circuit_breaker_state.get(), 0);
    }
}
