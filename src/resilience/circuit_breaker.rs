//! Circuit breaker for provider protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: provider assumed down, calls fail fast
//! - Half-Open: testing if provider recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure rate >= threshold within rolling window
//! Open → Half-Open: reset timeout elapses (timer, or the next call)
//! Half-Open → Closed: trial call succeeds (window reset)
//! Half-Open → Open: trial call fails (reset timer restarts)
//! ```
//!
//! # Design Decisions
//! - One breaker per provider, owned by the dispatch service (not global)
//! - Fail fast in Open state; the provider is never invoked
//! - Single trial call in Half-Open (prevents hammering a recovering provider)
//! - Timeouts count as failures
//! - All state lives behind one mutex that is never held across an await
//! - The reset timer holds a weak reference and a generation, so a dropped
//!   or already-recovered breaker ignores it

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::BreakerConfig;
use crate::resilience::timeouts::bounded;

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CircuitState {
    Closed,
    HalfOpen,
    Open,
}

impl CircuitState {
    /// Gauge encoding (0=Closed, 1=HalfOpen, 2=Open).
    pub fn as_metric_value(self) -> f64 {
        match self {
            CircuitState::Closed => 0.0,
            CircuitState::HalfOpen => 1.0,
            CircuitState::Open => 2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::HalfOpen => "half_open",
            CircuitState::Open => "open",
        }
    }
}

/// Why a guarded call did not produce a value.
#[derive(Debug, Error)]
pub enum CallError<E> {
    /// Rejected without invoking the operation.
    #[error("circuit breaker is open")]
    Open,

    /// The operation exceeded the call timeout and was abandoned.
    #[error("call timed out after {0:?}")]
    Timeout(Duration),

    /// The operation itself failed.
    #[error(transparent)]
    Failed(E),
}

impl<E> CallError<E> {
    pub fn is_open(&self) -> bool {
        matches!(self, CallError::Open)
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::Timeout(_))
    }
}

/// A state change, as delivered to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: CircuitState,
    pub to: CircuitState,
}

/// Receives breaker state changes.
///
/// Observers run while the breaker's state lock is held, so they see
/// transitions in order. They must be quick and must not call back into the
/// breaker.
pub trait BreakerObserver: Send + Sync {
    fn on_transition(&self, breaker: &str, transition: Transition);
}

/// Observer that writes every transition to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogObserver;

impl BreakerObserver for LogObserver {
    fn on_transition(&self, breaker: &str, transition: Transition) {
        match transition.to {
            CircuitState::Open => tracing::warn!(
                provider = breaker,
                from = transition.from.as_str(),
                "Email service circuit breaker opened"
            ),
            CircuitState::HalfOpen => tracing::warn!(
                provider = breaker,
                "Email service circuit breaker half-open, allowing a trial call"
            ),
            CircuitState::Closed => tracing::info!(
                provider = breaker,
                "Email service circuit breaker closed"
            ),
        }
    }
}

/// Call counts for one slice of the rolling window.
#[derive(Debug)]
struct Bucket {
    started: Instant,
    successes: u32,
    failures: u32,
}

/// Time-bucketed outcome counts over the last `span × capacity`.
#[derive(Debug)]
struct RollingWindow {
    buckets: VecDeque<Bucket>,
    span: Duration,
    capacity: u32,
}

impl RollingWindow {
    fn new(length: Duration, capacity: u32) -> Self {
        let capacity = capacity.max(1);
        Self {
            buckets: VecDeque::with_capacity(capacity as usize),
            span: length / capacity,
            capacity,
        }
    }

    fn prune(&mut self, now: Instant) {
        let length = self.span * self.capacity;
        while let Some(front) = self.buckets.front() {
            if now.duration_since(front.started) >= length {
                self.buckets.pop_front();
            } else {
                break;
            }
        }
    }

    fn record(&mut self, now: Instant, success: bool) {
        self.prune(now);
        let fresh = match self.buckets.back() {
            Some(back) => now.duration_since(back.started) >= self.span,
            None => true,
        };
        if fresh {
            self.buckets.push_back(Bucket {
                started: now,
                successes: 0,
                failures: 0,
            });
        }
        if let Some(bucket) = self.buckets.back_mut() {
            if success {
                bucket.successes += 1;
            } else {
                bucket.failures += 1;
            }
        }
    }

    /// (successes, failures) currently inside the window.
    fn totals(&mut self, now: Instant) -> (u32, u32) {
        self.prune(now);
        self.buckets
            .iter()
            .fold((0, 0), |(s, f), b| (s + b.successes, f + b.failures))
    }

    fn clear(&mut self) {
        self.buckets.clear();
    }
}

struct BreakerState {
    state: CircuitState,
    window: RollingWindow,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    /// Bumped on every transition; outcomes from older generations are ignored.
    generation: u64,
    observers: Vec<Arc<dyn BreakerObserver>>,
}

/// Point-in-time view of a breaker, for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub successes: u32,
    pub failures: u32,
}

/// Guards a fallible, time-bounded operation.
pub struct CircuitBreaker {
    shared: Arc<Shared>,
}

/// State reachable from the breaker and from its reset timer.
struct Shared {
    this: Weak<Shared>,
    name: String,
    call_timeout: Duration,
    reset_timeout: Duration,
    error_threshold_percentage: u32,
    volume_threshold: u32,
    state: Mutex<BreakerState>,
}

/// Admission ticket for one call.
///
/// Dropping an unsettled trial permit (the caller's future was cancelled)
/// frees the half-open trial slot.
struct Permit<'a> {
    shared: &'a Shared,
    generation: u64,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    fn settle(mut self, success: bool) {
        self.settled = true;
        self.shared.record(self.generation, success);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            let mut state = self.shared.state.lock();
            if state.generation == self.generation {
                state.trial_in_flight = false;
            }
        }
    }
}

impl CircuitBreaker {
    /// Create a closed breaker.
    pub fn new(name: impl Into<String>, config: &BreakerConfig) -> Self {
        let name = name.into();
        let shared = Arc::new_cyclic(|this| Shared {
            this: this.clone(),
            name,
            call_timeout: config.call_timeout(),
            reset_timeout: config.reset_timeout(),
            error_threshold_percentage: config.error_threshold_percentage,
            volume_threshold: config.volume_threshold,
            state: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                window: RollingWindow::new(config.rolling_window(), config.rolling_buckets),
                opened_at: None,
                trial_in_flight: false,
                generation: 0,
                observers: Vec::new(),
            }),
        });
        Self { shared }
    }

    /// Add a transition observer.
    pub fn with_observer(self, observer: Arc<dyn BreakerObserver>) -> Self {
        self.shared.state.lock().observers.push(observer);
        self
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Current state.
    ///
    /// Open moves to Half-Open when the reset timer fires. Outside a Tokio
    /// runtime there is no timer, and the move happens on the next call.
    pub fn state(&self) -> CircuitState {
        self.shared.state.lock().state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut state = self.shared.state.lock();
        let (successes, failures) = state.window.totals(Instant::now());
        BreakerSnapshot {
            state: state.state,
            successes,
            failures,
        }
    }

    /// Run `op` under the breaker.
    ///
    /// `op` is only invoked if the call is admitted. Its future is bounded by
    /// the call timeout; a timeout counts as a failure.
    pub async fn call<T, E, F, Fut>(&self, op: F) -> Result<T, CallError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let Some(permit) = self.shared.acquire() else {
            tracing::debug!(provider = %self.shared.name, "Call rejected by open circuit breaker");
            return Err(CallError::Open);
        };

        let result = bounded(self.shared.call_timeout, op()).await;
        permit.settle(result.is_ok());
        result
    }
}

impl Shared {
    fn acquire(&self) -> Option<Permit<'_>> {
        let mut state = self.state.lock();
        let now = Instant::now();

        let trial = match state.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let elapsed = state
                    .opened_at
                    .map_or(true, |opened| now.duration_since(opened) >= self.reset_timeout);
                if !elapsed {
                    return None;
                }
                // Reset timer has not run yet.
                self.transition(&mut state, CircuitState::HalfOpen, now);
                state.trial_in_flight = true;
                true
            }
            CircuitState::HalfOpen => {
                if state.trial_in_flight {
                    return None;
                }
                state.trial_in_flight = true;
                true
            }
        };

        Some(Permit {
            shared: self,
            generation: state.generation,
            trial,
            settled: false,
        })
    }

    fn record(&self, generation: u64, success: bool) {
        let mut state = self.state.lock();
        if state.generation != generation {
            // Admitted under a state that no longer applies.
            return;
        }
        let now = Instant::now();

        match state.state {
            CircuitState::Closed => {
                state.window.record(now, success);
                let (successes, failures) = state.window.totals(now);
                if self.should_trip(successes, failures) {
                    tracing::debug!(
                        provider = %self.name,
                        successes,
                        failures,
                        threshold = self.error_threshold_percentage,
                        "Failure rate reached threshold"
                    );
                    self.transition(&mut state, CircuitState::Open, now);
                }
            }
            CircuitState::HalfOpen => {
                let next = if success {
                    CircuitState::Closed
                } else {
                    CircuitState::Open
                };
                self.transition(&mut state, next, now);
            }
            CircuitState::Open => {}
        }
    }

    fn should_trip(&self, successes: u32, failures: u32) -> bool {
        let total = u64::from(successes) + u64::from(failures);
        total > 0
            && total >= u64::from(self.volume_threshold)
            && u64::from(failures) * 100 >= u64::from(self.error_threshold_percentage) * total
    }

    fn transition(&self, state: &mut BreakerState, to: CircuitState, now: Instant) {
        let from = state.state;
        state.state = to;
        state.generation += 1;
        state.trial_in_flight = false;
        match to {
            CircuitState::Open => {
                state.opened_at = Some(now);
                self.arm_reset_timer(now + self.reset_timeout, state.generation);
            }
            CircuitState::HalfOpen => {}
            CircuitState::Closed => {
                state.opened_at = None;
                state.window.clear();
            }
        }

        let transition = Transition { from, to };
        for observer in &state.observers {
            observer.on_transition(&self.name, transition);
        }
    }

    /// Move to Half-Open at `deadline` unless the breaker has moved on.
    fn arm_reset_timer(&self, deadline: Instant, generation: u64) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let this = self.this.clone();
        runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if let Some(shared) = this.upgrade() {
                shared.reset_timeout_elapsed(generation);
            }
        });
    }

    fn reset_timeout_elapsed(&self, generation: u64) {
        let mut state = self.state.lock();
        if state.state == CircuitState::Open && state.generation == generation {
            self.transition(&mut state, CircuitState::HalfOpen, Instant::now());
        }
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.shared.name)
            .field("state", &self.state())
            .field("call_timeout", &self.shared.call_timeout)
            .field("reset_timeout", &self.shared.reset_timeout)
            .field("error_threshold_percentage", &self.shared.error_threshold_percentage)
            .finish()
    }
}
