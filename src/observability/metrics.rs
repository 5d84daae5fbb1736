//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define email dispatch metrics (outcomes, latency, breaker state)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `email_send_total` (counter): logical sends by status, provider
//! - `email_send_duration_seconds` (histogram): time per logical send, retries included
//! - `email_circuit_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `email_send_attempts_total` (counter): individual attempts by result, provider
//!
//! # Design Decisions
//! - Handles are resolved once per provider; recording is an atomic update
//! - Recording never fails and never blocks the send path
//! - Histogram buckets start at 1ms and grow by 1.5x

use std::time::Instant;

use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics::{Counter, Gauge, Histogram};
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::resilience::circuit_breaker::{BreakerObserver, CallError, CircuitState, Transition};

pub const EMAIL_SEND_TOTAL: &str = "email_send_total";
pub const EMAIL_SEND_DURATION: &str = "email_send_duration_seconds";
pub const EMAIL_BREAKER_STATE: &str = "email_circuit_breaker_state";
pub const EMAIL_SEND_ATTEMPTS: &str = "email_send_attempts_total";

/// Exponential histogram buckets: 0.001 × 1.5^i for i in 0..10.
pub fn duration_buckets() -> Vec<f64> {
    (0..10).map(|i| 0.001 * 1.5f64.powi(i)).collect()
}

/// Prometheus builder with this crate's bucket layout.
pub fn prometheus_builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(EMAIL_SEND_DURATION.to_string()), &duration_buckets())
}

/// Install the global Prometheus recorder and return a handle for rendering.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = prometheus_builder()?.install_recorder()?;
    describe_metrics();
    Ok(handle)
}

/// Register help text with the installed recorder.
pub fn describe_metrics() {
    metrics::describe_counter!(EMAIL_SEND_TOTAL, "Total number of email send attempts");
    metrics::describe_histogram!(
        EMAIL_SEND_DURATION,
        metrics::Unit::Seconds,
        "Duration of email send operations in seconds"
    );
    metrics::describe_gauge!(
        EMAIL_BREAKER_STATE,
        "Current state of the email service circuit breaker (0=closed, 1=half-open, 2=open)"
    );
    metrics::describe_counter!(EMAIL_SEND_ATTEMPTS, "Individual provider call attempts by result");
}

/// Router serving `GET /metrics` in the Prometheus text format.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(handle)
        .layer(TraceLayer::new_for_http())
}

async fn render_metrics(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
}

/// Serve the metrics endpoint until the listener fails.
pub async fn serve_metrics(listener: TcpListener, handle: PrometheusHandle) -> std::io::Result<()> {
    tracing::info!(address = ?listener.local_addr().ok(), "Metrics endpoint listening");
    axum::serve(listener, metrics_router(handle)).await
}

/// Terminal outcome of one logical send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    Success,
    Failure,
}

/// Result of one provider call attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    Failure,
    Timeout,
    Rejected,
}

impl AttemptOutcome {
    pub fn of<T, E>(result: &Result<T, CallError<E>>) -> Self {
        match result {
            Ok(_) => AttemptOutcome::Success,
            Err(CallError::Failed(_)) => AttemptOutcome::Failure,
            Err(CallError::Timeout(_)) => AttemptOutcome::Timeout,
            Err(CallError::Open) => AttemptOutcome::Rejected,
        }
    }
}

/// Per-provider metric handles.
#[derive(Clone)]
pub struct MetricsRecorder {
    provider: &'static str,
    success: Counter,
    failure: Counter,
    duration: Histogram,
    breaker_state: Gauge,
    attempts: [Counter; 4],
}

impl MetricsRecorder {
    /// Resolve handles against the current recorder and mark the breaker closed.
    pub fn new(provider: &'static str) -> Self {
        let attempt = |result: &'static str| {
            metrics::counter!(EMAIL_SEND_ATTEMPTS, "result" => result, "provider" => provider)
        };
        let recorder = Self {
            provider,
            success: metrics::counter!(EMAIL_SEND_TOTAL, "status" => "success", "provider" => provider),
            failure: metrics::counter!(EMAIL_SEND_TOTAL, "status" => "failure", "provider" => provider),
            duration: metrics::histogram!(EMAIL_SEND_DURATION, "provider" => provider),
            breaker_state: metrics::gauge!(EMAIL_BREAKER_STATE, "provider" => provider),
            attempts: [
                attempt("success"),
                attempt("failure"),
                attempt("timeout"),
                attempt("rejected"),
            ],
        };
        recorder.set_breaker_state(CircuitState::Closed);
        recorder
    }

    pub fn provider(&self) -> &'static str {
        self.provider
    }

    /// Start timing a logical send.
    pub fn start_timer(&self) -> SendTimer<'_> {
        SendTimer {
            recorder: self,
            started: Instant::now(),
        }
    }

    pub fn record_attempt(&self, outcome: AttemptOutcome) {
        let index = match outcome {
            AttemptOutcome::Success => 0,
            AttemptOutcome::Failure => 1,
            AttemptOutcome::Timeout => 2,
            AttemptOutcome::Rejected => 3,
        };
        self.attempts[index].increment(1);
    }

    pub fn set_breaker_state(&self, state: CircuitState) {
        self.breaker_state.set(state.as_metric_value());
    }
}

impl BreakerObserver for MetricsRecorder {
    fn on_transition(&self, _breaker: &str, transition: Transition) {
        self.set_breaker_state(transition.to);
    }
}

impl std::fmt::Debug for MetricsRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetricsRecorder")
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// Running duration timer for one logical send.
#[must_use = "a timer records nothing until finished"]
pub struct SendTimer<'a> {
    recorder: &'a MetricsRecorder,
    started: Instant,
}

impl SendTimer<'_> {
    /// Stop the timer and count the outcome.
    pub fn finish(self, outcome: SendOutcome) {
        self.recorder.duration.record(self.started.elapsed().as_secs_f64());
        match outcome {
            SendOutcome::Success => self.recorder.success.increment(1),
            SendOutcome::Failure => self.recorder.failure.increment(1),
        }
    }
}
