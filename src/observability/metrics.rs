//! Metrics collection.
//!
//! Prometheus-compatible counters and gauges for sessions, answers, reflex
//! rounds and timeouts. Every label value comes from a closed enum, so label
//! cardinality is bounded without sanitizing.

use std::sync::atomic::{AtomicBool, Ordering};

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::ScamDrillError;

/// Guard to prevent double-initialization of the metrics recorder.
static METRICS_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Initializes the global metrics recorder.
///
/// When `port` is `Some`, a Prometheus HTTP listener is started on
/// `127.0.0.1:<port>`. When `None`, the recorder is installed without an
/// HTTP endpoint.
///
/// # Errors
///
/// Returns `ScamDrillError::Io` if the recorder or HTTP listener cannot be
/// installed (e.g. port already in use).
pub fn init_metrics(port: Option<u16>) -> Result<(), ScamDrillError> {
    if METRICS_INITIALIZED.swap(true, Ordering::SeqCst) {
        tracing::debug!("metrics already initialized, skipping");
        return Ok(());
    }
    port.map_or_else(
        || PrometheusBuilder::new().install_recorder().map(|_| ()),
        |p| {
            PrometheusBuilder::new()
                .with_http_listener(([127, 0, 0, 1], p))
                .install()
        },
    )
    .map_err(|e| ScamDrillError::Io(std::io::Error::other(e.to_string())))?;

    describe_metrics();
    Ok(())
}

/// Registers metric descriptions with the global recorder.
fn describe_metrics() {
    describe_counter!(
        "scamdrill_sessions_started_total",
        "Total number of sessions started"
    );
    describe_counter!(
        "scamdrill_answers_total",
        "Answers judged, by outcome"
    );
    describe_counter!(
        "scamdrill_reflex_total",
        "Reflex rounds resolved, by outcome"
    );
    describe_counter!(
        "scamdrill_timeouts_total",
        "Countdown expiries, by timer"
    );
    describe_counter!(
        "scamdrill_sessions_finished_total",
        "Sessions finished, by final status"
    );
    describe_counter!(
        "scamdrill_score_submissions_total",
        "Score submissions, by result"
    );
    describe_gauge!("scamdrill_current_level", "Level of the live session");
    describe_gauge!("scamdrill_current_hp", "HP of the live session");
}

/// Records a session start.
pub fn record_session_started() {
    counter!("scamdrill_sessions_started_total").increment(1);
}

/// Records a judged answer.
pub fn record_answer(correct: bool) {
    let outcome = if correct { "correct" } else { "wrong" };
    counter!("scamdrill_answers_total", "outcome" => outcome).increment(1);
}

/// Records a resolved reflex round (`"cleared"`, `"failed"` or `"lost"`).
pub fn record_reflex(outcome: &'static str) {
    counter!("scamdrill_reflex_total", "outcome" => outcome).increment(1);
}

/// Records an expired countdown (`"decision"` or `"reflex"`).
pub fn record_timeout(timer: &'static str) {
    counter!("scamdrill_timeouts_total", "timer" => timer).increment(1);
}

/// Records a finished session by its final status.
pub fn record_session_finished(status: &'static str) {
    counter!("scamdrill_sessions_finished_total", "status" => status).increment(1);
}

/// Records a score submission attempt.
pub fn record_score_submission(accepted: bool) {
    let result = if accepted { "accepted" } else { "failed" };
    counter!("scamdrill_score_submissions_total", "result" => result).increment(1);
}

/// Updates the live-session gauges.
pub fn set_progress(level: u32, hp: u32) {
    gauge!("scamdrill_current_level").set(f64::from(level));
    gauge!("scamdrill_current_hp").set(f64::from(hp));
}
