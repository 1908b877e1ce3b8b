//! Structured observability hooks for the console session lifecycle.
//!
//! Every function emits one `tracing` event with a stable `event` field so
//! JSON logs can be filtered by lifecycle step.

use tracing::{debug, info, warn};

/// Span covering one console session, tagged with its consumer group.
///
/// Attach it to the poll loop future with `Instrument::instrument`.
pub fn session_span(group: &str) -> tracing::Span {
    tracing::info_span!("ctlpanel.session", group = %group)
}

pub fn emit_session_started(group: &str, base_uri: &str) {
    info!(event = "session.started", group = %group, base_uri = %base_uri);
}

pub fn emit_session_start_failed(group: &str, error: &dyn std::fmt::Display) {
    warn!(event = "session.start_failed", group = %group, error = %error);
}

/// Emit event: teardown attempted; `released` is false when the DELETE failed.
pub fn emit_session_teardown(base_uri: &str, released: bool) {
    info!(event = "session.teardown", base_uri = %base_uri, released = released);
}

pub fn emit_batch_processed(records: usize, forwarded: usize, decode_failures: usize) {
    debug!(
        event = "poll.batch",
        records = records,
        forwarded = forwarded,
        decode_failures = decode_failures,
    );
}

pub fn emit_fetch_failed(error: &dyn std::fmt::Display) {
    warn!(event = "poll.fetch_failed", error = %error);
}

pub fn emit_decode_failed(partition: i32, offset: i64, error: &dyn std::fmt::Display) {
    warn!(
        event = "record.decode_failed",
        partition = partition,
        offset = offset,
        error = %error,
    );
}

pub fn emit_stale_signal(run_id: &str, latest_run_id: Option<&str>) {
    warn!(
        event = "correlation.stale_signal",
        run_id = %run_id,
        latest_run_id = latest_run_id.unwrap_or("none"),
    );
}

pub fn emit_run_built(run_id: &str) {
    info!(event = "correlation.run_built", run_id = %run_id);
}

pub fn emit_run_promoted(run_id: &str) {
    info!(event = "correlation.run_promoted", run_id = %run_id);
}

pub fn emit_command_published(topic: &str, command: &str) {
    info!(event = "command.published", topic = %topic, command = %command);
}

pub fn emit_command_failed(topic: &str, command: &str, error: &dyn std::fmt::Display) {
    warn!(event = "command.failed", topic = %topic, command = %command, error = %error);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Instrument;
    use tracing_test::traced_test;

    #[traced_test]
    #[test]
    fn session_events_carry_event_field() {
        emit_session_started("cp-panel-abc123", "http://proxy/consumers/g/instances/i");
        emit_session_teardown("http://proxy/consumers/g/instances/i", false);

        assert!(logs_contain("session.started"));
        assert!(logs_contain("cp-panel-abc123"));
        assert!(logs_contain("released=false"));
    }

    #[traced_test]
    #[test]
    fn stale_signal_without_latest_reports_none() {
        emit_stale_signal("run-99", None);
        assert!(logs_contain("correlation.stale_signal"));
        assert!(logs_contain("none"));
    }

    #[traced_test]
    #[tokio::test]
    async fn session_span_tags_group() {
        async { emit_fetch_failed(&"connection refused") }
            .instrument(session_span("cp-panel-span01"))
            .await;

        assert!(logs_contain("ctlpanel.session"));
        assert!(logs_contain("cp-panel-span01"));
        assert!(logs_contain("poll.fetch_failed"));
    }
}
