//! Error taxonomy for the console core.
//!
//! Record- and cycle-local failures (`DecodeError`, fetch-time
//! `TransportError`s, `StaleCorrelationSignal`) are reported and skipped by
//! the poll loop. `SessionError` ends a startup attempt and `PublishError`
//! ends a single operator action.

use ctlpanel_broker::TransportError;

use crate::correlation::RunId;

/// A record whose value could not be turned into a `LogEvent`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("record has no value")]
    MissingValue,

    #[error("record value is not valid base64: {0}")]
    Base64(String),

    #[error("record value is not UTF-8 text: {0}")]
    Utf8(String),

    #[error("record value is not a log payload: {0}")]
    Payload(String),
}

/// A promotion event naming a run other than the latest one observed.
///
/// Reported as a warning; never applied to `RunState`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stale promotion signal for {run_id} (latest run: {})", latest_display(.latest_run_id))]
pub struct StaleCorrelationSignal {
    pub run_id: RunId,
    pub latest_run_id: Option<RunId>,
}

fn latest_display(latest: &Option<RunId>) -> String {
    latest
        .as_ref()
        .map(|r| r.to_string())
        .unwrap_or_else(|| "none".to_string())
}

/// Failures of the one-time consumer setup sequence.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("could not create consumer instance: {0}")]
    CreateConsumer(#[source] TransportError),

    #[error("could not subscribe consumer to log topic: {0}")]
    Subscribe(#[source] TransportError),

    #[error("session is closed")]
    Closed,
}

/// Failures of an operator-triggered command.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("invalid build date '{date}': expected YYYY-MM-DD")]
    InvalidDate { date: String },

    #[error("run id must not be empty")]
    EmptyRunId,

    #[error("deploy is not available: {0}")]
    DeployUnavailable(String),

    #[error("broker rejected command on {topic} (HTTP {status}): {detail}")]
    Rejected {
        topic: String,
        status: u16,
        detail: String,
    },

    #[error("could not send command on {topic}: {source}")]
    Transport {
        topic: String,
        #[source]
        source: TransportError,
    },
}

impl PublishError {
    pub(crate) fn from_transport(topic: &str, err: TransportError) -> Self {
        match err {
            TransportError::Status { status, body, .. } => PublishError::Rejected {
                topic: topic.to_string(),
                status,
                detail: body,
            },
            other => PublishError::Transport {
                topic: topic.to_string(),
                source: other,
            },
        }
    }
}

/// Umbrella error for callers that drive a whole console.
#[derive(Debug, thiserror::Error)]
pub enum CtlpanelError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Publish(#[from] PublishError),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result type for console operations.
pub type Result<T> = std::result::Result<T, CtlpanelError>;
