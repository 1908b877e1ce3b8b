//! Presentation sink: where the session sends what the operator sees.
//!
//! The poll loop never formats output itself. It hands decoded events,
//! anomaly notices and workflow changes to a [`ConsoleSink`].

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ctlpanel_broker::TransportError;
use serde::{Deserialize, Serialize};

use crate::correlation::{can_deploy, RunId, RunState};
use crate::error::{DecodeError, StaleCorrelationSignal};
use crate::event::LogEvent;

/// Something the operator should see that is not an application log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    SessionStarted { group: String, base_uri: String },
    DecodeFailed {
        partition: i32,
        offset: i64,
        error: DecodeError,
    },
    StalePromotion(StaleCorrelationSignal),
    FetchFailed(TransportError),
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::SessionStarted { group, .. } => {
                write!(f, "tailing logs as consumer group {}", group)
            }
            Notice::DecodeFailed {
                partition,
                offset,
                error,
            } => write!(
                f,
                "skipped record {}@{}: {}",
                partition, offset, error
            ),
            Notice::StalePromotion(signal) => write!(f, "ignored {}", signal),
            Notice::FetchFailed(error) => write!(f, "log poll failed: {}", error),
        }
    }
}

/// Structured workflow notification: which affordances to show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowView {
    pub latest_run_id: Option<RunId>,
    pub promoted_run_id: Option<RunId>,
    /// The deploy action is offered
    pub deploy_available: bool,
    /// The latest run is the one in production
    pub promoted_visible: bool,
    /// Staging preview of the latest run
    pub preview_url: Option<String>,
    pub production_url: Option<String>,
}

impl WorkflowView {
    pub fn from_state(state: &RunState, site_url: Option<&str>) -> Self {
        let site = site_url.map(|s| s.trim_end_matches('/'));
        let promoted_visible = match (&state.latest_run_id, &state.promoted_run_id) {
            (Some(latest), Some(promoted)) => latest == promoted,
            _ => false,
        };

        WorkflowView {
            latest_run_id: state.latest_run_id.clone(),
            promoted_run_id: state.promoted_run_id.clone(),
            deploy_available: can_deploy(state),
            promoted_visible,
            preview_url: match (site, &state.latest_run_id) {
                (Some(site), Some(run)) => Some(format!("{}/staging/{}/", site, run)),
                _ => None,
            },
            production_url: site.map(|s| format!("{}/", s)),
        }
    }
}

/// Receiver of everything the session wants displayed.
pub trait ConsoleSink: Send {
    /// A decoded log line, with the workflow state after applying it.
    fn log_event(&mut self, event: &LogEvent, state: &RunState);

    fn notice(&mut self, notice: &Notice);

    /// Called only when the workflow state actually changed.
    fn workflow_changed(&mut self, view: &WorkflowView);
}

/// One call received by [`RecordingSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEntry {
    Event { event: LogEvent, state: RunState },
    Notice(Notice),
    Workflow(WorkflowView),
}

/// Sink that keeps every call in memory. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    entries: Arc<Mutex<Vec<SinkEntry>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SinkEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn entries(&self) -> Vec<SinkEntry> {
        self.lock().clone()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Event { event, .. } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Notice(n) => Some(n.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn views(&self) -> Vec<WorkflowView> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEntry::Workflow(v) => Some(v.clone()),
                _ => None,
            })
            .collect()
    }
}

impl ConsoleSink for RecordingSink {
    fn log_event(&mut self, event: &LogEvent, state: &RunState) {
        self.lock().push(SinkEntry::Event {
            event: event.clone(),
            state: state.clone(),
        });
    }

    fn notice(&mut self, notice: &Notice) {
        self.lock().push(SinkEntry::Notice(notice.clone()));
    }

    fn workflow_changed(&mut self, view: &WorkflowView) {
        self.lock().push(SinkEntry::Workflow(view.clone()));
    }
}
