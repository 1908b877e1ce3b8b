//! Run correlation: folds log events into the build/promote workflow state.
//!
//! Two message conventions drive the workflow, matched literally against
//! the start of a log message:
//!
//! - `Site built … → <path>`: a build finished; the run id is the last
//!   directory component of `<path>`.
//! - `Promoted <run_id> …`: `<run_id>` now serves production.
//!
//! The matching rules are coupled to the producers' message text by
//! convention only. Changing either side changes what the console shows.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::StaleCorrelationSignal;
use crate::event::LogEvent;

/// Leading text of a build-complete message
pub const BUILD_COMPLETE_MARKER: &str = "Site built";
/// Separates the build-complete marker from the output path
pub const BUILD_PATH_DELIMITER: &str = "→";
/// Leading text of a promotion message, directly followed by the run id
pub const PROMOTED_MARKER: &str = "Promoted ";

static BUILD_COMPLETE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Site built\b[^→]*→\s*(\S+)").expect("build-complete pattern is valid")
});

static PROMOTED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Promoted (\S+)").expect("promotion pattern is valid"));

/// Identifier of one completed build
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub String);

impl RunId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        RunId(s.to_string())
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        RunId(s)
    }
}

impl std::fmt::Display for RunId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Workflow state of one console session.
///
/// Invariant: `promoted_run_id`, when set, equals a run that was observed as
/// `latest_run_id` earlier in the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunState {
    pub latest_run_id: Option<RunId>,
    pub promoted_run_id: Option<RunId>,
}

impl RunState {
    pub fn can_deploy(&self) -> bool {
        can_deploy(self)
    }

    pub fn is_promoted(&self, run_id: &RunId) -> bool {
        is_promoted(run_id, self)
    }
}

/// A workflow-relevant message recognised in a log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowSignal {
    BuildComplete(RunId),
    Promoted(RunId),
}

/// What applying one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The message matched neither convention
    Unmatched,
    BuildCompleted(RunId),
    Promoted(RunId),
    /// A promotion for a run that is not the latest; ignored
    StalePromotion(StaleCorrelationSignal),
}

/// Result of [`apply`]: the next state and what happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub state: RunState,
    pub outcome: Outcome,
}

/// Recognise the workflow convention a message follows, if any.
pub fn classify(message: &str) -> Option<WorkflowSignal> {
    if let Some(caps) = BUILD_COMPLETE_REGEX.captures(message) {
        return run_id_from_path(&caps[1]).map(WorkflowSignal::BuildComplete);
    }
    PROMOTED_REGEX
        .captures(message)
        .map(|caps| WorkflowSignal::Promoted(RunId::from(&caps[1])))
}

/// Extract the run id from a build output path.
///
/// The run id is the final path component, or its parent when the final
/// component is a file name (`/app/output/run-42/index.html` → `run-42`).
pub fn run_id_from_path(path: &str) -> Option<RunId> {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let run_id = match segments.as_slice() {
        [] => return None,
        [.., parent, file] if file.contains('.') => parent,
        [.., last] => last,
    };
    Some(RunId::from(*run_id))
}

/// Apply one log event to the workflow state.
pub fn apply(state: RunState, event: &LogEvent) -> Transition {
    match classify(&event.message) {
        None => Transition {
            state,
            outcome: Outcome::Unmatched,
        },
        Some(WorkflowSignal::BuildComplete(run_id)) => Transition {
            state: RunState {
                latest_run_id: Some(run_id.clone()),
                promoted_run_id: None,
            },
            outcome: Outcome::BuildCompleted(run_id),
        },
        Some(WorkflowSignal::Promoted(run_id)) => {
            if state.latest_run_id.as_ref() == Some(&run_id) {
                Transition {
                    state: RunState {
                        latest_run_id: state.latest_run_id,
                        promoted_run_id: Some(run_id.clone()),
                    },
                    outcome: Outcome::Promoted(run_id),
                }
            } else {
                let signal = StaleCorrelationSignal {
                    run_id,
                    latest_run_id: state.latest_run_id.clone(),
                };
                Transition {
                    state,
                    outcome: Outcome::StalePromotion(signal),
                }
            }
        }
    }
}

/// Deploy is offered once a run is built and it is not already promoted.
pub fn can_deploy(state: &RunState) -> bool {
    match &state.latest_run_id {
        Some(latest) => state.promoted_run_id.as_ref() != Some(latest),
        None => false,
    }
}

pub fn is_promoted(run_id: &RunId, state: &RunState) -> bool {
    state.promoted_run_id.as_ref() == Some(run_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Severity;

    fn event(msg: &str) -> LogEvent {
        LogEvent::new(Severity::Info, "web_builder", msg)
    }

    fn built(run: &str) -> LogEvent {
        event(&format!(
            "Site built and staged → /app/output/{run} (and archived at /runs/{run}/site.tar.gz)"
        ))
    }

    fn promoted(run: &str) -> LogEvent {
        event(&format!("Promoted {run} → prod"))
    }

    #[test]
    fn classify_build_message_from_web_builder() {
        assert_eq!(
            classify("Site built and staged → /app/output/2025-06-20_01J0ABC (and archived at /runs/x/site.tar.gz)"),
            Some(WorkflowSignal::BuildComplete(RunId::from("2025-06-20_01J0ABC")))
        );
    }

    #[test]
    fn classify_build_message_with_file_path() {
        assert_eq!(
            classify("Site built → /app/output/run-42/index.html"),
            Some(WorkflowSignal::BuildComplete(RunId::from("run-42")))
        );
    }

    #[test]
    fn classify_build_message_with_trailing_slash() {
        assert_eq!(
            classify("Site built → /app/output/run-7/"),
            Some(WorkflowSignal::BuildComplete(RunId::from("run-7")))
        );
    }

    #[test]
    fn classify_promotion_message() {
        assert_eq!(
            classify("Promoted run-42"),
            Some(WorkflowSignal::Promoted(RunId::from("run-42")))
        );
        assert_eq!(
            classify("Promoted run-42 → prod"),
            Some(WorkflowSignal::Promoted(RunId::from("run-42")))
        );
    }

    #[test]
    fn markers_must_lead_the_message() {
        assert_eq!(classify("Note: Site built → /app/output/run-1"), None);
        assert_eq!(classify("Run was Promoted run-1"), None);
        assert_eq!(classify("Site built without a path"), None);
        assert_eq!(classify("Promoted"), None);
    }

    #[test]
    fn unmatched_event_leaves_state_unchanged() {
        let state = RunState {
            latest_run_id: Some(RunId::from("run-1")),
            promoted_run_id: None,
        };
        for msg in [
            "Starting web builder",
            "Generating static HTML files...",
            "Deleted staging run run-1",
            "",
        ] {
            let t = apply(state.clone(), &event(msg));
            assert_eq!(t.state, state);
            assert_eq!(t.outcome, Outcome::Unmatched);
        }
    }

    #[test]
    fn build_then_promote_same_run_hides_deploy() {
        let t = apply(RunState::default(), &built("run-42"));
        assert!(t.state.can_deploy());

        let t = apply(t.state, &promoted("run-42"));
        assert_eq!(t.outcome, Outcome::Promoted(RunId::from("run-42")));
        assert_eq!(t.state.promoted_run_id, Some(RunId::from("run-42")));
        assert!(!can_deploy(&t.state));
        assert!(is_promoted(&RunId::from("run-42"), &t.state));
    }

    #[test]
    fn promotion_of_other_run_is_stale() {
        let state = apply(RunState::default(), &built("run-2")).state;

        let t = apply(state.clone(), &promoted("run-1"));
        assert_eq!(t.state, state);
        assert!(t.state.can_deploy());
        match t.outcome {
            Outcome::StalePromotion(signal) => {
                assert_eq!(signal.run_id, RunId::from("run-1"));
                assert_eq!(signal.latest_run_id, Some(RunId::from("run-2")));
            }
            other => panic!("expected stale promotion, got {other:?}"),
        }
    }

    #[test]
    fn stale_promotion_keeps_existing_promotion() {
        let mut state = apply(RunState::default(), &built("run-3")).state;
        state = apply(state, &promoted("run-3")).state;

        let t = apply(state.clone(), &promoted("run-9"));
        assert_eq!(t.state, state);
        assert!(!t.state.can_deploy());
    }

    #[test]
    fn stale_promotion_twice_is_noop_both_times() {
        let state = RunState::default();
        let first = apply(state.clone(), &promoted("run-99"));
        let second = apply(first.state.clone(), &promoted("run-99"));
        assert_eq!(first.state, state);
        assert_eq!(second.state, state);
        assert!(matches!(second.outcome, Outcome::StalePromotion(_)));
    }

    #[test]
    fn new_build_resets_promotion() {
        let mut state = apply(RunState::default(), &built("run-1")).state;
        state = apply(state, &promoted("run-1")).state;
        assert!(!state.can_deploy());

        let t = apply(state, &built("run-2"));
        assert_eq!(t.state.latest_run_id, Some(RunId::from("run-2")));
        assert_eq!(t.state.promoted_run_id, None);
        assert!(t.state.can_deploy());
    }

    #[test]
    fn repeated_build_event_is_idempotent() {
        let once = apply(RunState::default(), &built("run-5")).state;
        let twice = apply(once.clone(), &built("run-5")).state;
        assert_eq!(once, twice);
    }

    #[test]
    fn unrelated_events_do_not_disturb_stale_handling() {
        let state = apply(RunState::default(), &built("run-2")).state;
        let a = apply(apply(state.clone(), &event("noise")).state, &promoted("run-1")).state;
        let b = apply(apply(state.clone(), &promoted("run-1")).state, &event("noise")).state;
        assert_eq!(a, state);
        assert_eq!(b, state);
    }

    #[test]
    fn can_deploy_requires_a_build() {
        assert!(!can_deploy(&RunState::default()));
    }

    #[test]
    fn run_id_from_path_handles_edge_cases() {
        assert_eq!(run_id_from_path(""), None);
        assert_eq!(run_id_from_path("/"), None);
        assert_eq!(run_id_from_path("run-1"), Some(RunId::from("run-1")));
        assert_eq!(run_id_from_path("index.html"), Some(RunId::from("index.html")));
    }
}
