//! ctlpanel-core: session logic of the pipeline operator console
//!
//! Tails the shared application log topic through a session-scoped consumer,
//! correlates build and promotion messages into a workflow state, and
//! publishes operator commands.
//!
//! ## Key Components
//!
//! - `Session`: wiring for one console session
//! - `PollLoop`: fetch, decode, correlate and forward on a fixed interval
//! - `ConsumerSessionManager`: create-once, delete-once consumer lifecycle
//! - `CommandPublisher`: build, deploy and clean commands
//! - `correlation`: pure workflow state transitions

pub mod config;
pub mod consumer;
pub mod correlation;
pub mod decoder;
pub mod error;
pub mod event;
pub mod metrics;
pub mod obs;
pub mod poll_loop;
pub mod publisher;
pub mod session;
pub mod sink;
pub mod telemetry;

pub use config::{CommandTopics, ConsoleConfig};
pub use consumer::{ConsumerHandle, ConsumerSessionManager, SessionIdentity};
pub use correlation::{apply, can_deploy, is_promoted, Outcome, RunId, RunState, Transition};
pub use decoder::{decode_payload, decode_record};
pub use error::{
    CtlpanelError, DecodeError, PublishError, Result, SessionError, StaleCorrelationSignal,
};
pub use event::{LogEvent, Severity};
pub use poll_loop::{CycleReport, LoopState, PollLoop};
pub use publisher::{BuildCommand, CleanCommand, CommandPublisher, DeployCommand, DeployTarget};
pub use session::Session;
pub use sink::{ConsoleSink, Notice, RecordingSink, SinkEntry, WorkflowView};
