//! The log poll loop.
//!
//! One cycle fetches the records available to the session's consumer,
//! decodes them in order, applies each to the workflow state and forwards
//! the results to the [`ConsoleSink`]. Cycles repeat at a fixed interval
//! until the cancellation token fires, after which the consumer is released.

use std::sync::Arc;
use std::time::Duration;

use ctlpanel_broker::{BrokerGateway, RecordEnvelope};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument};

use crate::consumer::ConsumerSessionManager;
use crate::correlation::{apply, Outcome, RunState};
use crate::decoder::decode_record;
use crate::error::SessionError;
use crate::metrics::METRICS;
use crate::obs;
use crate::sink::{ConsoleSink, Notice, WorkflowView};

/// Whether the loop has a live consumer yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Polling,
}

/// Counts for one fetch-and-process cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub forwarded: usize,
    pub decode_failures: usize,
    pub fetch_failed: bool,
}

pub struct PollLoop<B: ?Sized, S> {
    sessions: Arc<ConsumerSessionManager<B>>,
    broker: Arc<B>,
    sink: S,
    state: RunState,
    state_tx: Arc<watch::Sender<RunState>>,
    interval: Duration,
    site_url: Option<String>,
    phase: LoopState,
}

impl<B, S> PollLoop<B, S>
where
    B: BrokerGateway + ?Sized,
    S: ConsoleSink,
{
    pub fn new(
        sessions: Arc<ConsumerSessionManager<B>>,
        broker: Arc<B>,
        sink: S,
        state_tx: Arc<watch::Sender<RunState>>,
        interval: Duration,
        site_url: Option<String>,
    ) -> Self {
        let state = state_tx.borrow().clone();
        Self {
            sessions,
            broker,
            sink,
            state,
            state_tx,
            interval,
            site_url,
            phase: LoopState::Idle,
        }
    }

    pub fn phase(&self) -> LoopState {
        self.phase
    }

    pub fn state(&self) -> &RunState {
        &self.state
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Poll until `cancel` fires, then release the consumer.
    ///
    /// Returns an error, with the loop still `Idle`, when the consumer cannot
    /// be set up; the caller may call `run` again to retry. Fetch failures
    /// after startup are reported to the sink and polling continues.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        let span = obs::session_span(&self.sessions.identity().group);
        self.run_until_cancelled(cancel).instrument(span).await
    }

    async fn run_until_cancelled(&mut self, cancel: &CancellationToken) -> Result<(), SessionError> {
        loop {
            if cancel.is_cancelled() {
                break;
            }

            match self.run_cycle().await {
                Ok(_) => {}
                Err(SessionError::Closed) => break,
                Err(e) => return Err(e),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.sessions.teardown().await;
        METRICS.flush();
        Ok(())
    }

    /// Run a single cycle, setting up the consumer first if needed.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, SessionError> {
        let handle = self.sessions.ensure_session().await?;
        if self.phase == LoopState::Idle {
            self.phase = LoopState::Polling;
            self.sink.notice(&Notice::SessionStarted {
                group: handle.group.clone(),
                base_uri: handle.base_uri.clone(),
            });
        }

        METRICS.inc_poll_cycles();
        let records = match self.broker.fetch_records(&handle.base_uri).await {
            Ok(records) => records,
            Err(e) => {
                METRICS.inc_fetch_failures();
                obs::emit_fetch_failed(&e);
                self.sink.notice(&Notice::FetchFailed(e));
                return Ok(CycleReport {
                    fetch_failed: true,
                    ..CycleReport::default()
                });
            }
        };

        let mut report = CycleReport {
            fetched: records.len(),
            ..CycleReport::default()
        };
        for record in &records {
            if self.process_record(record) {
                report.forwarded += 1;
            } else {
                report.decode_failures += 1;
            }
        }

        obs::emit_batch_processed(report.fetched, report.forwarded, report.decode_failures);
        Ok(report)
    }

    /// Returns `false` when the record could not be decoded.
    fn process_record(&mut self, record: &RecordEnvelope) -> bool {
        let event = match decode_record(record) {
            Ok(event) => event,
            Err(error) => {
                METRICS.inc_decode_failures();
                obs::emit_decode_failed(record.partition, record.offset, &error);
                self.sink.notice(&Notice::DecodeFailed {
                    partition: record.partition,
                    offset: record.offset,
                    error,
                });
                return false;
            }
        };
        METRICS.inc_records_decoded();

        let transition = apply(self.state.clone(), &event);
        self.sink.log_event(&event, &transition.state);

        match transition.outcome {
            Outcome::Unmatched => {}
            Outcome::BuildCompleted(run_id) => obs::emit_run_built(run_id.as_str()),
            Outcome::Promoted(run_id) => obs::emit_run_promoted(run_id.as_str()),
            Outcome::StalePromotion(signal) => {
                obs::emit_stale_signal(
                    signal.run_id.as_str(),
                    signal.latest_run_id.as_ref().map(|r| r.as_str()),
                );
                self.sink.notice(&Notice::StalePromotion(signal));
            }
        }

        if transition.state != self.state {
            debug!(state = ?transition.state, "workflow state changed");
            self.state = transition.state;
            self.state_tx.send_replace(self.state.clone());
            let view = WorkflowView::from_state(&self.state, self.site_url.as_deref());
            self.sink.workflow_changed(&view);
        }
        true
    }
}
