//! Command publishing: operator actions as single Avro records.
//!
//! Each command is one `POST /topics/{topic}` carrying its value schema
//! inline. Failures are returned to the caller as-is; nothing is retried.

use std::sync::Arc;

use chrono::NaiveDate;
use ctlpanel_broker::{BrokerGateway, ProduceRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::config::{CommandTopics, ConsoleConfig};
use crate::correlation::{can_deploy, RunId, RunState};
use crate::error::PublishError;
use crate::metrics::METRICS;
use crate::obs;

pub const BUILD_SCHEMA: &str = r#"{"type":"record","name":"Cmd","fields":[{"name":"date","type":"string"},{"name":"collection","type":"string"}]}"#;

pub const DEPLOY_SCHEMA: &str = r#"{"type":"record","name":"DeployCmd","fields":[{"name":"run_id","type":"string"},{"name":"target","type":{"type":"enum","name":"Stage","symbols":["prod","staging"]},"default":"prod"}]}"#;

pub const CLEAN_SCHEMA: &str = r#"{"type":"record","name":"CleanCmd","fields":[{"name":"run_id","type":"string"}]}"#;

/// Where a deploy command sends a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployTarget {
    #[default]
    Prod,
    Staging,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildCommand {
    pub date: String,
    pub collection: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployCommand {
    pub run_id: String,
    pub target: DeployTarget,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanCommand {
    pub run_id: String,
}

/// Publishes build, deploy and clean commands.
///
/// Deploy eligibility is read from the session's workflow state; the
/// publisher never changes that state.
pub struct CommandPublisher<B: ?Sized> {
    broker: Arc<B>,
    topics: CommandTopics,
    collection: String,
    state: watch::Receiver<RunState>,
}

impl<B> CommandPublisher<B>
where
    B: BrokerGateway + ?Sized,
{
    pub fn new(broker: Arc<B>, config: &ConsoleConfig, state: watch::Receiver<RunState>) -> Self {
        Self {
            broker,
            topics: config.topics.clone(),
            collection: config.collection.clone(),
            state,
        }
    }

    /// Current workflow state as last published by the poll loop.
    pub fn state(&self) -> RunState {
        self.state.borrow().clone()
    }

    /// Ask the pipeline to build the collection for `date` (`YYYY-MM-DD`).
    pub async fn publish_build(&self, date: &str) -> Result<BuildCommand, PublishError> {
        let date = date.trim();
        NaiveDate::parse_from_str(date, "%Y-%m-%d").map_err(|_| PublishError::InvalidDate {
            date: date.to_string(),
        })?;

        let command = BuildCommand {
            date: date.to_string(),
            collection: self.collection.clone(),
        };
        self.send(&self.topics.build, "build", BUILD_SCHEMA, &command)
            .await?;
        Ok(command)
    }

    /// Promote `run_id` to production.
    ///
    /// Rejected without a network call unless deploy is currently offered.
    pub async fn publish_deploy(&self, run_id: &RunId) -> Result<DeployCommand, PublishError> {
        self.publish_deploy_to(run_id, DeployTarget::Prod).await
    }

    pub async fn publish_deploy_to(
        &self,
        run_id: &RunId,
        target: DeployTarget,
    ) -> Result<DeployCommand, PublishError> {
        if run_id.as_str().trim().is_empty() {
            return Err(PublishError::EmptyRunId);
        }
        let state = self.state();
        if !can_deploy(&state) {
            let reason = match &state.latest_run_id {
                None => "no completed build observed yet".to_string(),
                Some(latest) => format!("run {} is already promoted", latest),
            };
            return Err(PublishError::DeployUnavailable(reason));
        }

        let command = DeployCommand {
            run_id: run_id.to_string(),
            target,
        };
        self.send(&self.topics.deploy, "deploy", DEPLOY_SCHEMA, &command)
            .await?;
        Ok(command)
    }

    /// Deploy whatever run the session saw built last.
    pub async fn deploy_latest(&self) -> Result<DeployCommand, PublishError> {
        let latest = self.state().latest_run_id.ok_or_else(|| {
            PublishError::DeployUnavailable("no completed build observed yet".to_string())
        })?;
        self.publish_deploy(&latest).await
    }

    /// Remove a run's staging tree.
    pub async fn publish_clean(&self, run_id: &RunId) -> Result<CleanCommand, PublishError> {
        if run_id.as_str().trim().is_empty() {
            return Err(PublishError::EmptyRunId);
        }
        let command = CleanCommand {
            run_id: run_id.to_string(),
        };
        self.send(&self.topics.clean, "clean", CLEAN_SCHEMA, &command)
            .await?;
        Ok(command)
    }

    async fn send<T: Serialize>(
        &self,
        topic: &str,
        name: &str,
        schema: &str,
        command: &T,
    ) -> Result<(), PublishError> {
        let value = serde_json::to_value(command)
            .map_err(|e| PublishError::from_transport(topic, e.into()))?;
        let request = ProduceRequest::single(schema, value);

        match self.broker.produce(topic, &request).await {
            Ok(()) => {
                METRICS.inc_commands_published();
                obs::emit_command_published(topic, name);
                Ok(())
            }
            Err(e) => {
                obs::emit_command_failed(topic, name, &e);
                Err(PublishError::from_transport(topic, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ctlpanel_broker::fakes::MemoryBroker;
    use ctlpanel_broker::TransportError;
    use serde_json::json;

    fn publisher(
        broker: &Arc<MemoryBroker>,
        state: RunState,
    ) -> (CommandPublisher<MemoryBroker>, watch::Sender<RunState>) {
        let (tx, rx) = watch::channel(state);
        (
            CommandPublisher::new(Arc::clone(broker), &ConsoleConfig::default(), rx),
            tx,
        )
    }

    fn built(run: &str) -> RunState {
        RunState {
            latest_run_id: Some(RunId::from(run)),
            promoted_run_id: None,
        }
    }

    #[tokio::test]
    async fn build_command_carries_date_and_collection() {
        let broker = Arc::new(MemoryBroker::new());
        let (publisher, _tx) = publisher(&broker, RunState::default());

        publisher.publish_build("2025-06-20").await.unwrap();

        let produced = broker.produced();
        assert_eq!(produced.len(), 1);
        let (topic, request) = &produced[0];
        assert_eq!(topic, "cmd.query_agent");
        assert_eq!(request.value_schema, BUILD_SCHEMA);
        assert_eq!(
            request.records[0].value,
            json!({"date": "2025-06-20", "collection": "OJ"})
        );
    }

    #[tokio::test]
    async fn build_rejects_missing_or_malformed_date_locally() {
        let broker = Arc::new(MemoryBroker::new());
        let (publisher, _tx) = publisher(&broker, RunState::default());

        for date in ["", "20/06/2025", "2025-02-30"] {
            let err = publisher.publish_build(date).await.unwrap_err();
            assert!(matches!(err, PublishError::InvalidDate { .. }));
        }
        assert!(broker.produced().is_empty());
    }

    #[tokio::test]
    async fn deploy_without_build_makes_no_request() {
        let broker = Arc::new(MemoryBroker::new());
        let (publisher, _tx) = publisher(&broker, RunState::default());

        let err = publisher
            .publish_deploy(&RunId::from("run-1"))
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::DeployUnavailable(_)));
        assert!(broker.calls().is_empty());
    }

    #[tokio::test]
    async fn deploy_of_promoted_run_makes_no_request() {
        let broker = Arc::new(MemoryBroker::new());
        let state = RunState {
            latest_run_id: Some(RunId::from("run-1")),
            promoted_run_id: Some(RunId::from("run-1")),
        };
        let (publisher, _tx) = publisher(&broker, state);

        let err = publisher.deploy_latest().await.unwrap_err();

        assert!(err.to_string().contains("already promoted"));
        assert!(broker.calls().is_empty());
    }

    #[tokio::test]
    async fn deploy_follows_state_updates() {
        let broker = Arc::new(MemoryBroker::new());
        let (publisher, tx) = publisher(&broker, RunState::default());
        assert!(publisher.deploy_latest().await.is_err());

        tx.send_replace(built("run-42"));
        let command = publisher.deploy_latest().await.unwrap();

        assert_eq!(command.run_id, "run-42");
        assert_eq!(command.target, DeployTarget::Prod);
        let (topic, request) = &broker.produced()[0];
        assert_eq!(topic, "cmd.web_agent.deploy");
        assert_eq!(request.value_schema, DEPLOY_SCHEMA);
        assert_eq!(
            request.records[0].value,
            json!({"run_id": "run-42", "target": "prod"})
        );
    }

    #[tokio::test]
    async fn deploy_to_staging_uses_enum_symbol() {
        let broker = Arc::new(MemoryBroker::new());
        let (publisher, _tx) = publisher(&broker, built("run-3"));

        publisher
            .publish_deploy_to(&RunId::from("run-3"), DeployTarget::Staging)
            .await
            .unwrap();

        assert_eq!(broker.produced()[0].1.records[0].value["target"], "staging");
    }

    #[tokio::test]
    async fn rejected_publish_surfaces_body_and_is_not_retried() {
        let broker = Arc::new(MemoryBroker::new());
        broker.fail_next_produce(TransportError::Status {
            url: "http://fake-proxy/topics/cmd.web_agent.clean".to_string(),
            status: 422,
            body: "Unprocessable Entity: schema".to_string(),
        });
        let (publisher, _tx) = publisher(&broker, RunState::default());

        let err = publisher
            .publish_clean(&RunId::from("run-8"))
            .await
            .unwrap_err();

        match err {
            PublishError::Rejected { status, detail, .. } => {
                assert_eq!(status, 422);
                assert_eq!(detail, "Unprocessable Entity: schema");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(broker.produced().len(), 1);
    }

    #[tokio::test]
    async fn clean_rejects_empty_run_id() {
        let broker = Arc::new(MemoryBroker::new());
        let (publisher, _tx) = publisher(&broker, RunState::default());

        let err = publisher.publish_clean(&RunId::from(" ")).await.unwrap_err();

        assert!(matches!(err, PublishError::EmptyRunId));
        assert!(broker.calls().is_empty());
    }
}
