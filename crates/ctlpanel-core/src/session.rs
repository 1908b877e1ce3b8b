//! A console session: one consumer group, one workflow state, one lifetime.

use std::sync::Arc;

use ctlpanel_broker::{BrokerGateway, RestProxyClient, RestProxyConfig};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::config::ConsoleConfig;
use crate::consumer::{ConsumerSessionManager, SessionIdentity};
use crate::correlation::RunState;
use crate::error::Result;
use crate::poll_loop::PollLoop;
use crate::publisher::CommandPublisher;
use crate::sink::ConsoleSink;

/// Session-scoped wiring shared by the poll loop and the command publisher.
///
/// The workflow state lives here and is written only by the poll loop;
/// publishers and displays read it through [`Session::watch_state`].
pub struct Session<B: ?Sized> {
    config: ConsoleConfig,
    broker: Arc<B>,
    consumer: Arc<ConsumerSessionManager<B>>,
    state_tx: Arc<watch::Sender<RunState>>,
    cancel: CancellationToken,
}

impl Session<RestProxyClient> {
    /// Open a session against the REST proxy named in `config`.
    pub fn connect(config: ConsoleConfig) -> Result<Self> {
        config.validate()?;
        let client = RestProxyClient::new(RestProxyConfig::new(&config.proxy_url))?;
        Self::open(config, Arc::new(client))
    }
}

impl<B> Session<B>
where
    B: BrokerGateway + ?Sized,
{
    /// Open a session over any broker gateway. No network call is made until
    /// the poll loop runs its first cycle.
    pub fn open(config: ConsoleConfig, broker: Arc<B>) -> Result<Self> {
        config.validate()?;
        let identity = SessionIdentity::generate(&config.group_prefix);
        let consumer = Arc::new(ConsumerSessionManager::new(
            Arc::clone(&broker),
            identity,
            &config.log_topic,
        ));
        let (state_tx, _) = watch::channel(RunState::default());

        Ok(Self {
            config,
            broker,
            consumer,
            state_tx: Arc::new(state_tx),
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &ConsoleConfig {
        &self.config
    }

    /// Consumer group of this session.
    pub fn group(&self) -> &str {
        &self.consumer.identity().group
    }

    pub fn consumer(&self) -> &Arc<ConsumerSessionManager<B>> {
        &self.consumer
    }

    /// Snapshot of the workflow state.
    pub fn state(&self) -> RunState {
        self.state_tx.borrow().clone()
    }

    pub fn watch_state(&self) -> watch::Receiver<RunState> {
        self.state_tx.subscribe()
    }

    pub fn publisher(&self) -> CommandPublisher<B> {
        CommandPublisher::new(Arc::clone(&self.broker), &self.config, self.watch_state())
    }

    /// A poll loop feeding `sink`. Run it with [`Session::cancellation`].
    pub fn poll_loop<S: ConsoleSink>(&self, sink: S) -> PollLoop<B, S> {
        PollLoop::new(
            Arc::clone(&self.consumer),
            Arc::clone(&self.broker),
            sink,
            Arc::clone(&self.state_tx),
            self.config.poll_interval(),
            self.config.site_url.clone(),
        )
    }

    /// Token that stops the poll loop when cancelled.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// End the session: stop polling and release the consumer.
    ///
    /// Safe to call more than once and alongside a loop that is winding down
    /// by itself; the consumer is deleted at most once.
    pub async fn close(&self) -> bool {
        self.cancel.cancel();
        self.consumer.teardown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CtlpanelError;
    use ctlpanel_broker::fakes::MemoryBroker;

    #[test]
    fn open_rejects_invalid_config() {
        let config = ConsoleConfig::default().with_proxy_url("ftp://proxy");
        let result = Session::open(config, Arc::new(MemoryBroker::new()));
        assert!(matches!(result, Err(CtlpanelError::Config(_))));
    }

    #[tokio::test]
    async fn open_makes_no_calls_and_uses_group_prefix() {
        let broker = Arc::new(MemoryBroker::new());
        let session = Session::open(ConsoleConfig::default(), Arc::clone(&broker)).unwrap();

        assert!(session.group().starts_with("cp-panel-"));
        assert_eq!(session.state(), RunState::default());
        assert!(broker.calls().is_empty());
    }

    #[tokio::test]
    async fn close_without_polling_deletes_nothing() {
        let broker = Arc::new(MemoryBroker::new());
        let session = Session::open(ConsoleConfig::default(), Arc::clone(&broker)).unwrap();

        assert!(!session.close().await);
        assert!(session.cancellation().is_cancelled());
        assert_eq!(broker.delete_count(), 0);
    }

    #[test]
    fn connect_builds_rest_client() {
        let session = Session::connect(ConsoleConfig::default()).unwrap();
        assert_eq!(session.config().proxy_url, "http://localhost:8082");
    }
}
