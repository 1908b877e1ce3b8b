//! Consumer session management.
//!
//! A console session owns at most one consumer instance on the REST proxy.
//! It is created lazily by the first [`ConsumerSessionManager::ensure_session`]
//! call and released once by [`ConsumerSessionManager::teardown`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ctlpanel_broker::{BrokerGateway, CreateConsumerRequest};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::error::SessionError;
use crate::obs;

/// Reference to the proxy-side consumer instance of this session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumerHandle {
    pub group: String,
    pub instance: String,
    /// Address of the instance; every fetch and the final DELETE use it
    pub base_uri: String,
}

/// Naming for one session's consumer.
///
/// The group is fixed for the whole session. Each creation attempt draws a
/// fresh instance name under `instance_prefix`, so an instance left behind
/// by a failed attempt never blocks the next one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionIdentity {
    pub group: String,
    pub instance_prefix: String,
}

impl SessionIdentity {
    /// Fresh `<prefix>-xxxxxx` group; instances are named `ui-xxxxxx`.
    pub fn generate(group_prefix: &str) -> Self {
        SessionIdentity {
            group: format!("{}-{}", group_prefix, short_id()),
            instance_prefix: "ui".to_string(),
        }
    }

    /// A new instance name for one creation attempt.
    pub fn instance_name(&self) -> String {
        format!("{}-{}", self.instance_prefix, short_id())
    }
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

/// Owner of the session's consumer instance.
///
/// Creation runs at most once at a time: concurrent callers wait on the
/// in-flight sequence and share its handle. A failed sequence leaves nothing
/// behind, so the next call starts over.
pub struct ConsumerSessionManager<B: ?Sized> {
    broker: Arc<B>,
    identity: SessionIdentity,
    topic: String,
    handle: OnceCell<ConsumerHandle>,
    closed: AtomicBool,
}

impl<B> ConsumerSessionManager<B>
where
    B: BrokerGateway + ?Sized,
{
    pub fn new(broker: Arc<B>, identity: SessionIdentity, topic: &str) -> Self {
        Self {
            broker,
            identity,
            topic: topic.to_string(),
            handle: OnceCell::new(),
            closed: AtomicBool::new(false),
        }
    }

    pub fn identity(&self) -> &SessionIdentity {
        &self.identity
    }

    /// The handle, if the consumer has been created.
    pub fn handle(&self) -> Option<&ConsumerHandle> {
        self.handle.get()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Return the session's consumer, creating and subscribing it on first use.
    pub async fn ensure_session(&self) -> Result<ConsumerHandle, SessionError> {
        if self.is_closed() {
            return Err(SessionError::Closed);
        }

        let handle = self
            .handle
            .get_or_try_init(|| self.create_and_subscribe())
            .await?;
        Ok(handle.clone())
    }

    async fn create_and_subscribe(&self) -> Result<ConsumerHandle, SessionError> {
        let instance_name = self.identity.instance_name();
        let request = CreateConsumerRequest::binary_latest(&instance_name);
        let instance = self
            .broker
            .create_consumer(&self.identity.group, &request)
            .await
            .map_err(|e| {
                obs::emit_session_start_failed(&self.identity.group, &e);
                SessionError::CreateConsumer(e)
            })?;

        if let Err(e) = self
            .broker
            .subscribe(&instance.base_uri, std::slice::from_ref(&self.topic))
            .await
        {
            obs::emit_session_start_failed(&self.identity.group, &e);
            // The instance exists but is useless without a subscription.
            if let Err(cleanup) = self.broker.delete_consumer(&instance.base_uri).await {
                debug!(error = %cleanup, base_uri = %instance.base_uri, "orphan consumer not released");
            }
            return Err(SessionError::Subscribe(e));
        }

        obs::emit_session_started(&self.identity.group, &instance.base_uri);
        Ok(ConsumerHandle {
            group: self.identity.group.clone(),
            instance: instance_name,
            base_uri: instance.base_uri,
        })
    }

    /// Release the consumer instance. Best-effort and effective once.
    ///
    /// Returns `true` when this call issued the DELETE. Later calls, and
    /// calls before any consumer exists, only mark the session closed.
    pub async fn teardown(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let Some(handle) = self.handle.get() else {
            return false;
        };

        let released = match self.broker.delete_consumer(&handle.base_uri).await {
            Ok(()) => true,
            Err(e) => {
                debug!(error = %e, "consumer delete failed; ignoring");
                false
            }
        };
        obs::emit_session_teardown(&handle.base_uri, released);
        true
    }
}
