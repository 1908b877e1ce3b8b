//! Console configuration.
//!
//! Values come from `CTLPANEL_*` environment variables with the defaults of
//! the local pipeline stack; the binary lets flags override them.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CtlpanelError, Result};

pub const ENV_PROXY_URL: &str = "CTLPANEL_PROXY_URL";
pub const ENV_LOG_TOPIC: &str = "CTLPANEL_LOG_TOPIC";
pub const ENV_BUILD_TOPIC: &str = "CTLPANEL_BUILD_TOPIC";
pub const ENV_DEPLOY_TOPIC: &str = "CTLPANEL_DEPLOY_TOPIC";
pub const ENV_CLEAN_TOPIC: &str = "CTLPANEL_CLEAN_TOPIC";
pub const ENV_COLLECTION: &str = "CTLPANEL_COLLECTION";
pub const ENV_GROUP_PREFIX: &str = "CTLPANEL_GROUP_PREFIX";
pub const ENV_POLL_INTERVAL_MS: &str = "CTLPANEL_POLL_INTERVAL_MS";
pub const ENV_SITE_URL: &str = "CTLPANEL_SITE_URL";

/// Delay between the end of one poll cycle and the start of the next
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Command topics the publisher writes to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandTopics {
    /// Build requests for the query agent
    pub build: String,
    /// Promotion requests for the web agent
    pub deploy: String,
    /// Staging clean-up requests for the web agent
    pub clean: String,
}

impl Default for CommandTopics {
    fn default() -> Self {
        CommandTopics {
            build: "cmd.query_agent".to_string(),
            deploy: "cmd.web_agent.deploy".to_string(),
            clean: "cmd.web_agent.clean".to_string(),
        }
    }
}

/// Everything one console session needs to know about its environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsoleConfig {
    /// REST proxy base URL
    pub proxy_url: String,
    /// Shared application log topic
    pub log_topic: String,
    pub topics: CommandTopics,
    /// Document collection requested by build commands
    pub collection: String,
    /// Prefix of the session-scoped consumer group
    pub group_prefix: String,
    pub poll_interval_ms: u64,
    /// Base URL of the web agent, used for preview/production links
    pub site_url: Option<String>,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            proxy_url: ctlpanel_broker::DEFAULT_PROXY_URL.to_string(),
            log_topic: "logs.app".to_string(),
            topics: CommandTopics::default(),
            collection: "OJ".to_string(),
            group_prefix: "cp-panel".to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            site_url: None,
        }
    }
}

impl ConsoleConfig {
    /// Build config from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get(ENV_PROXY_URL) {
            config.proxy_url = v;
        }
        if let Some(v) = get(ENV_LOG_TOPIC) {
            config.log_topic = v;
        }
        if let Some(v) = get(ENV_BUILD_TOPIC) {
            config.topics.build = v;
        }
        if let Some(v) = get(ENV_DEPLOY_TOPIC) {
            config.topics.deploy = v;
        }
        if let Some(v) = get(ENV_CLEAN_TOPIC) {
            config.topics.clean = v;
        }
        if let Some(v) = get(ENV_COLLECTION) {
            config.collection = v;
        }
        if let Some(v) = get(ENV_GROUP_PREFIX) {
            config.group_prefix = v;
        }
        if let Some(v) = get(ENV_POLL_INTERVAL_MS) {
            config.poll_interval_ms = v.trim().parse().map_err(|_| {
                CtlpanelError::Config(format!(
                    "{ENV_POLL_INTERVAL_MS} must be a number of milliseconds, got '{v}'"
                ))
            })?;
        }
        if let Some(v) = get(ENV_SITE_URL) {
            config.site_url = Some(v);
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_proxy_url(mut self, proxy_url: &str) -> Self {
        self.proxy_url = proxy_url.to_string();
        self
    }

    pub fn with_log_topic(mut self, log_topic: &str) -> Self {
        self.log_topic = log_topic.to_string();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn with_site_url(mut self, site_url: &str) -> Self {
        self.site_url = Some(site_url.to_string());
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Reject values no session could work with.
    pub fn validate(&self) -> Result<()> {
        if !(self.proxy_url.starts_with("http://") || self.proxy_url.starts_with("https://")) {
            return Err(CtlpanelError::Config(format!(
                "proxy URL must be http(s), got '{}'",
                self.proxy_url
            )));
        }
        if self.log_topic.trim().is_empty() {
            return Err(CtlpanelError::Config("log topic must not be empty".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(CtlpanelError::Config(
                "poll interval must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
