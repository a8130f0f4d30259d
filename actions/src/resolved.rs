//! Resolved, invariant-safe configuration.
//!
//! Converts the optional boundary-level [`ActionsConfig`] into concrete
//! values so core logic never handles `Option` defaults.

use std::time::Duration;

use url::Url;

use crate::registry::RefreshMode;
use crate::types::{ActionError, ActionsConfig, ErrorCode};

pub(crate) const DEFAULT_USER_AGENT: &str = concat!("blink/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone)]
pub(crate) struct ResolvedConfig {
    pub user_agent: String,
    pub timeout: Duration,
    pub registry_url: Url,
    pub registry_ttl: Duration,
    pub refresh_mode: RefreshMode,
}

impl ResolvedConfig {
    pub fn from_config(config: &ActionsConfig) -> Result<Self, ActionError> {
        let user_agent = config
            .user_agent
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());

        let timeout_seconds = config
            .timeout_seconds
            .unwrap_or(ActionsConfig::DEFAULT_TIMEOUT_SECONDS)
            .max(1);
        let ttl_seconds = config
            .registry_ttl_seconds
            .unwrap_or(ActionsConfig::DEFAULT_REGISTRY_TTL_SECONDS)
            .max(1);

        let registry_url = config
            .registry_url
            .as_deref()
            .unwrap_or(ActionsConfig::DEFAULT_REGISTRY_URL);
        let registry_url = Url::parse(registry_url).map_err(|e| {
            ActionError::new(
                ErrorCode::BadArgs,
                format!("registry_url is not a valid URL: {e}"),
                false,
            )
            .with_detail("registry_url", registry_url)
        })?;

        Ok(Self {
            user_agent,
            timeout: Duration::from_secs(u64::from(timeout_seconds)),
            registry_url,
            registry_ttl: Duration::from_secs(u64::from(ttl_seconds)),
            refresh_mode: config.registry_refresh.unwrap_or(RefreshMode::Blocking),
        })
    }
}
