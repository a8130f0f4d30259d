//! Trust registry: cached allow/deny classification of action hosts.
//!
//! The registry answers "is this host trusted, known-malicious, or
//! unknown?" cheaply and consistently across a process run. One external
//! fetch populates a whole snapshot, held for a bounded TTL and replaced
//! atomically; readers never observe a torn mixture of old and new
//! entries. The refresh is single-flight: concurrent cache misses share
//! the first caller's fetch instead of re-issuing it.
//!
//! Trust is advisory. A fetch outage degrades to last-known-good data or
//! a built-in first-party fallback list, never to "deny all" and never
//! to an error: an unreachable trust service removes the positive trust
//! signal, it does not block execution.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use url::Url;

use crate::types::{ActionError, ErrorCode};

/// Built-in first-party hosts consulted when the dynamic fetch fails
/// before any snapshot exists.
pub const FIRST_PARTY_HOSTS: &[&str] = &[
    "dial.to",
    "actions.dialect.to",
    "jito.dial.to",
    "kamino.dial.to",
    "meteora.dial.to",
    "sanctum.dial.to",
];

/// Three-way classification of a host against a registry snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustStatus {
    Trusted,
    Unknown,
    Malicious,
}

impl TrustStatus {
    #[must_use]
    pub fn is_trusted(self) -> bool {
        self == TrustStatus::Trusted
    }

    /// Only an explicit deny-list entry hard-blocks execution; `Unknown`
    /// merely warns.
    #[must_use]
    pub fn blocks_execution(self) -> bool {
        self == TrustStatus::Malicious
    }
}

/// Host list document served by the registry source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostList {
    #[serde(default)]
    pub trusted: Vec<String>,
    #[serde(default)]
    pub malicious: Vec<String>,
}

/// The single external call the registry depends on.
///
/// A trait so tests can inject pre-seeded, always-stale, or counting
/// sources.
#[async_trait]
pub trait RegistrySource: Send + Sync {
    async fn fetch_host_list(&self) -> Result<HostList, ActionError>;
}

/// Default source: GET a JSON `{ trusted: [host], malicious: [host] }`
/// document from the configured registry URL.
pub struct HttpRegistrySource {
    http: reqwest::Client,
    url: Url,
}

impl HttpRegistrySource {
    #[must_use]
    pub fn new(http: reqwest::Client, url: Url) -> Self {
        Self { http, url }
    }
}

#[async_trait]
impl RegistrySource for HttpRegistrySource {
    async fn fetch_host_list(&self) -> Result<HostList, ActionError> {
        let response = self
            .http
            .get(self.url.clone())
            .send()
            .await
            .map_err(crate::client::map_transport_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ActionError::new(
                ErrorCode::ActionFetch,
                format!("registry fetch returned HTTP {status}"),
                status.is_server_error(),
            )
            .with_detail("status", status.as_str()));
        }
        response.json::<HostList>().await.map_err(|e| {
            ActionError::new(
                ErrorCode::Schema,
                format!("registry document is malformed: {e}"),
                false,
            )
        })
    }
}

/// How an expired snapshot is replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefreshMode {
    /// The querying caller refreshes inline before answering.
    Blocking,
    /// Stale data keeps serving while a background task refreshes.
    Background,
}

/// One immutable registry snapshot.
#[derive(Debug)]
struct Snapshot {
    trusted: HashSet<String>,
    malicious: HashSet<String>,
    expires_at: Instant,
}

impl Snapshot {
    fn from_list(list: &HostList, ttl: Duration) -> Self {
        Self {
            trusted: list.trusted.iter().map(|h| h.to_ascii_lowercase()).collect(),
            malicious: list
                .malicious
                .iter()
                .map(|h| h.to_ascii_lowercase())
                .collect(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn fallback(ttl: Duration) -> Self {
        Self {
            trusted: FIRST_PARTY_HOSTS.iter().map(|h| (*h).to_string()).collect(),
            malicious: HashSet::new(),
            expires_at: Instant::now() + ttl,
        }
    }

    /// Same data, re-armed expiry. Used to keep serving last-known-good
    /// entries after a failed refresh without re-fetching on every query.
    fn renewed(&self, ttl: Duration) -> Self {
        Self {
            trusted: self.trusted.clone(),
            malicious: self.malicious.clone(),
            expires_at: Instant::now() + ttl,
        }
    }

    fn fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }

    fn status(&self, host: &str) -> TrustStatus {
        let host = host.to_ascii_lowercase();
        // An explicit deny-list entry wins over everything.
        if self.malicious.contains(&host) {
            TrustStatus::Malicious
        } else if self.trusted.contains(&host) {
            TrustStatus::Trusted
        } else {
            TrustStatus::Unknown
        }
    }
}

struct RegistryInner {
    source: Arc<dyn RegistrySource>,
    ttl: Duration,
    refresh_mode: RefreshMode,
    snapshot: RwLock<Option<Arc<Snapshot>>>,
    refresh_guard: Mutex<()>,
}

/// Process-wide trust cache with an explicit lifecycle: initialized
/// lazily on first query, refreshed under a single-flight guard,
/// replaced atomically. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TrustRegistry {
    inner: Arc<RegistryInner>,
}

impl TrustRegistry {
    #[must_use]
    pub fn new(source: Arc<dyn RegistrySource>, ttl: Duration, refresh_mode: RefreshMode) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                source,
                ttl,
                refresh_mode,
                snapshot: RwLock::new(None),
                refresh_guard: Mutex::new(()),
            }),
        }
    }

    /// Classify a host against the current snapshot, fetching or
    /// refreshing it as needed. Infallible by design: registry trouble
    /// degrades to fallback data, never to an error.
    pub async fn status(&self, host: &str) -> TrustStatus {
        if let Some(snapshot) = self.fresh_snapshot().await {
            return snapshot.status(host);
        }

        if self.inner.refresh_mode == RefreshMode::Background
            && let Some(stale) = self.any_snapshot().await
        {
            self.spawn_refresh();
            return stale.status(host);
        }

        self.refresh().await.status(host)
    }

    async fn fresh_snapshot(&self) -> Option<Arc<Snapshot>> {
        let guard = self.inner.snapshot.read().await;
        guard.as_ref().filter(|s| s.fresh()).cloned()
    }

    async fn any_snapshot(&self) -> Option<Arc<Snapshot>> {
        self.inner.snapshot.read().await.clone()
    }

    /// Fetch a replacement snapshot under the single-flight guard and
    /// swap it in wholesale.
    async fn refresh(&self) -> Arc<Snapshot> {
        let _guard = self.inner.refresh_guard.lock().await;

        // Another caller may have completed the refresh while this one
        // waited on the guard.
        if let Some(snapshot) = self.fresh_snapshot().await {
            return snapshot;
        }

        let next = match self.inner.source.fetch_host_list().await {
            Ok(list) => Arc::new(Snapshot::from_list(&list, self.inner.ttl)),
            Err(error) => {
                tracing::warn!(%error, "trust registry fetch failed; degrading to fallback");
                match self.any_snapshot().await {
                    Some(stale) => Arc::new(stale.renewed(self.inner.ttl)),
                    None => Arc::new(Snapshot::fallback(self.inner.ttl)),
                }
            }
        };

        *self.inner.snapshot.write().await = Some(Arc::clone(&next));
        next
    }

    fn spawn_refresh(&self) {
        let registry = self.clone();
        tokio::spawn(async move {
            registry.refresh().await;
        });
    }
}
