//! The contract every resolver backend implements
//!
//! A backend declares a name and a label selector, validates its parameters,
//! chooses its own timeout, and performs the fetch. The reconciler owns the
//! deadline: `resolve` runs under a [`ResolveContext`] whose cancellation token
//! fires when the effective timeout expires, and backends with blocking work
//! must watch that token.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use resolution_common::duration::parse_duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Request parameters, keyed by parameter name
pub type Params = BTreeMap<String, String>;

/// Label set used for routing
pub type Labels = BTreeMap<String, String>;

/// ConfigMap key holding a resolver timeout override
pub const CONFIG_FIELD_TIMEOUT: &str = "timeout";

/// Stand-in deadline distance for timeouts past what the clock can represent
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// The instant `timeout` from now, clamped when the addition would overflow
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout)
        .unwrap_or_else(|| now + FAR_FUTURE)
}

// =============================================================================
// Errors
// =============================================================================

/// Outcome of a failed resolver call
#[derive(Debug, thiserror::Error)]
pub enum ResolverError {
    /// Required params missing or mutually exclusive params both set
    #[error("{0}")]
    InvalidParams(String),

    /// The per-call deadline expired before the resolver finished
    #[error("context deadline exceeded")]
    DeadlineExceeded,

    /// Infrastructure failure worth retrying on a later reconcile
    #[error("{0}")]
    Transient(String),

    /// Any other failure; terminal for the request
    #[error("{0}")]
    Failed(String),
}

impl ResolverError {
    /// Create an invalid-params error
    pub fn invalid_params(msg: impl Into<String>) -> Self {
        Self::InvalidParams(msg.into())
    }

    /// Create a terminal failure
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::Failed(msg.into())
    }

    /// Create a transient failure
    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }
}

// =============================================================================
// Resolved resource
// =============================================================================

/// Content plus annotations produced by a successful resolution
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolvedResource {
    data: Vec<u8>,
    annotations: BTreeMap<String, String>,
}

impl ResolvedResource {
    /// Create a resource with the given content and no annotations
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            annotations: BTreeMap::new(),
        }
    }

    /// Attach an annotation
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Attach several annotations
    pub fn with_annotations(mut self, annotations: BTreeMap<String, String>) -> Self {
        self.annotations.extend(annotations);
        self
    }

    /// Raw content bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Annotations to copy onto the request status
    pub fn annotations(&self) -> &BTreeMap<String, String> {
        &self.annotations
    }
}

// =============================================================================
// Configuration and call context
// =============================================================================

/// Per-resolver configuration, usually the data of a ConfigMap
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResolverConfig(BTreeMap<String, String>);

impl ResolverConfig {
    /// Wrap a key/value map
    pub fn new(data: BTreeMap<String, String>) -> Self {
        Self(data)
    }

    /// Look up a raw value
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Parsed `timeout` value. Absent or unparsable values yield `None`.
    pub fn timeout(&self) -> Option<Duration> {
        let raw = self.get(CONFIG_FIELD_TIMEOUT)?;
        match parse_duration(raw) {
            Ok(d) if !d.is_zero() => Some(d),
            Ok(_) => None,
            Err(e) => {
                warn!(value = %raw, error = %e, "ignoring invalid resolver timeout");
                None
            }
        }
    }
}

impl From<BTreeMap<String, String>> for ResolverConfig {
    fn from(data: BTreeMap<String, String>) -> Self {
        Self(data)
    }
}

/// Everything a single `resolve` call may consult besides its params
#[derive(Clone, Debug)]
pub struct ResolveContext {
    config: ResolverConfig,
    deadline: Instant,
    cancel: CancellationToken,
}

impl ResolveContext {
    /// Create a context expiring at `deadline`
    pub fn new(config: ResolverConfig, deadline: Instant, cancel: CancellationToken) -> Self {
        Self {
            config,
            deadline,
            cancel,
        }
    }

    /// Create a context expiring `timeout` from now with a fresh token
    pub fn with_timeout(config: ResolverConfig, timeout: Duration) -> Self {
        Self::new(config, deadline_after(timeout), CancellationToken::new())
    }

    /// Resolver configuration in effect for this call
    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Point in time after which the call is abandoned
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Token cancelled when the deadline passes or the caller gives up
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Whether the caller has given up on this call
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled() || Instant::now() >= self.deadline
    }
}

// =============================================================================
// Resolver trait
// =============================================================================

/// A pluggable backend that turns request params into content
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Stable identifier used in error messages (e.g. "Git")
    fn name(&self) -> &str;

    /// Labels a request must carry for this resolver to own it
    fn selector(&self) -> Labels;

    /// Reject params before any I/O happens
    fn validate_params(&self, params: &Params) -> Result<(), ResolverError>;

    /// Per-call timeout; a configured override wins over `default`
    fn timeout(&self, config: &ResolverConfig, default: Duration) -> Duration {
        config.timeout().unwrap_or(default)
    }

    /// Fetch the content. Must return promptly once `ctx` is cancelled.
    async fn resolve(
        &self,
        ctx: &ResolveContext,
        params: &Params,
    ) -> Result<ResolvedResource, ResolverError>;
}

/// Whether every selector entry is present in `labels` with the same value
pub fn selector_matches(selector: &Labels, labels: &Labels) -> bool {
    selector
        .iter()
        .all(|(k, v)| labels.get(k).is_some_and(|lv| lv == v))
}
