//! ResolutionRequest reconciler
//!
//! Drives a request through a single `Succeeded` condition:
//! Pending → InProgress → Succeeded/Failed
//!
//! Each reconcile is one bounded pass. The global ceiling is checked first so
//! a hung backend can never keep a request alive; otherwise the owning
//! resolver runs under `min(resolver timeout, remaining global budget)`.
//! "Come back later" is expressed as `Action::requeue`, never as a sleep.

use std::sync::Arc;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, Utc};
use kube::runtime::controller::Action;
use kube::{Client, ResourceExt};
use resolution_common::crd::{ResolutionRequest, ResolutionRequestStatus};
use resolution_common::duration::format_duration;
use resolution_common::{
    Error, LABEL_KEY_RESOLVER_TYPE, MESSAGE_WAITING_FOR_RESOLVER, REASON_PARAMS_INVALID,
    REASON_RESOLUTION_FAILED, REASON_RESOLUTION_TIMED_OUT,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::clock::{Clock, SystemClock};
use crate::registry::{ResolverRegistry, Route};
use crate::resolver::{
    deadline_after, Params, ResolveContext, ResolvedResource, Resolver, ResolverConfig,
    ResolverError,
};
use crate::store::{KubeRequestStore, RequestStore};

/// Fixed ceiling on how long any request may stay unresolved
pub const DEFAULT_MAXIMUM_RESOLUTION_DURATION: Duration = Duration::from_secs(60);

/// Timeout handed to resolvers that have no override configured
pub const DEFAULT_RESOLVER_TIMEOUT: Duration = Duration::from_secs(60);

/// Requeue delay after a retryable controller error
const ERROR_REQUEUE: Duration = Duration::from_secs(30);

/// Shortest delay used when requeueing a request still in progress
const MIN_REQUEUE: Duration = Duration::from_secs(1);

// =============================================================================
// Controller context
// =============================================================================

/// Shared state for every reconcile call
pub struct Context {
    /// Status persistence and resolver configuration
    pub store: Arc<dyn RequestStore>,
    /// Resolvers served by this controller
    pub registry: Arc<ResolverRegistry>,
    /// Time source for elapsed-time checks
    pub clock: Arc<dyn Clock>,
    /// Global ceiling, independent of any resolver
    pub max_resolution_duration: Duration,
    /// Default passed to `Resolver::timeout`
    pub default_resolver_timeout: Duration,
}

impl Context {
    /// Create a context with default durations and the system clock
    pub fn new(store: Arc<dyn RequestStore>, registry: Arc<ResolverRegistry>) -> Self {
        Self {
            store,
            registry,
            clock: Arc::new(SystemClock),
            max_resolution_duration: DEFAULT_MAXIMUM_RESOLUTION_DURATION,
            default_resolver_timeout: DEFAULT_RESOLVER_TIMEOUT,
        }
    }

    /// Create a context backed by the Kubernetes API
    pub fn from_client(
        client: Client,
        config_namespace: impl Into<String>,
        registry: Arc<ResolverRegistry>,
    ) -> Self {
        Self::new(
            Arc::new(KubeRequestStore::new(client, config_namespace)),
            registry,
        )
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the global ceiling
    pub fn with_max_resolution_duration(mut self, max: Duration) -> Self {
        self.max_resolution_duration = max;
        self
    }

    /// Replace the default resolver timeout
    pub fn with_default_resolver_timeout(mut self, timeout: Duration) -> Self {
        self.default_resolver_timeout = timeout;
        self
    }

    fn remaining_budget(&self, request: &ResolutionRequest, now: DateTime<Utc>) -> Duration {
        self.max_resolution_duration
            .saturating_sub(request_duration(request, now))
    }
}

// =============================================================================
// Reconciliation
// =============================================================================

/// Reconcile a ResolutionRequest
///
/// Terminal requests and requests owned by no registered resolver are left
/// alone. Resolver failures end up in the status; only store failures and
/// routing misconfiguration are returned as errors.
#[instrument(skip(request, ctx), fields(request = %request.key()))]
pub async fn reconcile(
    request: Arc<ResolutionRequest>,
    ctx: Arc<Context>,
) -> Result<Action, Error> {
    if request.is_done() {
        debug!("request already terminal");
        return Ok(Action::await_change());
    }

    let labels = request.metadata.labels.clone().unwrap_or_default();
    let resolver = match ctx.registry.route(&labels)? {
        Route::Resolver(r) => Arc::clone(r),
        Route::Unowned => {
            debug!(resolver_type = ?request.resolver_type(), "no registered resolver owns request");
            return Ok(Action::await_change());
        }
    };

    let namespace = request
        .namespace()
        .ok_or_else(|| Error::validation_for(request.key(), "request has no namespace"))?;
    let name = request.name_any();
    let now = ctx.clock.now();

    let mut status = request.status.clone().unwrap_or_default();
    status.initialize_conditions(now);

    let action = if status.has_data() {
        info!("request already carries data");
        status.mark_succeeded(now);
        Action::await_change()
    } else if request_duration(&request, now) >= ctx.max_resolution_duration {
        let message = format!(
            "resolution took longer than global timeout of {}",
            format_duration(ctx.max_resolution_duration)
        );
        warn!(%message, "global resolution timeout exceeded");
        status.mark_failed(REASON_RESOLUTION_TIMED_OUT, message, now);
        Action::await_change()
    } else {
        resolve_request(&ctx, resolver.as_ref(), &request, &mut status).await
    };

    ctx.store
        .patch_request_status(&namespace, &name, &status)
        .await?;

    debug!(phase = %status.phase(), ?action, "reconciled request");
    Ok(action)
}

/// Validate, run the resolver under its deadline, and record the outcome
async fn resolve_request(
    ctx: &Context,
    resolver: &dyn Resolver,
    request: &ResolutionRequest,
    status: &mut ResolutionRequestStatus,
) -> Action {
    let params = &request.spec.params;

    if let Err(e) = resolver.validate_params(params) {
        warn!(resolver = %resolver.name(), error = %e, "invalid resolver params");
        status.mark_failed(REASON_PARAMS_INVALID, e.to_string(), ctx.clock.now());
        return Action::await_change();
    }

    let config = load_config(ctx, resolver).await;
    let timeout = resolver
        .timeout(&config, ctx.default_resolver_timeout)
        .min(ctx.remaining_budget(request, ctx.clock.now()));

    debug!(resolver = %resolver.name(), timeout_ms = timeout.as_millis(), "resolving");
    let outcome = run_with_deadline(resolver, config, timeout, params).await;
    let now = ctx.clock.now();

    match outcome {
        Ok(resource) => {
            info!(
                resolver = %resolver.name(),
                bytes = resource.data().len(),
                "resolution succeeded"
            );
            status.data = Some(STANDARD.encode(resource.data()));
            status.annotations.extend(
                resource
                    .annotations()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone())),
            );
            status.mark_succeeded(now);
            Action::await_change()
        }
        Err(ResolverError::DeadlineExceeded) => {
            warn!(resolver = %resolver.name(), "resolution deadline exceeded");
            status.mark_failed(
                REASON_RESOLUTION_TIMED_OUT,
                ResolverError::DeadlineExceeded.to_string(),
                now,
            );
            Action::await_change()
        }
        Err(ResolverError::InvalidParams(message)) => {
            warn!(resolver = %resolver.name(), %message, "resolver rejected params");
            status.mark_failed(REASON_PARAMS_INVALID, message, now);
            Action::await_change()
        }
        Err(ResolverError::Transient(message)) => {
            let requeue = ctx.remaining_budget(request, now).max(MIN_REQUEUE);
            warn!(
                resolver = %resolver.name(),
                %message,
                requeue_secs = requeue.as_secs(),
                "transient resolver error, will retry"
            );
            status.mark_in_progress(MESSAGE_WAITING_FOR_RESOLVER, now);
            Action::requeue(requeue)
        }
        Err(e) => {
            let message = format!(
                "error getting \"{}\" \"{}\": {}",
                resolver.name(),
                request.key(),
                e
            );
            warn!(resolver = %resolver.name(), %message, "resolution failed");
            status.mark_failed(REASON_RESOLUTION_FAILED, message, now);
            Action::await_change()
        }
    }
}

/// Run `resolve` bounded by `timeout`, cancelling the call's token on expiry
/// and whenever this function returns.
async fn run_with_deadline(
    resolver: &dyn Resolver,
    config: ResolverConfig,
    timeout: Duration,
    params: &Params,
) -> Result<ResolvedResource, ResolverError> {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let resolve_ctx = ResolveContext::new(config, deadline_after(timeout), cancel.clone());

    match tokio::time::timeout(timeout, resolver.resolve(&resolve_ctx, params)).await {
        Ok(result) => result,
        Err(_) => {
            cancel.cancel();
            Err(ResolverError::DeadlineExceeded)
        }
    }
}

/// Resolver configuration; lookup failures fall back to an empty config
async fn load_config(ctx: &Context, resolver: &dyn Resolver) -> ResolverConfig {
    let resolver_type = resolver
        .selector()
        .get(LABEL_KEY_RESOLVER_TYPE)
        .cloned()
        .unwrap_or_else(|| resolver.name().to_lowercase());

    match ctx.store.resolver_config(&resolver_type).await {
        Ok(config) => config,
        Err(e) => {
            warn!(resolver = %resolver.name(), error = %e, "failed to load resolver config, using defaults");
            ResolverConfig::default()
        }
    }
}

/// Time since the request was created; zero when unknown or in the future
fn request_duration(request: &ResolutionRequest, now: DateTime<Utc>) -> Duration {
    match request.created_at() {
        Some(created) => (now - created).to_std().unwrap_or(Duration::ZERO),
        None => Duration::ZERO,
    }
}

/// Error policy for the ResolutionRequest controller
///
/// - Retryable errors (API server hiccups, conflicts): requeue after 30 seconds
/// - Non-retryable errors (routing misconfiguration): await a change
pub fn error_policy(request: Arc<ResolutionRequest>, error: &Error, _ctx: Arc<Context>) -> Action {
    error!(
        ?error,
        request = %request.key(),
        retryable = error.is_retryable(),
        "reconciliation failed"
    );

    if error.is_retryable() {
        Action::requeue(ERROR_REQUEUE)
    } else {
        Action::await_change()
    }
}

// =============================================================================
// Tests
// =============================================================================
