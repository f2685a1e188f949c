//! Controller runner - wires resolvers, context, and the kube Controller

use std::sync::Arc;

use futures::StreamExt;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Patch, PatchParams};
use kube::runtime::watcher::Config as WatcherConfig;
use kube::runtime::Controller;
use kube::{Api, Client, CustomResourceExt};
use tracing::info;

use resolution_common::crd::ResolutionRequest;
use resolution_common::{Error, FIELD_MANAGER, LABEL_KEY_RESOLVER_TYPE};
use resolution_framework::{error_policy, reconcile, Context, ResolverRegistry};
use resolution_git::GitResolver;

use crate::config::OperatorConfig;

/// Watcher timeout (seconds) - must be less than client read_timeout (30s)
/// This forces the API server to close the watch before the client times out,
/// preventing "body read timed out" errors on idle watches.
const WATCH_TIMEOUT_SECS: u32 = 25;

/// Name of the ResolutionRequest CRD
pub const CRD_NAME: &str = "resolutionrequests.resolution.dev";

/// Registry holding every resolver this binary ships
pub fn default_registry() -> Result<ResolverRegistry, Error> {
    let mut registry = ResolverRegistry::new();
    registry.register(Arc::new(GitResolver::new()))?;
    Ok(registry)
}

/// Build the reconcile context from configuration
pub fn build_context(
    client: Client,
    config: &OperatorConfig,
    registry: Arc<ResolverRegistry>,
) -> Context {
    Context::from_client(client, config.namespace.clone(), registry)
        .with_max_resolution_duration(config.max_resolution_duration)
        .with_default_resolver_timeout(config.default_resolver_timeout)
}

/// Run the ResolutionRequest controller until a shutdown signal arrives
///
/// Only requests carrying the resolver-type label are watched; routing to a
/// specific resolver happens in the reconciler.
pub async fn run_controller(
    client: Client,
    config: OperatorConfig,
    registry: Arc<ResolverRegistry>,
) {
    info!(
        resolvers = ?registry.names(),
        namespace = %config.namespace,
        max_resolution_duration = ?config.max_resolution_duration,
        "Starting ResolutionRequest controller"
    );

    let ctx = Arc::new(build_context(client.clone(), &config, registry));
    let requests: Api<ResolutionRequest> = Api::all(client);

    Controller::new(
        requests,
        WatcherConfig::default()
            .labels(LABEL_KEY_RESOLVER_TYPE)
            .timeout(WATCH_TIMEOUT_SECS),
    )
    .shutdown_on_signal()
    .run(reconcile, error_policy, ctx)
    .for_each(log_reconcile_result("ResolutionRequest"))
    .await;

    info!("ResolutionRequest controller stopped");
}

/// Ensure the ResolutionRequest CRD is installed
///
/// The operator installs its own CRD on startup using server-side apply so
/// the CRD version always matches the operator version.
pub async fn ensure_crds_installed(client: &Client) -> anyhow::Result<()> {
    let crds: Api<CustomResourceDefinition> = Api::all(client.clone());
    let params = PatchParams::apply(FIELD_MANAGER).force();

    info!("Installing ResolutionRequest CRD...");
    crds.patch(CRD_NAME, &params, &Patch::Apply(&ResolutionRequest::crd()))
        .await
        .map_err(|e| anyhow::anyhow!("Failed to install ResolutionRequest CRD: {}", e))?;

    info!("ResolutionRequest CRD installed/updated");
    Ok(())
}

fn log_reconcile_result<T: std::fmt::Debug, E: std::fmt::Debug>(
    controller_name: &'static str,
) -> impl Fn(Result<T, E>) -> std::future::Ready<()> {
    move |result| {
        match result {
            Ok(action) => tracing::debug!(?action, "{} reconciliation completed", controller_name),
            Err(e) => tracing::error!(error = ?e, "{} reconciliation error", controller_name),
        }
        std::future::ready(())
    }
}
