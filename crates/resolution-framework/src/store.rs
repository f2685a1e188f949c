//! Persistence seam between the reconciler and the Kubernetes API

use std::collections::BTreeMap;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ConfigMap;
use kube::api::{Api, Patch, PatchParams};
use kube::Client;
use resolution_common::crd::{ResolutionRequest, ResolutionRequestStatus};
use resolution_common::{Error, FIELD_MANAGER};
use tracing::debug;

#[cfg(test)]
use mockall::automock;

use crate::resolver::ResolverConfig;

/// Name of the ConfigMap holding configuration for a resolver type
pub fn resolver_config_map_name(resolver_type: &str) -> String {
    format!("{resolver_type}-resolver-config")
}

/// Trait abstracting request persistence and resolver configuration lookup
///
/// Lets the reconciler run against a mock in tests and the real API server
/// in production.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Write the status subresource of a ResolutionRequest
    async fn patch_request_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ResolutionRequestStatus,
    ) -> Result<(), Error>;

    /// Configuration for a resolver type; empty when none is stored
    async fn resolver_config(&self, resolver_type: &str) -> Result<ResolverConfig, Error>;
}

/// Real Kubernetes implementation
pub struct KubeRequestStore {
    client: Client,
    config_namespace: String,
}

impl KubeRequestStore {
    /// Create a store reading resolver ConfigMaps from `config_namespace`
    pub fn new(client: Client, config_namespace: impl Into<String>) -> Self {
        Self {
            client,
            config_namespace: config_namespace.into(),
        }
    }
}

#[async_trait]
impl RequestStore for KubeRequestStore {
    async fn patch_request_status(
        &self,
        namespace: &str,
        name: &str,
        status: &ResolutionRequestStatus,
    ) -> Result<(), Error> {
        let api: Api<ResolutionRequest> = Api::namespaced(self.client.clone(), namespace);
        let status_patch = serde_json::json!({ "status": status });

        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER),
            &Patch::Merge(&status_patch),
        )
        .await?;

        debug!(namespace = %namespace, request = %name, "patched request status");
        Ok(())
    }

    async fn resolver_config(&self, resolver_type: &str) -> Result<ResolverConfig, Error> {
        let api: Api<ConfigMap> = Api::namespaced(self.client.clone(), &self.config_namespace);
        let name = resolver_config_map_name(resolver_type);

        match api.get_opt(&name).await? {
            Some(cm) => Ok(ResolverConfig::new(cm.data.unwrap_or_default())),
            None => {
                debug!(config_map = %name, "no resolver config found, using defaults");
                Ok(ResolverConfig::new(BTreeMap::new()))
            }
        }
    }
}
