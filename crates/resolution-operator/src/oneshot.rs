//! One-shot local resolution, bypassing the cluster
//!
//! Runs a registered resolver with the same validation and timeout rules the
//! controller applies, minus the global ceiling and status bookkeeping.

use std::time::Duration;

use anyhow::Context as _;
use resolution_framework::{
    Params, ResolveContext, ResolvedResource, ResolverConfig, ResolverError, ResolverRegistry,
};
use tracing::{debug, info};

/// Resolve `params` with the resolver registered for `resolver_type`
pub async fn resolve_once(
    registry: &ResolverRegistry,
    resolver_type: &str,
    params: Params,
    config: ResolverConfig,
    default_timeout: Duration,
) -> anyhow::Result<ResolvedResource> {
    let resolver = registry.get(resolver_type).ok_or_else(|| {
        anyhow::anyhow!(
            "no resolver registered for type {:?} (available: {})",
            resolver_type,
            registry.names().join(", ")
        )
    })?;

    resolver.validate_params(&params)?;

    let timeout = resolver.timeout(&config, default_timeout);
    let ctx = ResolveContext::with_timeout(config, timeout);
    let _guard = ctx.cancellation().clone().drop_guard();
    debug!(resolver = %resolver.name(), timeout_ms = timeout.as_millis(), "resolving locally");

    let result = match tokio::time::timeout(timeout, resolver.resolve(&ctx, &params)).await {
        Ok(result) => result,
        Err(_) => {
            ctx.cancellation().cancel();
            Err(ResolverError::DeadlineExceeded)
        }
    };

    let resource = result.with_context(|| format!("error getting {:?}", resolver.name()))?;
    info!(resolver = %resolver.name(), bytes = resource.data().len(), "resolved");
    Ok(resource)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use resolution_common::LABEL_KEY_RESOLVER_TYPE;
    use resolution_framework::{Labels, Resolver};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    /// Echoes the `value` param back after an optional delay
    struct EchoResolver;

    #[async_trait]
    impl Resolver for EchoResolver {
        fn name(&self) -> &str {
            "Echo"
        }

        fn selector(&self) -> Labels {
            BTreeMap::from([(LABEL_KEY_RESOLVER_TYPE.to_string(), "echo".to_string())])
        }

        fn validate_params(&self, params: &Params) -> Result<(), ResolverError> {
            if params.contains_key("value") {
                Ok(())
            } else {
                Err(ResolverError::invalid_params("missing value"))
            }
        }

        async fn resolve(
            &self,
            ctx: &ResolveContext,
            params: &Params,
        ) -> Result<ResolvedResource, ResolverError> {
            if let Some(delay) = params.get("delay_secs").and_then(|d| d.parse().ok()) {
                tokio::select! {
                    _ = tokio::time::sleep(Duration::from_secs(delay)) => {}
                    _ = ctx.cancellation().cancelled() => return Err(ResolverError::DeadlineExceeded),
                }
            }
            Ok(ResolvedResource::new(params["value"].clone().into_bytes()))
        }
    }

    fn registry() -> ResolverRegistry {
        let mut registry = ResolverRegistry::new();
        registry.register(Arc::new(EchoResolver)).unwrap();
        registry
    }

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn resolves_with_registered_resolver() {
        let resource = resolve_once(
            &registry(),
            "echo",
            params(&[("value", "hello")]),
            ResolverConfig::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap();

        assert_eq!(resource.data(), b"hello");
    }

    #[tokio::test]
    async fn huge_default_timeout_is_treated_as_unbounded() {
        let config = ResolverConfig::new(BTreeMap::from([(
            "timeout".to_string(),
            "9999999999999999h".to_string(),
        )]));

        let resource = resolve_once(
            &registry(),
            "echo",
            params(&[("value", "hello")]),
            config,
            Duration::from_secs(u64::MAX),
        )
        .await
        .unwrap();

        assert_eq!(resource.data(), b"hello");
    }

    #[tokio::test]
    async fn unknown_type_lists_available_resolvers() {
        let err = resolve_once(
            &registry(),
            "hub",
            Params::new(),
            ResolverConfig::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert!(err.to_string().contains("available: Echo"));
    }

    #[tokio::test]
    async fn invalid_params_are_rejected() {
        let err = resolve_once(
            &registry(),
            "echo",
            Params::new(),
            ResolverConfig::default(),
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();

        assert_eq!(err.to_string(), "missing value");
    }

    #[tokio::test(start_paused = true)]
    async fn configured_timeout_cuts_off_slow_resolver() {
        let config = ResolverConfig::new(BTreeMap::from([(
            "timeout".to_string(),
            "1s".to_string(),
        )]));

        let err = resolve_once(
            &registry(),
            "echo",
            params(&[("value", "late"), ("delay_secs", "5")]),
            config,
            Duration::from_secs(60),
        )
        .await
        .unwrap_err();

        let cause = err.root_cause().to_string();
        assert_eq!(cause, "context deadline exceeded");
    }
}
