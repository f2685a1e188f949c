//! Test doubles for the resolver contract

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use resolution_common::LABEL_KEY_RESOLVER_TYPE;

use crate::resolver::{
    Labels, Params, ResolveContext, ResolvedResource, Resolver, ResolverConfig, ResolverError,
};

/// Param key the fake resolver looks up canned results by
pub const FAKE_PARAM_NAME: &str = "fake-key";

/// Canned behavior for one param value
#[derive(Clone, Debug, Default)]
pub struct FakeResolvedResource {
    pub content: String,
    pub annotations: BTreeMap<String, String>,
    pub error_with: Option<String>,
    pub transient: bool,
    pub wait_for: Option<Duration>,
}

/// Resolver answering from a map keyed by the `fake-key` param
#[derive(Clone, Debug)]
pub struct FakeResolver {
    pub name: String,
    pub selector: Option<Labels>,
    pub for_param: BTreeMap<String, FakeResolvedResource>,
    pub timeout: Option<Duration>,
}

impl Default for FakeResolver {
    fn default() -> Self {
        Self::named("Fake")
    }
}

impl FakeResolver {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            selector: None,
            for_param: BTreeMap::new(),
            timeout: None,
        }
    }

    pub fn with_selector(mut self, selector: Labels) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_resource(mut self, value: &str, resource: FakeResolvedResource) -> Self {
        self.for_param.insert(value.to_string(), resource);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    fn name(&self) -> &str {
        &self.name
    }

    fn selector(&self) -> Labels {
        self.selector.clone().unwrap_or_else(|| {
            BTreeMap::from([(
                LABEL_KEY_RESOLVER_TYPE.to_string(),
                self.name.to_lowercase(),
            )])
        })
    }

    fn validate_params(&self, params: &Params) -> Result<(), ResolverError> {
        if params.contains_key(FAKE_PARAM_NAME) {
            Ok(())
        } else {
            Err(ResolverError::invalid_params(format!(
                "missing {FAKE_PARAM_NAME}"
            )))
        }
    }

    fn timeout(&self, config: &ResolverConfig, default: Duration) -> Duration {
        self.timeout
            .or_else(|| config.timeout())
            .unwrap_or(default)
    }

    async fn resolve(
        &self,
        ctx: &ResolveContext,
        params: &Params,
    ) -> Result<ResolvedResource, ResolverError> {
        let value = params.get(FAKE_PARAM_NAME).cloned().unwrap_or_default();
        let Some(fake) = self.for_param.get(&value) else {
            return Err(ResolverError::failed(format!(
                "couldn't find resource for param value {value}"
            )));
        };

        if let Some(wait) = fake.wait_for {
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = ctx.cancellation().cancelled() => return Err(ResolverError::DeadlineExceeded),
            }
        }

        if let Some(msg) = &fake.error_with {
            return Err(if fake.transient {
                ResolverError::transient(msg.clone())
            } else {
                ResolverError::failed(msg.clone())
            });
        }

        Ok(ResolvedResource::new(fake.content.as_bytes().to_vec())
            .with_annotations(fake.annotations.clone()))
    }
}
