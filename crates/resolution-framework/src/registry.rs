//! Resolver registry and selector-based routing

use std::sync::Arc;

use resolution_common::{Error, LABEL_KEY_RESOLVER_TYPE};
use tracing::info;

use crate::resolver::{selector_matches, Labels, Resolver};

/// Outcome of routing a request's labels
pub enum Route<'a> {
    /// Exactly one resolver owns the request
    Resolver(&'a Arc<dyn Resolver>),
    /// No registered resolver matches
    Unowned,
}

/// The set of resolvers served by this controller
#[derive(Default)]
pub struct ResolverRegistry {
    resolvers: Vec<Arc<dyn Resolver>>,
}

impl ResolverRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolver
    ///
    /// The selector must carry the resolver-type label, its value must name the
    /// resolver (case-insensitively), and no other resolver may have the same
    /// selector.
    pub fn register(&mut self, resolver: Arc<dyn Resolver>) -> Result<(), Error> {
        let selector = resolver.selector();
        let name = resolver.name();

        let Some(resolver_type) = selector.get(LABEL_KEY_RESOLVER_TYPE) else {
            return Err(Error::configuration(format!(
                "resolver {name:?} selector is missing the {LABEL_KEY_RESOLVER_TYPE} label"
            )));
        };
        if !resolver_type.eq_ignore_ascii_case(name) {
            return Err(Error::configuration(format!(
                "resolver {name:?} selector type {resolver_type:?} does not match its name"
            )));
        }
        if let Some(existing) = self.resolvers.iter().find(|r| r.selector() == selector) {
            return Err(Error::configuration(format!(
                "resolver {name:?} has the same selector as {:?}",
                existing.name()
            )));
        }

        info!(resolver = %name, resolver_type = %resolver_type, "registered resolver");
        self.resolvers.push(resolver);
        Ok(())
    }

    /// Find the resolver owning a request with the given labels
    ///
    /// More than one match is a configuration error.
    pub fn route(&self, labels: &Labels) -> Result<Route<'_>, Error> {
        let mut matches = self
            .resolvers
            .iter()
            .filter(|r| selector_matches(&r.selector(), labels));

        match (matches.next(), matches.next()) {
            (None, _) => Ok(Route::Unowned),
            (Some(resolver), None) => Ok(Route::Resolver(resolver)),
            (Some(first), Some(second)) => Err(Error::configuration(format!(
                "request labels match more than one resolver ({:?}, {:?})",
                first.name(),
                second.name()
            ))),
        }
    }

    /// Look up a resolver by its type label value
    pub fn get(&self, resolver_type: &str) -> Option<&Arc<dyn Resolver>> {
        self.resolvers.iter().find(|r| {
            r.selector()
                .get(LABEL_KEY_RESOLVER_TYPE)
                .is_some_and(|t| t == resolver_type)
        })
    }

    /// Registered resolver names
    pub fn names(&self) -> Vec<&str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    /// Number of registered resolvers
    pub fn len(&self) -> usize {
        self.resolvers.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }
}
