//! Resolution framework: the resolver contract and the request reconciler
//!
//! A [`Resolver`] fetches content for a ResolutionRequest given its params.
//! The [`reconciler`] routes each request to the resolver whose selector it
//! matches, bounds the call by timeouts, and records the outcome in status.

#![deny(missing_docs)]

pub mod clock;
pub mod reconciler;
pub mod registry;
pub mod resolver;
pub mod store;

#[cfg(test)]
mod testing;

pub use clock::{Clock, SystemClock};
pub use reconciler::{error_policy, reconcile, Context};
pub use registry::{ResolverRegistry, Route};
pub use resolver::{
    Labels, Params, ResolveContext, ResolvedResource, Resolver, ResolverConfig, ResolverError,
    CONFIG_FIELD_TIMEOUT, deadline_after,
};
pub use store::{KubeRequestStore, RequestStore};
