//! Common types for remote resolution: CRDs, errors, and utilities

#![deny(missing_docs)]

pub mod crd;
pub mod duration;
pub mod error;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Label key carrying the resolver type a request is routed to
pub const LABEL_KEY_RESOLVER_TYPE: &str = "resolution.dev/type";

/// Default namespace holding per-resolver configuration
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "resolution-system";

/// Field manager used for server-side apply and status patches
pub const FIELD_MANAGER: &str = "resolution-controller";

/// Condition reason: the request is still waiting on its resolver
pub const REASON_RESOLUTION_IN_PROGRESS: &str = "ResolutionInProgress";

/// Condition reason: resolution produced data
pub const REASON_RESOLUTION_SUCCEEDED: &str = "ResolutionSucceeded";

/// Condition reason: the resolver returned an error
pub const REASON_RESOLUTION_FAILED: &str = "ResolutionFailed";

/// Condition reason: the per-call deadline or the global ceiling was exceeded
pub const REASON_RESOLUTION_TIMED_OUT: &str = "ResolutionTimedOut";

/// Condition reason: the resolver rejected the request parameters
pub const REASON_PARAMS_INVALID: &str = "ResolverParamsInvalid";

/// Message set while a request is in progress
pub const MESSAGE_WAITING_FOR_RESOLVER: &str = "waiting for resolver";
