//! Error types for the resolution controller
//!
//! Errors are structured with fields to aid debugging in production.
//! Resolver failures are not errors at this level: they are recorded on the
//! request status. What remains here are failures of the controller itself.

use thiserror::Error;

/// Default context value when no specific context is available
pub const UNKNOWN_CONTEXT: &str = "unknown";

/// Main error type for resolution operations
#[derive(Debug, Error)]
pub enum Error {
    /// Kubernetes API error
    #[error("kubernetes error: {source}")]
    Kube {
        /// The underlying kube-rs error
        #[from]
        source: kube::Error,
    },

    /// Validation error for a request or configuration value
    #[error("validation error for {request}: {message}")]
    Validation {
        /// `namespace/name` of the offending request, or `unknown`
        request: String,
        /// Description of what's invalid
        message: String,
    },

    /// Resolver wiring error (no unique resolver, bad selector)
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of what's misconfigured
        message: String,
    },

    /// Internal/operational error
    #[error("internal error [{context}]: {message}")]
    Internal {
        /// Description of what failed
        message: String,
        /// Context where the error occurred (e.g., "reconciler", "store")
        context: String,
    },
}

impl Error {
    /// Create a validation error with the given message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            request: UNKNOWN_CONTEXT.to_string(),
            message: msg.into(),
        }
    }

    /// Create a validation error tied to a specific request
    pub fn validation_for(request: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Validation {
            request: request.into(),
            message: msg.into(),
        }
    }

    /// Create a configuration error with the given message
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration {
            message: msg.into(),
        }
    }

    /// Create an internal error with the given message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: UNKNOWN_CONTEXT.to_string(),
        }
    }

    /// Create an internal error with context
    pub fn internal_with_context(context: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Internal {
            message: msg.into(),
            context: context.into(),
        }
    }

    /// Check if this error is retryable
    ///
    /// Validation and configuration errors need an operator or user fix. Kubernetes errors are retried unless the API rejected the call
    /// with a 4xx; a 409 conflict is retried since the next reconcile sees
    /// fresh state.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Kube { source } => match source {
                kube::Error::Api(ae) if ae.code == 409 => true,
                kube::Error::Api(ae) => !(400..500).contains(&ae.code),
                _ => true,
            },
            Error::Validation { .. } => false,
            Error::Configuration { .. } => false,
            Error::Internal { .. } => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(code: u16) -> Error {
        Error::from(kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Test".to_string(),
            code,
        }))
    }

    /// Story: store conflicts and server errors are retried, rejections are not
    #[test]
    fn story_kube_errors_classified_by_status_code() {
        assert!(api_error(409).is_retryable());
        assert!(api_error(500).is_retryable());
        assert!(api_error(503).is_retryable());
        assert!(!api_error(404).is_retryable());
        assert!(!api_error(422).is_retryable());
    }

    /// Story: misconfiguration is surfaced once and not retried
    #[test]
    fn story_permanent_errors_not_retryable() {
        assert!(!Error::validation("bad").is_retryable());
        assert!(!Error::configuration("two resolvers match").is_retryable());
        assert!(Error::internal("flaky").is_retryable());
    }

    #[test]
    fn error_messages_include_context() {
        let err = Error::validation_for("foo/rr", "missing creation timestamp");
        assert_eq!(
            err.to_string(),
            "validation error for foo/rr: missing creation timestamp"
        );

        let err = Error::internal_with_context("store", "lost connection");
        assert_eq!(err.to_string(), "internal error [store]: lost connection");

        let err = Error::configuration("no resolver");
        assert_eq!(err.to_string(), "configuration error: no resolver");
    }
}
