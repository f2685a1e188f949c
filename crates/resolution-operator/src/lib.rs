//! Resolution operator - serves ResolutionRequests with the built-in resolvers

#![deny(missing_docs)]

pub mod config;
pub mod controller_runner;
pub mod oneshot;

pub use config::OperatorConfig;
pub use controller_runner::{default_registry, ensure_crds_installed, run_controller};
pub use oneshot::resolve_once;
