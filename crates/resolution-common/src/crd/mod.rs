//! Custom Resource Definitions for remote resolution

mod request;
mod types;

pub use request::{
    RequestPhase, ResolutionRequest, ResolutionRequestSpec, ResolutionRequestStatus,
    CONDITION_SUCCEEDED,
};
pub use types::{Condition, ConditionStatus};
