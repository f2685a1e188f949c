//! ResolutionRequest CRD types
//!
//! A `ResolutionRequest` asks a resolver (selected by the
//! `resolution.dev/type` label) to fetch some remote content. The spec is
//! immutable; the status moves through a single `Succeeded` condition:
//! absent → Unknown → True | False. True and False are absorbing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{Condition, ConditionStatus};
use crate::{
    LABEL_KEY_RESOLVER_TYPE, MESSAGE_WAITING_FOR_RESOLVER, REASON_RESOLUTION_IN_PROGRESS,
    REASON_RESOLUTION_SUCCEEDED,
};

/// Condition type tracking the outcome of a resolution
pub const CONDITION_SUCCEEDED: &str = "Succeeded";

// =============================================================================
// Phase
// =============================================================================

/// Lifecycle phase of a ResolutionRequest, derived from its condition
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestPhase {
    /// No condition has been recorded yet
    Pending,
    /// Condition is Unknown
    InProgress,
    /// Condition is True
    Succeeded,
    /// Condition is False
    Failed,
}

impl RequestPhase {
    /// Whether the phase is absorbing
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

impl std::fmt::Display for RequestPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::InProgress => write!(f, "InProgress"),
            Self::Succeeded => write!(f, "Succeeded"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

// =============================================================================
// CRD
// =============================================================================

/// A request for a resolver to fetch remote content
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "resolution.dev",
    version = "v1alpha1",
    kind = "ResolutionRequest",
    plural = "resolutionrequests",
    shortname = "rr",
    namespaced,
    status = "ResolutionRequestStatus",
    printcolumn = r#"{"name":"Succeeded","type":"string","jsonPath":".status.conditions[?(@.type=='Succeeded')].status"}"#,
    printcolumn = r#"{"name":"Reason","type":"string","jsonPath":".status.conditions[?(@.type=='Succeeded')].reason"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequestSpec {
    /// Resolver-specific parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

/// Status of a ResolutionRequest
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRequestStatus {
    /// Conditions; only `Succeeded` is used
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,

    /// Annotations copied from the resolved resource
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    /// Resolved content, base64-encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

impl ResolutionRequestStatus {
    /// The `Succeeded` condition, if recorded
    pub fn succeeded_condition(&self) -> Option<&Condition> {
        self.conditions
            .iter()
            .find(|c| c.type_ == CONDITION_SUCCEEDED)
    }

    /// Phase derived from the `Succeeded` condition
    pub fn phase(&self) -> RequestPhase {
        match self.succeeded_condition().map(|c| &c.status) {
            None => RequestPhase::Pending,
            Some(ConditionStatus::Unknown) => RequestPhase::InProgress,
            Some(ConditionStatus::True) => RequestPhase::Succeeded,
            Some(ConditionStatus::False) => RequestPhase::Failed,
        }
    }

    /// Whether the status is terminal
    pub fn is_done(&self) -> bool {
        self.phase().is_terminal()
    }

    /// Whether resolved data has been recorded
    pub fn has_data(&self) -> bool {
        self.data.as_deref().is_some_and(|d| !d.is_empty())
    }

    /// Record an Unknown condition if none exists yet
    pub fn initialize_conditions(&mut self, at: DateTime<Utc>) {
        if self.succeeded_condition().is_none() {
            self.mark_in_progress(MESSAGE_WAITING_FOR_RESOLVER, at);
        }
    }

    /// Set the condition to Unknown with the given message
    pub fn mark_in_progress(&mut self, message: impl Into<String>, at: DateTime<Utc>) {
        self.set_condition(Condition::at(
            CONDITION_SUCCEEDED,
            ConditionStatus::Unknown,
            REASON_RESOLUTION_IN_PROGRESS,
            message,
            at,
        ));
    }

    /// Set the condition to True
    pub fn mark_succeeded(&mut self, at: DateTime<Utc>) {
        self.set_condition(Condition::at(
            CONDITION_SUCCEEDED,
            ConditionStatus::True,
            REASON_RESOLUTION_SUCCEEDED,
            "",
            at,
        ));
    }

    /// Set the condition to False with a reason and message
    pub fn mark_failed(
        &mut self,
        reason: impl Into<String>,
        message: impl Into<String>,
        at: DateTime<Utc>,
    ) {
        self.set_condition(Condition::at(
            CONDITION_SUCCEEDED,
            ConditionStatus::False,
            reason,
            message,
            at,
        ));
    }

    /// Replace the condition of the same type. The transition time only moves
    /// when the status value changes.
    fn set_condition(&mut self, mut condition: Condition) {
        match self
            .conditions
            .iter_mut()
            .find(|c| c.type_ == condition.type_)
        {
            Some(existing) => {
                if existing.status == condition.status {
                    condition.last_transition_time = existing.last_transition_time;
                }
                *existing = condition;
            }
            None => self.conditions.push(condition),
        }
    }
}

impl ResolutionRequest {
    /// `namespace/name` identity used in logs and error messages
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace().unwrap_or_default(), self.name_any())
    }

    /// Value of the resolver-type label, if present
    pub fn resolver_type(&self) -> Option<&str> {
        self.metadata
            .labels
            .as_ref()
            .and_then(|l| l.get(LABEL_KEY_RESOLVER_TYPE))
            .map(String::as_str)
    }

    /// Whether the request already reached a terminal condition
    pub fn is_done(&self) -> bool {
        self.status.as_ref().is_some_and(|s| s.is_done())
    }

    /// Creation time as recorded by the API server
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.metadata.creation_timestamp.as_ref().map(|t| t.0)
    }
}

// =============================================================================
// Tests
// =============================================================================
