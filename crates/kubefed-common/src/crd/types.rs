//! Shared types used by the federation CRDs

use std::fmt;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type reported for a member cluster
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ClusterConditionType {
    /// The member API server answered `/healthz` with `ok`
    Ready,
    /// The member API server could not be reached
    Offline,
}

impl fmt::Display for ClusterConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Offline => write!(f, "Offline"),
        }
    }
}

/// Status of a condition
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq, Hash)]
pub enum ConditionStatus {
    /// Condition holds
    True,
    /// Condition does not hold
    False,
}

impl fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::True => write!(f, "True"),
            Self::False => write!(f, "False"),
        }
    }
}

/// Kubernetes-style condition describing member cluster health
///
/// Produced fresh on every probe. Merging into the persisted status (and
/// preserving `last_transition_time` across probes) is the job of whatever
/// publishes the status.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClusterCondition {
    /// Type of condition
    #[serde(rename = "type")]
    pub type_: ClusterConditionType,

    /// Status of the condition
    pub status: ConditionStatus,

    /// Machine-readable reason for the condition
    pub reason: String,

    /// Human-readable message
    pub message: String,

    /// Last time the condition was probed
    pub last_probe_time: DateTime<Utc>,

    /// Last time the condition transitioned
    pub last_transition_time: DateTime<Utc>,
}

impl ClusterCondition {
    /// Create a condition probed (and transitioned) at `now`
    pub fn new(
        type_: ClusterConditionType,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            type_,
            status,
            reason: reason.into(),
            message: message.into(),
            last_probe_time: now,
            last_transition_time: now,
        }
    }
}

/// Reference to a Secret in the federation namespace
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct LocalSecretReference {
    /// Name of the secret
    pub name: String,
}
