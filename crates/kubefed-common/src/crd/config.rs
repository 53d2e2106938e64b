//! KubeFedConfig Custom Resource Definition
//!
//! Only the scope of the control plane is modelled; it decides which RBAC
//! objects `join` provisions on a member cluster.

use std::fmt;
use std::str::FromStr;

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Scope the federation control plane operates at
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum ResourceScope {
    /// Control plane manages resources in every namespace
    #[default]
    Cluster,
    /// Control plane manages resources in its own namespace only
    Namespaced,
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cluster => write!(f, "Cluster"),
            Self::Namespaced => write!(f, "Namespaced"),
        }
    }
}

impl FromStr for ResourceScope {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "namespaced" => Ok(Self::Namespaced),
            _ => Err(crate::Error::validation(format!(
                "invalid scope '{}', expected Cluster or Namespaced",
                s
            ))),
        }
    }
}

/// Specification for a KubeFedConfig
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.kubefed.io",
    version = "v1beta1",
    kind = "KubeFedConfig",
    plural = "kubefedconfigs",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct KubeFedConfigSpec {
    /// Scope of the control plane
    #[serde(default)]
    pub scope: ResourceScope,
}
