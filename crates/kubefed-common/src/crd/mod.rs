//! Custom Resource Definitions for the federation control plane

mod cluster;
mod config;
mod types;

pub use cluster::{
    KubeFedCluster, KubeFedClusterSpec, KubeFedClusterStatus, TLS_VALIDATION_ALL,
    TLS_VALIDATION_SUBJECT_NAME, TLS_VALIDATION_VALIDITY_PERIOD,
};
pub use config::{KubeFedConfig, KubeFedConfigSpec, ResourceScope};
pub use types::{ClusterCondition, ClusterConditionType, ConditionStatus, LocalSecretReference};
