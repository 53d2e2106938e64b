//! Federation membership: join, unjoin and health probing of member clusters
//!
//! Every operation talks to clusters only through [`HostClusterApi`] and
//! [`MemberClusterApi`]. Clients are obtained from a [`ClusterResolver`],
//! normally a [`KubeconfigResolver`] reading kubeconfig contexts.
//!
//! Unjoin and join are sequences of idempotent steps: an object that is
//! already absent (unjoin) or already present (join) counts as done, so a
//! failed run can simply be repeated. Retry policy is left to the caller.

#![deny(missing_docs)]

pub mod client;
pub mod health;
pub mod join;
pub mod namespace;
pub mod outcome;
pub mod rbac;
pub mod registration;
pub mod resolver;
pub mod unjoin;

pub use client::{HostClusterApi, KubeClusterClient, MemberClusterApi};
pub use health::{ClusterZones, HealthMonitor};
pub use join::{join, join_cluster, JoinOptions};
pub use outcome::{TeardownFailure, TeardownOutcome};
pub use resolver::{ClusterResolver, KubeconfigResolver};
pub use unjoin::{unjoin, unjoin_cluster, UnjoinOptions, UnjoinReport};
