//! CLI commands

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use kubefed_common::DEFAULT_KUBEFED_NAMESPACE;
use kubefed_membership::KubeconfigResolver;

pub mod health;
pub mod join;
pub mod unjoin;

/// Options shared by every subcommand
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Path to kubeconfig (defaults to $KUBECONFIG, then ~/.kube/config)
    #[arg(long)]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context of the host cluster
    #[arg(long)]
    pub host_cluster_context: String,

    /// Namespace the federation control plane runs in
    #[arg(long, default_value = DEFAULT_KUBEFED_NAMESPACE)]
    pub kubefed_namespace: String,

    /// Log what would change without changing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Bound on every API call, in seconds
    #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(u64).range(1..))]
    pub timeout: u64,
}

impl ClusterArgs {
    /// Per-call timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Resolver for the host and the given member context
    pub fn resolver(&self, member_context: &str) -> KubeconfigResolver {
        KubeconfigResolver::new(
            self.kubeconfig.clone(),
            self.host_cluster_context.as_str(),
            member_context,
        )
        .with_timeout(self.timeout())
    }
}
