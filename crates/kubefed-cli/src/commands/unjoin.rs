//! Unjoin command - Remove a cluster from the federation
//!
//! Usage: kubefedctl unjoin CLUSTER_NAME --host-cluster-context HOST [--force] [--dry-run]
//!
//! Deletes the delegated service account and its roles from the cluster,
//! deletes the federation namespace there (unless the cluster is the host),
//! then deletes the KubeFedCluster and its secret from the host. The host
//! registration is only deleted when the member cleanup fully succeeded or
//! `--force` is given.

use clap::Args;
use tracing::{debug, warn};

use kubefed_membership::{unjoin, UnjoinOptions};

use super::ClusterArgs;
use crate::Result;

/// Remove a cluster from the federation
#[derive(Args, Debug)]
pub struct UnjoinArgs {
    /// Name of the cluster to unjoin
    #[arg(value_name = "CLUSTER_NAME")]
    pub cluster_name: String,

    /// Kubeconfig context of the cluster (defaults to CLUSTER_NAME)
    #[arg(long)]
    pub cluster_context: Option<String>,

    /// Host cluster name used in delegated identity names (defaults to the host context)
    #[arg(long)]
    pub host_cluster_name: Option<String>,

    /// Deregister from the host even if the cluster is unreachable or cleanup fails
    #[arg(long)]
    pub force: bool,

    #[command(flatten)]
    pub cluster: ClusterArgs,
}

impl UnjoinArgs {
    /// Validated options for this invocation
    pub fn options(&self) -> Result<UnjoinOptions> {
        Ok(UnjoinOptions::new(
            &self.cluster_name,
            &self.cluster.host_cluster_context,
            self.host_cluster_name.as_deref(),
        )?
        .with_namespace(self.cluster.kubefed_namespace.as_str())
        .with_force_deletion(self.force)
        .with_dry_run(self.cluster.dry_run))
    }

    /// Kubeconfig context of the unjoining cluster
    pub fn member_context(&self) -> &str {
        self.cluster_context.as_deref().unwrap_or(&self.cluster_name)
    }
}

pub async fn run(args: UnjoinArgs) -> Result<()> {
    let options = args.options()?;
    let resolver = args.cluster.resolver(args.member_context());

    let report = unjoin(&resolver, &options).await?;
    if report.fully_deregistered() {
        debug!(cluster = %options.cluster_name, dry_run = options.dry_run, "Unjoin complete");
    } else if let Some(deregistration) = &report.deregistration {
        warn!(
            cluster = %options.cluster_name,
            leftover = %deregistration.failures,
            "Cluster deregistered with host objects left behind; delete them manually or rerun"
        );
    } else {
        warn!(
            cluster = %options.cluster_name,
            failures = %report.teardown,
            "Cluster not deregistered; fix the failures and rerun, or rerun with --force"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> UnjoinArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Unjoin(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn parses_minimal_unjoin() {
        let args = parse(&[
            "kubefedctl",
            "unjoin",
            "cluster2",
            "--host-cluster-context",
            "cluster1",
        ]);
        assert_eq!(args.cluster_name, "cluster2");
        assert_eq!(args.member_context(), "cluster2");
        assert!(!args.force);
        assert!(!args.cluster.dry_run);
        assert_eq!(args.cluster.kubefed_namespace, "kube-federation-system");

        let options = args.options().unwrap();
        assert_eq!(options.service_account_name(), "cluster2-cluster1");
        assert!(!options.force_deletion);
    }

    #[test]
    fn parses_all_flags() {
        let args = parse(&[
            "kubefedctl",
            "unjoin",
            "cluster2",
            "--host-cluster-context",
            "arn:aws:eks:us-east-1:1:cluster/c1",
            "--host-cluster-name",
            "c1",
            "--cluster-context",
            "ctx2",
            "--kubefed-namespace",
            "fed",
            "--kubeconfig",
            "/tmp/kc",
            "--timeout",
            "10",
            "--force",
            "--dry-run",
        ]);
        assert_eq!(args.member_context(), "ctx2");

        let options = args.options().unwrap();
        assert_eq!(options.host_cluster_name, "c1");
        assert_eq!(options.kubefed_namespace, "fed");
        assert!(options.force_deletion);
        assert!(options.dry_run);
        assert_eq!(args.cluster.timeout().as_secs(), 10);
    }

    #[test]
    fn cluster_name_is_required() {
        let result = Cli::try_parse_from(["kubefedctl", "unjoin", "--host-cluster-context", "c1"]);
        assert!(result.is_err());
    }

    #[test]
    fn host_context_is_required() {
        let result = Cli::try_parse_from(["kubefedctl", "unjoin", "cluster2"]);
        assert!(result.is_err());
    }

    #[test]
    fn reserved_characters_in_host_context_need_an_override() {
        let args = parse(&[
            "kubefedctl",
            "unjoin",
            "cluster2",
            "--host-cluster-context",
            "arn:aws:eks/c1",
        ]);
        assert!(args.options().is_err());
    }
}
