//! Join command - Add a cluster to the federation
//!
//! Usage: kubefedctl join CLUSTER_NAME --host-cluster-context HOST [--scope Cluster|Namespaced]

use clap::Args;
use tracing::info;

use kubefed_common::crd::ResourceScope;
use kubefed_membership::{join, JoinOptions};

use super::ClusterArgs;
use crate::Result;

/// Add a cluster to the federation
#[derive(Args, Debug)]
pub struct JoinArgs {
    /// Name of the cluster to join
    #[arg(value_name = "CLUSTER_NAME")]
    pub cluster_name: String,

    /// Kubeconfig context of the cluster (defaults to CLUSTER_NAME)
    #[arg(long)]
    pub cluster_context: Option<String>,

    /// Host cluster name used in delegated identity names (defaults to the host context)
    #[arg(long)]
    pub host_cluster_name: Option<String>,

    /// Scope of the delegated identity (defaults to the KubeFedConfig scope)
    #[arg(long)]
    pub scope: Option<ResourceScope>,

    /// Fail if the cluster is already registered
    #[arg(long)]
    pub error_on_existing: bool,

    #[command(flatten)]
    pub cluster: ClusterArgs,
}

impl JoinArgs {
    /// Validated options for this invocation
    pub fn options(&self) -> Result<JoinOptions> {
        Ok(JoinOptions::new(
            &self.cluster_name,
            &self.cluster.host_cluster_context,
            self.host_cluster_name.as_deref(),
        )?
        .with_namespace(self.cluster.kubefed_namespace.as_str())
        .with_scope(self.scope)
        .with_error_on_existing(self.error_on_existing)
        .with_dry_run(self.cluster.dry_run)
        .with_token_timeout(self.cluster.timeout()))
    }

    /// Kubeconfig context of the joining cluster
    pub fn member_context(&self) -> &str {
        self.cluster_context.as_deref().unwrap_or(&self.cluster_name)
    }
}

pub async fn run(args: JoinArgs) -> Result<()> {
    let options = args.options()?;
    let resolver = args.cluster.resolver(args.member_context());

    let registration = join(&resolver, &options).await?;
    info!(
        cluster = %options.cluster_name,
        endpoint = %registration.spec.api_endpoint,
        dry_run = options.dry_run,
        "Join complete"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Cli, Commands};
    use clap::Parser;

    fn parse(args: &[&str]) -> JoinArgs {
        let cli = Cli::try_parse_from(args).unwrap();
        match cli.command {
            Commands::Join(args) => args,
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn scope_defaults_to_config() {
        let args = parse(&["kubefedctl", "join", "cluster2", "--host-cluster-context", "cluster1"]);
        let options = args.options().unwrap();
        assert_eq!(options.scope, None);
        assert!(!options.error_on_existing);
        assert_eq!(options.token_timeout.as_secs(), 30);
    }

    #[test]
    fn parses_scope_and_existing_flag() {
        let args = parse(&[
            "kubefedctl",
            "join",
            "cluster2",
            "--host-cluster-context",
            "cluster1",
            "--scope",
            "namespaced",
            "--error-on-existing",
            "--cluster-context",
            "kind-cluster2",
        ]);
        assert_eq!(args.member_context(), "kind-cluster2");
        let options = args.options().unwrap();
        assert_eq!(options.scope, Some(ResourceScope::Namespaced));
        assert!(options.error_on_existing);
    }

    #[test]
    fn rejects_unknown_scope() {
        let result = Cli::try_parse_from([
            "kubefedctl",
            "join",
            "cluster2",
            "--host-cluster-context",
            "cluster1",
            "--scope",
            "global",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn rejects_invalid_cluster_name() {
        let args = parse(&["kubefedctl", "join", "Cluster_2", "--host-cluster-context", "cluster1"]);
        assert!(args.options().is_err());
    }
}
