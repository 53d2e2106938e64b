//! Health command - Probe a joined cluster the way the control plane does
//!
//! Usage: kubefedctl health CLUSTER_NAME --host-cluster-context HOST
//!
//! Builds a client from the cluster's KubeFedCluster registration and its
//! credential secret, probes `/healthz` and node zones, and prints the
//! resulting status as JSON.

use clap::Args;
use tracing::debug;

use kubefed_common::naming::validate_cluster_name;
use kubefed_common::Error as KubefedError;
use kubefed_membership::resolver::member_for_registration;
use kubefed_membership::{ClusterResolver, HealthMonitor};

use super::ClusterArgs;
use crate::Result;

/// Probe the health of a joined cluster
#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Name of the joined cluster
    #[arg(value_name = "CLUSTER_NAME")]
    pub cluster_name: String,

    #[command(flatten)]
    pub cluster: ClusterArgs,
}

pub async fn run(args: HealthArgs) -> Result<()> {
    validate_cluster_name(&args.cluster_name)?;
    let namespace = args.cluster.kubefed_namespace.as_str();

    let host = args.cluster.resolver(&args.cluster_name).host().await?;
    let registration = host
        .get_kubefed_cluster(namespace, &args.cluster_name)
        .await?
        .ok_or_else(|| KubefedError::not_found("KubeFedCluster", args.cluster_name.as_str()))?;
    debug!(endpoint = %registration.spec.api_endpoint, "Found registration");

    let member =
        member_for_registration(host.as_ref(), &registration, namespace, args.cluster.timeout())
            .await?;
    let status = HealthMonitor::new(member, args.cluster_name.as_str())
        .get_cluster_status()
        .await;

    println!("{}", serde_json::to_string_pretty(&status)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use crate::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn parses_health() {
        let cli = Cli::try_parse_from([
            "kubefedctl",
            "--log-format",
            "json",
            "health",
            "cluster2",
            "--host-cluster-context",
            "cluster1",
            "--timeout",
            "5",
        ])
        .unwrap();
        assert_eq!(cli.log_format, kubefed_common::telemetry::LogFormat::Json);
        match cli.command {
            Commands::Health(args) => {
                assert_eq!(args.cluster_name, "cluster2");
                assert_eq!(args.cluster.timeout().as_secs(), 5);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let result = Cli::try_parse_from([
            "kubefedctl",
            "health",
            "cluster2",
            "--host-cluster-context",
            "cluster1",
            "--timeout",
            "0",
        ]);
        assert!(result.is_err());
    }
}
