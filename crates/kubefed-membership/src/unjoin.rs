//! Removing a member cluster from the federation
//!
//! Unjoin runs strictly in order:
//!
//! 1. resolve the host (fatal on failure)
//! 2. resolve the member (fatal unless forced; forced unjoins continue without it)
//! 3. delete the delegated identity on the member, best effort
//! 4. delete the mirrored federation namespace on the member, unless it is the host's own
//! 5. deregister the cluster on the host, only if 3 and 4 fully succeeded or the unjoin is forced
//!
//! Every step treats an absent object as done, so running unjoin again after
//! a partial failure is always safe.

use tracing::{debug, error, instrument, warn};

use kubefed_common::naming::{
    cluster_service_account_name, resolve_host_cluster_name, validate_cluster_name,
};
use kubefed_common::{Error, DEFAULT_KUBEFED_NAMESPACE};

use crate::client::{HostClusterApi, MemberClusterApi};
use crate::namespace::{delete_fed_namespace, NamespaceTeardown};
use crate::outcome::TeardownOutcome;
use crate::rbac::delete_rbac_resources;
use crate::registration::{delete_cluster_and_secret, Deregistration};
use crate::resolver::ClusterResolver;

/// Validated, immutable parameters of one unjoin
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnjoinOptions {
    /// Name of the cluster being removed
    pub cluster_name: String,
    /// Host cluster name used to derive delegated identity names
    pub host_cluster_name: String,
    /// Federation namespace on the host and members
    pub kubefed_namespace: String,
    /// Deregister on the host even if member cleanup was not confirmed
    pub force_deletion: bool,
    /// Evaluate every step without mutating anything
    pub dry_run: bool,
}

impl UnjoinOptions {
    /// Validate names before any network call.
    ///
    /// `host_cluster_name` overrides `host_cluster_context` for naming; the
    /// effective one may not contain `/` or `:`.
    pub fn new(
        cluster_name: &str,
        host_cluster_context: &str,
        host_cluster_name: Option<&str>,
    ) -> Result<Self, Error> {
        validate_cluster_name(cluster_name)?;
        let host_cluster_name = resolve_host_cluster_name(host_cluster_name, host_cluster_context)?;
        Ok(Self {
            cluster_name: cluster_name.to_string(),
            host_cluster_name,
            kubefed_namespace: DEFAULT_KUBEFED_NAMESPACE.to_string(),
            force_deletion: false,
            dry_run: false,
        })
    }

    /// Use a non-default federation namespace
    pub fn with_namespace(mut self, kubefed_namespace: impl Into<String>) -> Self {
        self.kubefed_namespace = kubefed_namespace.into();
        self
    }

    /// Set force deletion
    pub fn with_force_deletion(mut self, force_deletion: bool) -> Self {
        self.force_deletion = force_deletion;
        self
    }

    /// Set dry run
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Name of the member's delegated service account
    pub fn service_account_name(&self) -> String {
        cluster_service_account_name(&self.cluster_name, &self.host_cluster_name)
    }
}

/// What an unjoin did
#[derive(Debug, Default)]
pub struct UnjoinReport {
    /// The member was unavailable and member-side cleanup was skipped
    pub member_skipped: bool,
    /// Member-side objects that could not be removed
    pub teardown: TeardownOutcome,
    /// Fate of the member's federation namespace, if it was looked at
    pub namespace: Option<NamespaceTeardown>,
    /// Host-side deregistration, `None` when it was withheld
    pub deregistration: Option<Deregistration>,
}

impl UnjoinReport {
    /// True when member-side cleanup fully succeeded
    pub fn teardown_succeeded(&self) -> bool {
        !self.member_skipped && self.teardown.succeeded()
    }

    /// True when host-side deregistration ran
    pub fn deregistered(&self) -> bool {
        self.deregistration.is_some()
    }

    /// True when deregistration ran and left nothing behind on the host
    pub fn fully_deregistered(&self) -> bool {
        self.deregistration
            .as_ref()
            .is_some_and(|d| d.failures.succeeded())
    }
}

/// Resolve both clusters and unjoin.
///
/// Host resolution failure is always an error. Member resolution failure is
/// an error unless `force_deletion` is set, in which case only the host
/// side is cleaned up.
#[instrument(skip(resolver, options), fields(cluster = %options.cluster_name))]
pub async fn unjoin(
    resolver: &dyn ClusterResolver,
    options: &UnjoinOptions,
) -> Result<UnjoinReport, Error> {
    let host = resolver.host().await.map_err(|e| {
        error!(error = %e, "Failed to get host cluster client");
        e
    })?;

    let member = match resolver.member().await {
        Ok(member) => Some(member),
        Err(e) if options.force_deletion => {
            warn!(error = %e, "Unjoining cluster unavailable, forcing host-side cleanup only");
            None
        }
        Err(e) => {
            error!(error = %e, "Failed to get unjoining cluster client");
            return Err(e);
        }
    };

    unjoin_cluster(host.as_ref(), member.as_deref(), options).await
}

/// Unjoin with already-resolved clients.
///
/// Partial member-side failures are reported, not returned as errors: the
/// registration is then kept on the host so that a later run can finish.
#[instrument(skip(host, member, options), fields(cluster = %options.cluster_name))]
pub async fn unjoin_cluster(
    host: &dyn HostClusterApi,
    member: Option<&dyn MemberClusterApi>,
    options: &UnjoinOptions,
) -> Result<UnjoinReport, Error> {
    let mut report = UnjoinReport::default();
    let namespace = options.kubefed_namespace.as_str();
    let cluster_name = options.cluster_name.as_str();

    match member {
        Some(member) => {
            let service_account = options.service_account_name();
            let rbac = delete_rbac_resources(
                member,
                &service_account,
                namespace,
                cluster_name,
                options.dry_run,
            )
            .await;
            report.teardown.merge(rbac.into_outcome(&service_account));

            match delete_fed_namespace(host, member, namespace, cluster_name, options.dry_run).await
            {
                Ok(outcome) => report.namespace = Some(outcome),
                Err(e) => {
                    error!(error = %e, "Error deleting federation namespace from unjoining cluster");
                    report
                        .teardown
                        .record(format!("Namespace {:?}", namespace), Err(e));
                }
            }
        }
        None => report.member_skipped = true,
    }

    if report.teardown_succeeded() || options.force_deletion {
        let deregistration =
            delete_cluster_and_secret(host, namespace, cluster_name, options.dry_run).await;
        if deregistration.failures.succeeded() {
            debug!(dry_run = options.dry_run, "Cluster unjoined");
        } else {
            warn!(
                leftover = %deregistration.failures,
                "Cluster deregistration incomplete, host objects remain"
            );
        }
        report.deregistration = Some(deregistration);
    } else {
        warn!(
            failures = %report.teardown,
            "Member cleanup incomplete, keeping KubeFedCluster registration; rerun or use --force"
        );
    }

    Ok(report)
}
