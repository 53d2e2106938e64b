//! Federation namespace mirrored onto member clusters

use tracing::{debug, error, info, instrument};

use kubefed_common::kube_utils::{ignore_already_exists, ignore_not_found, is_same_object};
use kubefed_common::Error;

use crate::client::{HostClusterApi, MemberClusterApi};

/// What happened to the member's copy of the federation namespace
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NamespaceTeardown {
    /// The member's namespace is the host's own; left in place
    PrimaryCluster,
    /// The namespace was already absent on the member
    AlreadyAbsent,
    /// The namespace was deleted (or would have been, in dry-run mode)
    Deleted,
}

/// Remove the federation namespace from an unjoining member cluster.
///
/// Both copies are looked up by name. When the member's copy is the same
/// object as the host's, the unjoining cluster is the host itself and the
/// namespace is kept. Any lookup failure other than absence on the member
/// is an error.
#[instrument(skip(host, member, cluster_name), fields(cluster = %cluster_name))]
pub async fn delete_fed_namespace(
    host: &dyn HostClusterApi,
    member: &dyn MemberClusterApi,
    kubefed_namespace: &str,
    cluster_name: &str,
    dry_run: bool,
) -> Result<NamespaceTeardown, Error> {
    let host_namespace = host
        .get_namespace(kubefed_namespace)
        .await
        .inspect_err(|e| {
            error!(
                namespace = kubefed_namespace,
                error = %e,
                "Error retrieving namespace from host cluster"
            )
        })?
        .ok_or_else(|| Error::not_found("Namespace", kubefed_namespace))?;

    let member_namespace = member
        .get_namespace(kubefed_namespace)
        .await
        .inspect_err(|e| {
            error!(
                namespace = kubefed_namespace,
                error = %e,
                "Error retrieving namespace from unjoining cluster"
            )
        })?;

    let Some(member_namespace) = member_namespace else {
        debug!(
            namespace = kubefed_namespace,
            "Federation namespace no longer exists in unjoining cluster"
        );
        return Ok(NamespaceTeardown::AlreadyAbsent);
    };

    if is_same_object(&host_namespace.metadata, &member_namespace.metadata) {
        info!(
            namespace = kubefed_namespace,
            "Unjoining cluster is the host; federation namespace is kept"
        );
        return Ok(NamespaceTeardown::PrimaryCluster);
    }

    if dry_run {
        info!(namespace = kubefed_namespace, "Dry run: would delete federation namespace");
        return Ok(NamespaceTeardown::Deleted);
    }

    debug!(namespace = kubefed_namespace, "Deleting federation namespace from unjoining cluster");
    let deleted = ignore_not_found(member.delete_namespace(kubefed_namespace).await)
        .inspect_err(|e| {
            error!(
                namespace = kubefed_namespace,
                error = %e,
                "Could not delete namespace from unjoining cluster"
            )
        })?;

    if deleted {
        debug!(namespace = kubefed_namespace, "Deleted federation namespace");
        Ok(NamespaceTeardown::Deleted)
    } else {
        debug!(namespace = kubefed_namespace, "Federation namespace already gone");
        Ok(NamespaceTeardown::AlreadyAbsent)
    }
}

/// Make sure the federation namespace exists on a joining member cluster
#[instrument(skip(member, cluster_name), fields(cluster = %cluster_name))]
pub async fn ensure_fed_namespace(
    member: &dyn MemberClusterApi,
    kubefed_namespace: &str,
    cluster_name: &str,
    dry_run: bool,
) -> Result<(), Error> {
    if member.get_namespace(kubefed_namespace).await?.is_some() {
        debug!(namespace = kubefed_namespace, "Federation namespace already present");
        return Ok(());
    }

    if dry_run {
        info!(namespace = kubefed_namespace, "Dry run: would create federation namespace");
        return Ok(());
    }

    if ignore_already_exists(member.create_namespace(kubefed_namespace).await)? {
        info!(namespace = kubefed_namespace, "Created federation namespace");
    }
    Ok(())
}
