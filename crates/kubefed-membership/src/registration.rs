//! KubeFedCluster registrations and their credential secrets on the host

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use tracing::{debug, error, info, instrument, warn};

use kubefed_common::crd::{KubeFedCluster, KubeFedClusterSpec, LocalSecretReference};
use kubefed_common::kube_utils::ignore_not_found;
use kubefed_common::{Error, CA_CRT_KEY, TOKEN_KEY};

use crate::client::{named, HostClusterApi};
use crate::outcome::TeardownOutcome;

/// Result of removing a registration from the host
#[derive(Debug, Default)]
pub struct Deregistration {
    /// Whether a registration existed when the call started
    pub found: bool,
    /// Secret or registration deletions that failed
    pub failures: TeardownOutcome,
}

/// Delete a cluster's registration and the credential secret it references.
///
/// Never fails: an absent registration means the cluster is already
/// deregistered, and deletion failures are logged and reported in the
/// returned value only.
#[instrument(skip(host))]
pub async fn delete_cluster_and_secret(
    host: &dyn HostClusterApi,
    kubefed_namespace: &str,
    cluster_name: &str,
    dry_run: bool,
) -> Deregistration {
    let mut result = Deregistration::default();

    let registration = match host.get_kubefed_cluster(kubefed_namespace, cluster_name).await {
        Ok(Some(registration)) => registration,
        Ok(None) => {
            warn!("KubeFedCluster not found in host cluster, nothing to deregister");
            return result;
        }
        Err(e) => {
            error!(error = %e, "Failed to get KubeFedCluster from host cluster");
            result
                .failures
                .record(format!("KubeFedCluster {:?}", cluster_name), Err(e));
            return result;
        }
    };
    result.found = true;

    let secret_name = registration.spec.secret_ref.name.clone();
    if dry_run {
        info!(secret = %secret_name, "Dry run: would delete credential secret and KubeFedCluster");
        return result;
    }

    let secret_object = format!("Secret {:?}", secret_name);
    match ignore_not_found(host.delete_secret(kubefed_namespace, &secret_name).await) {
        Ok(true) => debug!(secret = %secret_name, "Deleted credential secret"),
        Ok(false) => warn!(secret = %secret_name, "Credential secret already absent"),
        Err(e) => {
            error!(secret = %secret_name, error = %e, "Could not delete credential secret");
            result.failures.record(secret_object, Err(e));
        }
    }

    let cluster_object = format!("KubeFedCluster {:?}", cluster_name);
    match ignore_not_found(
        host.delete_kubefed_cluster(kubefed_namespace, cluster_name)
            .await,
    ) {
        Ok(true) => info!("Deleted KubeFedCluster"),
        Ok(false) => warn!("KubeFedCluster already absent"),
        Err(e) => {
            error!(error = %e, "Could not delete KubeFedCluster");
            result.failures.record(cluster_object, Err(e));
        }
    }

    result
}

/// Credentials of the delegated identity, as read from the member
#[derive(Clone, Debug, PartialEq)]
pub struct MemberCredentials {
    /// Bearer token of the service account
    pub token: Vec<u8>,
    /// PEM CA bundle of the member API server, if published
    pub ca_crt: Option<Vec<u8>>,
}

/// Credential secret to create on the host for `cluster_name`
pub fn credential_secret(
    cluster_name: &str,
    kubefed_namespace: &str,
    credentials: &MemberCredentials,
) -> Secret {
    let mut data = BTreeMap::new();
    data.insert(TOKEN_KEY.to_string(), ByteString(credentials.token.clone()));
    if let Some(ca) = &credentials.ca_crt {
        data.insert(CA_CRT_KEY.to_string(), ByteString(ca.clone()));
    }

    Secret {
        metadata: ObjectMeta {
            generate_name: Some(format!("{}-", cluster_name)),
            namespace: Some(kubefed_namespace.to_string()),
            ..Default::default()
        },
        type_: Some("Opaque".to_string()),
        data: Some(data),
        ..Default::default()
    }
}

/// KubeFedCluster registration pointing at `secret_name`
pub fn kubefed_cluster(
    cluster_name: &str,
    kubefed_namespace: &str,
    api_endpoint: &str,
    secret_name: &str,
    ca_crt: Option<&[u8]>,
) -> KubeFedCluster {
    KubeFedCluster {
        metadata: named(cluster_name, Some(kubefed_namespace)),
        spec: KubeFedClusterSpec {
            api_endpoint: api_endpoint.to_string(),
            ca_bundle: ca_crt.map(|ca| STANDARD.encode(ca)),
            secret_ref: LocalSecretReference {
                name: secret_name.to_string(),
            },
            disabled_tls_validations: Vec::new(),
        },
        status: None,
    }
}

/// Register a member cluster on the host.
///
/// When a registration with this name already exists, it is returned as is
/// unless `error_on_existing` is set, in which case that is an error. The
/// credential secret is only created for a new registration.
#[instrument(skip(host, api_endpoint, credentials))]
pub async fn create_cluster_and_secret(
    host: &dyn HostClusterApi,
    kubefed_namespace: &str,
    cluster_name: &str,
    api_endpoint: &str,
    credentials: &MemberCredentials,
    error_on_existing: bool,
    dry_run: bool,
) -> Result<KubeFedCluster, Error> {
    if let Some(existing) = host
        .get_kubefed_cluster(kubefed_namespace, cluster_name)
        .await?
    {
        if error_on_existing {
            return Err(Error::validation_for(
                cluster_name,
                format!(
                    "federated cluster {:?} already exists in host cluster",
                    cluster_name
                ),
            ));
        }
        info!("KubeFedCluster already exists, keeping it");
        return Ok(existing);
    }

    let secret = credential_secret(cluster_name, kubefed_namespace, credentials);
    let ca_crt = credentials.ca_crt.as_deref();

    if dry_run {
        let placeholder = format!("{}-", cluster_name);
        info!("Dry run: would create credential secret and KubeFedCluster");
        return Ok(kubefed_cluster(
            cluster_name,
            kubefed_namespace,
            api_endpoint,
            &placeholder,
            ca_crt,
        ));
    }

    let created = host.create_secret(kubefed_namespace, &secret).await?;
    let secret_name = created.metadata.name.ok_or_else(|| {
        Error::internal_with_context(
            "create_cluster_and_secret",
            "host returned credential secret without a name",
        )
    })?;
    debug!(secret = %secret_name, "Created credential secret");

    let registration = kubefed_cluster(
        cluster_name,
        kubefed_namespace,
        api_endpoint,
        &secret_name,
        ca_crt,
    );
    let created = match host
        .create_kubefed_cluster(kubefed_namespace, &registration)
        .await
    {
        Ok(created) => created,
        Err(e) => {
            // Only a KubeFedCluster references the generated secret
            if let Err(cleanup) =
                ignore_not_found(host.delete_secret(kubefed_namespace, &secret_name).await)
            {
                warn!(
                    secret = %secret_name,
                    error = %cleanup,
                    "Could not delete credential secret after failed registration"
                );
            }
            return Err(e);
        }
    };
    info!(secret = %secret_name, "Created KubeFedCluster");
    Ok(created)
}
