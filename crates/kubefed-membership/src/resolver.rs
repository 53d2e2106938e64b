//! Turning cluster names and credentials into live API clients
//!
//! Host and member clients come either from kubeconfig contexts (join,
//! unjoin) or from a KubeFedCluster registration plus its credential secret
//! (health probing of an already-joined member).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use serde_json::json;
use tracing::{debug, instrument};

#[cfg(test)]
use mockall::automock;

use kubefed_common::crd::KubeFedCluster;
use kubefed_common::kube_utils::{
    client_from_config, config_for_context, config_from_kubeconfig, DEFAULT_READ_TIMEOUT,
};
use kubefed_common::{Error, CA_CRT_KEY, TOKEN_KEY};

use crate::client::{HostClusterApi, KubeClusterClient, MemberClusterApi};

/// Source of host and member clients for a membership change
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ClusterResolver: Send + Sync {
    /// Client for the host cluster
    async fn host(&self) -> Result<Arc<dyn HostClusterApi>, Error>;

    /// Client for the member cluster, verified to be reachable.
    ///
    /// Any failure is reported as [`Error::Unreachable`] or [`Error::Config`].
    async fn member(&self) -> Result<Arc<dyn MemberClusterApi>, Error>;
}

/// Resolves both clusters from contexts of one kubeconfig
#[derive(Clone, Debug)]
pub struct KubeconfigResolver {
    kubeconfig: Option<PathBuf>,
    host_context: String,
    member_context: String,
    timeout: Duration,
}

impl KubeconfigResolver {
    /// Create a resolver; `None` for `kubeconfig` uses the default chain
    pub fn new(
        kubeconfig: Option<PathBuf>,
        host_context: impl Into<String>,
        member_context: impl Into<String>,
    ) -> Self {
        Self {
            kubeconfig,
            host_context: host_context.into(),
            member_context: member_context.into(),
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Bound every API call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn client_for(&self, context: &str) -> Result<KubeClusterClient, Error> {
        let config =
            config_for_context(self.kubeconfig.as_deref(), Some(context), self.timeout).await?;
        let endpoint = config.cluster_url.to_string();
        let client = client_from_config(config, context)?;
        Ok(KubeClusterClient::new(client, endpoint))
    }
}

#[async_trait]
impl ClusterResolver for KubeconfigResolver {
    #[instrument(skip(self), fields(context = %self.host_context))]
    async fn host(&self) -> Result<Arc<dyn HostClusterApi>, Error> {
        let client = self.client_for(&self.host_context).await?;
        debug!(endpoint = %MemberClusterApi::api_endpoint(&client), "Resolved host cluster");
        Ok(Arc::new(client))
    }

    #[instrument(skip(self), fields(context = %self.member_context))]
    async fn member(&self) -> Result<Arc<dyn MemberClusterApi>, Error> {
        let config = config_for_context(
            self.kubeconfig.as_deref(),
            Some(&self.member_context),
            self.timeout,
        )
        .await?;
        let endpoint = config.cluster_url.to_string();
        let client = client_from_config(config, &self.member_context)?;
        probe(&client, &self.member_context).await?;
        debug!(endpoint = %endpoint, "Resolved member cluster");
        Ok(Arc::new(KubeClusterClient::new(client, endpoint)))
    }
}

async fn probe(client: &Client, cluster: &str) -> Result<(), Error> {
    client
        .apiserver_version()
        .await
        .map(|_| ())
        .map_err(|e| Error::unreachable(cluster, e.to_string()))
}

/// Build an in-memory kubeconfig for a registered cluster.
///
/// The token comes from the registration's credential secret. The CA is the
/// registration's `caBundle`, falling back to the secret's `ca.crt`.
pub fn registration_kubeconfig(
    cluster: &KubeFedCluster,
    token: &str,
    secret_ca_crt: Option<&[u8]>,
) -> Result<Kubeconfig, Error> {
    let name = cluster
        .metadata
        .name
        .clone()
        .unwrap_or_else(|| "member".to_string());

    if cluster.spec.api_endpoint.is_empty() {
        return Err(Error::config(&name, "KubeFedCluster has no apiEndpoint"));
    }

    let mut cluster_entry = json!({ "server": cluster.spec.api_endpoint });
    if cluster.spec.skips_tls_verification() {
        cluster_entry["insecure-skip-tls-verify"] = json!(true);
    } else if let Some(ca) = &cluster.spec.ca_bundle {
        cluster_entry["certificate-authority-data"] = json!(ca);
    } else if let Some(ca) = secret_ca_crt {
        cluster_entry["certificate-authority-data"] = json!(STANDARD.encode(ca));
    }

    let document = json!({
        "apiVersion": "v1",
        "kind": "Config",
        "clusters": [{ "name": name, "cluster": cluster_entry }],
        "users": [{ "name": name, "user": { "token": token } }],
        "contexts": [{ "name": name, "context": { "cluster": name, "user": name } }],
        "current-context": name,
    });

    serde_json::from_value(document)
        .map_err(|e| Error::config(&name, format!("invalid generated kubeconfig: {}", e)))
}

/// Client config for a registered member cluster.
///
/// Reads the credential secret named by the registration from the host's
/// federation namespace.
pub async fn config_for_registration(
    host: &dyn HostClusterApi,
    cluster: &KubeFedCluster,
    kubefed_namespace: &str,
    timeout: Duration,
) -> Result<Config, Error> {
    let name = cluster.metadata.name.as_deref().unwrap_or("member");
    let secret_name = &cluster.spec.secret_ref.name;
    if secret_name.is_empty() {
        return Err(Error::config(name, "KubeFedCluster has no secretRef"));
    }

    let secret = host
        .get_secret(kubefed_namespace, secret_name)
        .await?
        .ok_or_else(|| {
            Error::config(
                name,
                format!("credential secret {:?} not found", secret_name),
            )
        })?;
    let data = secret.data.unwrap_or_default();

    let token = data
        .get(TOKEN_KEY)
        .ok_or_else(|| {
            Error::config(
                name,
                format!("credential secret {:?} has no {} key", secret_name, TOKEN_KEY),
            )
        })
        .and_then(|bytes| {
            String::from_utf8(bytes.0.clone())
                .map_err(|e| Error::config(name, format!("token is not UTF-8: {}", e)))
        })?;
    let ca_crt = data.get(CA_CRT_KEY).map(|bytes| bytes.0.as_slice());

    let kubeconfig = registration_kubeconfig(cluster, token.trim(), ca_crt)?;
    config_from_kubeconfig(kubeconfig, &KubeConfigOptions::default(), name, timeout).await
}

/// Member client for a registered cluster, without a reachability probe
pub async fn member_for_registration(
    host: &dyn HostClusterApi,
    cluster: &KubeFedCluster,
    kubefed_namespace: &str,
    timeout: Duration,
) -> Result<Arc<dyn MemberClusterApi>, Error> {
    let name = cluster.metadata.name.as_deref().unwrap_or("member");
    let config = config_for_registration(host, cluster, kubefed_namespace, timeout).await?;
    let client = client_from_config(config, name)?;
    Ok(Arc::new(KubeClusterClient::new(
        client,
        cluster.spec.api_endpoint.clone(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockHostClusterApi;
    use crate::registration::{credential_secret, kubefed_cluster, MemberCredentials};
    use kubefed_common::crd::TLS_VALIDATION_ALL;

    const NS: &str = "kube-federation-system";

    fn registration() -> KubeFedCluster {
        kubefed_cluster("cluster2", NS, "https://10.0.0.2:6443", "cluster2-abcde", None)
    }

    #[test]
    fn kubeconfig_carries_endpoint_and_token() {
        let kubeconfig = registration_kubeconfig(&registration(), "abc", None).unwrap();
        assert_eq!(kubeconfig.current_context.as_deref(), Some("cluster2"));
        let cluster = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(cluster.server.as_deref(), Some("https://10.0.0.2:6443"));
        assert!(cluster.certificate_authority_data.is_none());
        assert_eq!(kubeconfig.auth_infos.len(), 1);
    }

    #[test]
    fn ca_bundle_wins_over_secret_ca() {
        let mut cluster = registration();
        cluster.spec.ca_bundle = Some("Y2E=".to_string());
        let kubeconfig = registration_kubeconfig(&cluster, "abc", Some(b"other")).unwrap();
        let entry = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(entry.certificate_authority_data.as_deref(), Some("Y2E="));
    }

    #[test]
    fn secret_ca_is_encoded_when_no_bundle() {
        let kubeconfig = registration_kubeconfig(&registration(), "abc", Some(b"ca")).unwrap();
        let entry = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(entry.certificate_authority_data.as_deref(), Some("Y2E="));
    }

    #[test]
    fn disabled_validation_skips_tls_verify() {
        let mut cluster = registration();
        cluster.spec.disabled_tls_validations = vec![TLS_VALIDATION_ALL.to_string()];
        let kubeconfig = registration_kubeconfig(&cluster, "abc", Some(b"ca")).unwrap();
        let entry = kubeconfig.clusters[0].cluster.as_ref().unwrap();
        assert_eq!(entry.insecure_skip_tls_verify, Some(true));
        assert!(entry.certificate_authority_data.is_none());
    }

    #[test]
    fn missing_endpoint_is_config_error() {
        let mut cluster = registration();
        cluster.spec.api_endpoint.clear();
        let result = registration_kubeconfig(&cluster, "abc", None);
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn missing_secret_is_config_error() {
        let mut host = MockHostClusterApi::new();
        host.expect_get_secret()
            .withf(|ns, name| ns == NS && name == "cluster2-abcde")
            .returning(|_, _| Ok(None));

        let result = config_for_registration(&host, &registration(), NS, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn secret_without_token_is_config_error() {
        let mut host = MockHostClusterApi::new();
        host.expect_get_secret().returning(|_, _| {
            let mut secret = credential_secret(
                "cluster2",
                NS,
                &MemberCredentials {
                    token: Vec::new(),
                    ca_crt: None,
                },
            );
            secret.data = None;
            Ok(Some(secret))
        });

        let result = config_for_registration(&host, &registration(), NS, Duration::from_secs(5)).await;
        assert!(matches!(result, Err(Error::Config { .. })));
    }

    #[tokio::test]
    async fn config_from_secret_applies_timeout() {
        let mut host = MockHostClusterApi::new();
        host.expect_get_secret().returning(|_, _| {
            Ok(Some(credential_secret(
                "cluster2",
                NS,
                &MemberCredentials {
                    token: b"abc\n".to_vec(),
                    ca_crt: None,
                },
            )))
        });

        let config = config_for_registration(&host, &registration(), NS, Duration::from_secs(7))
            .await
            .unwrap();
        assert_eq!(config.cluster_url.host(), Some("10.0.0.2"));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(7)));
    }
}
