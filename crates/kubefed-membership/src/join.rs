//! Admitting a member cluster into the federation
//!
//! The mirror of unjoin: make sure the federation namespace exists on the
//! member, create the delegated identity there, wait for its token, then
//! register the cluster on the host with that token. Every create treats an
//! existing object as done, so a join can be rerun after a failure.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use tracing::{debug, info, instrument, trace};

use kubefed_common::crd::{KubeFedCluster, ResourceScope};
use kubefed_common::kube_utils::{ignore_already_exists, DEFAULT_READ_TIMEOUT};
use kubefed_common::naming::{
    cluster_service_account_name, resolve_host_cluster_name, validate_cluster_name,
};
use kubefed_common::{Error, CA_CRT_KEY, DEFAULT_KUBEFED_NAMESPACE, TOKEN_KEY};

use crate::client::{HostClusterApi, MemberClusterApi};
use crate::namespace::ensure_fed_namespace;
use crate::rbac::create_rbac_resources;
use crate::registration::{create_cluster_and_secret, MemberCredentials};
use crate::resolver::ClusterResolver;

/// Interval between checks for a populated service account token
const TOKEN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Secret type populated by the token controller
const SERVICE_ACCOUNT_TOKEN_TYPE: &str = "kubernetes.io/service-account-token";

/// Annotation binding a token secret to its service account
const SERVICE_ACCOUNT_NAME_ANNOTATION: &str = "kubernetes.io/service-account.name";

/// Validated, immutable parameters of one join
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinOptions {
    /// Name of the cluster being admitted
    pub cluster_name: String,
    /// Host cluster name used to derive delegated identity names
    pub host_cluster_name: String,
    /// Federation namespace on the host and members
    pub kubefed_namespace: String,
    /// Scope of the delegated identity; `None` reads it from the KubeFedConfig
    pub scope: Option<ResourceScope>,
    /// Fail when the cluster is already registered
    pub error_on_existing: bool,
    /// Evaluate every step without mutating anything
    pub dry_run: bool,
    /// How long to wait for the token controller
    pub token_timeout: Duration,
}

impl JoinOptions {
    /// Validate names before any network call, with the same rules as unjoin
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
            scope: None,
            error_on_existing: false,
            dry_run: false,
            token_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// Use a non-default federation namespace
    pub fn with_namespace(mut self, kubefed_namespace: impl Into<String>) -> Self {
        self.kubefed_namespace = kubefed_namespace.into();
        self
    }

    /// Force the scope of the delegated identity
    pub fn with_scope(mut self, scope: Option<ResourceScope>) -> Self {
        self.scope = scope;
        self
    }

    /// Set error on existing
    pub fn with_error_on_existing(mut self, error_on_existing: bool) -> Self {
        self.error_on_existing = error_on_existing;
        self
    }

    /// Set dry run
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Set the token wait bound
    pub fn with_token_timeout(mut self, token_timeout: Duration) -> Self {
        self.token_timeout = token_timeout;
        self
    }

    /// Name of the member's delegated service account
    pub fn service_account_name(&self) -> String {
        cluster_service_account_name(&self.cluster_name, &self.host_cluster_name)
    }
}

/// Resolve both clusters and join. Neither may be unavailable.
#[instrument(skip(resolver, options), fields(cluster = %options.cluster_name))]
pub async fn join(
    resolver: &dyn ClusterResolver,
    options: &JoinOptions,
) -> Result<KubeFedCluster, Error> {
    let host = resolver.host().await?;
    let member = resolver.member().await?;
    join_cluster(host.as_ref(), member.as_ref(), options).await
}

/// Join with already-resolved clients, returning the registration
#[instrument(skip(host, member, options), fields(cluster = %options.cluster_name))]
pub async fn join_cluster(
    host: &dyn HostClusterApi,
    member: &dyn MemberClusterApi,
    options: &JoinOptions,
) -> Result<KubeFedCluster, Error> {
    let namespace = options.kubefed_namespace.as_str();
    let cluster_name = options.cluster_name.as_str();

    let scope = match options.scope {
        Some(scope) => scope,
        None => host
            .get_kubefed_config(namespace)
            .await?
            .map(|config| config.spec.scope)
            .unwrap_or_default(),
    };
    info!(%scope, "Joining cluster");

    ensure_fed_namespace(member, namespace, cluster_name, options.dry_run).await?;

    let service_account = options.service_account_name();
    create_rbac_resources(
        member,
        &service_account,
        namespace,
        scope,
        cluster_name,
        options.dry_run,
    )
    .await?;

    let credentials = if options.dry_run {
        info!(service_account = %service_account, "Dry run: would mint service account token");
        MemberCredentials {
            token: Vec::new(),
            ca_crt: None,
        }
    } else {
        mint_credentials(member, namespace, &service_account, options.token_timeout).await?
    };

    create_cluster_and_secret(
        host,
        namespace,
        cluster_name,
        &member.api_endpoint(),
        &credentials,
        options.error_on_existing,
        options.dry_run,
    )
    .await
}

/// Name of the token secret minted for a service account
pub fn token_secret_name(service_account: &str) -> String {
    format!("{}-token", service_account)
}

fn token_secret(service_account: &str, namespace: &str) -> Secret {
    Secret {
        metadata: ObjectMeta {
            name: Some(token_secret_name(service_account)),
            namespace: Some(namespace.to_string()),
            annotations: Some(BTreeMap::from([(
                SERVICE_ACCOUNT_NAME_ANNOTATION.to_string(),
                service_account.to_string(),
            )])),
            ..Default::default()
        },
        type_: Some(SERVICE_ACCOUNT_TOKEN_TYPE.to_string()),
        ..Default::default()
    }
}

fn populated_credentials(secret: &Secret) -> Option<MemberCredentials> {
    let data = secret.data.as_ref()?;
    let token = data.get(TOKEN_KEY).filter(|t| !t.0.is_empty())?;
    Some(MemberCredentials {
        token: token.0.clone(),
        ca_crt: data.get(CA_CRT_KEY).map(|ca| ca.0.clone()),
    })
}

/// Create a token secret for the service account and wait until the token
/// controller fills it in.
#[instrument(skip(member))]
async fn mint_credentials(
    member: &dyn MemberClusterApi,
    namespace: &str,
    service_account: &str,
    timeout: Duration,
) -> Result<MemberCredentials, Error> {
    let secret = token_secret(service_account, namespace);
    let name = token_secret_name(service_account);
    if ignore_already_exists(member.create_secret(namespace, &secret).await)? {
        debug!(secret = %name, "Created service account token secret");
    }

    let start = Instant::now();
    loop {
        match member.get_secret(namespace, &name).await? {
            Some(secret) => {
                if let Some(credentials) = populated_credentials(&secret) {
                    debug!(secret = %name, "Service account token populated");
                    return Ok(credentials);
                }
                trace!(secret = %name, "Token not yet populated");
            }
            None => trace!(secret = %name, "Token secret not visible yet"),
        }

        if start.elapsed() >= timeout {
            return Err(Error::internal_with_context(
                "mint_credentials",
                format!(
                    "timed out after {:?} waiting for token in secret {:?}",
                    timeout, name
                ),
            ));
        }
        tokio::time::sleep(TOKEN_POLL_INTERVAL).await;
    }
}
