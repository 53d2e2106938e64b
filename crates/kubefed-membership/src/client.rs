//! Capability traits for the two clusters involved in a membership change
//!
//! The host cluster runs the federation control plane and owns the
//! KubeFedCluster registrations; the member cluster carries the delegated
//! identity and the mirrored federation namespace. Each side is its own
//! trait so orchestration code states exactly which cluster it touches, and
//! so tests can script either side with mocks.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Namespace, Node, Secret, ServiceAccount};
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use tracing::trace;

#[cfg(test)]
use mockall::automock;

use kubefed_common::crd::{KubeFedCluster, KubeFedConfig};
use kubefed_common::kube_utils::map_kube_error;
use kubefed_common::{Error, FIELD_MANAGER, KUBEFED_CONFIG_NAME};

/// Operations issued against the host cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait HostClusterApi: Send + Sync {
    /// Get a namespace, `None` if absent
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    /// Get a KubeFedCluster registration, `None` if absent
    async fn get_kubefed_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<KubeFedCluster>, Error>;

    /// Create a KubeFedCluster registration
    async fn create_kubefed_cluster(
        &self,
        namespace: &str,
        cluster: &KubeFedCluster,
    ) -> Result<KubeFedCluster, Error>;

    /// Delete a KubeFedCluster registration (`Error::NotFound` if absent)
    async fn delete_kubefed_cluster(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Get the federation's KubeFedConfig, `None` if absent
    async fn get_kubefed_config(&self, namespace: &str) -> Result<Option<KubeFedConfig>, Error>;

    /// Get a Secret, `None` if absent
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create a Secret, returning the stored object (with any generated name)
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, Error>;

    /// Delete a Secret (`Error::NotFound` if absent)
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), Error>;
}

/// Operations issued against a member cluster
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MemberClusterApi: Send + Sync {
    /// URL of the member API server as seen by this client
    fn api_endpoint(&self) -> String;

    /// Get a namespace, `None` if absent
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error>;

    /// Create a namespace
    async fn create_namespace(&self, name: &str) -> Result<(), Error>;

    /// Delete a namespace (`Error::NotFound` if absent)
    async fn delete_namespace(&self, name: &str) -> Result<(), Error>;

    /// Create a service account
    async fn create_service_account(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Delete a service account (`Error::NotFound` if absent)
    async fn delete_service_account(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Create a cluster role
    async fn create_cluster_role(&self, role: &ClusterRole) -> Result<(), Error>;

    /// Delete a cluster role (`Error::NotFound` if absent)
    async fn delete_cluster_role(&self, name: &str) -> Result<(), Error>;

    /// Create a cluster role binding
    async fn create_cluster_role_binding(&self, binding: &ClusterRoleBinding)
        -> Result<(), Error>;

    /// Delete a cluster role binding (`Error::NotFound` if absent)
    async fn delete_cluster_role_binding(&self, name: &str) -> Result<(), Error>;

    /// Create a namespaced role
    async fn create_role(&self, namespace: &str, role: &Role) -> Result<(), Error>;

    /// Delete a namespaced role (`Error::NotFound` if absent)
    async fn delete_role(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Create a namespaced role binding
    async fn create_role_binding(&self, namespace: &str, binding: &RoleBinding)
        -> Result<(), Error>;

    /// Delete a namespaced role binding (`Error::NotFound` if absent)
    async fn delete_role_binding(&self, namespace: &str, name: &str) -> Result<(), Error>;

    /// Get a Secret, `None` if absent
    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error>;

    /// Create a Secret
    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error>;

    /// GET `/healthz`, returning the raw body.
    ///
    /// Transport failures, timeouts and non-2xx responses are errors.
    async fn healthz(&self) -> Result<String, Error>;

    /// List nodes in API listing order
    async fn list_nodes(&self) -> Result<Vec<Node>, Error>;
}

/// Real client implementation backed by a kube [`Client`].
///
/// The same type serves as host or member client; which trait it is used
/// through decides what it may do.
pub struct KubeClusterClient {
    client: Client,
    api_endpoint: String,
}

impl KubeClusterClient {
    /// Create a new KubeClusterClient
    pub fn new(client: Client, api_endpoint: impl Into<String>) -> Self {
        Self {
            client,
            api_endpoint: api_endpoint.into(),
        }
    }

    async fn get_namespace_opt(&self, name: &str) -> Result<Option<Namespace>, Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn get_secret_opt(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }
}

fn post_params() -> PostParams {
    PostParams {
        field_manager: Some(FIELD_MANAGER.to_string()),
        ..Default::default()
    }
}

/// Build ObjectMeta for a named object
pub(crate) fn named(name: &str, namespace: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: namespace.map(str::to_string),
        ..Default::default()
    }
}

#[async_trait]
impl HostClusterApi for KubeClusterClient {
    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        self.get_namespace_opt(name).await
    }

    async fn get_kubefed_cluster(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<KubeFedCluster>, Error> {
        let api: Api<KubeFedCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(name).await?)
    }

    async fn create_kubefed_cluster(
        &self,
        namespace: &str,
        cluster: &KubeFedCluster,
    ) -> Result<KubeFedCluster, Error> {
        let api: Api<KubeFedCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&post_params(), cluster).await?)
    }

    async fn delete_kubefed_cluster(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<KubeFedCluster> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "KubeFedCluster", name))?;
        Ok(())
    }

    async fn get_kubefed_config(&self, namespace: &str) -> Result<Option<KubeFedConfig>, Error> {
        let api: Api<KubeFedConfig> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.get_opt(KUBEFED_CONFIG_NAME).await?)
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        self.get_secret_opt(namespace, name).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<Secret, Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.create(&post_params(), secret).await?)
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "Secret", name))?;
        Ok(())
    }
}

#[async_trait]
impl MemberClusterApi for KubeClusterClient {
    fn api_endpoint(&self) -> String {
        self.api_endpoint.clone()
    }

    async fn get_namespace(&self, name: &str) -> Result<Option<Namespace>, Error> {
        self.get_namespace_opt(name).await
    }

    async fn create_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        let ns = Namespace {
            metadata: named(name, None),
            ..Default::default()
        };
        api.create(&post_params(), &ns).await?;
        Ok(())
    }

    async fn delete_namespace(&self, name: &str) -> Result<(), Error> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "Namespace", name))?;
        Ok(())
    }

    async fn create_service_account(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        let sa = ServiceAccount {
            metadata: named(name, Some(namespace)),
            ..Default::default()
        };
        api.create(&post_params(), &sa).await?;
        Ok(())
    }

    async fn delete_service_account(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<ServiceAccount> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "ServiceAccount", name))?;
        Ok(())
    }

    async fn create_cluster_role(&self, role: &ClusterRole) -> Result<(), Error> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        api.create(&post_params(), role).await?;
        Ok(())
    }

    async fn delete_cluster_role(&self, name: &str) -> Result<(), Error> {
        let api: Api<ClusterRole> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "ClusterRole", name))?;
        Ok(())
    }

    async fn create_cluster_role_binding(
        &self,
        binding: &ClusterRoleBinding,
    ) -> Result<(), Error> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        api.create(&post_params(), binding).await?;
        Ok(())
    }

    async fn delete_cluster_role_binding(&self, name: &str) -> Result<(), Error> {
        let api: Api<ClusterRoleBinding> = Api::all(self.client.clone());
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "ClusterRoleBinding", name))?;
        Ok(())
    }

    async fn create_role(&self, namespace: &str, role: &Role) -> Result<(), Error> {
        let api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
        api.create(&post_params(), role).await?;
        Ok(())
    }

    async fn delete_role(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<Role> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "Role", name))?;
        Ok(())
    }

    async fn create_role_binding(
        &self,
        namespace: &str,
        binding: &RoleBinding,
    ) -> Result<(), Error> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        api.create(&post_params(), binding).await?;
        Ok(())
    }

    async fn delete_role_binding(&self, namespace: &str, name: &str) -> Result<(), Error> {
        let api: Api<RoleBinding> = Api::namespaced(self.client.clone(), namespace);
        api.delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, "RoleBinding", name))?;
        Ok(())
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<Option<Secret>, Error> {
        self.get_secret_opt(namespace, name).await
    }

    async fn create_secret(&self, namespace: &str, secret: &Secret) -> Result<(), Error> {
        let api: Api<Secret> = Api::namespaced(self.client.clone(), namespace);
        api.create(&post_params(), secret).await?;
        Ok(())
    }

    async fn healthz(&self) -> Result<String, Error> {
        let request = http::Request::get("/healthz")
            .body(Vec::new())
            .map_err(|e| Error::internal_with_context("healthz", e.to_string()))?;
        let body = self.client.request_text(request).await?;
        trace!(endpoint = %self.api_endpoint, body = %body, "healthz responded");
        Ok(body)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>, Error> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }
}
