//! Delegated-access identity on member clusters
//!
//! `join` creates a service account on the member cluster plus the role and
//! binding objects that let the host's control plane act through it;
//! `unjoin` removes them again. Object names come from
//! [`kubefed_common::naming`] and must match what earlier joins created.

use std::fmt;

use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};
use tracing::{debug, info, instrument, warn};

use kubefed_common::crd::ResourceScope;
use kubefed_common::kube_utils::{ignore_already_exists, ignore_not_found};
use kubefed_common::naming::{health_check_role_name, role_name};
use kubefed_common::Error;

use crate::client::{named, MemberClusterApi};
use crate::outcome::{delete_all, TeardownOutcome};

const RBAC_API_GROUP: &str = "rbac.authorization.k8s.io";
const HEALTHZ_PATH: &str = "/healthz";

/// A role or binding owned by the delegated identity
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RbacObject {
    /// Cluster-scoped role
    ClusterRole(String),
    /// Cluster-scoped binding
    ClusterRoleBinding(String),
    /// Namespaced role
    Role {
        /// Namespace of the role
        namespace: String,
        /// Role name
        name: String,
    },
    /// Namespaced binding
    RoleBinding {
        /// Namespace of the binding
        namespace: String,
        /// Binding name
        name: String,
    },
}

impl fmt::Display for RbacObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ClusterRole(name) => write!(f, "ClusterRole {:?}", name),
            Self::ClusterRoleBinding(name) => write!(f, "ClusterRoleBinding {:?}", name),
            Self::Role { namespace, name } => write!(f, "Role {}/{}", namespace, name),
            Self::RoleBinding { namespace, name } => {
                write!(f, "RoleBinding {}/{}", namespace, name)
            }
        }
    }
}

impl RbacObject {
    async fn delete(&self, member: &dyn MemberClusterApi) -> Result<(), Error> {
        match self {
            Self::ClusterRole(name) => member.delete_cluster_role(name).await,
            Self::ClusterRoleBinding(name) => member.delete_cluster_role_binding(name).await,
            Self::Role { namespace, name } => member.delete_role(namespace, name).await,
            Self::RoleBinding { namespace, name } => {
                member.delete_role_binding(namespace, name).await
            }
        }
    }
}

/// Every role and binding a join may have created for `service_account`.
///
/// Bindings come before the roles they reference. Both scopes are covered
/// because the scope at join time is not recorded anywhere.
pub fn rbac_objects(service_account: &str, namespace: &str) -> Vec<RbacObject> {
    let role = role_name(service_account);
    let health_check_role = health_check_role_name(service_account, namespace);

    let mut objects = Vec::with_capacity(6);
    for name in [&role, &health_check_role] {
        objects.push(RbacObject::ClusterRoleBinding(name.clone()));
        objects.push(RbacObject::ClusterRole(name.clone()));
    }
    objects.push(RbacObject::RoleBinding {
        namespace: namespace.to_string(),
        name: role.clone(),
    });
    objects.push(RbacObject::Role {
        namespace: namespace.to_string(),
        name: role,
    });
    objects
}

/// Result of removing the delegated identity from a member cluster
#[derive(Debug)]
pub struct RbacTeardown {
    /// Failures among the roles and bindings
    pub roles: TeardownOutcome,
    /// Result of deleting the service account itself
    pub service_account: Result<(), Error>,
}

impl RbacTeardown {
    /// True when every role and binding is gone
    pub fn roles_deleted(&self) -> bool {
        self.roles.succeeded()
    }

    /// Fold the service-account result into a single outcome
    pub fn into_outcome(self, service_account: &str) -> TeardownOutcome {
        let mut outcome = self.roles;
        outcome.record(
            format!("ServiceAccount {:?}", service_account),
            self.service_account,
        );
        outcome
    }
}

/// Delete the delegated identity's roles, bindings and service account.
///
/// Every object is attempted even when earlier deletions fail; absence is
/// success. In dry-run mode nothing is deleted and everything succeeds.
#[instrument(skip(member, cluster_name), fields(cluster = %cluster_name))]
pub async fn delete_rbac_resources(
    member: &dyn MemberClusterApi,
    service_account: &str,
    namespace: &str,
    cluster_name: &str,
    dry_run: bool,
) -> RbacTeardown {
    let objects = rbac_objects(service_account, namespace);

    if dry_run {
        for object in &objects {
            info!(object = %object, "Dry run: would delete");
        }
        info!(service_account, namespace, "Dry run: would delete service account");
        return RbacTeardown {
            roles: TeardownOutcome::default(),
            service_account: Ok(()),
        };
    }

    debug!(service_account, "Deleting roles and bindings for service account");
    let roles = delete_all(objects, move |object| async move {
        object.delete(member).await
    })
    .await;
    if roles.succeeded() {
        debug!(service_account, "Deleted roles and bindings for service account");
    }

    debug!(service_account, namespace, "Deleting service account");
    let service_account_result =
        match ignore_not_found(member.delete_service_account(namespace, service_account).await) {
            Ok(true) => {
                debug!(service_account, "Deleted service account");
                Ok(())
            }
            Ok(false) => {
                debug!(service_account, "Service account already absent");
                Ok(())
            }
            Err(e) => {
                warn!(service_account, error = %e, "Error deleting service account");
                Err(e)
            }
        };

    RbacTeardown {
        roles,
        service_account: service_account_result,
    }
}

fn all_resources_rule() -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec!["*".to_string()]),
        resources: Some(vec!["*".to_string()]),
        verbs: vec!["*".to_string()],
        ..Default::default()
    }
}

fn healthz_rule() -> PolicyRule {
    PolicyRule {
        non_resource_urls: Some(vec![HEALTHZ_PATH.to_string()]),
        verbs: vec!["get".to_string()],
        ..Default::default()
    }
}

fn list_nodes_rule() -> PolicyRule {
    PolicyRule {
        api_groups: Some(vec![String::new()]),
        resources: Some(vec!["nodes".to_string()]),
        verbs: vec!["list".to_string()],
        ..Default::default()
    }
}

fn service_account_subject(service_account: &str, namespace: &str) -> Subject {
    Subject {
        kind: "ServiceAccount".to_string(),
        name: service_account.to_string(),
        namespace: Some(namespace.to_string()),
        ..Default::default()
    }
}

fn role_ref(kind: &str, name: &str) -> RoleRef {
    RoleRef {
        api_group: RBAC_API_GROUP.to_string(),
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

fn cluster_role(name: &str, rules: Vec<PolicyRule>) -> ClusterRole {
    ClusterRole {
        metadata: named(name, None),
        rules: Some(rules),
        ..Default::default()
    }
}

fn cluster_role_binding(name: &str, service_account: &str, namespace: &str) -> ClusterRoleBinding {
    ClusterRoleBinding {
        metadata: named(name, None),
        role_ref: role_ref("ClusterRole", name),
        subjects: Some(vec![service_account_subject(service_account, namespace)]),
    }
}

fn ensure(object: &str, result: Result<(), Error>) -> Result<(), Error> {
    if ignore_already_exists(result)? {
        debug!(object, "Created");
    } else {
        debug!(object, "Already exists");
    }
    Ok(())
}

/// Create the delegated identity on a member cluster.
///
/// Cluster scope grants full access cluster-wide. Namespaced scope grants
/// full access inside `namespace` plus a cluster role limited to health
/// checks and node listing. Existing objects are left as they are.
#[instrument(skip(member, cluster_name), fields(cluster = %cluster_name))]
pub async fn create_rbac_resources(
    member: &dyn MemberClusterApi,
    service_account: &str,
    namespace: &str,
    scope: ResourceScope,
    cluster_name: &str,
    dry_run: bool,
) -> Result<(), Error> {
    let role = role_name(service_account);

    if dry_run {
        info!(service_account, role = %role, %scope, "Dry run: would create service account, roles and bindings");
        return Ok(());
    }

    ensure(
        service_account,
        member.create_service_account(namespace, service_account).await,
    )?;

    match scope {
        ResourceScope::Cluster => {
            let rules = vec![all_resources_rule(), healthz_rule()];
            ensure(&role, member.create_cluster_role(&cluster_role(&role, rules)).await)?;
            ensure(
                &role,
                member
                    .create_cluster_role_binding(&cluster_role_binding(
                        &role,
                        service_account,
                        namespace,
                    ))
                    .await,
            )?;
        }
        ResourceScope::Namespaced => {
            let ns_role = Role {
                metadata: named(&role, Some(namespace)),
                rules: Some(vec![all_resources_rule()]),
            };
            ensure(&role, member.create_role(namespace, &ns_role).await)?;

            let binding = RoleBinding {
                metadata: named(&role, Some(namespace)),
                role_ref: role_ref("Role", &role),
                subjects: Some(vec![service_account_subject(service_account, namespace)]),
            };
            ensure(&role, member.create_role_binding(namespace, &binding).await)?;

            let health_check_role = health_check_role_name(service_account, namespace);
            let rules = vec![healthz_rule(), list_nodes_rule()];
            ensure(
                &health_check_role,
                member
                    .create_cluster_role(&cluster_role(&health_check_role, rules))
                    .await,
            )?;
            ensure(
                &health_check_role,
                member
                    .create_cluster_role_binding(&cluster_role_binding(
                        &health_check_role,
                        service_account,
                        namespace,
                    ))
                    .await,
            )?;
        }
    }

    info!(service_account, %scope, "Delegated identity ready");
    Ok(())
}
