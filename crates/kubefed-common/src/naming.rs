//! Naming conventions shared with existing federation deployments
//!
//! Every name produced here is persisted on member clusters by `join` and
//! looked up again by `unjoin`, so the formats must never change.

use crate::Error;

/// Prefix for every role and binding owned by the federation controller
const CONTROLLER_ROLE_PREFIX: &str = "kubefed-controller-manager";

/// Characters that cannot appear in names derived from the host cluster name
const RESERVED_NAME_CHARS: [char; 2] = ['/', ':'];

/// Maximum length of an RFC 1123 subdomain
const MAX_SUBDOMAIN_LEN: usize = 253;

/// Name of the service account created on a member cluster for the host.
pub fn cluster_service_account_name(joining_cluster_name: &str, host_cluster_name: &str) -> String {
    format!("{}-{}", joining_cluster_name, host_cluster_name)
}

/// Name of the cluster role, role and their bindings for a service account.
pub fn role_name(service_account_name: &str) -> String {
    format!("{}:{}", CONTROLLER_ROLE_PREFIX, service_account_name)
}

/// Name of the health-check cluster role and binding for a namespace-scoped join.
pub fn health_check_role_name(service_account_name: &str, namespace: &str) -> String {
    format!(
        "{}:{}:healthcheck-{}",
        CONTROLLER_ROLE_PREFIX, namespace, service_account_name
    )
}

/// Validate a member cluster name as an RFC 1123 subdomain.
///
/// Rules:
/// - 1 to 253 characters
/// - dot-separated labels of lowercase alphanumerics and hyphens
/// - each label starts and ends with an alphanumeric
pub fn validate_cluster_name(name: &str) -> Result<(), Error> {
    if name.is_empty() {
        return Err(Error::validation("cluster name is required"));
    }
    if name.len() > MAX_SUBDOMAIN_LEN {
        return Err(Error::validation_for(
            name,
            format!("cluster name must be at most {} characters", MAX_SUBDOMAIN_LEN),
        ));
    }

    for label in name.split('.') {
        let valid_chars = label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
        let alnum_edges = label
            .chars()
            .next()
            .zip(label.chars().last())
            .map(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric())
            .unwrap_or(false);

        if !valid_chars || !alnum_edges {
            return Err(Error::validation_for(
                name,
                "cluster name must be a valid RFC 1123 subdomain \
                 (lowercase alphanumerics, '-' and '.', starting and ending with an alphanumeric)",
            ));
        }
    }

    Ok(())
}

/// Resolve the host cluster name embedded in RBAC object names.
///
/// An explicit `host_cluster_name` override wins and must not contain `/` or
/// `:`. Without an override the raw host context is used, so the context
/// itself must be free of those characters.
pub fn resolve_host_cluster_name(
    host_cluster_name: Option<&str>,
    host_cluster_context: &str,
) -> Result<String, Error> {
    match host_cluster_name.filter(|n| !n.is_empty()) {
        Some(name) if name.contains(RESERVED_NAME_CHARS) => Err(Error::validation_for(
            name,
            "host-cluster-name may not contain \"/\" or \":\"",
        )),
        Some(name) => Ok(name.to_string()),
        None if host_cluster_context.contains(RESERVED_NAME_CHARS) => {
            Err(Error::validation_for(
                host_cluster_context,
                "host-cluster-name must be set if the name of the host cluster context contains one of \":\" or \"/\"",
            ))
        }
        None => Ok(host_cluster_context.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_account_joins_member_and_host() {
        assert_eq!(
            cluster_service_account_name("cluster2", "cluster1"),
            "cluster2-cluster1"
        );
    }

    #[test]
    fn role_name_is_prefixed() {
        assert_eq!(
            role_name("cluster2-cluster1"),
            "kubefed-controller-manager:cluster2-cluster1"
        );
    }

    #[test]
    fn health_check_role_name_includes_namespace() {
        assert_eq!(
            health_check_role_name("cluster2-cluster1", "kube-federation-system"),
            "kubefed-controller-manager:kube-federation-system:healthcheck-cluster2-cluster1"
        );
    }

    #[test]
    fn cluster_name_accepts_subdomains() {
        assert!(validate_cluster_name("cluster2").is_ok());
        assert!(validate_cluster_name("east.prod-1").is_ok());
        assert!(validate_cluster_name("0abc").is_ok());
    }

    #[test]
    fn cluster_name_rejects_bad_shapes() {
        assert!(validate_cluster_name("").is_err());
        assert!(validate_cluster_name("Cluster2").is_err());
        assert!(validate_cluster_name("-cluster").is_err());
        assert!(validate_cluster_name("cluster-").is_err());
        assert!(validate_cluster_name("a..b").is_err());
        assert!(validate_cluster_name("kind:cluster").is_err());
        assert!(validate_cluster_name(&"a".repeat(254)).is_err());
    }

    #[test]
    fn host_name_override_wins() {
        assert_eq!(
            resolve_host_cluster_name(Some("host"), "arn:aws:eks/host").unwrap(),
            "host"
        );
    }

    #[test]
    fn host_name_override_rejects_reserved_chars() {
        assert!(resolve_host_cluster_name(Some("a/b"), "cluster1").is_err());
        assert!(resolve_host_cluster_name(Some("a:b"), "cluster1").is_err());
    }

    #[test]
    fn host_context_used_without_override() {
        assert_eq!(
            resolve_host_cluster_name(None, "cluster1").unwrap(),
            "cluster1"
        );
        assert_eq!(
            resolve_host_cluster_name(Some(""), "cluster1").unwrap(),
            "cluster1"
        );
    }

    #[test]
    fn host_context_with_reserved_chars_needs_override() {
        let err = resolve_host_cluster_name(None, "arn:aws:eks:us-east-1:1234:cluster/host")
            .unwrap_err();
        assert!(err.to_string().contains("host-cluster-name must be set"));
    }
}
