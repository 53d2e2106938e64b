//! Kubernetes utilities shared by the membership operations
//!
//! Client construction (always with bounded timeouts), NotFound handling and
//! object identity checks.

use std::path::Path;
use std::time::Duration;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use tracing::trace;

use crate::Error;

/// Default connection timeout for kube clients
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default read timeout for kube clients
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Build a kube [`Config`] from an optional kubeconfig path and context.
///
/// With no path, the kube default chain (`KUBECONFIG`, `~/.kube/config`) is
/// read. With no context, the kubeconfig's current context is used.
/// Both connect and read are bounded by `timeout`.
pub async fn config_for_context(
    kubeconfig: Option<&Path>,
    context: Option<&str>,
    timeout: Duration,
) -> Result<Config, Error> {
    let source = context.unwrap_or("current-context");
    let kubeconfig = match kubeconfig {
        Some(path) => Kubeconfig::read_from(path).map_err(|e| {
            Error::config(
                source,
                format!("failed to read kubeconfig {}: {}", path.display(), e),
            )
        })?,
        None => Kubeconfig::read()
            .map_err(|e| Error::config(source, format!("failed to read kubeconfig: {}", e)))?,
    };

    let options = KubeConfigOptions {
        context: context.map(str::to_string),
        ..Default::default()
    };

    config_from_kubeconfig(kubeconfig, &options, source, timeout).await
}

/// Build a kube [`Config`] from an already-loaded [`Kubeconfig`] with timeouts applied
pub async fn config_from_kubeconfig(
    kubeconfig: Kubeconfig,
    options: &KubeConfigOptions,
    source: &str,
    timeout: Duration,
) -> Result<Config, Error> {
    let mut config = Config::from_custom_kubeconfig(kubeconfig, options)
        .await
        .map_err(|e| Error::config(source, format!("failed to load kubeconfig: {}", e)))?;
    apply_timeout(&mut config, timeout);
    Ok(config)
}

/// Bound every call made through `config` by `timeout`.
///
/// The connect timeout never exceeds [`DEFAULT_CONNECT_TIMEOUT`].
pub fn apply_timeout(config: &mut Config, timeout: Duration) {
    config.connect_timeout = Some(timeout.min(DEFAULT_CONNECT_TIMEOUT));
    config.read_timeout = Some(timeout);
    config.write_timeout = Some(timeout);
}

/// Create a kube [`Client`] from a resolved config
pub fn client_from_config(config: Config, cluster: &str) -> Result<Client, Error> {
    Client::try_from(config)
        .map_err(|e| Error::unreachable(cluster, format!("failed to create client: {}", e)))
}

/// Map a kube error for a named object, turning HTTP 404 into [`Error::NotFound`]
pub fn map_kube_error(err: kube::Error, kind: &str, name: &str) -> Error {
    match err {
        kube::Error::Api(ae) if ae.code == 404 => Error::not_found(kind, name),
        other => Error::from(other),
    }
}

/// Treat an already-absent object as success.
///
/// Returns `Ok(true)` if the operation acted on the object, `Ok(false)` if
/// the object was already gone.
pub fn ignore_not_found(result: Result<(), Error>) -> Result<bool, Error> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => {
            trace!(error = %e, "object already absent");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

/// Treat an already-existing object as success (idempotent create).
pub fn ignore_already_exists(result: Result<(), Error>) -> Result<bool, Error> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Check whether two copies of an object are the same underlying object.
///
/// Both copies are fetched by the same name, so only the UID tells them
/// apart. Objects without a UID are never considered the same.
pub fn is_same_object(a: &ObjectMeta, b: &ObjectMeta) -> bool {
    match (a.uid.as_deref(), b.uid.as_deref()) {
        (Some(a), Some(b)) => !a.is_empty() && a == b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;

    fn meta(uid: Option<&str>) -> ObjectMeta {
        ObjectMeta {
            name: Some("kube-federation-system".to_string()),
            uid: uid.map(str::to_string),
            ..Default::default()
        }
    }

    fn api_error(code: u16) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "boom".to_string(),
            reason: "Boom".to_string(),
            code,
        })
    }

    #[test]
    fn same_uid_is_same_object() {
        assert!(is_same_object(&meta(Some("abc")), &meta(Some("abc"))));
    }

    #[test]
    fn different_uid_is_different_object() {
        assert!(!is_same_object(&meta(Some("abc")), &meta(Some("def"))));
    }

    #[test]
    fn missing_uid_is_never_same() {
        assert!(!is_same_object(&meta(None), &meta(None)));
        assert!(!is_same_object(&meta(Some("")), &meta(Some(""))));
        assert!(!is_same_object(&meta(Some("abc")), &meta(None)));
    }

    #[test]
    fn map_404_to_not_found() {
        let err = map_kube_error(api_error(404), "ServiceAccount", "cluster2-cluster1");
        assert!(matches!(err, Error::NotFound { ref kind, .. } if kind == "ServiceAccount"));
    }

    #[test]
    fn map_other_codes_to_kube() {
        let err = map_kube_error(api_error(403), "ServiceAccount", "cluster2-cluster1");
        assert!(matches!(err, Error::Kube { .. }));
    }

    #[test]
    fn ignore_not_found_reports_absence() {
        assert!(ignore_not_found(Ok(())).unwrap());
        assert!(!ignore_not_found(Err(Error::not_found("Role", "r"))).unwrap());
        assert!(ignore_not_found(Err(Error::internal("boom"))).is_err());
    }

    #[test]
    fn ignore_already_exists_reports_existing() {
        let exists = Error::from(kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "exists".to_string(),
            reason: "AlreadyExists".to_string(),
            code: 409,
        }));
        assert!(!ignore_already_exists(Err(exists)).unwrap());
        assert!(ignore_already_exists(Ok(())).unwrap());
    }

    #[test]
    fn timeout_bounds_config() {
        let mut config = Config::new("https://10.0.0.1:6443".parse().unwrap());
        apply_timeout(&mut config, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(3)));

        apply_timeout(&mut config, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Some(DEFAULT_CONNECT_TIMEOUT));
        assert_eq!(config.read_timeout, Some(Duration::from_secs(60)));
    }
}
