//! Common types for kubefed: CRDs, errors, naming conventions and kube utilities

#![deny(missing_docs)]

pub mod crd;
pub mod error;
pub mod kube_utils;
pub mod naming;
pub mod telemetry;

pub use error::Error;

/// Result type alias using our custom Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Namespace in the host cluster where the federation control plane runs
pub const DEFAULT_KUBEFED_NAMESPACE: &str = "kube-federation-system";

/// Name of the singleton KubeFedConfig object in the federation namespace
pub const KUBEFED_CONFIG_NAME: &str = "kubefed";

/// Field manager / user agent used for every mutation issued by this tooling
pub const FIELD_MANAGER: &str = "kubefedctl";

/// Secret key holding the bearer token of the delegated identity
pub const TOKEN_KEY: &str = "token";

/// Secret key holding the member API server CA bundle
pub const CA_CRT_KEY: &str = "ca.crt";

/// Node label carrying the failure-domain zone
pub const LABEL_ZONE_FAILURE_DOMAIN: &str = "failure-domain.beta.kubernetes.io/zone";

/// Node label carrying the failure-domain region
pub const LABEL_ZONE_REGION: &str = "failure-domain.beta.kubernetes.io/region";
