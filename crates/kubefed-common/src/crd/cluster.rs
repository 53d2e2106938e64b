//! KubeFedCluster Custom Resource Definition
//!
//! A KubeFedCluster is the host cluster's record that a member cluster is
//! part of the federation. It points at the member API server and at the
//! Secret holding the credentials of the delegated service account.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::{ClusterCondition, LocalSecretReference};

/// TLS validation that may be skipped when talking to a member cluster
pub const TLS_VALIDATION_ALL: &str = "*";
/// Skip only the server name check
pub const TLS_VALIDATION_SUBJECT_NAME: &str = "SubjectName";
/// Skip the validity period check
pub const TLS_VALIDATION_VALIDITY_PERIOD: &str = "ValidityPeriod";

/// Specification for a KubeFedCluster
#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "core.kubefed.io",
    version = "v1beta1",
    kind = "KubeFedCluster",
    plural = "kubefedclusters",
    status = "KubeFedClusterStatus",
    namespaced,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#,
    printcolumn = r#"{"name":"Ready","type":"string","jsonPath":".status.conditions[?(@.type=='Ready')].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct KubeFedClusterSpec {
    /// URL of the member cluster API server
    pub api_endpoint: String,

    /// Base64-encoded PEM CA bundle used to verify the member API server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_bundle: Option<String>,

    /// Secret in the federation namespace holding the member credentials
    pub secret_ref: LocalSecretReference,

    /// TLS validations to skip when connecting (`*`, `SubjectName`, `ValidityPeriod`)
    #[serde(
        default,
        rename = "disabledTLSValidations",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub disabled_tls_validations: Vec<String>,
}

impl KubeFedClusterSpec {
    /// Whether server certificate verification should be skipped entirely
    pub fn skips_tls_verification(&self) -> bool {
        self.disabled_tls_validations
            .iter()
            .any(|v| v == TLS_VALIDATION_ALL || v == TLS_VALIDATION_SUBJECT_NAME)
    }
}

/// Status for a KubeFedCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KubeFedClusterStatus {
    /// Conditions from the latest health probe
    #[serde(default)]
    pub conditions: Vec<ClusterCondition>,

    /// Zones the member cluster's nodes run in
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,

    /// Region of the member cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_uses_wire_field_names() {
        let spec = KubeFedClusterSpec {
            api_endpoint: "https://10.0.0.1:6443".to_string(),
            ca_bundle: Some("Y2E=".to_string()),
            secret_ref: LocalSecretReference {
                name: "cluster2-x7k2p".to_string(),
            },
            disabled_tls_validations: vec!["*".to_string()],
        };
        let json = serde_json::to_value(&spec).unwrap();

        assert_eq!(json["apiEndpoint"], "https://10.0.0.1:6443");
        assert_eq!(json["caBundle"], "Y2E=");
        assert_eq!(json["secretRef"]["name"], "cluster2-x7k2p");
        assert_eq!(json["disabledTLSValidations"][0], "*");
    }

    #[test]
    fn skips_tls_for_wildcard_or_subject_name() {
        let mut spec = KubeFedClusterSpec::default();
        assert!(!spec.skips_tls_verification());

        spec.disabled_tls_validations = vec![TLS_VALIDATION_VALIDITY_PERIOD.to_string()];
        assert!(!spec.skips_tls_verification());

        spec.disabled_tls_validations = vec![TLS_VALIDATION_SUBJECT_NAME.to_string()];
        assert!(spec.skips_tls_verification());

        spec.disabled_tls_validations = vec![TLS_VALIDATION_ALL.to_string()];
        assert!(spec.skips_tls_verification());
    }

    #[test]
    fn status_conditions_default_to_empty() {
        let status: KubeFedClusterStatus = serde_json::from_str("{}").unwrap();
        assert!(status.conditions.is_empty());
        assert!(status.region.is_none());
    }
}
