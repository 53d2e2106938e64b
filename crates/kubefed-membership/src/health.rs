//! Member cluster liveness and topology probing
//!
//! A [`HealthMonitor`] holds one member client and is read-only after
//! construction, so one monitor per cluster can be polled concurrently.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::Node;
use tracing::{debug, instrument, warn};

use kubefed_common::crd::{
    ClusterCondition, ClusterConditionType, ConditionStatus, KubeFedClusterStatus,
};
use kubefed_common::{Error, LABEL_ZONE_FAILURE_DOMAIN, LABEL_ZONE_REGION};

use crate::client::MemberClusterApi;

/// Zones and region a member cluster's nodes run in
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClusterZones {
    /// Distinct zone labels across all nodes
    pub zones: BTreeSet<String>,
    /// Region label of the first listed node
    pub region: Option<String>,
}

/// Probes one member cluster
pub struct HealthMonitor {
    client: Arc<dyn MemberClusterApi>,
    cluster_name: String,
}

impl HealthMonitor {
    /// Create a monitor for `cluster_name` using `client`
    pub fn new(client: Arc<dyn MemberClusterApi>, cluster_name: impl Into<String>) -> Self {
        Self {
            client,
            cluster_name: cluster_name.into(),
        }
    }

    /// Name of the monitored cluster
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    /// Probe `/healthz` once and classify the result.
    ///
    /// - request error: `[Offline=True]`
    /// - body `ok` (any case): `[Ready=True]`
    /// - any other body: `[Ready=False, Offline=False]`
    ///
    /// The missing counterpart condition in the first two cases is left for
    /// the status publisher to infer.
    #[instrument(skip(self), fields(cluster = %self.cluster_name))]
    pub async fn get_cluster_health_status(&self) -> Vec<ClusterCondition> {
        let now = Utc::now();
        match self.client.healthz().await {
            Err(e) => {
                warn!(error = %e, "Failed to do cluster health check");
                vec![offline(now)]
            }
            Ok(body) if body.eq_ignore_ascii_case("ok") => {
                debug!("Cluster is ready");
                vec![ready(now)]
            }
            Ok(body) => {
                debug!(body = %body, "Cluster reachable but not ready");
                vec![not_ready(now), not_offline(now)]
            }
        }
    }

    /// List nodes and collect their zones, taking the region from the first node
    #[instrument(skip(self), fields(cluster = %self.cluster_name))]
    pub async fn get_cluster_zones(&self) -> Result<ClusterZones, Error> {
        let nodes = self.client.list_nodes().await.map_err(|e| {
            warn!(error = %e, "Failed to list nodes while getting zone names");
            e
        })?;
        Ok(zones_for_nodes(&nodes))
    }

    /// Conditions plus topology, in the shape stored on a KubeFedCluster.
    ///
    /// Topology is only gathered from a ready cluster; a failed node listing
    /// leaves zones and region empty.
    pub async fn get_cluster_status(&self) -> KubeFedClusterStatus {
        let conditions = self.get_cluster_health_status().await;
        let is_ready = conditions.iter().any(|c| {
            c.type_ == ClusterConditionType::Ready && c.status == ConditionStatus::True
        });

        let mut status = KubeFedClusterStatus {
            conditions,
            ..Default::default()
        };
        if is_ready {
            if let Ok(zones) = self.get_cluster_zones().await {
                status.zones = zones.zones.into_iter().collect();
                status.region = zones.region;
            }
        }
        status
    }
}

fn label<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(key))
        .map(String::as_str)
        .filter(|value| !value.is_empty())
}

/// Zones of all nodes; region of the first node only
pub fn zones_for_nodes(nodes: &[Node]) -> ClusterZones {
    ClusterZones {
        zones: nodes
            .iter()
            .filter_map(|node| label(node, LABEL_ZONE_FAILURE_DOMAIN))
            .map(str::to_string)
            .collect(),
        region: nodes
            .first()
            .and_then(|node| label(node, LABEL_ZONE_REGION))
            .map(str::to_string),
    }
}

fn ready(now: DateTime<Utc>) -> ClusterCondition {
    ClusterCondition::new(
        ClusterConditionType::Ready,
        ConditionStatus::True,
        "ClusterReady",
        "/healthz responded with ok",
        now,
    )
}

fn not_ready(now: DateTime<Utc>) -> ClusterCondition {
    ClusterCondition::new(
        ClusterConditionType::Ready,
        ConditionStatus::False,
        "ClusterNotReady",
        "/healthz responded without ok",
        now,
    )
}

fn offline(now: DateTime<Utc>) -> ClusterCondition {
    ClusterCondition::new(
        ClusterConditionType::Offline,
        ConditionStatus::True,
        "ClusterNotReachable",
        "cluster is not reachable",
        now,
    )
}

fn not_offline(now: DateTime<Utc>) -> ClusterCondition {
    ClusterCondition::new(
        ClusterConditionType::Offline,
        ConditionStatus::False,
        "ClusterReachable",
        "cluster is reachable",
        now,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

    use crate::client::MockMemberClusterApi;

    fn monitor(member: MockMemberClusterApi) -> HealthMonitor {
        HealthMonitor::new(Arc::new(member), "cluster2")
    }

    fn node(name: &str, zone: Option<&str>, region: Option<&str>) -> Node {
        let mut labels = BTreeMap::new();
        if let Some(zone) = zone {
            labels.insert(LABEL_ZONE_FAILURE_DOMAIN.to_string(), zone.to_string());
        }
        if let Some(region) = region {
            labels.insert(LABEL_ZONE_REGION.to_string(), region.to_string());
        }
        Node {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                labels: Some(labels),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn kinds(conditions: &[ClusterCondition]) -> Vec<(ClusterConditionType, ConditionStatus)> {
        conditions.iter().map(|c| (c.type_, c.status)).collect()
    }

    #[tokio::test]
    async fn ok_body_is_ready() {
        let mut member = MockMemberClusterApi::new();
        member
            .expect_healthz()
            .returning(|| Ok("OK".to_string()));

        let conditions = monitor(member).get_cluster_health_status().await;
        assert_eq!(
            kinds(&conditions),
            vec![(ClusterConditionType::Ready, ConditionStatus::True)]
        );
        assert_eq!(conditions[0].reason, "ClusterReady");
        assert_eq!(conditions[0].last_probe_time, conditions[0].last_transition_time);
    }

    #[tokio::test]
    async fn request_error_is_offline() {
        let mut member = MockMemberClusterApi::new();
        member
            .expect_healthz()
            .returning(|| Err(Error::unreachable("cluster2", "timed out")));

        let conditions = monitor(member).get_cluster_health_status().await;
        assert_eq!(
            kinds(&conditions),
            vec![(ClusterConditionType::Offline, ConditionStatus::True)]
        );
        assert_eq!(conditions[0].reason, "ClusterNotReachable");
    }

    #[tokio::test]
    async fn unexpected_body_is_reachable_but_not_ready() {
        let mut member = MockMemberClusterApi::new();
        member
            .expect_healthz()
            .returning(|| Ok("degraded".to_string()));

        let conditions = monitor(member).get_cluster_health_status().await;
        assert_eq!(
            kinds(&conditions),
            vec![
                (ClusterConditionType::Ready, ConditionStatus::False),
                (ClusterConditionType::Offline, ConditionStatus::False),
            ]
        );
        assert_eq!(conditions[0].message, "/healthz responded without ok");
        assert_eq!(conditions[1].reason, "ClusterReachable");
    }

    #[tokio::test]
    async fn case_folding_is_ascii_only() {
        let mut member = MockMemberClusterApi::new();
        member
            .expect_healthz()
            .returning(|| Ok("o\u{212A}".to_string()));

        let conditions = monitor(member).get_cluster_health_status().await;
        assert_eq!(
            kinds(&conditions),
            vec![
                (ClusterConditionType::Ready, ConditionStatus::False),
                (ClusterConditionType::Offline, ConditionStatus::False),
            ]
        );
    }

    #[tokio::test]
    async fn zones_deduplicate_and_region_comes_from_first_node() {
        let mut member = MockMemberClusterApi::new();
        member.expect_list_nodes().returning(|| {
            Ok(vec![
                node("n1", Some("a"), Some("r1")),
                node("n2", Some("a"), Some("r2")),
                node("n3", Some("b"), Some("r2")),
            ])
        });

        let zones = monitor(member).get_cluster_zones().await.unwrap();
        assert_eq!(
            zones.zones,
            BTreeSet::from(["a".to_string(), "b".to_string()])
        );
        assert_eq!(zones.region.as_deref(), Some("r1"));
    }

    #[test]
    fn unlabelled_first_node_means_no_region() {
        let zones = zones_for_nodes(&[node("n1", None, None), node("n2", Some("a"), Some("r2"))]);
        assert_eq!(zones.zones.len(), 1);
        assert_eq!(zones.region, None);
    }

    #[test]
    fn no_nodes_means_no_topology() {
        assert_eq!(zones_for_nodes(&[]), ClusterZones::default());
    }

    #[tokio::test]
    async fn node_listing_failure_is_an_error() {
        let mut member = MockMemberClusterApi::new();
        member
            .expect_list_nodes()
            .returning(|| Err(Error::internal("forbidden")));

        assert!(monitor(member).get_cluster_zones().await.is_err());
    }

    #[tokio::test]
    async fn status_includes_topology_when_ready() {
        let mut member = MockMemberClusterApi::new();
        member.expect_healthz().returning(|| Ok("ok".to_string()));
        member
            .expect_list_nodes()
            .returning(|| Ok(vec![node("n1", Some("a"), Some("r1"))]));

        let status = monitor(member).get_cluster_status().await;
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.zones, vec!["a".to_string()]);
        assert_eq!(status.region.as_deref(), Some("r1"));
    }

    #[tokio::test]
    async fn status_skips_topology_when_offline() {
        let mut member = MockMemberClusterApi::new();
        member
            .expect_healthz()
            .returning(|| Err(Error::unreachable("cluster2", "refused")));
        member.expect_list_nodes().never();

        let status = monitor(member).get_cluster_status().await;
        assert!(status.zones.is_empty());
        assert!(status.region.is_none());
    }
}
