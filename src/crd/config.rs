//! Config Custom Resource Definition
//!
//! Defines the cluster-scoped `Config` resource holding the desired state of
//! the integrated image registry and the status the operator reports back.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::{Affinity, ResourceRequirements, Toleration, TopologySpreadConstraint};
use kube::{CustomResource, ResourceExt};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::duration::Duration;
use super::operator::{OperatorSpec, OperatorStatus};
use super::schema::{atomic_list, atomic_map, empty_as_none, is_default};
use super::storage::ImageRegistryConfigStorage;

// =============================================================================
// Config CRD
// =============================================================================

/// Configuration object for the integrated image registry.
///
/// The operator only acts on the instance named `cluster`.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "imageregistry.operator.openshift.io",
    version = "v1",
    kind = "Config",
    plural = "configs",
    status = "ImageRegistryStatus",
    derive = "PartialEq",
    printcolumn = r#"{"name": "Management", "type": "string", "jsonPath": ".spec.managementState"}"#,
    printcolumn = r#"{"name": "Replicas", "type": "integer", "jsonPath": ".spec.replicas"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistrySpec {
    /// Operator specific configuration
    #[serde(flatten)]
    pub operator: OperatorSpec,

    /// httpSecret is the value needed by the registry to secure uploads,
    /// generated by default.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http_secret: String,

    /// proxy defines the proxy to be used when calling master api, upstream
    /// registries, etc.
    #[serde(default, skip_serializing_if = "ImageRegistryConfigProxy::is_empty")]
    pub proxy: ImageRegistryConfigProxy,

    /// storage details for configuring registry storage, e.g. S3 bucket
    /// coordinates.
    #[serde(default, skip_serializing_if = "is_default")]
    pub storage: ImageRegistryConfigStorage,

    /// readOnly indicates whether the registry instance should reject
    /// attempts to push new images or delete existing ones.
    #[serde(default, skip_serializing_if = "is_default")]
    pub read_only: bool,

    /// disableRedirect controls whether to route all data through the
    /// Registry, rather than redirecting to the backend.
    #[serde(default, skip_serializing_if = "is_default")]
    pub disable_redirect: bool,

    /// requests controls how many parallel requests a given registry instance
    /// will handle before queuing additional requests.
    #[serde(default, skip_serializing_if = "is_default")]
    #[schemars(schema_with = "requests_schema")]
    pub requests: ImageRegistryConfigRequests,

    /// defaultRoute indicates whether an external facing route for the
    /// registry should be created using the default generated hostname.
    #[serde(default, skip_serializing_if = "is_default")]
    pub default_route: bool,

    /// routes defines additional external facing routes which should be
    /// created for the registry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "routes_schema")]
    pub routes: Vec<ImageRegistryConfigRoute>,

    /// replicas determines the number of registry instances to run.
    pub replicas: i32,

    /// logging is deprecated, use logLevel instead.
    #[serde(default, skip_serializing_if = "is_default")]
    pub logging: i64,

    /// resources defines the resource requests+limits for the registry pod.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "resources_schema")]
    pub resources: Option<ResourceRequirements>,

    /// nodeSelector defines the node selection constraints for the registry
    /// pod.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    #[schemars(schema_with = "node_selector_schema")]
    pub node_selector: BTreeMap<String, String>,

    /// tolerations defines the tolerations for the registry pod.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "tolerations_schema")]
    pub tolerations: Vec<Toleration>,

    /// rolloutStrategy defines rollout strategy for the image registry
    /// deployment.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub rollout_strategy: Option<RolloutStrategy>,

    /// affinity is a group of node affinity scheduling rules for the image
    /// registry pod(s).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "affinity_schema")]
    pub affinity: Option<Affinity>,

    /// topologySpreadConstraints specify how to spread matching pods among
    /// the given topology.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "topology_spread_constraints_schema")]
    pub topology_spread_constraints: Vec<TopologySpreadConstraint>,
}

fn requests_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_map::<ImageRegistryConfigRequests>(gen)
}

fn routes_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_list::<ImageRegistryConfigRoute>(gen)
}

fn resources_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_map::<Option<ResourceRequirements>>(gen)
}

fn node_selector_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_map::<BTreeMap<String, String>>(gen)
}

fn tolerations_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_list::<Toleration>(gen)
}

fn affinity_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_map::<Option<Affinity>>(gen)
}

fn topology_spread_constraints_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_list::<TopologySpreadConstraint>(gen)
}

/// Deployment rollout strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum RolloutStrategy {
    RollingUpdate,
    Recreate,
}

// =============================================================================
// Status
// =============================================================================

/// Image registry operational status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryStatus {
    /// Operator level status
    #[serde(flatten)]
    pub operator: OperatorStatus,

    /// storageManaged is deprecated, please refer to Storage.managementState
    #[serde(default)]
    pub storage_managed: bool,

    /// storage indicates the current applied storage configuration of the
    /// registry.
    #[serde(default)]
    pub storage: ImageRegistryConfigStorage,
}

// =============================================================================
// Supporting Types
// =============================================================================

/// Proxy configuration used by the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigProxy {
    /// http defines the proxy to be used by the image registry when accessing
    /// HTTP endpoints.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub http: String,

    /// https defines the proxy to be used by the image registry when
    /// accessing HTTPS endpoints.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub https: String,

    /// noProxy defines a comma-separated list of host names that shouldn't
    /// go through any proxy.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub no_proxy: String,
}

impl ImageRegistryConfigProxy {
    pub fn is_empty(&self) -> bool {
        self.http.is_empty() && self.https.is_empty() && self.no_proxy.is_empty()
    }
}

/// Registry limits on read and write requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageRegistryConfigRequests {
    /// read defines limits for image registry's reads.
    #[serde(default, skip_serializing_if = "is_default")]
    pub read: ImageRegistryConfigRequestsLimits,

    /// write defines limits for image registry's writes.
    #[serde(default, skip_serializing_if = "is_default")]
    pub write: ImageRegistryConfigRequestsLimits,
}

/// Limits on in-flight, queued and waiting API requests
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigRequestsLimits {
    /// maxRunning sets the maximum in flight api requests to the registry.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_running: i64,

    /// maxInQueue sets the maximum queued api requests to the registry.
    #[serde(default, skip_serializing_if = "is_default")]
    pub max_in_queue: i64,

    /// maxWaitInQueue sets the maximum time a request can wait in the queue
    /// before being rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_wait_in_queue: Option<Duration>,
}

/// External route access to the registry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigRoute {
    /// name of the route to be created.
    pub name: String,

    /// hostname for the route.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,

    /// secretName points to secret containing the certificates to be used by
    /// the route.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub secret_name: String,
}

// =============================================================================
// Implementations
// =============================================================================

impl Config {
    /// Name of the only instance the operator acts on
    pub const SINGLETON_NAME: &'static str = "cluster";

    /// Get the resource name
    pub fn name(&self) -> String {
        self.name_any()
    }

    /// Check whether this is the instance the operator acts on
    pub fn is_singleton(&self) -> bool {
        self.metadata.name.as_deref() == Some(Self::SINGLETON_NAME)
    }
}

impl ImageRegistryStatus {
    /// Build a status recording the storage configuration that was applied
    pub fn with_applied_storage(storage: ImageRegistryConfigStorage) -> Self {
        Self {
            storage,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::storage::StorageManagementState;
    use kube::CustomResourceExt;
    use serde_json::json;

    fn config_from(value: serde_json::Value) -> Config {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_config_minimal() {
        let config = config_from(json!({
            "apiVersion": "imageregistry.operator.openshift.io/v1",
            "kind": "Config",
            "metadata": {"name": "cluster"},
            "spec": {"replicas": 1}
        }));

        assert_eq!(config.name(), "cluster");
        assert!(config.is_singleton());
        assert_eq!(config.spec.replicas, 1);
        assert!(!config.spec.storage.is_configured());
        assert!(config.status.is_none());
    }

    #[test]
    fn test_spec_requires_replicas() {
        let err = serde_json::from_value::<ImageRegistrySpec>(json!({"readOnly": true})).unwrap_err();
        assert!(err.to_string().contains("replicas"));
    }

    #[test]
    fn test_spec_flattens_operator_fields() {
        let spec: ImageRegistrySpec = serde_json::from_value(json!({
            "managementState": "Removed",
            "logLevel": "Debug",
            "replicas": 2,
            "httpSecret": "s3cr3t"
        }))
        .unwrap();

        assert_eq!(
            spec.operator.management_state,
            crate::crd::ManagementState::Removed
        );
        assert_eq!(spec.operator.log_level, Some(crate::crd::LogLevel::Debug));
        assert_eq!(spec.http_secret, "s3cr3t");

        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["managementState"], "Removed");
        assert!(json.get("operator").is_none());
    }

    #[test]
    fn test_spec_rollout_strategy() {
        let spec: ImageRegistrySpec =
            serde_json::from_value(json!({"replicas": 1, "rolloutStrategy": "Recreate"})).unwrap();
        assert_eq!(spec.rollout_strategy, Some(RolloutStrategy::Recreate));

        let spec: ImageRegistrySpec =
            serde_json::from_value(json!({"replicas": 1, "rolloutStrategy": ""})).unwrap();
        assert_eq!(spec.rollout_strategy, None);

        assert!(serde_json::from_value::<ImageRegistrySpec>(
            json!({"replicas": 1, "rolloutStrategy": "BlueGreen"})
        )
        .is_err());
    }

    #[test]
    fn test_spec_omits_empty_fields() {
        let spec = ImageRegistrySpec {
            replicas: 1,
            ..Default::default()
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json, json!({"managementState": "Managed", "replicas": 1}));
    }

    #[test]
    fn test_requests_limits() {
        let requests: ImageRegistryConfigRequests = serde_json::from_value(json!({
            "read": {"maxRunning": 10, "maxInQueue": 5, "maxWaitInQueue": "1m30s"},
            "write": {"maxRunning": 2}
        }))
        .unwrap();

        assert_eq!(requests.read.max_running, 10);
        assert_eq!(requests.read.max_in_queue, 5);
        assert_eq!(
            requests.read.max_wait_in_queue.unwrap().as_std().as_secs(),
            90
        );
        assert_eq!(requests.write.max_wait_in_queue, None);
    }

    #[test]
    fn test_routes_keep_order() {
        let spec: ImageRegistrySpec = serde_json::from_value(json!({
            "replicas": 1,
            "routes": [
                {"name": "b", "hostname": "b.example.com"},
                {"name": "a", "secretName": "a-tls"}
            ]
        }))
        .unwrap();

        let names: Vec<&str> = spec.routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert_eq!(spec.routes[1].secret_name, "a-tls");
    }

    #[test]
    fn test_status_always_serializes_storage() {
        let status = ImageRegistryStatus::default();
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(
            json,
            json!({"readyReplicas": 0, "storageManaged": false, "storage": {}})
        );
    }

    #[test]
    fn test_status_applied_storage() {
        let storage: ImageRegistryConfigStorage =
            serde_json::from_value(json!({"pvc": {"claim": "c"}, "managementState": "Managed"}))
                .unwrap();
        let status = ImageRegistryStatus::with_applied_storage(storage);
        assert_eq!(status.storage.pvc().unwrap().claim, "c");
        assert_eq!(
            status.storage.management_state,
            Some(StorageManagementState::Managed)
        );
    }

    #[test]
    fn test_crd_metadata() {
        let crd = Config::crd();
        assert_eq!(
            crd.metadata.name.as_deref(),
            Some("configs.imageregistry.operator.openshift.io")
        );
        assert_eq!(crd.spec.scope, "Cluster");
        assert_eq!(crd.spec.names.kind, "Config");
        assert_eq!(crd.spec.versions[0].name, "v1");
        assert!(crd.spec.versions[0]
            .subresources
            .as_ref()
            .and_then(|s| s.status.as_ref())
            .is_some());
    }

    #[test]
    fn test_crd_schema_markers() {
        let crd = Config::crd();
        let schema = serde_json::to_value(
            crd.spec.versions[0]
                .schema
                .as_ref()
                .and_then(|s| s.open_api_v3_schema.as_ref())
                .unwrap(),
        )
        .unwrap();
        let spec = &schema["properties"]["spec"]["properties"];

        assert_eq!(spec["routes"]["x-kubernetes-list-type"], "atomic");
        assert_eq!(spec["tolerations"]["x-kubernetes-list-type"], "atomic");
        assert_eq!(spec["nodeSelector"]["x-kubernetes-map-type"], "atomic");
        assert_eq!(spec["requests"]["x-kubernetes-map-type"], "atomic");
        assert!(spec["storage"]["x-kubernetes-validations"].is_array());
        assert_eq!(
            spec["requests"]["properties"]["read"]["properties"]["maxWaitInQueue"]["format"],
            "duration"
        );
    }
}
