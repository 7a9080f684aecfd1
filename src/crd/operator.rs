//! Operator spec/status fields shared by operator-managed resources
//!
//! These are inlined into [`ImageRegistrySpec`](super::ImageRegistrySpec) and
//! [`ImageRegistryStatus`](super::ImageRegistryStatus) and describe how the
//! operator itself treats the registry, independent of registry settings.

use chrono::{DateTime, Utc};
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::schema::{empty_as_none, is_default, preserve_unknown_fields};

// =============================================================================
// Operator Spec
// =============================================================================

/// Operator-level configuration common to all operator-managed components
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorSpec {
    /// managementState indicates whether and how the operator should manage the component.
    #[serde(default)]
    pub management_state: ManagementState,

    /// logLevel is an intent based logging for an overall component. It does
    /// not give fine grained control, but it is a simple way to manage coarse
    /// grained logging choices that operators have to interpret for their operands.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub log_level: Option<LogLevel>,

    /// operatorLogLevel is an intent based logging for the operator itself.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    pub operator_log_level: Option<LogLevel>,

    /// unsupportedConfigOverrides overrides the final configuration that was
    /// computed by the operator. Use of this field is unsupported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub unsupported_config_overrides: Option<serde_json::Value>,

    /// observedConfig holds a sparse config that controller has observed from
    /// the cluster state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "preserve_unknown_fields")]
    pub observed_config: Option<serde_json::Value>,
}

/// Whether and how the operator manages a component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ManagementState {
    /// The operator is actively managing the component
    #[default]
    Managed,
    /// The operator ignores the component
    Unmanaged,
    /// The operator manages the component even when it reports errors
    Force,
    /// The operator removes the component
    Removed,
}

impl std::fmt::Display for ManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ManagementState::Managed => write!(f, "Managed"),
            ManagementState::Unmanaged => write!(f, "Unmanaged"),
            ManagementState::Force => write!(f, "Force"),
            ManagementState::Removed => write!(f, "Removed"),
        }
    }
}

/// Coarse logging intent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum LogLevel {
    #[default]
    Normal,
    Debug,
    Trace,
    TraceAll,
}

// =============================================================================
// Operator Status
// =============================================================================

/// Operator-level observed state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorStatus {
    /// observedGeneration is the last generation change you've dealt with
    #[serde(default, skip_serializing_if = "is_default")]
    pub observed_generation: i64,

    /// conditions is a list of conditions and their status
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schemars(schema_with = "conditions_schema")]
    pub conditions: Vec<OperatorCondition>,

    /// version is the level this availability applies to
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,

    /// readyReplicas indicates how many replicas are ready and at the desired state
    #[serde(default)]
    pub ready_replicas: i32,

    /// latestAvailableRevision is the deploymentID of the most recent deployment
    #[serde(default, skip_serializing_if = "is_default")]
    pub latest_available_revision: i32,

    /// generations are used to determine when an item needs to be reconciled
    /// or has changed in a way that needs a reaction.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generations: Vec<GenerationStatus>,
}

/// Condition reported by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperatorCondition {
    /// Type of condition
    pub r#type: String,

    /// Status: True, False, or Unknown
    pub status: ConditionStatus,

    /// Last time the condition transitioned
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_transition_time: Option<DateTime<Utc>>,

    /// Machine-readable reason
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,

    /// Human-readable message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Condition status values
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub enum ConditionStatus {
    True,
    False,
    Unknown,
}

/// Tracks the generation of a resource the operator reacts to
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerationStatus {
    /// group is the group of the thing you're tracking
    pub group: String,

    /// resource is the resource type of the thing you're tracking
    pub resource: String,

    /// namespace is where the thing you're tracking is
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,

    /// name is the name of the thing you're tracking
    pub name: String,

    /// lastGeneration is the last generation of the workload controller involved
    #[serde(default)]
    pub last_generation: i64,

    /// hash is an optional field set for resources without generation that
    /// are content sensitive like secrets and configmaps
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

fn conditions_schema(gen: &mut SchemaGenerator) -> Schema {
    let mut object = Vec::<OperatorCondition>::json_schema(gen).into_object();
    object
        .extensions
        .insert("x-kubernetes-list-type".to_string(), json!("map"));
    object
        .extensions
        .insert("x-kubernetes-list-map-keys".to_string(), json!(["type"]));
    Schema::Object(object)
}

// =============================================================================
// Implementations
// =============================================================================

impl OperatorCondition {
    /// Create a condition stamped with the current time
    pub fn new(
        condition_type: impl Into<String>,
        status: ConditionStatus,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            r#type: condition_type.into(),
            status,
            last_transition_time: Some(Utc::now()),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}

impl OperatorStatus {
    /// Update a condition, creating it if it doesn't exist.
    ///
    /// The previous transition time is kept when the status value is unchanged.
    pub fn set_condition(&mut self, mut condition: OperatorCondition) {
        if let Some(existing) = self
            .conditions
            .iter_mut()
            .find(|c| c.r#type == condition.r#type)
        {
            if existing.status == condition.status {
                condition.last_transition_time = existing.last_transition_time;
            }
            *existing = condition;
        } else {
            self.conditions.push(condition);
        }
    }

    /// Look up a condition by type
    pub fn condition(&self, condition_type: &str) -> Option<&OperatorCondition> {
        self.conditions.iter().find(|c| c.r#type == condition_type)
    }

    /// Check whether a condition is present with status True
    pub fn is_condition_true(&self, condition_type: &str) -> bool {
        self.condition(condition_type)
            .is_some_and(|c| c.status == ConditionStatus::True)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_management_state_default_and_display() {
        assert_eq!(ManagementState::default(), ManagementState::Managed);
        assert_eq!(format!("{}", ManagementState::Removed), "Removed");
        assert_eq!(
            serde_json::to_string(&ManagementState::Force).unwrap(),
            "\"Force\""
        );
    }

    #[test]
    fn test_operator_spec_empty_log_level_is_unset() {
        let spec: OperatorSpec =
            serde_json::from_str(r#"{"managementState":"Unmanaged","logLevel":""}"#).unwrap();
        assert_eq!(spec.management_state, ManagementState::Unmanaged);
        assert_eq!(spec.log_level, None);

        let json = serde_json::to_value(&spec).unwrap();
        assert!(json.get("logLevel").is_none());
    }

    #[test]
    fn test_operator_spec_rejects_unknown_log_level() {
        let err = serde_json::from_str::<OperatorSpec>(r#"{"logLevel":"Verbose"}"#).unwrap_err();
        assert!(err.to_string().contains("Verbose"));
    }

    #[test]
    fn test_operator_spec_preserves_overrides() {
        let spec: OperatorSpec = serde_json::from_str(
            r#"{"managementState":"Managed","unsupportedConfigOverrides":{"a":{"b":[1,2]}}}"#,
        )
        .unwrap();
        assert_eq!(
            spec.unsupported_config_overrides,
            Some(json!({"a": {"b": [1, 2]}}))
        );
    }

    #[test]
    fn test_set_condition_new() {
        let mut status = OperatorStatus::default();
        status.set_condition(OperatorCondition::new(
            "Available",
            ConditionStatus::True,
            "Ready",
            "registry is ready",
        ));

        assert_eq!(status.conditions.len(), 1);
        assert!(status.is_condition_true("Available"));
        assert!(!status.is_condition_true("Degraded"));
    }

    #[test]
    fn test_set_condition_keeps_transition_time_when_status_unchanged() {
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut status = OperatorStatus::default();
        status.set_condition(OperatorCondition {
            r#type: "Progressing".to_string(),
            status: ConditionStatus::False,
            last_transition_time: Some(first),
            reason: None,
            message: None,
        });

        status.set_condition(OperatorCondition::new(
            "Progressing",
            ConditionStatus::False,
            "Steady",
            "nothing to do",
        ));
        assert_eq!(status.conditions.len(), 1);
        assert_eq!(status.conditions[0].last_transition_time, Some(first));
        assert_eq!(status.conditions[0].reason.as_deref(), Some("Steady"));

        status.set_condition(OperatorCondition::new(
            "Progressing",
            ConditionStatus::True,
            "Rollout",
            "rolling out",
        ));
        assert_ne!(status.conditions[0].last_transition_time, Some(first));
        assert!(status.is_condition_true("Progressing"));
    }

    #[test]
    fn test_operator_status_serialization_omits_empty() {
        let json = serde_json::to_value(OperatorStatus::default()).unwrap();
        assert_eq!(json, json!({"readyReplicas": 0}));
    }

    #[test]
    fn test_conditions_schema_is_list_map() {
        let schema = schemars::schema_for!(OperatorStatus);
        let json = serde_json::to_value(&schema).unwrap();
        let conditions = &json["properties"]["conditions"];
        assert_eq!(conditions["x-kubernetes-list-type"], "map");
        assert_eq!(conditions["x-kubernetes-list-map-keys"], json!(["type"]));
    }
}
