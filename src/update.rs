//! Update semantics for Config objects
//!
//! Updates are JSON merge patches (RFC 7386). Lists are always replaced by a
//! merge patch; maps and structs normally merge key by key. Fields declared
//! atomic in the schema are replaced as a whole instead, so a patch never
//! leaves a mix of old and new entries behind.

use serde_json::{Map, Value};
use tracing::debug;

use crate::crd::Config;
use crate::error::Result;
use crate::manifest::decode_config;

/// Map and struct fields replaced whole by an update
pub const ATOMIC_PATHS: &[&[&str]] = &[
    &["spec", "requests"],
    &["spec", "resources"],
    &["spec", "nodeSelector"],
    &["spec", "affinity"],
    &["spec", "storage", "s3", "cloudFront"],
];

fn is_atomic(path: &[&str]) -> bool {
    ATOMIC_PATHS.iter().any(|atomic| *atomic == path)
}

/// Apply a JSON merge patch to a Config and decode the result.
///
/// The result goes through the same decoding as any other input, so a patch
/// that leaves two storage backends populated is rejected. To switch
/// backends, the patch must null out the previous one, e.g.
/// `{"spec":{"storage":{"s3":null,"gcs":{}}}}`.
pub fn apply_merge_patch(config: &Config, patch: &Value) -> Result<Config> {
    let mut document = serde_json::to_value(config)?;
    let mut path = Vec::new();
    merge(&mut document, patch, &mut path);

    let updated = decode_config(document)?;
    debug!(
        name = %updated.name(),
        changed = (updated != *config),
        "Applied merge patch"
    );
    Ok(updated)
}

fn merge<'a>(target: &mut Value, patch: &'a Value, path: &mut Vec<&'a str>) {
    let Value::Object(patch_fields) = patch else {
        *target = patch.clone();
        return;
    };

    if is_atomic(path) {
        *target = without_nulls(patch);
        return;
    }

    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    let Value::Object(target_fields) = target else {
        return;
    };

    for (key, value) in patch_fields {
        if value.is_null() {
            target_fields.remove(key);
            continue;
        }
        path.push(key.as_str());
        let entry = target_fields.entry(key.clone()).or_insert(Value::Null);
        merge(entry, value, path);
        path.pop();
    }
}

/// A patch value as it lands in an empty document: null members are dropped.
fn without_nulls(value: &Value) -> Value {
    match value {
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), without_nulls(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{ImageRegistrySpec, StorageBackend};
    use crate::error::Error;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn base() -> Config {
        serde_json::from_value(json!({
            "apiVersion": "imageregistry.operator.openshift.io/v1",
            "kind": "Config",
            "metadata": {"name": "cluster"},
            "spec": {
                "managementState": "Managed",
                "replicas": 2,
                "nodeSelector": {"zone": "a", "tier": "infra"},
                "routes": [{"name": "one"}, {"name": "two"}],
                "requests": {"read": {"maxRunning": 10, "maxInQueue": 5}},
                "storage": {
                    "s3": {
                        "bucket": "b1",
                        "region": "us-east-1",
                        "cloudFront": {
                            "baseURL": "https://cdn.example.com",
                            "privateKey": {"name": "cf", "key": "pk"},
                            "keypairID": "kp",
                            "duration": "5m"
                        }
                    },
                    "managementState": "Managed"
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_scalar_update_keeps_other_fields() {
        let updated = apply_merge_patch(&base(), &json!({"spec": {"replicas": 3}})).unwrap();
        assert_eq!(updated.spec.replicas, 3);
        assert_eq!(updated.spec.routes.len(), 2);
        assert_eq!(updated.spec.storage.s3().unwrap().bucket, "b1");
    }

    #[test]
    fn test_node_selector_replaced_whole() {
        let updated =
            apply_merge_patch(&base(), &json!({"spec": {"nodeSelector": {"zone": "b"}}})).unwrap();
        assert_eq!(updated.spec.node_selector.len(), 1);
        assert_eq!(updated.spec.node_selector["zone"], "b");
    }

    #[test]
    fn test_routes_replaced_whole() {
        let updated =
            apply_merge_patch(&base(), &json!({"spec": {"routes": [{"name": "three"}]}})).unwrap();
        let names: Vec<&str> = updated.spec.routes.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["three"]);
    }

    #[test]
    fn test_requests_replaced_whole() {
        let updated = apply_merge_patch(
            &base(),
            &json!({"spec": {"requests": {"write": {"maxRunning": 1}}}}),
        )
        .unwrap();
        assert_eq!(updated.spec.requests.read.max_running, 0);
        assert_eq!(updated.spec.requests.write.max_running, 1);
    }

    #[test]
    fn test_cloud_front_replaced_whole() {
        let updated = apply_merge_patch(
            &base(),
            &json!({"spec": {"storage": {"s3": {"cloudFront": {
                "baseURL": "https://cdn2.example.com",
                "privateKey": {"name": "cf2", "key": "pk"},
                "keypairID": "kp2",
                "duration": null
            }}}}}),
        )
        .unwrap();
        let s3 = updated.spec.storage.s3().unwrap();
        let cloud_front = s3.cloud_front.as_ref().unwrap();
        assert_eq!(cloud_front.keypair_id, "kp2");
        assert_eq!(cloud_front.duration, None);
        assert_eq!(s3.region, "us-east-1");
    }

    #[test]
    fn test_storage_fields_merge() {
        let updated = apply_merge_patch(
            &base(),
            &json!({"spec": {"storage": {"s3": {"bucket": "b2"}}}}),
        )
        .unwrap();
        let s3 = updated.spec.storage.s3().unwrap();
        assert_eq!(s3.bucket, "b2");
        assert_eq!(s3.region, "us-east-1");
    }

    #[test]
    fn test_switching_backend_requires_removing_previous() {
        let err = apply_merge_patch(
            &base(),
            &json!({"spec": {"storage": {"gcs": {"bucket": "g"}}}}),
        )
        .unwrap_err();
        assert_matches!(err, Error::Decode { ref path, .. } if path == "spec.storage");
        assert!(err.to_string().contains("at most one storage backend"));

        let updated = apply_merge_patch(
            &base(),
            &json!({"spec": {"storage": {"s3": null, "gcs": {"bucket": "g"}}}}),
        )
        .unwrap();
        assert_matches!(updated.spec.storage.backend, Some(StorageBackend::Gcs(_)));
    }

    #[test]
    fn test_null_removes_field() {
        let updated =
            apply_merge_patch(&base(), &json!({"spec": {"nodeSelector": null}})).unwrap();
        assert!(updated.spec.node_selector.is_empty());
    }

    #[test]
    fn test_patch_cannot_drop_required_field() {
        let err = apply_merge_patch(&base(), &json!({"spec": {"replicas": null}})).unwrap_err();
        assert!(err.to_string().contains("replicas"));
    }

    #[test]
    fn test_non_object_patch_replaces_document() {
        let err = apply_merge_patch(&base(), &json!([1, 2])).unwrap_err();
        assert_matches!(err, Error::Json(_));
    }

    #[test]
    fn test_base_is_untouched() {
        let config = base();
        let _ = apply_merge_patch(&config, &json!({"spec": {"replicas": 9}})).unwrap();
        assert_eq!(config.spec.replicas, 2);
        assert_ne!(config.spec, ImageRegistrySpec::default());
    }
}
