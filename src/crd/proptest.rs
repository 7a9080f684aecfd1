//! Property-Based Tests for the Config schema
//!
//! # Test Properties
//!
//! 1. **Duration text form**: parse(format(d)) = d for every representable duration
//! 2. **Storage union**: a storage object decodes iff at most one backend is set
//! 3. **Stable encoding**: decode(encode(storage)) = storage

#![cfg(test)]

use proptest::prelude::*;
use serde_json::{json, Map, Value};

use super::duration::{format_duration, parse_duration, Duration};
use super::storage::ImageRegistryConfigStorage;

// =============================================================================
// Property Strategies
// =============================================================================

const BACKEND_FIELDS: [&str; 8] = ["emptyDir", "s3", "gcs", "swift", "pvc", "azure", "ibmcos", "oss"];

/// Strategy for durations across the whole int64 nanosecond range.
fn duration_strategy() -> impl Strategy<Value = std::time::Duration> {
    prop_oneof![
        (0u64..1_000_000_000).prop_map(std::time::Duration::from_nanos),
        (0u64..=i64::MAX as u64).prop_map(std::time::Duration::from_nanos),
        (0u64..1_000_000).prop_map(std::time::Duration::from_secs),
    ]
}

/// Strategy for a subset of backend fields, as a presence mask.
fn backend_mask_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(any::<bool>(), BACKEND_FIELDS.len())
}

/// Minimal valid body for a backend field.
fn backend_body(field: &str) -> Value {
    match field {
        "s3" => json!({"bucket": "registry-bucket"}),
        "gcs" => json!({"projectID": "project-1"}),
        "swift" => json!({"container": "registry"}),
        "pvc" => json!({"claim": "image-registry-storage"}),
        "azure" => json!({"container": "registry"}),
        "ibmcos" => json!({"location": "us-south"}),
        "oss" => json!({"bucket": "registry-oss"}),
        _ => json!({}),
    }
}

fn storage_value(mask: &[bool]) -> Value {
    let mut object = Map::new();
    for (field, present) in BACKEND_FIELDS.iter().zip(mask) {
        if *present {
            object.insert(field.to_string(), backend_body(field));
        }
    }
    Value::Object(object)
}

// =============================================================================
// Duration Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    /// Property: Formatting then parsing returns the original duration.
    #[test]
    fn prop_duration_format_parse_identity(d in duration_strategy()) {
        let text = format_duration(d);
        let parsed = parse_duration(&text)?;
        prop_assert_eq!(parsed, d, "text form {}", text);
    }

    /// Property: The serde form agrees with the text form.
    #[test]
    fn prop_duration_serde_identity(d in duration_strategy()) {
        let duration = Duration::from_std(d)?;
        let encoded = serde_json::to_value(duration)?;
        let text = format_duration(d);
        prop_assert_eq!(encoded.as_str(), Some(text.as_str()));

        let decoded: Duration = serde_json::from_value(encoded)?;
        prop_assert_eq!(decoded, duration);
    }

    /// Property: Parsing never panics on arbitrary input.
    #[test]
    fn prop_duration_parse_total(s in "[0-9.+\\-a-zµ]{0,16}") {
        let _ = parse_duration(&s);
    }

    /// Property: Hour counts beyond int64 nanoseconds are rejected, whatever the fraction.
    #[test]
    fn prop_duration_parse_rejects_overflow(
        whole in (i64::MAX as u64 / 3_600_000_000_000 + 1)..u64::MAX,
        fraction in "[0-9]{0,30}",
    ) {
        let text = format!("{}.{}h", whole, fraction);
        prop_assert!(parse_duration(&text).is_err(), "{} was accepted", text);
    }
}

// =============================================================================
// Storage Union Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Property: Decoding succeeds iff at most one backend field is present.
    #[test]
    fn prop_storage_union_at_most_one(mask in backend_mask_strategy()) {
        let populated = mask.iter().filter(|present| **present).count();
        let result = serde_json::from_value::<ImageRegistryConfigStorage>(storage_value(&mask));

        if populated <= 1 {
            let storage = result?;
            let expected = BACKEND_FIELDS
                .iter()
                .zip(&mask)
                .find(|(_, present)| **present)
                .map(|(field, _)| *field);
            prop_assert_eq!(storage.backend_name(), expected);
        } else {
            let err = result.unwrap_err().to_string();
            prop_assert!(err.contains("at most one storage backend"), "{}", err);
        }
    }

    /// Property: A decoded storage object encodes back to the same value.
    #[test]
    fn prop_storage_encoding_stable(index in 0usize..BACKEND_FIELDS.len(), managed in any::<bool>()) {
        let mut value = storage_value(&[false; 8]);
        let field = BACKEND_FIELDS[index];
        value[field] = backend_body(field);
        value["managementState"] = json!(if managed { "Managed" } else { "Unmanaged" });

        let storage: ImageRegistryConfigStorage = serde_json::from_value(value.clone())?;
        let encoded = serde_json::to_value(&storage)?;
        let decoded: ImageRegistryConfigStorage = serde_json::from_value(encoded)?;
        prop_assert_eq!(decoded, storage);
    }
}
