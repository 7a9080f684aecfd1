//! Schema and wire helpers shared by the CRD types
//!
//! The Kubernetes structural schema carries list/map semantics and CEL rules
//! as `x-kubernetes-*` extensions. schemars has no attribute for those, so
//! the fields that need them point `schema_with` at the functions here.

use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};

/// `skip_serializing_if` predicate mirroring Go's `omitempty` for scalars.
pub(crate) fn is_default<T: Default + PartialEq>(value: &T) -> bool {
    *value == T::default()
}

/// Deserialize an optional string enum, treating `""` the same as absent.
///
/// Go clients serialize unset enum strings as `""` unless the field is
/// `omitempty`, so both spellings must decode to `None`.
pub(crate) fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => {
            let de: serde::de::value::StringDeserializer<D::Error> = s.into_deserializer();
            T::deserialize(de).map(Some)
        }
    }
}

// =============================================================================
// Extension Helpers
// =============================================================================

fn with_extension(schema: Schema, key: &str, value: Value) -> Schema {
    let mut object = schema.into_object();
    object.extensions.insert(key.to_string(), value);
    Schema::Object(object)
}

/// Mark a list schema `x-kubernetes-list-type: atomic`.
pub(crate) fn atomic_list<T: JsonSchema>(gen: &mut SchemaGenerator) -> Schema {
    with_extension(
        Vec::<T>::json_schema(gen),
        "x-kubernetes-list-type",
        json!("atomic"),
    )
}

/// Mark a map or struct schema `x-kubernetes-map-type: atomic`.
pub(crate) fn atomic_map<T: JsonSchema>(gen: &mut SchemaGenerator) -> Schema {
    with_extension(T::json_schema(gen), "x-kubernetes-map-type", json!("atomic"))
}

/// Attach a CEL validation rule to an object schema.
pub(crate) fn with_validation(schema: Schema, rule: &str, message: &str) -> Schema {
    let mut object = schema.into_object();
    let entry = json!({ "rule": rule, "message": message });
    match object.extensions.get_mut("x-kubernetes-validations") {
        Some(Value::Array(rules)) => rules.push(entry),
        _ => {
            object
                .extensions
                .insert("x-kubernetes-validations".to_string(), json!([entry]));
        }
    }
    Schema::Object(object)
}

/// Attach a default value to a schema.
pub(crate) fn with_default(schema: Schema, default: Value) -> Schema {
    let mut object = schema.into_object();
    object.metadata().default = Some(default);
    Schema::Object(object)
}

/// Schema of `T` carrying a default the API server fills in when absent.
pub(crate) fn defaulted<T: JsonSchema>(gen: &mut SchemaGenerator, default: Value) -> Schema {
    with_default(T::json_schema(gen), default)
}

/// Free-form JSON object kept verbatim by the API server.
pub(crate) fn preserve_unknown_fields(_gen: &mut SchemaGenerator) -> Schema {
    let mut object = SchemaObject {
        instance_type: Some(InstanceType::Object.into()),
        ..Default::default()
    };
    object.extensions.insert(
        "x-kubernetes-preserve-unknown-fields".to_string(),
        json!(true),
    );
    object.extensions.insert("nullable".to_string(), json!(true));
    Schema::Object(object)
}
