//! Alibaba Cloud Object Storage Service backend

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::schema::{defaulted, empty_as_none, with_validation};
use crate::validation::FieldError;

/// CEL rule mirrored by [`EncryptionAlibaba`]'s decode adapter.
pub const ALIBABA_KMS_RULE: &str =
    "has(self.method) && self.method == 'KMS' ? has(self.kms) : true";

/// Holds Alibaba Cloud OSS configuration.
///
/// Configures the registry to use Alibaba Cloud Object Storage Service for
/// backend storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigStorageAlibabaOss {
    /// bucket is the bucket name in which you want to store the registry's
    /// data. Empty value means no opinion and the platform chooses a default,
    /// currently `<clusterid>-image-registry-<region>-<random string 27 chars>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(length(min = 3, max = 63), regex(pattern = r"^[0-9a-z]+(-[0-9a-z]+)*$"))]
    pub bucket: String,

    /// region is the Alibaba Cloud Region in which your bucket exists.
    /// Empty value means no opinion and the platform chooses a default based
    /// on the installed Alibaba Cloud Region.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    /// endpointAccessibility specifies whether the registry uses the OSS VPC
    /// internal endpoint. Empty value means no opinion and the platform
    /// chooses a default, currently `Internal`.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    #[schemars(schema_with = "endpoint_accessibility_schema")]
    pub endpoint_accessibility: Option<EndpointAccessibility>,

    /// encryption specifies whether you would like your data encrypted on the
    /// server side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encryption: Option<EncryptionAlibaba>,
}

fn endpoint_accessibility_schema(gen: &mut SchemaGenerator) -> Schema {
    defaulted::<Option<EndpointAccessibility>>(gen, json!("Internal"))
}

fn method_schema(gen: &mut SchemaGenerator) -> Schema {
    defaulted::<Option<AlibabaEncryptionMethod>>(gen, json!("AES256"))
}

impl ImageRegistryConfigStorageAlibabaOss {
    /// Endpoint accessibility with the platform default applied
    pub fn endpoint_accessibility_or_default(&self) -> EndpointAccessibility {
        self.endpoint_accessibility
            .unwrap_or(EndpointAccessibility::Internal)
    }
}

/// Alibaba VPC endpoint used for storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum EndpointAccessibility {
    /// Use the VPC internal endpoint
    Internal,
    /// Use the public endpoint
    Public,
}

/// Server-side encryption mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AlibabaEncryptionMethod {
    #[serde(rename = "AES256")]
    Aes256,
    #[serde(rename = "KMS")]
    Kms,
}

/// KMS key used for server-side encryption
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct KmsEncryptionAlibaba {
    /// keyID holds the KMS encryption key ID
    #[serde(rename = "keyID")]
    #[schemars(length(min = 1))]
    pub key_id: String,
}

/// Server-side encryption for the OSS bucket.
///
/// Wire form: `{"method": "AES256"|"KMS", "kms": {"keyID": ...}}`. An empty
/// method means the platform default, currently AES256.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "EncryptionAlibabaWire", into = "EncryptionAlibabaWire")]
pub enum EncryptionAlibaba {
    #[default]
    Aes256,
    Kms(KmsEncryptionAlibaba),
}

impl EncryptionAlibaba {
    /// The wire discriminator for this variant
    pub fn method(&self) -> AlibabaEncryptionMethod {
        match self {
            EncryptionAlibaba::Aes256 => AlibabaEncryptionMethod::Aes256,
            EncryptionAlibaba::Kms(_) => AlibabaEncryptionMethod::Kms,
        }
    }

    /// KMS key ID when KMS encryption is selected
    pub fn kms_key_id(&self) -> Option<&str> {
        match self {
            EncryptionAlibaba::Kms(kms) => Some(kms.key_id.as_str()),
            EncryptionAlibaba::Aes256 => None,
        }
    }
}

// =============================================================================
// Wire Adapter
// =============================================================================

/// EncryptionAlibaba is a union type. Depending on the value of method,
/// different detail records may be used.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
struct EncryptionAlibabaWire {
    /// method defines the different encryption modes available. Empty value
    /// means no opinion and the platform chooses a default, currently AES256.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    #[schemars(schema_with = "method_schema")]
    method: Option<AlibabaEncryptionMethod>,

    /// kms (key management service) is an encryption type that holds the
    /// struct for the KMS KeyID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kms: Option<KmsEncryptionAlibaba>,
}

impl TryFrom<EncryptionAlibabaWire> for EncryptionAlibaba {
    type Error = FieldError;

    fn try_from(wire: EncryptionAlibabaWire) -> Result<Self, Self::Error> {
        match (wire.method, wire.kms) {
            (Some(AlibabaEncryptionMethod::Kms), None) => Err(FieldError::required("kms")),
            (Some(AlibabaEncryptionMethod::Kms), Some(kms)) if kms.key_id.is_empty() => {
                Err(FieldError::required("kms.keyID"))
            }
            (Some(AlibabaEncryptionMethod::Kms), Some(kms)) => Ok(EncryptionAlibaba::Kms(kms)),
            (_, Some(kms)) => {
                warn!(
                    key_id = %kms.key_id,
                    "Ignoring kms settings: encryption method is not KMS"
                );
                Ok(EncryptionAlibaba::Aes256)
            }
            (_, None) => Ok(EncryptionAlibaba::Aes256),
        }
    }
}

impl From<EncryptionAlibaba> for EncryptionAlibabaWire {
    fn from(encryption: EncryptionAlibaba) -> Self {
        match encryption {
            EncryptionAlibaba::Aes256 => EncryptionAlibabaWire {
                method: Some(AlibabaEncryptionMethod::Aes256),
                kms: None,
            },
            EncryptionAlibaba::Kms(kms) => EncryptionAlibabaWire {
                method: Some(AlibabaEncryptionMethod::Kms),
                kms: Some(kms),
            },
        }
    }
}

impl JsonSchema for EncryptionAlibaba {
    fn schema_name() -> String {
        "EncryptionAlibaba".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        with_validation(
            EncryptionAlibabaWire::json_schema(gen),
            ALIBABA_KMS_RULE,
            "kms is required when method is KMS",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    #[test]
    fn test_encryption_defaults_to_aes256() {
        let enc: EncryptionAlibaba = serde_json::from_str("{}").unwrap();
        assert_eq!(enc, EncryptionAlibaba::Aes256);

        let enc: EncryptionAlibaba = serde_json::from_str(r#"{"method":""}"#).unwrap();
        assert_eq!(enc.method(), AlibabaEncryptionMethod::Aes256);
    }

    #[test]
    fn test_encryption_kms_with_key() {
        let enc: EncryptionAlibaba =
            serde_json::from_str(r#"{"method":"KMS","kms":{"keyID":"key-1"}}"#).unwrap();
        assert_matches!(&enc, EncryptionAlibaba::Kms(kms) if kms.key_id == "key-1");
        assert_eq!(enc.kms_key_id(), Some("key-1"));
    }

    #[test]
    fn test_encryption_kms_requires_record() {
        let err = serde_json::from_str::<EncryptionAlibaba>(r#"{"method":"KMS"}"#).unwrap_err();
        assert!(err.to_string().contains("kms: Required value"));
    }

    #[test]
    fn test_encryption_kms_requires_non_empty_key() {
        let err =
            serde_json::from_str::<EncryptionAlibaba>(r#"{"method":"KMS","kms":{"keyID":""}}"#)
                .unwrap_err();
        assert!(err.to_string().contains("kms.keyID: Required value"));
    }

    #[test]
    fn test_encryption_aes256_ignores_kms() {
        let enc: EncryptionAlibaba =
            serde_json::from_str(r#"{"method":"AES256","kms":{"keyID":"unused"}}"#).unwrap();
        assert_eq!(enc, EncryptionAlibaba::Aes256);
        assert_eq!(enc.kms_key_id(), None);
        assert_eq!(serde_json::to_value(&enc).unwrap(), json!({"method": "AES256"}));
    }

    #[test]
    fn test_encryption_rejects_unknown_method() {
        assert!(serde_json::from_str::<EncryptionAlibaba>(r#"{"method":"DES"}"#).is_err());
    }

    #[test]
    fn test_encryption_serializes_exact_strings() {
        let enc = EncryptionAlibaba::Kms(KmsEncryptionAlibaba {
            key_id: "k".to_string(),
        });
        assert_eq!(
            serde_json::to_value(&enc).unwrap(),
            json!({"method": "KMS", "kms": {"keyID": "k"}})
        );
    }

    #[test]
    fn test_endpoint_accessibility_empty_is_unset() {
        let oss: ImageRegistryConfigStorageAlibabaOss =
            serde_json::from_str(r#"{"bucket":"b-123","endpointAccessibility":""}"#).unwrap();
        assert_eq!(oss.endpoint_accessibility, None);
        assert_eq!(
            oss.endpoint_accessibility_or_default(),
            EndpointAccessibility::Internal
        );

        let oss: ImageRegistryConfigStorageAlibabaOss =
            serde_json::from_str(r#"{"endpointAccessibility":"Public"}"#).unwrap();
        assert_eq!(oss.endpoint_accessibility, Some(EndpointAccessibility::Public));
    }

    #[test]
    fn test_encryption_schema_carries_rule() {
        let schema = schemars::schema_for!(EncryptionAlibaba);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["x-kubernetes-validations"][0]["rule"], ALIBABA_KMS_RULE);
        assert_eq!(json["properties"]["method"]["default"], "AES256");
    }

    #[test]
    fn test_oss_schema_defaults_endpoint_accessibility() {
        let schema = schemars::schema_for!(ImageRegistryConfigStorageAlibabaOss);
        let json = serde_json::to_value(&schema).unwrap();
        assert_eq!(json["properties"]["endpointAccessibility"]["default"], "Internal");
    }
}
