//! Registry storage configuration
//!
//! On the wire, storage is a flat object with one optional field per backend
//! (`emptyDir`, `s3`, `gcs`, `swift`, `pvc`, `azure`, `ibmcos`, `oss`). At
//! most one of them may be set. Internally the selection is a single
//! [`StorageBackend`] enum; the adapter between the two rejects wire input
//! with more than one backend populated.

use k8s_openapi::api::core::v1::SecretKeySelector;
use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::alibaba::ImageRegistryConfigStorageAlibabaOss;
use super::azure::ImageRegistryConfigStorageAzure;
use super::duration::Duration;
use super::schema::{atomic_map, empty_as_none, is_default, with_validation};
use crate::validation::FieldError;

/// Namespace holding the config map referenced by `trustedCA`
pub const TRUSTED_CA_NAMESPACE: &str = "openshift-config";

/// Key of the CA bundle within the `trustedCA` config map
pub const TRUSTED_CA_KEY: &str = "ca-bundle.crt";

/// CEL rule enforcing the storage union in the rendered CRD
pub const STORAGE_UNION_RULE: &str = "[has(self.emptyDir), has(self.s3), has(self.gcs), \
     has(self.swift), has(self.pvc), has(self.azure), has(self.ibmcos), has(self.oss)]\
     .filter(x, x).size() <= 1";

/// Message reported when more than one backend is configured
pub const STORAGE_UNION_MESSAGE: &str = "at most one storage backend may be configured";

// =============================================================================
// Storage Union
// =============================================================================

/// Whether the operator manages the underlying storage unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum StorageManagementState {
    /// The operator provisions the storage and removes it when the registry is Removed
    Managed,
    /// The storage is owned by the administrator
    Unmanaged,
}

impl std::fmt::Display for StorageManagementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageManagementState::Managed => write!(f, "Managed"),
            StorageManagementState::Unmanaged => write!(f, "Unmanaged"),
        }
    }
}

/// One concrete storage provider configuration
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    EmptyDir(ImageRegistryConfigStorageEmptyDir),
    S3(ImageRegistryConfigStorageS3),
    Gcs(ImageRegistryConfigStorageGcs),
    Swift(ImageRegistryConfigStorageSwift),
    Pvc(ImageRegistryConfigStoragePvc),
    Azure(ImageRegistryConfigStorageAzure),
    IbmCos(ImageRegistryConfigStorageIbmCos),
    Oss(ImageRegistryConfigStorageAlibabaOss),
}

impl StorageBackend {
    /// Wire field name selecting this backend
    pub fn field_name(&self) -> &'static str {
        match self {
            StorageBackend::EmptyDir(_) => "emptyDir",
            StorageBackend::S3(_) => "s3",
            StorageBackend::Gcs(_) => "gcs",
            StorageBackend::Swift(_) => "swift",
            StorageBackend::Pvc(_) => "pvc",
            StorageBackend::Azure(_) => "azure",
            StorageBackend::IbmCos(_) => "ibmcos",
            StorageBackend::Oss(_) => "oss",
        }
    }
}

/// Describes how the storage should be configured for the image registry.
///
/// `backend: None` is the unconfigured state, legal before a backend is
/// chosen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StorageWire", into = "StorageWire")]
pub struct ImageRegistryConfigStorage {
    /// Selected storage backend
    pub backend: Option<StorageBackend>,

    /// Whether the operator manages the storage unit. Left unset here when
    /// absent on the wire; see [`Self::management_state_or_default`].
    pub management_state: Option<StorageManagementState>,
}

impl ImageRegistryConfigStorage {
    /// Storage using the given backend, management state left unset
    pub fn new(backend: StorageBackend) -> Self {
        Self {
            backend: Some(backend),
            management_state: None,
        }
    }

    /// Set the management state
    pub fn with_management_state(mut self, state: StorageManagementState) -> Self {
        self.management_state = Some(state);
        self
    }

    /// Check whether a backend has been chosen
    pub fn is_configured(&self) -> bool {
        self.backend.is_some()
    }

    /// Wire field name of the selected backend
    pub fn backend_name(&self) -> Option<&'static str> {
        self.backend.as_ref().map(StorageBackend::field_name)
    }

    /// Management state as consumers interpret it: unset means Unmanaged.
    pub fn management_state_or_default(&self) -> StorageManagementState {
        self.management_state
            .unwrap_or(StorageManagementState::Unmanaged)
    }

    pub fn empty_dir(&self) -> Option<&ImageRegistryConfigStorageEmptyDir> {
        match &self.backend {
            Some(StorageBackend::EmptyDir(b)) => Some(b),
            _ => None,
        }
    }

    pub fn s3(&self) -> Option<&ImageRegistryConfigStorageS3> {
        match &self.backend {
            Some(StorageBackend::S3(b)) => Some(b),
            _ => None,
        }
    }

    pub fn gcs(&self) -> Option<&ImageRegistryConfigStorageGcs> {
        match &self.backend {
            Some(StorageBackend::Gcs(b)) => Some(b),
            _ => None,
        }
    }

    pub fn swift(&self) -> Option<&ImageRegistryConfigStorageSwift> {
        match &self.backend {
            Some(StorageBackend::Swift(b)) => Some(b),
            _ => None,
        }
    }

    pub fn pvc(&self) -> Option<&ImageRegistryConfigStoragePvc> {
        match &self.backend {
            Some(StorageBackend::Pvc(b)) => Some(b),
            _ => None,
        }
    }

    pub fn azure(&self) -> Option<&ImageRegistryConfigStorageAzure> {
        match &self.backend {
            Some(StorageBackend::Azure(b)) => Some(b),
            _ => None,
        }
    }

    pub fn ibmcos(&self) -> Option<&ImageRegistryConfigStorageIbmCos> {
        match &self.backend {
            Some(StorageBackend::IbmCos(b)) => Some(b),
            _ => None,
        }
    }

    pub fn oss(&self) -> Option<&ImageRegistryConfigStorageAlibabaOss> {
        match &self.backend {
            Some(StorageBackend::Oss(b)) => Some(b),
            _ => None,
        }
    }
}

/// ImageRegistryConfigStorage describes how the storage should be configured
/// for the image registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct StorageWire {
    /// emptyDir represents ephemeral storage on the pod's host node.
    /// WARNING: this storage cannot be used with more than 1 replica and is
    /// not suitable for production use. When the pod is removed from a node
    /// for any reason, the data in the emptyDir is deleted forever.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    empty_dir: Option<ImageRegistryConfigStorageEmptyDir>,

    /// s3 represents configuration that uses Amazon Simple Storage Service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    s3: Option<ImageRegistryConfigStorageS3>,

    /// gcs represents configuration that uses Google Cloud Storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gcs: Option<ImageRegistryConfigStorageGcs>,

    /// swift represents configuration that uses OpenStack Object Storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    swift: Option<ImageRegistryConfigStorageSwift>,

    /// pvc represents configuration that uses a PersistentVolumeClaim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pvc: Option<ImageRegistryConfigStoragePvc>,

    /// azure represents configuration that uses Azure Blob Storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    azure: Option<ImageRegistryConfigStorageAzure>,

    /// ibmcos represents configuration that uses IBM Cloud Object Storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ibmcos: Option<ImageRegistryConfigStorageIbmCos>,

    /// oss represents configuration that uses Alibaba Cloud Object Storage Service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    oss: Option<ImageRegistryConfigStorageAlibabaOss>,

    /// managementState indicates if the operator manages the underlying
    /// storage unit. If Managed the operator will remove the storage when
    /// this operator gets Removed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    management_state: Option<StorageManagementState>,
}

impl TryFrom<StorageWire> for ImageRegistryConfigStorage {
    type Error = FieldError;

    fn try_from(wire: StorageWire) -> Result<Self, Self::Error> {
        let mut populated: Vec<StorageBackend> = [
            wire.empty_dir.map(StorageBackend::EmptyDir),
            wire.s3.map(StorageBackend::S3),
            wire.gcs.map(StorageBackend::Gcs),
            wire.swift.map(StorageBackend::Swift),
            wire.pvc.map(StorageBackend::Pvc),
            wire.azure.map(StorageBackend::Azure),
            wire.ibmcos.map(StorageBackend::IbmCos),
            wire.oss.map(StorageBackend::Oss),
        ]
        .into_iter()
        .flatten()
        .collect();

        if populated.len() > 1 {
            let names: Vec<&str> = populated.iter().map(StorageBackend::field_name).collect();
            return Err(FieldError::forbidden(
                "",
                format!("{}, found: {}", STORAGE_UNION_MESSAGE, names.join(", ")),
            ));
        }

        Ok(Self {
            backend: populated.pop(),
            management_state: wire.management_state,
        })
    }
}

impl From<ImageRegistryConfigStorage> for StorageWire {
    fn from(storage: ImageRegistryConfigStorage) -> Self {
        let mut wire = StorageWire {
            management_state: storage.management_state,
            ..Default::default()
        };
        match storage.backend {
            Some(StorageBackend::EmptyDir(b)) => wire.empty_dir = Some(b),
            Some(StorageBackend::S3(b)) => wire.s3 = Some(b),
            Some(StorageBackend::Gcs(b)) => wire.gcs = Some(b),
            Some(StorageBackend::Swift(b)) => wire.swift = Some(b),
            Some(StorageBackend::Pvc(b)) => wire.pvc = Some(b),
            Some(StorageBackend::Azure(b)) => wire.azure = Some(b),
            Some(StorageBackend::IbmCos(b)) => wire.ibmcos = Some(b),
            Some(StorageBackend::Oss(b)) => wire.oss = Some(b),
            None => {}
        }
        wire
    }
}

impl JsonSchema for ImageRegistryConfigStorage {
    fn schema_name() -> String {
        "ImageRegistryConfigStorage".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        with_validation(
            StorageWire::json_schema(gen),
            STORAGE_UNION_RULE,
            STORAGE_UNION_MESSAGE,
        )
    }
}

// =============================================================================
// Backends
// =============================================================================

/// Placeholder used when the registry is leveraging ephemeral storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageRegistryConfigStorageEmptyDir {}

/// Holds the information to configure the registry to use the AWS S3
/// service for backend storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigStorageS3 {
    /// bucket is the bucket name in which you want to store the registry's
    /// data. Optional, will be generated if not provided.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,

    /// region is the AWS region in which your bucket exists. Optional, will
    /// be set based on the installed AWS Region.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    /// regionEndpoint is the endpoint for S3 compatible storage services. It
    /// should be a valid URL with scheme, e.g. https://s3.example.com.
    /// Optional, defaults based on the Region that is provided.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region_endpoint: String,

    /// encrypt specifies whether the registry stores the image in encrypted
    /// format or not. Optional, defaults to false.
    #[serde(default, skip_serializing_if = "is_default")]
    pub encrypt: bool,

    /// keyID is the KMS key ID to use for encryption. Optional, Encrypt must
    /// be true, or this parameter is ignored.
    #[serde(default, rename = "keyID", skip_serializing_if = "String::is_empty")]
    pub key_id: String,

    /// cloudFront configures Amazon Cloudfront as the storage middleware in a
    /// registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(schema_with = "cloud_front_schema")]
    pub cloud_front: Option<ImageRegistryConfigStorageS3CloudFront>,

    /// virtualHostedStyle enables using S3 virtual hosted style bucket paths
    /// with a custom RegionEndpoint. Optional, defaults to false.
    #[serde(default)]
    pub virtual_hosted_style: bool,

    /// trustedCA is a reference to a config map containing a CA bundle. The
    /// image registry and its operator use certificates from this bundle to
    /// verify S3 server certificates. The namespace for the config map is
    /// "openshift-config" and the key for the bundle is "ca-bundle.crt".
    #[serde(default, rename = "trustedCA")]
    pub trusted_ca: S3TrustedCaSource,
}

fn cloud_front_schema(gen: &mut SchemaGenerator) -> Schema {
    atomic_map::<Option<ImageRegistryConfigStorageS3CloudFront>>(gen)
}

/// Holds the configuration to use Amazon Cloudfront as the storage
/// middleware in a registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigStorageS3CloudFront {
    /// baseURL contains the SCHEME://HOST[/PATH] at which Cloudfront is served.
    #[serde(rename = "baseURL")]
    pub base_url: String,

    /// privateKey points to secret containing the private key, provided by AWS.
    pub private_key: SecretKeySelector,

    /// keypairID is key pair ID provided by AWS.
    #[serde(rename = "keypairID")]
    pub keypair_id: String,

    /// duration is the duration of the Cloudfront session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<Duration>,
}

/// References a config map with a CA certificate bundle in the
/// "openshift-config" namespace. The key for the bundle in the config map is
/// "ca-bundle.crt".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct S3TrustedCaSource {
    /// name is the metadata.name of the referenced config map. It must
    /// consist solely of alphanumeric characters, hyphens (-) and periods (.)
    /// and has a maximum length of 253 characters. If empty, the default
    /// trust bundle is used.
    #[serde(default)]
    #[schemars(
        length(max = 253),
        regex(pattern = r"^$|^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$")
    )]
    pub name: String,
}

/// Location of a CA bundle within the cluster
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigMapKeyRef<'a> {
    pub namespace: &'static str,
    pub name: &'a str,
    pub key: &'static str,
}

impl S3TrustedCaSource {
    /// Config map key holding the bundle, or `None` for the default trust bundle
    pub fn config_map_ref(&self) -> Option<ConfigMapKeyRef<'_>> {
        if self.name.is_empty() {
            return None;
        }
        Some(ConfigMapKeyRef {
            namespace: TRUSTED_CA_NAMESPACE,
            name: &self.name,
            key: TRUSTED_CA_KEY,
        })
    }
}

/// Holds GCS configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigStorageGcs {
    /// bucket is the bucket name in which you want to store the registry's
    /// data. Optional, will be generated if not provided.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,

    /// region is the GCS location in which your bucket exists. Optional, will
    /// be set based on the installed GCS Region.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region: String,

    /// projectID is the Project ID of the GCP project that this bucket should
    /// be associated with.
    #[serde(default, rename = "projectID", skip_serializing_if = "String::is_empty")]
    pub project_id: String,

    /// keyID is the KMS key ID to use for encryption. Optional, buckets are
    /// encrypted by default on GCP.
    #[serde(default, rename = "keyID", skip_serializing_if = "String::is_empty")]
    pub key_id: String,
}

/// Holds the information to configure the registry to use the OpenStack
/// Swift service for backend storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigStorageSwift {
    /// authURL defines the URL for obtaining an authentication token.
    #[serde(default, rename = "authURL", skip_serializing_if = "String::is_empty")]
    pub auth_url: String,

    /// authVersion specifies the OpenStack Auth's version.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub auth_version: String,

    /// container defines the name of Swift container where to store the
    /// registry's data.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub container: String,

    /// domain specifies Openstack's domain name for Identity v3 API.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,

    /// domainID specifies Openstack's domain id for Identity v3 API.
    #[serde(default, rename = "domainID", skip_serializing_if = "String::is_empty")]
    pub domain_id: String,

    /// tenant defines Openstack tenant name to be used by registry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub tenant: String,

    /// tenantID defines Openstack tenant id to be used by registry.
    #[serde(default, rename = "tenantID", skip_serializing_if = "String::is_empty")]
    pub tenant_id: String,

    /// regionName defines Openstack's region in which container exists.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub region_name: String,
}

/// Holds Persistent Volume Claims data to be used by the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ImageRegistryConfigStoragePvc {
    /// claim defines the Persistent Volume Claim's name to be used.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub claim: String,
}

/// Holds the information to configure the registry to use IBM Cloud Object
/// Storage for backend storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigStorageIbmCos {
    /// bucket is the bucket name in which you want to store the registry's
    /// data. Optional, will be generated if not provided.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,

    /// location is the IBM Cloud location in which your bucket exists.
    /// Optional, will be set based on the installed IBM Cloud location.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,

    /// resourceGroupName is the name of the IBM Cloud resource group that
    /// this bucket and its service instance is associated with.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub resource_group_name: String,

    /// resourceKeyCRN is the CRN of the IBM Cloud resource key that is
    /// created for the service instance. Must contain HMAC type credentials.
    /// Optional, will be computed if not provided.
    #[serde(default, rename = "resourceKeyCRN", skip_serializing_if = "String::is_empty")]
    #[schemars(regex(pattern = r"^crn:.+:.+:.+:cloud-object-storage:.+:.+:.+:resource-key:.+$"))]
    pub resource_key_crn: String,

    /// serviceInstanceCRN is the CRN of the IBM Cloud Object Storage service
    /// instance that this bucket is associated with. Optional, will be
    /// computed if not provided.
    #[serde(
        default,
        rename = "serviceInstanceCRN",
        skip_serializing_if = "String::is_empty"
    )]
    #[schemars(regex(pattern = r"^crn:.+:.+:.+:cloud-object-storage:.+:.+:.+::$"))]
    pub service_instance_crn: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::azure::AzureNetworkAccess;
    use serde_json::json;

    #[test]
    fn test_storage_empty_is_unconfigured() {
        let storage: ImageRegistryConfigStorage = serde_json::from_str("{}").unwrap();
        assert!(!storage.is_configured());
        assert_eq!(storage.backend_name(), None);
        assert_eq!(storage.management_state, None);
        assert_eq!(serde_json::to_value(&storage).unwrap(), json!({}));
    }

    #[test]
    fn test_storage_single_backend() {
        let storage: ImageRegistryConfigStorage = serde_json::from_str(
            r#"{"s3":{"bucket":"b1","region":"us-east-1"},"managementState":"Managed"}"#,
        )
        .unwrap();

        assert_eq!(storage.backend_name(), Some("s3"));
        assert_eq!(storage.s3().unwrap().bucket, "b1");
        assert_eq!(storage.s3().unwrap().region, "us-east-1");
        assert!(storage.gcs().is_none());
        assert!(storage.empty_dir().is_none());
        assert_eq!(
            storage.management_state,
            Some(StorageManagementState::Managed)
        );
    }

    #[test]
    fn test_storage_rejects_two_backends() {
        let err = serde_json::from_str::<ImageRegistryConfigStorage>(
            r#"{"s3":{"bucket":"b1"},"gcs":{"bucket":"b2"}}"#,
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("Forbidden: "), "{}", message);
        assert!(message.contains(STORAGE_UNION_MESSAGE));
        assert!(message.contains("s3, gcs"));
    }

    #[test]
    fn test_storage_empty_dir_counts_as_backend() {
        let err = serde_json::from_str::<ImageRegistryConfigStorage>(
            r#"{"emptyDir":{},"pvc":{"claim":"registry"}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("emptyDir, pvc"));

        let storage: ImageRegistryConfigStorage =
            serde_json::from_str(r#"{"emptyDir":{}}"#).unwrap();
        assert!(storage.empty_dir().is_some());
        assert_eq!(serde_json::to_value(&storage).unwrap(), json!({"emptyDir": {}}));
    }

    #[test]
    fn test_storage_management_state() {
        let storage: ImageRegistryConfigStorage =
            serde_json::from_str(r#"{"managementState":""}"#).unwrap();
        assert_eq!(storage.management_state, None);
        assert_eq!(
            storage.management_state_or_default(),
            StorageManagementState::Unmanaged
        );

        assert!(
            serde_json::from_str::<ImageRegistryConfigStorage>(r#"{"managementState":"Force"}"#)
                .is_err()
        );
    }

    #[test]
    fn test_storage_encodes_selected_backend_only() {
        let storage = ImageRegistryConfigStorage::new(StorageBackend::Pvc(
            ImageRegistryConfigStoragePvc {
                claim: "registry-storage".to_string(),
            },
        ))
        .with_management_state(StorageManagementState::Unmanaged);

        assert_eq!(
            serde_json::to_value(&storage).unwrap(),
            json!({"pvc": {"claim": "registry-storage"}, "managementState": "Unmanaged"})
        );
    }

    #[test]
    fn test_storage_nested_union_errors_propagate() {
        let err = serde_json::from_str::<ImageRegistryConfigStorage>(
            r#"{"azure":{"networkAccess":{"type":"External","internal":{"vnetName":"v1"}}}}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("internal is forbidden"));

        let storage: ImageRegistryConfigStorage = serde_json::from_str(
            r#"{"azure":{"container":"registry","networkAccess":{"type":"Internal"}}}"#,
        )
        .unwrap();
        assert_eq!(
            storage.azure().unwrap().network_access,
            Some(AzureNetworkAccess::Internal(None))
        );
    }

    #[test]
    fn test_s3_always_serializes_required_fields() {
        let s3 = ImageRegistryConfigStorageS3 {
            bucket: "b".to_string(),
            ..Default::default()
        };
        let json = serde_json::to_value(&s3).unwrap();
        assert_eq!(
            json,
            json!({"bucket": "b", "virtualHostedStyle": false, "trustedCA": {"name": ""}})
        );
    }

    #[test]
    fn test_s3_field_names() {
        let s3: ImageRegistryConfigStorageS3 = serde_json::from_str(
            r#"{"regionEndpoint":"https://s3.example.com","encrypt":true,"keyID":"k",
                "cloudFront":{"baseURL":"https://cdn.example.com","privateKey":{"name":"cf","key":"pk"},
                              "keypairID":"kp","duration":"20m"},
                "trustedCA":{"name":"custom-ca"}}"#,
        )
        .unwrap();

        assert_eq!(s3.region_endpoint, "https://s3.example.com");
        assert_eq!(s3.key_id, "k");
        let cf = s3.cloud_front.as_ref().unwrap();
        assert_eq!(cf.base_url, "https://cdn.example.com");
        assert_eq!(cf.keypair_id, "kp");
        assert_eq!(cf.duration.unwrap().as_std().as_secs(), 1200);
        assert_eq!(s3.trusted_ca.name, "custom-ca");
    }

    #[test]
    fn test_trusted_ca_config_map_ref() {
        assert_eq!(S3TrustedCaSource::default().config_map_ref(), None);

        let source = S3TrustedCaSource {
            name: "registry-ca".to_string(),
        };
        let reference = source.config_map_ref().unwrap();
        assert_eq!(reference.namespace, "openshift-config");
        assert_eq!(reference.name, "registry-ca");
        assert_eq!(reference.key, "ca-bundle.crt");
    }

    #[test]
    fn test_storage_schema_has_flat_fields_and_union_rule() {
        let schema = schemars::schema_for!(ImageRegistryConfigStorage);
        let json = serde_json::to_value(&schema).unwrap();
        let properties = json["properties"].as_object().unwrap();
        for field in [
            "emptyDir",
            "s3",
            "gcs",
            "swift",
            "pvc",
            "azure",
            "ibmcos",
            "oss",
            "managementState",
        ] {
            assert!(properties.contains_key(field), "missing {}", field);
        }
        assert_eq!(json["x-kubernetes-validations"][0]["rule"], STORAGE_UNION_RULE);
    }
}
