//! Azure Blob Storage backend
//!
//! Network access is a discriminated union on the wire (`type` plus an
//! optional `internal` detail record). In Rust it is an enum, so a detail
//! record can only exist for the `Internal` variant; the decode adapter
//! rejects wire input that pairs `internal` with any other type.

use schemars::gen::SchemaGenerator;
use schemars::schema::Schema;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::schema::{defaulted, empty_as_none, with_default, with_validation};
use crate::validation::FieldError;

/// CEL rule mirrored by [`AzureNetworkAccess`]'s decode adapter.
pub const AZURE_NETWORK_ACCESS_RULE: &str =
    "has(self.type) && self.type == 'Internal' ?  true : !has(self.internal)";

/// Message reported when `internal` is set without `type: Internal`.
pub const AZURE_INTERNAL_FORBIDDEN: &str = "internal is forbidden when type is not Internal";

/// Holds the information to configure the registry to use Azure Blob
/// Storage for backend storage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ImageRegistryConfigStorageAzure {
    /// accountName defines the account to be used by the registry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub account_name: String,

    /// container defines Azure's container to be used by registry.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(length(min = 3, max = 63), regex(pattern = r"^[0-9a-z]+(-[0-9a-z]+)*$"))]
    pub container: String,

    /// cloudName is the name of the Azure cloud environment to be used by the
    /// registry. If empty, the operator will set it based on the
    /// infrastructure object.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cloud_name: String,

    /// networkAccess defines the network access properties for the storage
    /// account. Defaults to type: External.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_access: Option<AzureNetworkAccess>,
}

impl ImageRegistryConfigStorageAzure {
    /// Network access with the documented default applied
    pub fn network_access_or_default(&self) -> AzureNetworkAccess {
        self.network_access.clone().unwrap_or_default()
    }
}

/// Network access level for the storage account
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum AzureNetworkAccessType {
    /// The storage account is private, exposed only within the cluster's vnet
    Internal,
    /// The storage account is publicly accessible
    External,
}

/// Network access properties for the storage account.
///
/// Wire form: `{"type": "Internal"|"External", "internal": {...}}`. An absent
/// `type` means `External`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "AzureNetworkAccessWire", into = "AzureNetworkAccessWire")]
pub enum AzureNetworkAccess {
    /// Publicly exposed storage account
    #[default]
    External,
    /// Private storage account. Without a detail record the operator
    /// discovers the vnet and subnet and generates a private endpoint name.
    Internal(Option<AzureNetworkAccessInternal>),
}

impl AzureNetworkAccess {
    /// The wire discriminator for this variant
    pub fn access_type(&self) -> AzureNetworkAccessType {
        match self {
            AzureNetworkAccess::External => AzureNetworkAccessType::External,
            AzureNetworkAccess::Internal(_) => AzureNetworkAccessType::Internal,
        }
    }

    /// Detail record, only ever present for `Internal`
    pub fn internal(&self) -> Option<&AzureNetworkAccessInternal> {
        match self {
            AzureNetworkAccess::Internal(internal) => internal.as_ref(),
            AzureNetworkAccess::External => None,
        }
    }
}

/// vnet and subnet names used to configure a private endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AzureNetworkAccessInternal {
    /// networkResourceGroupName is the resource group name where the
    /// cluster's vnet and subnet are. When omitted, the registry operator will
    /// use the cluster resource group. It must be between 1 and 90 characters
    /// in length and must consist only of alphanumeric characters, hyphens
    /// (-), periods (.) and underscores (_), and not end with a period.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(
        length(min = 1, max = 90),
        regex(pattern = r"^[0-9A-Za-z_.-](?:[0-9A-Za-z_.-]*[0-9A-Za-z_-])?$")
    )]
    pub network_resource_group_name: String,

    /// vnetName is the name of the vnet the registry operates in. When
    /// omitted, the registry operator will discover it. It must be between 2
    /// and 64 characters, start with an alphanumeric character and end with an
    /// alphanumeric character or an underscore.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(
        length(min = 2, max = 64),
        regex(pattern = r"^[0-9A-Za-z][0-9A-Za-z_.-]*[0-9A-Za-z_]$")
    )]
    pub vnet_name: String,

    /// subnetName is the name of the subnet the registry operates in. When
    /// omitted, the registry operator will discover it. It must be between 1
    /// and 80 characters.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(
        length(min = 1, max = 80),
        regex(pattern = r"^[0-9A-Za-z](?:[0-9A-Za-z_.-]*[0-9A-Za-z_])?$")
    )]
    pub subnet_name: String,

    /// privateEndpointName is the name of the private endpoint for the
    /// registry. When omitted, the registry will generate one. It must be
    /// between 2 and 64 characters.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    #[schemars(
        length(min = 2, max = 64),
        regex(pattern = r"^[0-9A-Za-z][0-9A-Za-z_.-]*[0-9A-Za-z_]$")
    )]
    pub private_endpoint_name: String,
}

// =============================================================================
// Wire Adapter
// =============================================================================

/// AzureNetworkAccess defines the network access properties for the storage account.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
struct AzureNetworkAccessWire {
    /// type is the network access level to be used for the storage account.
    /// type: Internal means the storage account will be private, type:
    /// External means the storage account will be publicly accessible.
    /// Defaults to "External".
    #[serde(
        default,
        rename = "type",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "empty_as_none"
    )]
    #[schemars(schema_with = "access_type_schema")]
    access_type: Option<AzureNetworkAccessType>,

    /// internal defines the vnet and subnet names to configure a private
    /// endpoint and connect it to the storage account in order to make it
    /// private.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    internal: Option<AzureNetworkAccessInternal>,
}

fn access_type_schema(gen: &mut SchemaGenerator) -> Schema {
    defaulted::<Option<AzureNetworkAccessType>>(gen, json!("External"))
}

impl TryFrom<AzureNetworkAccessWire> for AzureNetworkAccess {
    type Error = FieldError;

    fn try_from(wire: AzureNetworkAccessWire) -> Result<Self, Self::Error> {
        match (wire.access_type, wire.internal) {
            (Some(AzureNetworkAccessType::Internal), internal) => {
                Ok(AzureNetworkAccess::Internal(internal))
            }
            (_, Some(_)) => Err(FieldError::forbidden("internal", AZURE_INTERNAL_FORBIDDEN)),
            (_, None) => Ok(AzureNetworkAccess::External),
        }
    }
}

impl From<AzureNetworkAccess> for AzureNetworkAccessWire {
    fn from(access: AzureNetworkAccess) -> Self {
        match access {
            AzureNetworkAccess::External => AzureNetworkAccessWire {
                access_type: Some(AzureNetworkAccessType::External),
                internal: None,
            },
            AzureNetworkAccess::Internal(internal) => AzureNetworkAccessWire {
                access_type: Some(AzureNetworkAccessType::Internal),
                internal,
            },
        }
    }
}

impl JsonSchema for AzureNetworkAccess {
    fn schema_name() -> String {
        "AzureNetworkAccess".to_string()
    }

    fn json_schema(gen: &mut SchemaGenerator) -> Schema {
        let schema = with_validation(
            AzureNetworkAccessWire::json_schema(gen),
            AZURE_NETWORK_ACCESS_RULE,
            AZURE_INTERNAL_FORBIDDEN,
        );
        with_default(schema, json!({"type": "External"}))
    }
}
