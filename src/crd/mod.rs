//! Custom Resource Definitions
//!
//! This module contains the `Config` resource and every type reachable from
//! its spec and status.

mod alibaba;
mod azure;
mod config;
mod duration;
mod operator;
mod schema;
mod storage;

#[cfg(test)]
mod proptest;

// Re-export all types for public API
pub use config::{
    Config, ImageRegistryConfigProxy, ImageRegistryConfigRequests,
    ImageRegistryConfigRequestsLimits, ImageRegistryConfigRoute, ImageRegistrySpec,
    ImageRegistryStatus, RolloutStrategy,
};

pub use operator::{
    ConditionStatus, GenerationStatus, LogLevel, ManagementState, OperatorCondition, OperatorSpec,
    OperatorStatus,
};

pub use storage::{
    ConfigMapKeyRef, ImageRegistryConfigStorage, ImageRegistryConfigStorageEmptyDir,
    ImageRegistryConfigStorageGcs, ImageRegistryConfigStorageIbmCos,
    ImageRegistryConfigStoragePvc, ImageRegistryConfigStorageS3,
    ImageRegistryConfigStorageS3CloudFront, ImageRegistryConfigStorageSwift, S3TrustedCaSource,
    StorageBackend, StorageManagementState, STORAGE_UNION_MESSAGE, STORAGE_UNION_RULE,
    TRUSTED_CA_KEY, TRUSTED_CA_NAMESPACE,
};

pub use azure::{
    AzureNetworkAccess, AzureNetworkAccessInternal, AzureNetworkAccessType,
    ImageRegistryConfigStorageAzure, AZURE_INTERNAL_FORBIDDEN, AZURE_NETWORK_ACCESS_RULE,
};

pub use alibaba::{
    AlibabaEncryptionMethod, EncryptionAlibaba, EndpointAccessibility,
    ImageRegistryConfigStorageAlibabaOss, KmsEncryptionAlibaba, ALIBABA_KMS_RULE,
};

pub use duration::{format_duration, parse_duration, Duration};

/// List form of [`Config`]
pub type ConfigList = kube::core::ObjectList<Config>;
