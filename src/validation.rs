//! Field-level validation for Config objects
//!
//! Decoding already enforces the shape of the object: enum strings, the
//! storage union and the Azure/Alibaba discriminated unions. The validator
//! here covers the rest of the schema constraints (patterns, lengths, URLs,
//! ranges) and reports every violation with its full field path in the
//! Kubernetes field error format, plus non-fatal warnings.

use std::collections::HashSet;
use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use url::Url;

use crate::crd::{
    AzureNetworkAccessInternal, Config, EncryptionAlibaba, ImageRegistryConfigProxy,
    ImageRegistryConfigRequestsLimits, ImageRegistryConfigRoute, ImageRegistryConfigStorage,
    ImageRegistryConfigStorageAlibabaOss, ImageRegistryConfigStorageAzure,
    ImageRegistryConfigStorageIbmCos, ImageRegistryConfigStorageS3,
    ImageRegistryConfigStorageS3CloudFront, ImageRegistryConfigStorageSwift, ImageRegistrySpec,
    StorageBackend,
};

// =============================================================================
// Field Errors
// =============================================================================

/// The rule a field violated
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldErrorKind {
    /// A required field is missing or empty
    Required,
    /// The value is malformed
    Invalid { value: String, detail: String },
    /// The value is not one of an allowed set
    NotSupported { value: String, supported: Vec<String> },
    /// The field may not be set in this context
    Forbidden { detail: String },
    /// The value exceeds a maximum length
    TooLong { max: usize },
    /// The value repeats one that must be unique
    Duplicate { value: String },
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldErrorKind::Required => write!(f, "Required value"),
            FieldErrorKind::Invalid { value, detail } => {
                write!(f, "Invalid value: {:?}: {}", value, detail)
            }
            FieldErrorKind::NotSupported { value, supported } => {
                let quoted: Vec<String> = supported.iter().map(|s| format!("{:?}", s)).collect();
                write!(
                    f,
                    "Unsupported value: {:?}: supported values: {}",
                    value,
                    quoted.join(", ")
                )
            }
            FieldErrorKind::Forbidden { detail } => write!(f, "Forbidden: {}", detail),
            FieldErrorKind::TooLong { max } => {
                write!(f, "Too long: may not be longer than {}", max)
            }
            FieldErrorKind::Duplicate { value } => write!(f, "Duplicate value: {:?}", value),
        }
    }
}

/// A single violated constraint, naming the field by its JSON path
///
/// Errors raised while decoding a union carry a path relative to the union
/// value; an empty path names the value itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub kind: FieldErrorKind,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}: {}", self.field, self.kind)
        }
    }
}

impl std::error::Error for FieldError {}

impl FieldError {
    pub fn required(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Required,
        }
    }

    pub fn invalid(
        field: impl Into<String>,
        value: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Invalid {
                value: value.into(),
                detail: detail.into(),
            },
        }
    }

    pub fn not_supported(field: impl Into<String>, value: impl Into<String>, supported: &[&str]) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::NotSupported {
                value: value.into(),
                supported: supported.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn forbidden(field: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Forbidden {
                detail: detail.into(),
            },
        }
    }

    pub fn too_long(field: impl Into<String>, max: usize) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::TooLong { max },
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: FieldErrorKind::Duplicate {
                value: value.into(),
            },
        }
    }
}

/// All field errors found in one object
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl std::error::Error for ValidationErrors {}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        write!(f, "{}", messages.join("; "))
    }
}

impl ValidationErrors {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

/// Outcome of validating an object: errors reject it, warnings do not
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// Check whether the object may be persisted
    pub fn is_allowed(&self) -> bool {
        self.errors.is_empty()
    }

    /// Split into the warnings on success or the errors on rejection
    pub fn into_result(self) -> Result<Vec<String>, ValidationErrors> {
        if self.errors.is_empty() {
            Ok(self.warnings)
        } else {
            Err(ValidationErrors(self.errors))
        }
    }
}

// =============================================================================
// Patterns
// =============================================================================

macro_rules! static_regex {
    ($pattern:expr, $name:expr) => {
        Regex::new($pattern).unwrap_or_else(|_| {
            panic!("Static regex '{}' failed to compile - this is a bug", $name)
        })
    };
}

pub const BUCKET_NAME_PATTERN: &str = r"^[0-9a-z]+(-[0-9a-z]+)*$";
pub const DNS_SUBDOMAIN_PATTERN: &str =
    r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?(\.[a-z0-9]([-a-z0-9]*[a-z0-9])?)*$";
pub const RESOURCE_GROUP_PATTERN: &str = r"^[0-9A-Za-z_.-](?:[0-9A-Za-z_.-]*[0-9A-Za-z_-])?$";
pub const VNET_NAME_PATTERN: &str = r"^[0-9A-Za-z][0-9A-Za-z_.-]*[0-9A-Za-z_]$";
pub const SUBNET_NAME_PATTERN: &str = r"^[0-9A-Za-z](?:[0-9A-Za-z_.-]*[0-9A-Za-z_])?$";
pub const RESOURCE_KEY_CRN_PATTERN: &str =
    r"^crn:.+:.+:.+:cloud-object-storage:.+:.+:.+:resource-key:.+$";
pub const SERVICE_INSTANCE_CRN_PATTERN: &str = r"^crn:.+:.+:.+:cloud-object-storage:.+:.+:.+::$";

/// DNS-1123 subdomains are limited to 253 characters.
pub const DNS_SUBDOMAIN_MAX_LENGTH: usize = 253;

static BUCKET_NAME: Lazy<Regex> = Lazy::new(|| static_regex!(BUCKET_NAME_PATTERN, "BUCKET_NAME"));
static DNS_SUBDOMAIN: Lazy<Regex> =
    Lazy::new(|| static_regex!(DNS_SUBDOMAIN_PATTERN, "DNS_SUBDOMAIN"));
static RESOURCE_GROUP: Lazy<Regex> =
    Lazy::new(|| static_regex!(RESOURCE_GROUP_PATTERN, "RESOURCE_GROUP"));
static VNET_NAME: Lazy<Regex> = Lazy::new(|| static_regex!(VNET_NAME_PATTERN, "VNET_NAME"));
static SUBNET_NAME: Lazy<Regex> = Lazy::new(|| static_regex!(SUBNET_NAME_PATTERN, "SUBNET_NAME"));
static RESOURCE_KEY_CRN: Lazy<Regex> =
    Lazy::new(|| static_regex!(RESOURCE_KEY_CRN_PATTERN, "RESOURCE_KEY_CRN"));
static SERVICE_INSTANCE_CRN: Lazy<Regex> =
    Lazy::new(|| static_regex!(SERVICE_INSTANCE_CRN_PATTERN, "SERVICE_INSTANCE_CRN"));

// =============================================================================
// Validator
// =============================================================================

/// Collects errors and warnings while walking an object
#[derive(Debug, Default)]
pub(crate) struct Validator {
    errors: Vec<FieldError>,
    warnings: Vec<String>,
}

fn join(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{}.{}", path, field)
    }
}

impl Validator {
    fn error(&mut self, error: FieldError) {
        self.errors.push(error);
    }

    fn warn(&mut self, path: &str, message: &str) {
        self.warnings.push(format!("{}: {}", path, message));
    }

    fn required(&mut self, path: &str, value: &str) -> bool {
        if value.is_empty() {
            self.error(FieldError::required(path));
            return false;
        }
        true
    }

    fn non_negative(&mut self, path: &str, value: i64) {
        if value < 0 {
            self.error(FieldError::invalid(
                path,
                value.to_string(),
                "must be greater than or equal to 0",
            ));
        }
    }

    /// Length bounds in characters, checked only for non-empty values.
    fn length(&mut self, path: &str, value: &str, min: usize, max: usize) -> bool {
        let len = value.chars().count();
        if len > max {
            self.error(FieldError::too_long(path, max));
            return false;
        }
        if len < min {
            self.error(FieldError::invalid(
                path,
                value,
                format!("must be at least {} characters", min),
            ));
            return false;
        }
        true
    }

    fn pattern(&mut self, path: &str, value: &str, regex: &Regex, pattern: &str) {
        if !regex.is_match(value) {
            self.error(FieldError::invalid(
                path,
                value,
                format!("must match the pattern {}", pattern),
            ));
        }
    }

    /// Optional string constrained by length and pattern
    fn bounded(&mut self, path: &str, value: &str, min: usize, max: usize, regex: &Regex, pattern: &str) {
        if value.is_empty() {
            return;
        }
        if self.length(path, value, min, max) {
            self.pattern(path, value, regex, pattern);
        }
    }

    fn url(&mut self, path: &str, value: &str, schemes: &[&str]) {
        match Url::parse(value) {
            Ok(url) if !schemes.is_empty() && !schemes.contains(&url.scheme()) => {
                self.error(FieldError::not_supported(path, url.scheme(), schemes));
            }
            Ok(url) if url.host_str().is_none() => {
                self.error(FieldError::invalid(path, value, "must include a host"));
            }
            Ok(_) => {}
            Err(e) => {
                self.error(FieldError::invalid(
                    path,
                    value,
                    format!("must be a valid URL with scheme: {}", e),
                ));
            }
        }
    }

    pub(crate) fn finish(self) -> ValidationReport {
        debug!(
            errors = self.errors.len(),
            warnings = self.warnings.len(),
            "Validation finished"
        );
        ValidationReport {
            errors: self.errors,
            warnings: self.warnings,
        }
    }
}

/// Types that validate themselves at a given field path
pub(crate) trait Validate {
    fn validate_at(&self, path: &str, v: &mut Validator);
}

// =============================================================================
// Config
// =============================================================================

impl Config {
    /// Validate the whole object.
    ///
    /// Errors name the full field path, e.g. `spec.storage.azure.container`.
    pub fn validate(&self) -> ValidationReport {
        let mut v = Validator::default();
        if let Some(name) = self.metadata.name.as_deref() {
            if name != Config::SINGLETON_NAME {
                v.warn(
                    "metadata.name",
                    &format!(
                        "only the Config named {:?} is acted upon by the operator",
                        Config::SINGLETON_NAME
                    ),
                );
            }
        }
        self.spec.validate_at("spec", &mut v);
        v.finish()
    }
}

impl ImageRegistrySpec {
    /// Validate the spec, reporting paths under `spec`.
    pub fn validate(&self) -> ValidationReport {
        let mut v = Validator::default();
        self.validate_at("spec", &mut v);
        v.finish()
    }
}

impl Validate for ImageRegistrySpec {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        if self.replicas < 0 {
            v.error(FieldError::invalid(
                join(path, "replicas"),
                self.replicas.to_string(),
                "must be greater than or equal to 0",
            ));
        }
        if self.logging != 0 {
            v.warn(
                &join(path, "logging"),
                "deprecated, use logLevel instead",
            );
        }
        if self.operator.unsupported_config_overrides.is_some() {
            v.warn(
                &join(path, "unsupportedConfigOverrides"),
                "use of this field is unsupported and may block upgrades",
            );
        }

        self.proxy.validate_at(&join(path, "proxy"), v);

        let requests = join(path, "requests");
        self.requests.read.validate_at(&join(&requests, "read"), v);
        self.requests.write.validate_at(&join(&requests, "write"), v);

        let routes = join(path, "routes");
        let mut seen = HashSet::new();
        for (i, route) in self.routes.iter().enumerate() {
            let route_path = format!("{}[{}]", routes, i);
            route.validate_at(&route_path, v);
            if !route.name.is_empty() && !seen.insert(route.name.as_str()) {
                v.error(FieldError::duplicate(join(&route_path, "name"), &route.name));
            }
        }

        let storage = join(path, "storage");
        self.storage.validate_at(&storage, v);
        if self.storage.empty_dir().is_some() && self.replicas > 1 {
            v.warn(
                &join(&storage, "emptyDir"),
                &format!(
                    "ephemeral storage is not shared between the {} replicas and is lost when a pod is removed",
                    self.replicas
                ),
            );
        }
    }
}

impl Validate for ImageRegistryConfigProxy {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        for (field, value) in [("http", &self.http), ("https", &self.https)] {
            if !value.is_empty() {
                v.url(&join(path, field), value, &["http", "https"]);
            }
        }
    }
}

impl Validate for ImageRegistryConfigRequestsLimits {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        v.non_negative(&join(path, "maxRunning"), self.max_running);
        v.non_negative(&join(path, "maxInQueue"), self.max_in_queue);
    }
}

impl Validate for ImageRegistryConfigRoute {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        v.required(&join(path, "name"), &self.name);
        if !self.hostname.is_empty() {
            let hostname = join(path, "hostname");
            if v.length(&hostname, &self.hostname, 1, DNS_SUBDOMAIN_MAX_LENGTH) {
                v.pattern(&hostname, &self.hostname, &DNS_SUBDOMAIN, DNS_SUBDOMAIN_PATTERN);
            }
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

impl Validate for ImageRegistryConfigStorage {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        let Some(backend) = &self.backend else {
            return;
        };
        let backend_path = join(path, backend.field_name());
        match backend {
            StorageBackend::S3(s3) => s3.validate_at(&backend_path, v),
            StorageBackend::Swift(swift) => swift.validate_at(&backend_path, v),
            StorageBackend::Azure(azure) => azure.validate_at(&backend_path, v),
            StorageBackend::IbmCos(ibmcos) => ibmcos.validate_at(&backend_path, v),
            StorageBackend::Oss(oss) => oss.validate_at(&backend_path, v),
            StorageBackend::EmptyDir(_) | StorageBackend::Gcs(_) | StorageBackend::Pvc(_) => {}
        }
    }
}

impl Validate for ImageRegistryConfigStorageS3 {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        if !self.region_endpoint.is_empty() {
            v.url(&join(path, "regionEndpoint"), &self.region_endpoint, &[]);
        }
        if !self.key_id.is_empty() && !self.encrypt {
            v.warn(
                &join(path, "keyID"),
                "ignored because encrypt is false",
            );
        }
        if let Some(cloud_front) = &self.cloud_front {
            cloud_front.validate_at(&join(path, "cloudFront"), v);
        }
        if !self.trusted_ca.name.is_empty() {
            let name = join(path, "trustedCA.name");
            if v.length(&name, &self.trusted_ca.name, 1, DNS_SUBDOMAIN_MAX_LENGTH) {
                v.pattern(&name, &self.trusted_ca.name, &DNS_SUBDOMAIN, DNS_SUBDOMAIN_PATTERN);
            }
        }
    }
}

impl Validate for ImageRegistryConfigStorageS3CloudFront {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        let base_url = join(path, "baseURL");
        if v.required(&base_url, &self.base_url) {
            v.url(&base_url, &self.base_url, &[]);
        }
        v.required(&join(path, "privateKey.key"), &self.private_key.key);
        v.required(&join(path, "keypairID"), &self.keypair_id);
    }
}

impl Validate for ImageRegistryConfigStorageSwift {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        if !self.auth_url.is_empty() {
            v.url(&join(path, "authURL"), &self.auth_url, &[]);
        }
    }
}

impl Validate for ImageRegistryConfigStorageAzure {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        v.bounded(
            &join(path, "container"),
            &self.container,
            3,
            63,
            &BUCKET_NAME,
            BUCKET_NAME_PATTERN,
        );
        if let Some(internal) = self.network_access.as_ref().and_then(|a| a.internal()) {
            internal.validate_at(&join(path, "networkAccess.internal"), v);
        }
    }
}

impl Validate for AzureNetworkAccessInternal {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        v.bounded(
            &join(path, "networkResourceGroupName"),
            &self.network_resource_group_name,
            1,
            90,
            &RESOURCE_GROUP,
            RESOURCE_GROUP_PATTERN,
        );
        v.bounded(
            &join(path, "vnetName"),
            &self.vnet_name,
            2,
            64,
            &VNET_NAME,
            VNET_NAME_PATTERN,
        );
        v.bounded(
            &join(path, "subnetName"),
            &self.subnet_name,
            1,
            80,
            &SUBNET_NAME,
            SUBNET_NAME_PATTERN,
        );
        v.bounded(
            &join(path, "privateEndpointName"),
            &self.private_endpoint_name,
            2,
            64,
            &VNET_NAME,
            VNET_NAME_PATTERN,
        );
    }
}

impl Validate for ImageRegistryConfigStorageIbmCos {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        if !self.resource_key_crn.is_empty() {
            v.pattern(
                &join(path, "resourceKeyCRN"),
                &self.resource_key_crn,
                &RESOURCE_KEY_CRN,
                RESOURCE_KEY_CRN_PATTERN,
            );
        }
        if !self.service_instance_crn.is_empty() {
            v.pattern(
                &join(path, "serviceInstanceCRN"),
                &self.service_instance_crn,
                &SERVICE_INSTANCE_CRN,
                SERVICE_INSTANCE_CRN_PATTERN,
            );
        }
    }
}

impl Validate for ImageRegistryConfigStorageAlibabaOss {
    fn validate_at(&self, path: &str, v: &mut Validator) {
        v.bounded(
            &join(path, "bucket"),
            &self.bucket,
            3,
            63,
            &BUCKET_NAME,
            BUCKET_NAME_PATTERN,
        );
        if let Some(EncryptionAlibaba::Kms(kms)) = &self.encryption {
            v.required(&join(path, "encryption.kms.keyID"), &kms.key_id);
        }
    }
}
