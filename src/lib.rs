//! Image Registry Operator Configuration API
//!
//! Typed schema for the cluster image registry operator's `Config` resource:
//! desired state (storage backend, routes, scaling, request limits) and the
//! status the operator reports back.
//!
//! # Wire Boundary
//!
//! ```text
//! JSON/YAML ──▶ decode adapters ──▶ Config ──▶ validate() ──▶ accept / reject
//!               (union rules)                 (field rules)
//! ```
//!
//! Union invariants (one storage backend, Azure network access, Alibaba
//! encryption) are enforced while decoding, so a `Config` value can never
//! hold an illegal combination. Field-level constraints are reported by
//! [`validation`] with Kubernetes-style field paths.
//!
//! # Modules
//!
//! - [`crd`] - Custom Resource Definition and supporting types
//! - [`validation`] - Field errors, warnings and the validator
//! - [`update`] - Merge patches with atomic replace semantics
//! - [`manifest`] - Reading YAML/JSON manifests
//! - [`admission`] - Validating admission webhook server
//! - [`error`] - Error types

pub mod admission;
pub mod crd;
pub mod error;
pub mod manifest;
pub mod update;
pub mod validation;

// Re-export commonly used types
pub use crd::{Config, ImageRegistrySpec, ImageRegistryStatus};
pub use error::{Error, Result};
pub use update::apply_merge_patch;
pub use validation::{FieldError, ValidationErrors, ValidationReport};
