//! Reading Config manifests from files
//!
//! Manifests are YAML (possibly several `---` separated documents) or JSON.
//! A document whose kind is a list (`ConfigList`, `List`) contributes each of
//! its items. Decoding always goes through `serde_json` so union errors read
//! the same regardless of the input format.

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::crd::Config;
use crate::error::{Error, Result};

/// One object found in a manifest
#[derive(Debug)]
pub struct Document {
    /// Position among the objects of the manifest, starting at 0
    pub index: usize,
    /// The decoded object, or why it could not be decoded
    pub config: Result<Config>,
}

/// Split manifest text into raw objects, expanding lists.
pub fn parse_values(text: &str) -> Result<Vec<Value>> {
    let trimmed = text.trim_start();
    let raw = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str::<Value>(trimmed)? {
            Value::Array(items) => items,
            value => vec![value],
        }
    } else {
        let mut values = Vec::new();
        for document in serde_yaml::Deserializer::from_str(text) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            values.push(serde_json::to_value(value)?);
        }
        values
    };

    let mut objects = Vec::with_capacity(raw.len());
    for value in raw {
        match list_items(&value) {
            Some(items) => objects.extend(items.iter().cloned()),
            None => objects.push(value),
        }
    }
    Ok(objects)
}

fn list_items(value: &Value) -> Option<&Vec<Value>> {
    let kind = value.get("kind")?.as_str()?;
    if kind.ends_with("List") {
        value.get("items")?.as_array()
    } else {
        None
    }
}

/// Decode one object as a Config.
///
/// Failures below the root are reported as [`Error::Decode`] with the full
/// field path, e.g. `spec.storage.oss.encryption: kms: Required value`.
pub fn decode_config(value: Value) -> Result<Config> {
    serde_path_to_error::deserialize(value).map_err(|e| {
        let at_root = e.path().iter().next().is_none();
        let path = e.path().to_string();
        let source = e.into_inner();
        if at_root {
            Error::Json(source)
        } else {
            Error::Decode { path, source }
        }
    })
}

/// Decode every object in the manifest text.
pub fn parse_documents(text: &str) -> Result<Vec<Document>> {
    let documents: Vec<Document> = parse_values(text)?
        .into_iter()
        .enumerate()
        .map(|(index, value)| Document {
            index,
            config: decode_config(value),
        })
        .collect();
    debug!(documents = documents.len(), "Parsed manifest");
    Ok(documents)
}

/// Decode every object in a manifest file.
pub fn load_documents(path: &Path) -> Result<Vec<Document>> {
    let text = std::fs::read_to_string(path)?;
    parse_documents(&text)
}

/// Load a manifest file that must hold exactly one Config.
pub fn load_config(path: &Path) -> Result<Config> {
    let mut documents = load_documents(path)?;
    if documents.len() != 1 {
        return Err(Error::Manifest(format!(
            "{} holds {} objects, expected exactly one Config",
            path.display(),
            documents.len()
        )));
    }
    documents.remove(0).config
}

/// Load a merge patch from a YAML or JSON file.
pub fn load_patch(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    let mut values = parse_values(&text)?;
    match values.len() {
        1 => Ok(values.remove(0)),
        n => Err(Error::Manifest(format!(
            "{} holds {} documents, expected exactly one patch",
            path.display(),
            n
        ))),
    }
}

/// Render a Config as a YAML manifest.
pub fn to_yaml(config: &Config) -> Result<String> {
    Ok(serde_yaml::to_string(config)?)
}
